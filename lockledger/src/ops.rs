use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::errors::{MigrateError, MigrateResult};

/// Runs one store round-trip under the per-operation timeout, giving up early when
/// `cancel` fires.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> MigrateResult<T>
where
    F: Future<Output = MigrateResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MigrateError::Cancelled),
        result = tokio::time::timeout(timeout, fut) => {
            result.unwrap_or(Err(MigrateError::OperationTimeout { operation, timeout }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_operations_time_out() {
        let cancel = CancellationToken::new();
        let err = bounded("list applied migrations", Duration::from_millis(50), &cancel, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, MigrateError>(())
        })
        .await
        .expect_err("timeout");
        assert!(matches!(
            err,
            MigrateError::OperationTimeout { operation: "list applied migrations", .. }
        ));
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_work() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = bounded("remove migration", Duration::from_secs(5), &cancel, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, MigrateError>(())
        })
        .await
        .expect_err("cancelled");
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn fast_operations_pass_through() {
        let cancel = CancellationToken::new();
        let value = bounded("add migration", Duration::from_secs(1), &cancel, async { Ok(7) })
            .await
            .expect("value");
        assert_eq!(value, 7);
    }
}
