use redis::aio::ConnectionLike;
use serde_json::Value;

use crate::{
    errors::StoreError,
    runtime::{
        commands::DocumentCommand,
        scripts::{COLLECTION_SCAN_SCRIPT, DOCUMENT_DELETE_SCRIPT, DOCUMENT_INSERT_SCRIPT, DOCUMENT_UPDATE_SCRIPT},
    },
};

/// Runs one command as a single Lua script and returns the decoded `{"ok": true, ...}` reply.
pub async fn execute_command<C>(conn: &mut C, command: &DocumentCommand) -> Result<Value, StoreError>
where
    C: ConnectionLike + Send,
{
    let (script, payload) = match command {
        DocumentCommand::Insert(cmd) => (&*DOCUMENT_INSERT_SCRIPT, serde_json::to_string(cmd)?),
        DocumentCommand::Update(cmd) => (&*DOCUMENT_UPDATE_SCRIPT, serde_json::to_string(cmd)?),
        DocumentCommand::Delete(cmd) => (&*DOCUMENT_DELETE_SCRIPT, serde_json::to_string(cmd)?),
        DocumentCommand::Scan(cmd) => (&*COLLECTION_SCAN_SCRIPT, serde_json::to_string(cmd)?),
    };

    let mut invocation = script.prepare_invoke();
    invocation.arg(payload);
    let raw: String = invocation.invoke_async(conn).await?;

    decode_reply(command, &raw)
}

fn decode_reply(command: &DocumentCommand, raw: &str) -> Result<Value, StoreError> {
    let value: Value = serde_json::from_str(raw)?;

    if let Some(error) = value.get("error") {
        let code = error.as_str().unwrap_or("lua_error");
        return Err(match code {
            "duplicate_key" => StoreError::DuplicateKey {
                collection: command.collection().to_string(),
                id: value
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_default(),
            },
            other => StoreError::Script {
                code: other.to_string(),
            },
        });
    }

    Ok(value)
}
