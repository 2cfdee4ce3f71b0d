use uuid::Uuid;

/// Generates a fresh lock-holder token.
///
/// Tokens only need to be unique among concurrent holders; they are never reused
/// across process restarts.
pub fn generate_lock_token() -> String {
    Uuid::new_v4().to_string()
}
