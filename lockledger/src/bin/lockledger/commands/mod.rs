pub mod destroy;
pub mod init;
pub mod resolve;
pub mod status;
pub mod unlock;
