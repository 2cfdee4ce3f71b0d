use redis::Script;
use std::sync::LazyLock;

pub const DOCUMENT_INSERT_SCRIPT_BODY: &str = include_str!("../../lua/document_insert.lua");
pub const DOCUMENT_UPDATE_SCRIPT_BODY: &str = include_str!("../../lua/document_update.lua");
pub const DOCUMENT_DELETE_SCRIPT_BODY: &str = include_str!("../../lua/document_delete.lua");
pub const COLLECTION_SCAN_SCRIPT_BODY: &str = include_str!("../../lua/collection_scan.lua");

pub static DOCUMENT_INSERT_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(DOCUMENT_INSERT_SCRIPT_BODY));
pub static DOCUMENT_UPDATE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(DOCUMENT_UPDATE_SCRIPT_BODY));
pub static DOCUMENT_DELETE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(DOCUMENT_DELETE_SCRIPT_BODY));
pub static COLLECTION_SCAN_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(COLLECTION_SCAN_SCRIPT_BODY));
