use serde::Serialize;

use crate::{
    keys::KeyContext,
    store::{Document, Filter},
};

/// Single-document command executed by one Lua script.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCommand {
    Insert(DocumentInsert),
    Update(DocumentUpdate),
    Delete(DocumentDelete),
    Scan(CollectionScan),
}

impl DocumentCommand {
    /// Collection the command operates on, used to enrich error replies.
    pub fn collection(&self) -> &str {
        match self {
            DocumentCommand::Insert(cmd) => &cmd.collection,
            DocumentCommand::Update(cmd) => &cmd.collection,
            DocumentCommand::Delete(cmd) => &cmd.collection,
            DocumentCommand::Scan(cmd) => &cmd.collection,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentInsert {
    pub collection: String,
    pub key: String,
    pub index_key: String,
    pub id: String,
    /// Full JSON payload stored at `key`.
    pub document_json: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentUpdate {
    pub collection: String,
    pub key: String,
    pub index_key: String,
    pub filter: Filter,
    /// Fields merged into the matched document (or the body of an upserted one).
    pub set: Document,
    pub upsert: bool,
}

#[derive(Debug, Serialize)]
pub struct DocumentDelete {
    pub collection: String,
    pub key: String,
    pub index_key: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionScan {
    pub collection: String,
    pub index_key: String,
    pub document_prefix: String,
}

pub fn build_document_insert(keys: &KeyContext<'_>, id: &str, document_json: String) -> DocumentCommand {
    DocumentCommand::Insert(DocumentInsert {
        collection: keys.collection.to_string(),
        key: keys.document(id),
        index_key: keys.index(),
        id: id.to_string(),
        document_json,
    })
}

pub fn build_document_update(keys: &KeyContext<'_>, filter: &Filter, set: Document, upsert: bool) -> DocumentCommand {
    DocumentCommand::Update(DocumentUpdate {
        collection: keys.collection.to_string(),
        key: keys.document(&filter.id),
        index_key: keys.index(),
        filter: filter.clone(),
        set,
        upsert,
    })
}

pub fn build_document_delete(keys: &KeyContext<'_>, id: &str) -> DocumentCommand {
    DocumentCommand::Delete(DocumentDelete {
        collection: keys.collection.to_string(),
        key: keys.document(id),
        index_key: keys.index(),
        id: id.to_string(),
    })
}

pub fn build_collection_scan(keys: &KeyContext<'_>) -> DocumentCommand {
    DocumentCommand::Scan(CollectionScan {
        collection: keys.collection.to_string(),
        index_key: keys.index(),
        document_prefix: keys.document_prefix(),
    })
}
