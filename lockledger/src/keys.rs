/// Key-construction helpers for documents stored in Redis.
///
/// Layout: `prefix:collection:doc:<id>` per document, `prefix:collection:idx` for the
/// lexicographic id index and `prefix:collection:meta` as the collection marker.
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
    pub collection: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str, collection: &'a str) -> Self {
        Self { prefix, collection }
    }

    pub fn document(&self, id: &str) -> String {
        format!("{}:{}:doc:{}", self.prefix, self.collection, id)
    }

    /// Prefix shared by every document key; scripts append the id.
    pub fn document_prefix(&self) -> String {
        format!("{}:{}:doc:", self.prefix, self.collection)
    }

    pub fn index(&self) -> String {
        format!("{}:{}:idx", self.prefix, self.collection)
    }

    pub fn meta(&self) -> String {
        format!("{}:{}:meta", self.prefix, self.collection)
    }

    /// SCAN pattern matching every key owned by the collection. Glob characters in
    /// the prefix or collection name are matched literally.
    pub fn pattern(&self) -> String {
        format!("{}:{}:*", escape_glob(self.prefix), escape_glob(self.collection))
    }
}

fn escape_glob(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
