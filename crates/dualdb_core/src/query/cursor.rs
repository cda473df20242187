//! Pagination cursor.

use dualdb_storage::Item;

/// Where the next batch of a query starts.
///
/// Cursors are opaque to callers and only valid for the query that
/// produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationCursor {
    /// Continuation token of the attribute store.
    Token(String),
    /// Last evaluated key of the key/range store.
    Key(Item),
}

impl PaginationCursor {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Token(token) => format!("token {token}"),
            Self::Key(key) => {
                let parts: Vec<String> = key.iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!("key {}", parts.join(","))
            }
        }
    }
}
