//! `SQLite` schema for the document store.
//!
//! Every document of every collection lives in one `documents` table, keyed
//! by its collection path and document id. Subcollections are ordinary
//! collection paths such as `students/<id>/phones`.

/// Documents of all collections. `seq` preserves insertion order.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (collection, doc_id)
)
";

/// Listing a collection scans by path in insertion order. Added by migration 1.
pub const CREATE_COLLECTION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq)
";

/// Key-value pairs for store bookkeeping (schema version).
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_DOCUMENTS_TABLE, CREATE_METADATA_TABLE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_table_columns() {
        assert!(CREATE_DOCUMENTS_TABLE.contains("seq INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("collection TEXT NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("doc_id TEXT NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("UNIQUE (collection, doc_id)"));
    }

    #[test]
    fn test_schema_statements_in_dependency_order() {
        assert_eq!(SCHEMA_STATEMENTS[0], CREATE_DOCUMENTS_TABLE);
        assert!(SCHEMA_STATEMENTS
            .iter()
            .all(|stmt| stmt.contains("IF NOT EXISTS")));
        assert!(!SCHEMA_STATEMENTS.contains(&CREATE_COLLECTION_INDEX));
    }
}
