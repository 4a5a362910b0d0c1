//! `SQLite`-backed document store.
//!
//! Emulates a document database on one table: collections are path strings,
//! documents are JSON bodies with store-assigned ids, and a record's phones
//! live under the collection path `<collection>/<store id>/<phones>`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{migrations, RecordStore};
use crate::config::{Config, DEFAULT_COLLECTION, DEFAULT_PHONE_SUBCOLLECTION};
use crate::error::{Error, Result};
use crate::record::{PhoneBody, PhoneDocument, StoreId, Student, StudentDocument, StudentFields};

/// Length of a store-assigned document id, in hex characters.
const ID_LEN: usize = 20;

/// Record store on a local `SQLite` database.
///
/// The connection sits behind a FIFO async mutex, so operations issued
/// concurrently are applied in the order they first reached the store.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    /// Top-level collection holding student documents.
    collection: String,
    /// Name of the per-student phone subcollection.
    phone_subcollection: String,
    /// Feeds id generation so ids minted in the same instant differ.
    id_counter: AtomicU64,
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening document store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Document store opened at {}", path.display());
        Ok(Self::with_connection(path, conn))
    }

    /// Create an in-memory store, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self::with_connection(PathBuf::from(":memory:"), conn))
    }

    /// Open the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::open(config.database_path())?.with_collections(
            config.store.collection.clone(),
            config.store.phone_subcollection.clone(),
        ))
    }

    fn with_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn: Mutex::new(conn),
            collection: DEFAULT_COLLECTION.to_string(),
            phone_subcollection: DEFAULT_PHONE_SUBCOLLECTION.to_string(),
            id_counter: AtomicU64::new(0),
        }
    }

    /// Use different collection names than `students` / `phones`.
    #[must_use]
    pub fn with_collections(
        mut self,
        collection: impl Into<String>,
        phone_subcollection: impl Into<String>,
    ) -> Self {
        self.collection = collection.into();
        self.phone_subcollection = phone_subcollection.into();
        self
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the top-level student collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Collection path of one record's phones.
    #[must_use]
    pub fn phones_path(&self, store_id: &StoreId) -> String {
        format!(
            "{}/{}/{}",
            self.collection, store_id, self.phone_subcollection
        )
    }

    /// Mint a new document id for `collection`.
    fn next_id(&self, collection: &str) -> StoreId {
        let counter = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        let mut hasher = blake3::Hasher::new();
        hasher.update(collection.as_bytes());
        hasher.update(&nanos.to_le_bytes());
        hasher.update(&counter.to_le_bytes());
        hasher.update(&std::process::id().to_le_bytes());
        let hex = hasher.finalize().to_hex();

        StoreId::new(&hex.as_str()[..ID_LEN])
    }
}

fn insert_document(conn: &Connection, collection: &str, doc_id: &str, data: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r"
        INSERT INTO documents (collection, doc_id, data, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        ",
        params![collection, doc_id, data, now],
    )?;
    Ok(())
}

/// Bodies of a collection's documents, in insertion order.
fn documents_in(conn: &Connection, collection: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        r"
        SELECT doc_id, data FROM documents
        WHERE collection = ?1 ORDER BY seq ASC
        ",
    )?;
    let documents = stmt
        .query_map([collection], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(documents)
}

fn string_field(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Read a main document; fields of the wrong type read as empty.
fn read_student(data: &str) -> Result<StudentDocument> {
    let body: Value = serde_json::from_str(data)?;
    Ok(StudentDocument {
        id: string_field(&body, "id"),
        name: string_field(&body, "name"),
        program: string_field(&body, "program"),
    })
}

/// Read a phone subcollection; documents without a string `number` are skipped.
fn read_phones(conn: &Connection, collection: &str) -> Result<Vec<PhoneDocument>> {
    let mut phones = Vec::new();
    for (doc_id, data) in documents_in(conn, collection)? {
        let body: Value = serde_json::from_str(&data)?;
        match body.get("number").and_then(Value::as_str) {
            Some(number) => phones.push(PhoneDocument {
                id: StoreId::new(doc_id),
                number: number.to_string(),
            }),
            None => debug!("Skipping phone document {collection}/{doc_id} without a number"),
        }
    }
    Ok(phones)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create(&self, fields: &StudentFields) -> Result<StoreId> {
        let store_id = self.next_id(&self.collection);
        let phones_path = self.phones_path(&store_id);

        let body = serde_json::to_string(&fields.to_document())
            .map_err(|err| Error::from(err).into_write("create"))?;
        let mut phone_bodies = Vec::with_capacity(fields.phones.len());
        for number in &fields.phones {
            let phone = serde_json::to_string(&PhoneBody {
                number: number.clone(),
            })
            .map_err(|err| Error::from(err).into_write("create"))?;
            phone_bodies.push((self.next_id(&phones_path), phone));
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|err| Error::from(err).into_write("create"))?;
        insert_document(&tx, &self.collection, store_id.as_str(), &body)
            .map_err(|err| err.into_write("create"))?;
        for (phone_id, phone) in &phone_bodies {
            insert_document(&tx, &phones_path, phone_id.as_str(), phone)
                .map_err(|err| err.into_write("create"))?;
        }
        tx.commit()
            .map_err(|err| Error::from(err).into_write("create"))?;

        debug!(
            "Created {}/{} with {} phones",
            self.collection,
            store_id,
            phone_bodies.len()
        );
        Ok(store_id)
    }

    async fn replace(&self, store_id: &StoreId, fields: &StudentFields) -> Result<()> {
        let body = serde_json::to_string(&fields.to_document())
            .map_err(|err| Error::from(err).into_write("replace"))?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().await;
        let affected = conn
            .execute(
                r"
                UPDATE documents SET data = ?1, updated_at = ?2
                WHERE collection = ?3 AND doc_id = ?4
                ",
                params![body, now, self.collection, store_id.as_str()],
            )
            .map_err(|err| Error::from(err).into_write("replace"))?;

        if affected == 0 {
            return Err(Error::store_write(
                "replace",
                format!("document {}/{} not found", self.collection, store_id),
            ));
        }
        debug!("Replaced {}/{}", self.collection, store_id);
        Ok(())
    }

    async fn delete(&self, store_id: &StoreId) -> Result<bool> {
        let phones_path = self.phones_path(store_id);

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|err| Error::from(err).into_write("delete"))?;
        let affected = tx
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2",
                params![self.collection, store_id.as_str()],
            )
            .map_err(|err| Error::from(err).into_write("delete"))?;
        tx.execute(
            "DELETE FROM documents WHERE collection = ?1",
            [&phones_path],
        )
        .map_err(|err| Error::from(err).into_write("delete"))?;
        tx.commit()
            .map_err(|err| Error::from(err).into_write("delete"))?;

        if affected == 0 {
            debug!("Delete of {}/{}: no such document", self.collection, store_id);
        } else {
            debug!("Deleted {}/{}", self.collection, store_id);
        }
        Ok(affected > 0)
    }

    async fn list_all(&self) -> Result<Vec<Student>> {
        let conn = self.conn.lock().await;
        let read = || -> Result<Vec<Student>> {
            let mut students = Vec::new();
            for (doc_id, data) in documents_in(&conn, &self.collection)? {
                let store_id = StoreId::new(doc_id);
                let phones = read_phones(&conn, &self.phones_path(&store_id))?
                    .into_iter()
                    .map(|phone| phone.number)
                    .collect();
                let fields = read_student(&data)?.into_fields(phones);
                students.push(Student::persisted(store_id, fields));
            }
            Ok(students)
        };
        let students = read().map_err(|err| err.into_read("list_all"))?;

        debug!("Listed {} documents in {}", students.len(), self.collection);
        Ok(students)
    }

    async fn list_phones(&self, store_id: &StoreId) -> Result<Vec<PhoneDocument>> {
        let conn = self.conn.lock().await;
        read_phones(&conn, &self.phones_path(store_id)).map_err(|err| err.into_read("list_phones"))
    }

    async fn delete_phone(&self, store_id: &StoreId, phone_id: &StoreId) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2",
            params![self.phones_path(store_id), phone_id.as_str()],
        )
        .map_err(|err| Error::from(err).into_write("delete_phone"))?;
        Ok(())
    }

    async fn add_phone(&self, store_id: &StoreId, number: &str) -> Result<StoreId> {
        let phones_path = self.phones_path(store_id);
        let phone_id = self.next_id(&phones_path);
        let body = serde_json::to_string(&PhoneBody {
            number: number.to_string(),
        })
        .map_err(|err| Error::from(err).into_write("add_phone"))?;

        let conn = self.conn.lock().await;
        insert_document(&conn, &phones_path, phone_id.as_str(), &body)
            .map_err(|err| err.into_write("add_phone"))?;
        Ok(phone_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test store")
    }

    fn ann() -> StudentFields {
        StudentFields::new("S1", "Ann", "CS", vec!["111".to_string()])
    }

    #[test]
    fn test_open_in_memory() {
        let store = create_test_store();
        assert_eq!(store.path().to_string_lossy(), ":memory:");
        assert_eq!(store.collection(), "students");
    }

    #[test]
    fn test_phones_path() {
        let store = create_test_store();
        assert_eq!(store.phones_path(&"d1".into()), "students/d1/phones");

        let store = create_test_store().with_collections("pupils", "numbers");
        assert_eq!(store.phones_path(&"d1".into()), "pupils/d1/numbers");
    }

    #[test]
    fn test_next_id_shape_and_uniqueness() {
        let store = create_test_store();
        let a = store.next_id("students");
        let b = store.next_id("students");

        assert_eq!(a.as_str().len(), ID_LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_create_then_list_round_trip() {
        let store = create_test_store();
        let id = store.create(&ann()).await.unwrap();

        assert!(id.is_assigned());
        let students = store.list_all().await.unwrap();
        assert_eq!(students, vec![Student::persisted(id, ann())]);
    }

    #[tokio::test]
    async fn test_main_document_has_no_phones_field() {
        let store = create_test_store();
        let id = store.create(&ann()).await.unwrap();

        let conn = store.conn.lock().await;
        let data: String = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = 'students' AND doc_id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .unwrap();
        let body: Value = serde_json::from_str(&data).unwrap();
        assert!(body.get("phones").is_none());
        assert_eq!(body["id"], "S1");
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = create_test_store();
        for name in ["Ann", "Bob", "Cid"] {
            store
                .create(&StudentFields::new("x", name, "CS", Vec::new()))
                .await
                .unwrap();
        }

        let names: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.fields.name)
            .collect();
        assert_eq!(names, vec!["Ann", "Bob", "Cid"]);
    }

    #[tokio::test]
    async fn test_replace_overwrites_fields_keeps_phones() {
        let store = create_test_store();
        let id = store.create(&ann()).await.unwrap();

        let changed = StudentFields::new("S1", "Anne", "Math", Vec::new());
        store.replace(&id, &changed).await.unwrap();

        let students = store.list_all().await.unwrap();
        assert_eq!(students[0].fields.name, "Anne");
        assert_eq!(students[0].fields.program, "Math");
        assert_eq!(students[0].fields.phones, vec!["111"]);
    }

    #[tokio::test]
    async fn test_replace_missing_document_fails() {
        let store = create_test_store();
        let err = store.replace(&"missing".into(), &ann()).await.unwrap_err();

        assert!(err.is_store_write());
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_delete_removes_document_and_phones() {
        let store = create_test_store();
        let id = store.create(&ann()).await.unwrap();

        assert!(store.delete(&id).await.unwrap());
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(store.list_phones(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_an_error() {
        let store = create_test_store();
        assert!(!store.delete(&"missing".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_and_delete_phone() {
        let store = create_test_store();
        let id = store
            .create(&StudentFields::new("S1", "Ann", "CS", Vec::new()))
            .await
            .unwrap();

        let phone_id = store.add_phone(&id, "555").await.unwrap();
        let phones = store.list_phones(&id).await.unwrap();
        assert_eq!(
            phones,
            vec![PhoneDocument {
                id: phone_id.clone(),
                number: "555".to_string()
            }]
        );

        store.delete_phone(&id, &phone_id).await.unwrap();
        assert!(store.list_phones(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lenient_document_reading() {
        let store = create_test_store();
        {
            let conn = store.conn.lock().await;
            insert_document(&conn, "students", "odd", r#"{"id": 7, "name": "Ann"}"#).unwrap();
            insert_document(&conn, "students/odd/phones", "p1", r#"{"number": "111"}"#).unwrap();
            insert_document(&conn, "students/odd/phones", "p2", r#"{"label": "home"}"#).unwrap();
        }

        let students = store.list_all().await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].fields.external_id, "");
        assert_eq!(students[0].fields.name, "Ann");
        assert_eq!(students[0].fields.phones, vec!["111"]);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_a_read_error() {
        let store = create_test_store();
        {
            let conn = store.conn.lock().await;
            insert_document(&conn, "students", "bad", "not json").unwrap();
        }

        let err = store.list_all().await.unwrap_err();
        assert!(err.is_store_read());
    }

    #[tokio::test]
    async fn test_open_file_based() {
        let db_path =
            std::env::temp_dir().join(format!("rollcall_test_{}.db", std::process::id()));

        let store = SqliteStore::open(&db_path).unwrap();
        store.create(&ann()).await.unwrap();
        assert_eq!(store.path(), db_path);
        drop(store);

        let reopened = SqliteStore::open(&db_path).unwrap();
        assert_eq!(reopened.list_all().await.unwrap().len(), 1);

        drop(reopened);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("rollcall_test_dirs_{}", std::process::id()));
        let nested_path = root.join("nested/students.db");
        let _ = std::fs::remove_dir_all(&root);

        let store = SqliteStore::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&root);
    }
}
