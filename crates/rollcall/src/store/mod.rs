//! Record store client.
//!
//! [`RecordStore`] is the boundary to the document database holding student
//! records. Every operation is asynchronous and completes on its own; callers
//! get no ordering between operations they did not sequence themselves.
//!
//! The main document of a record holds only `{id, name, program}`. Phone
//! numbers live in a per-record subcollection of `{number}` documents and are
//! rewritten by [`RecordStore::replace_phones`].

pub mod migrations;
mod phones;
pub mod schema;
mod sqlite;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{PhoneDocument, StoreId, Student, StudentFields};

pub use phones::{replace_phones, PhoneSyncReport};
pub use sqlite::SqliteStore;

/// Operations against the students collection and its phone subcollections.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record and return the id the store assigned to it.
    ///
    /// The record's phones are written along with it.
    ///
    /// # Errors
    ///
    /// Returns a store write error if the document is rejected.
    async fn create(&self, fields: &StudentFields) -> Result<StoreId>;

    /// Overwrite the main document of an existing record.
    ///
    /// Only `{id, name, program}` is written; the phone subcollection is
    /// left alone.
    ///
    /// # Errors
    ///
    /// Returns a store write error if `store_id` does not exist or the write
    /// is rejected.
    async fn replace(&self, store_id: &StoreId, fields: &StudentFields) -> Result<()>;

    /// Delete a record and its phones.
    ///
    /// Returns `false` if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns a store write error if the delete is rejected. A missing
    /// document is not an error.
    async fn delete(&self, store_id: &StoreId) -> Result<bool>;

    /// Read every record in the collection, phones included.
    ///
    /// # Errors
    ///
    /// Returns a store read error if the collection cannot be read.
    async fn list_all(&self) -> Result<Vec<Student>>;

    /// Read the phone subcollection of one record, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a store read error if the subcollection cannot be read.
    async fn list_phones(&self, store_id: &StoreId) -> Result<Vec<PhoneDocument>>;

    /// Delete one phone document.
    ///
    /// # Errors
    ///
    /// Returns a store write error if the delete is rejected.
    async fn delete_phone(&self, store_id: &StoreId, phone_id: &StoreId) -> Result<()>;

    /// Add one phone document and return its id.
    ///
    /// # Errors
    ///
    /// Returns a store write error if the document is rejected.
    async fn add_phone(&self, store_id: &StoreId, number: &str) -> Result<StoreId>;

    /// Delete every phone of a record, then add `phones` in order.
    ///
    /// Not atomic; see [`replace_phones`].
    ///
    /// # Errors
    ///
    /// Returns a store write error if listing or the delete phase fails, and
    /// [`Error::PartialPhoneSync`](crate::Error::PartialPhoneSync) if the add
    /// phase fails after the delete phase succeeded.
    async fn replace_phones(&self, store_id: &StoreId, phones: &[String]) -> Result<PhoneSyncReport> {
        replace_phones(self, store_id, phones).await
    }
}
