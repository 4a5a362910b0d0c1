//! Fault-injecting store for exercising failure paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{RecordStore, SqliteStore};
use crate::error::{Error, Result};
use crate::record::{PhoneDocument, StoreId, Student, StudentFields};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Create,
    Replace,
    Delete,
    ListAll,
    ListPhones,
    DeletePhone,
    AddPhone,
}

/// In-memory [`SqliteStore`] whose operations fail on demand.
#[derive(Debug)]
pub(crate) struct FlakyStore {
    inner: SqliteStore,
    failing: Mutex<HashSet<Op>>,
    yielding: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().expect("failed to create test store"),
            failing: Mutex::new(HashSet::new()),
            yielding: AtomicBool::new(false),
        }
    }

    /// Make every later call of `op` fail.
    pub(crate) fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    /// Let `op` succeed again.
    pub(crate) fn heal(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    /// Suspend once at the start of every call, like a networked store.
    pub(crate) fn yield_before_calls(&self) {
        self.yielding.store(true, Ordering::Relaxed);
    }

    async fn enter(&self, op: Op) -> Result<()> {
        if self.yielding.load(Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }
        self.check(op)
    }

    fn check(&self, op: Op) -> Result<()> {
        if !self.failing.lock().unwrap().contains(&op) {
            return Ok(());
        }
        let message = "injected failure";
        Err(match op {
            Op::ListAll => Error::store_read("list_all", message),
            Op::ListPhones => Error::store_read("list_phones", message),
            Op::Create => Error::store_write("create", message),
            Op::Replace => Error::store_write("replace", message),
            Op::Delete => Error::store_write("delete", message),
            Op::DeletePhone => Error::store_write("delete_phone", message),
            Op::AddPhone => Error::store_write("add_phone", message),
        })
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn create(&self, fields: &StudentFields) -> Result<StoreId> {
        self.enter(Op::Create).await?;
        self.inner.create(fields).await
    }

    async fn replace(&self, store_id: &StoreId, fields: &StudentFields) -> Result<()> {
        self.enter(Op::Replace).await?;
        self.inner.replace(store_id, fields).await
    }

    async fn delete(&self, store_id: &StoreId) -> Result<bool> {
        self.enter(Op::Delete).await?;
        self.inner.delete(store_id).await
    }

    async fn list_all(&self) -> Result<Vec<Student>> {
        self.enter(Op::ListAll).await?;
        self.inner.list_all().await
    }

    async fn list_phones(&self, store_id: &StoreId) -> Result<Vec<PhoneDocument>> {
        self.enter(Op::ListPhones).await?;
        self.inner.list_phones(store_id).await
    }

    async fn delete_phone(&self, store_id: &StoreId, phone_id: &StoreId) -> Result<()> {
        self.enter(Op::DeletePhone).await?;
        self.inner.delete_phone(store_id, phone_id).await
    }

    async fn add_phone(&self, store_id: &StoreId, number: &str) -> Result<StoreId> {
        self.enter(Op::AddPhone).await?;
        self.inner.add_phone(store_id, number).await
    }
}
