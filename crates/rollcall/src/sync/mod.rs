//! Synchronization controller.
//!
//! [`SyncController`] owns the list of students shown to the presentation
//! layer. The list is only ever replaced wholesale with the result of a full
//! `list_all()` read, never patched locally. Each mutation session holds a
//! single async lock from its first store write until its refresh has been
//! published, so overlapping intents run one after another and a slow
//! refresh can never overwrite the snapshot of a later one.
//!
//! Session outline:
//!
//! ```text
//! create:  Creating -> (create)                   -> Refreshing -> settled
//! update:  Updating -> (replace, replace phones)  -> Refreshing -> settled
//! delete:  Deleting -> (delete)                   -> Refreshing -> settled
//! ```
//!
//! "Settled" is `Editing` while the form still selects a record and `Idle`
//! otherwise. A failed session settles without refreshing, except after a
//! partial phone sync, where the store is re-read so the list shows what was
//! actually written.

mod session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::record::{StoreId, Student, StudentFields};
use crate::store::RecordStore;

pub use session::{Intent, SessionState, StudentForm};

/// A published list of students.
pub type Snapshot = Arc<Vec<Student>>;

#[derive(Debug, Default)]
struct Session {
    state: SessionState,
    form: StudentForm,
    /// Bumped whenever a session writes or discards the form's contents.
    form_epoch: u64,
}

impl Session {
    fn reset_form(&mut self) {
        self.form.clear();
        self.form_epoch = self.form_epoch.wrapping_add(1);
    }
}

/// Mediates every mutation of the student list through a [`RecordStore`].
#[derive(Debug)]
pub struct SyncController<S> {
    store: Arc<S>,
    snapshot: watch::Sender<Snapshot>,
    session: Mutex<Session>,
    mutations: tokio::sync::Mutex<()>,
    verify_phone_sync: bool,
}

impl<S: RecordStore> SyncController<S> {
    /// Create a controller over `store` with an empty list.
    ///
    /// Call [`refresh`](Self::refresh) to load the current records.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Create a controller over a shared store.
    #[must_use]
    pub fn from_arc(store: Arc<S>) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            store,
            snapshot,
            session: Mutex::new(Session::default()),
            mutations: tokio::sync::Mutex::new(()),
            verify_phone_sync: SyncConfig::default().verify_phone_sync,
        }
    }

    /// Apply synchronization settings.
    #[must_use]
    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.verify_phone_sync = config.verify_phone_sync;
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The list as of the last successful full read.
    #[must_use]
    pub fn records(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch every list the controller publishes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session().state
    }

    /// Current form contents.
    #[must_use]
    pub fn form(&self) -> StudentForm {
        self.session().form.clone()
    }

    /// Edit form fields in place. Local only.
    pub fn update_form(&self, edit: impl FnOnce(&mut StudentForm)) {
        edit(&mut self.session().form);
    }

    /// Load `student` into the form and start editing it.
    pub fn select_for_edit(&self, student: &Student) {
        let mut session = self.session();
        session.form = StudentForm::for_record(student);
        if !session.state.is_busy() {
            session.state = settled_state(&session.form);
        }
        debug!("Selected {} for edit", student.store_id);
    }

    /// Drop the phone at `index` from the form. Local only.
    pub fn remove_phone_at(&self, index: usize) -> Option<String> {
        self.session().form.remove_phone_at(index)
    }

    /// Dispatch a presentation intent.
    ///
    /// # Errors
    ///
    /// Returns whatever the triggered session returns, or an invalid input
    /// error for a phone index outside the form.
    pub async fn handle(&self, intent: Intent) -> Result<()> {
        match intent {
            Intent::Submit(student) => self.submit(student).await,
            Intent::SelectForEdit(student) => {
                self.select_for_edit(&student);
                Ok(())
            }
            Intent::Delete(student) => self.delete(&student).await,
            Intent::RemovePhoneAtIndex(index) => self
                .remove_phone_at(index)
                .map(|_| ())
                .ok_or_else(|| Error::invalid_input(format!("no phone at index {index}"))),
        }
    }

    /// Re-read the whole collection and publish it.
    ///
    /// Returns the number of records published.
    ///
    /// # Errors
    ///
    /// Returns a store read error; the published list is then unchanged.
    pub async fn refresh(&self) -> Result<usize> {
        let _serial = self.mutations.lock().await;
        self.set_state(SessionState::Refreshing);
        let result = self.resync().await;
        self.settle();
        result
    }

    /// Persist `student`: create it when it has no store id, update it
    /// otherwise. The form is left alone except that a successful update
    /// of the selected record clears the selection.
    ///
    /// # Errors
    ///
    /// Returns the first failing store operation's error.
    pub async fn submit(&self, student: Student) -> Result<()> {
        let _serial = self.mutations.lock().await;
        self.submit_locked(student, None).await
    }

    /// Submit the form, then clear it if the write succeeded.
    ///
    /// The form is read once this session gets its turn. A submit queued
    /// behind a session that already wrote the form is skipped, and edits
    /// made while the write was in flight are kept.
    ///
    /// # Errors
    ///
    /// Returns the first failing store operation's error. The form is kept
    /// on any write failure so the submit can be retried.
    pub async fn submit_form(&self) -> Result<()> {
        let epoch = self.session().form_epoch;

        let _serial = self.mutations.lock().await;
        let form = {
            let session = self.session();
            if session.form_epoch != epoch {
                debug!("Form was written by an earlier session, skipping submit");
                return Ok(());
            }
            session.form.clone()
        };
        self.submit_locked(form.to_record(), Some(&form)).await
    }

    /// Delete `student` from the store.
    ///
    /// Deleting a record that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error for a record that was never persisted,
    /// a store write error if the delete fails, or a store read error if the
    /// following refresh fails.
    pub async fn delete(&self, student: &Student) -> Result<()> {
        if !student.is_persisted() {
            return Err(Error::invalid_input(
                "cannot delete a record that was never persisted",
            ));
        }
        let store_id = &student.store_id;

        let _serial = self.mutations.lock().await;
        self.set_state(SessionState::Deleting);
        match self.store.delete(store_id).await {
            Ok(true) => info!("Student {} deleted", store_id),
            Ok(false) => info!("Student {} was already gone", store_id),
            Err(err) => {
                error!("Error deleting student {}: {}", store_id, err);
                self.settle();
                return Err(err);
            }
        }

        {
            let mut session = self.session();
            if session.form.is_editing(store_id) {
                session.reset_form();
            }
        }
        self.finish().await
    }

    /// Write `student`. Callers hold the mutation lock. `submitted` is the
    /// form the record was built from, if any.
    async fn submit_locked(
        &self,
        student: Student,
        submitted: Option<&StudentForm>,
    ) -> Result<()> {
        let written = if student.is_persisted() {
            self.update_locked(&student).await
        } else {
            self.create_locked(&student.fields).await
        };
        let store_id = match written {
            Ok(store_id) => store_id,
            Err(err) => {
                self.settle();
                return Err(err);
            }
        };

        {
            let mut session = self.session();
            match submitted {
                Some(form) if session.form == *form => session.reset_form(),
                Some(_) => {
                    debug!("Form edited during submit, keeping it");
                    session.form_epoch = session.form_epoch.wrapping_add(1);
                }
                None if session.form.is_editing(&store_id) => session.reset_form(),
                None => {}
            }
        }
        self.finish().await
    }

    async fn create_locked(&self, fields: &StudentFields) -> Result<StoreId> {
        self.set_state(SessionState::Creating);
        match self.store.create(fields).await {
            Ok(store_id) => {
                info!("Student added with store id {}", store_id);
                Ok(store_id)
            }
            Err(err) => {
                warn!("Error adding student: {}", err);
                Err(err)
            }
        }
    }

    async fn update_locked(&self, student: &Student) -> Result<StoreId> {
        let store_id = &student.store_id;
        self.set_state(SessionState::Updating);

        if let Err(err) = self.store.replace(store_id, &student.fields).await {
            warn!("Error updating student {}: {}", store_id, err);
            return Err(err);
        }
        match self
            .store
            .replace_phones(store_id, &student.fields.phones)
            .await
        {
            Ok(report) => {
                info!(
                    "Student {} updated ({} phones removed, {} added)",
                    store_id, report.deleted, report.added
                );
                Ok(store_id.clone())
            }
            Err(err) if err.is_partial_phone_sync() => {
                error!("Student {} left with incomplete phones: {}", store_id, err);
                self.reconcile_phones(student).await;
                Err(err)
            }
            Err(err) => {
                warn!("Error updating phones of {}: {}", store_id, err);
                Err(err)
            }
        }
    }

    /// Re-read the store after a partial phone sync and log the gap between
    /// what was submitted and what the store now holds.
    async fn reconcile_phones(&self, intended: &Student) {
        if !self.verify_phone_sync {
            return;
        }
        self.set_state(SessionState::Refreshing);
        if self.resync().await.is_err() {
            return;
        }

        let records = self.records();
        let stored = records
            .iter()
            .find(|record| record.store_id == intended.store_id)
            .map(|record| record.fields.phones.as_slice())
            .unwrap_or_default();
        let missing = missing_phones(&intended.fields.phones, stored);
        warn!(
            "Phones of {} out of sync: store has {:?}, submitted {:?}, missing {:?}",
            intended.store_id, stored, intended.fields.phones, missing
        );
    }

    /// Refresh after a successful write and settle.
    async fn finish(&self) -> Result<()> {
        self.set_state(SessionState::Refreshing);
        let result = self.resync().await;
        self.settle();
        result.map(|_| ())
    }

    /// Full resynchronization. Callers hold the mutation lock.
    async fn resync(&self) -> Result<usize> {
        match self.store.list_all().await {
            Ok(students) => {
                let count = students.len();
                self.snapshot.send_replace(Arc::new(students));
                debug!("Published {} students", count);
                Ok(count)
            }
            Err(err) => {
                warn!("Error getting students: {}", err);
                Err(err.into_read("list_all"))
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        self.session().state = state;
    }

    fn settle(&self) {
        let mut session = self.session();
        session.state = settled_state(&session.form);
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Submitted phones the store does not hold, counting repeats.
fn missing_phones<'a>(submitted: &'a [String], stored: &[String]) -> Vec<&'a String> {
    let mut unmatched: Vec<&String> = stored.iter().collect();
    submitted
        .iter()
        .filter(|phone| match unmatched.iter().position(|held| *held == *phone) {
            Some(index) => {
                unmatched.swap_remove(index);
                false
            }
            None => true,
        })
        .collect()
}

fn settled_state(form: &StudentForm) -> SessionState {
    if form.selected().is_some() {
        SessionState::Editing
    } else {
        SessionState::Idle
    }
}
