//! Two-phase replacement of a record's phone subcollection.
//!
//! Phase one deletes every existing phone document, phase two adds one
//! document per new number. Each phase issues all of its operations at once
//! and waits for every one of them before deciding the phase's outcome.
//! Nothing is rolled back: a failed add phase leaves the record with only the
//! phones that made it in, possibly none.
//!
//! Dropping the returned future drops whatever operations of the current
//! phase are still outstanding, and the next phase never starts.

use std::future::Future;

use futures::future::join_all;
use tracing::{debug, warn};

use super::RecordStore;
use crate::error::{Error, Result};
use crate::record::StoreId;

/// What a completed phone replacement did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhoneSyncReport {
    /// Phone documents removed by the delete phase.
    pub deleted: usize,
    /// Phone documents written by the add phase.
    pub added: usize,
}

/// Outcome of one all-of-N phase.
#[derive(Debug)]
struct Phase<T> {
    completed: Vec<T>,
    failures: Vec<Error>,
}

impl<T> Phase<T> {
    fn total(&self) -> usize {
        self.completed.len() + self.failures.len()
    }

    fn first_failure(&self) -> Option<&Error> {
        self.failures.first()
    }
}

/// Run every operation concurrently and wait for all of them.
async fn join_phase<I, F, T>(operations: I) -> Phase<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    let mut phase = Phase {
        completed: Vec::new(),
        failures: Vec::new(),
    };
    for outcome in join_all(operations).await {
        match outcome {
            Ok(value) => phase.completed.push(value),
            Err(err) => phase.failures.push(err),
        }
    }
    phase
}

/// Replace the phones of `store_id` with `phones` on any [`RecordStore`].
///
/// New phone documents are issued in the order of `phones`.
///
/// # Errors
///
/// - store write error if the current phones cannot be listed or any
///   deletion fails (the add phase is then skipped);
/// - [`Error::PartialPhoneSync`] if any addition fails.
pub async fn replace_phones<S>(
    store: &S,
    store_id: &StoreId,
    phones: &[String],
) -> Result<PhoneSyncReport>
where
    S: RecordStore + ?Sized,
{
    let existing = store
        .list_phones(store_id)
        .await
        .map_err(|err| err.into_write("list phones"))?;
    debug!(
        "Replacing {} phones of {} with {}",
        existing.len(),
        store_id,
        phones.len()
    );

    let deletions = join_phase(
        existing
            .iter()
            .map(|phone| store.delete_phone(store_id, &phone.id)),
    )
    .await;
    if let Some(err) = deletions.first_failure() {
        warn!(
            "Deleting phones of {} failed ({} of {}): {}",
            store_id,
            deletions.failures.len(),
            deletions.total(),
            err
        );
        return Err(Error::store_write(
            "delete phones",
            format!(
                "{} of {} deletions failed: {err}",
                deletions.failures.len(),
                deletions.total()
            ),
        ));
    }

    let additions = join_phase(
        phones
            .iter()
            .map(|number| store.add_phone(store_id, number)),
    )
    .await;
    if let Some(err) = additions.first_failure() {
        warn!(
            "Adding phones to {} failed after old phones were deleted: {}",
            store_id, err
        );
        return Err(Error::PartialPhoneSync {
            store_id: store_id.to_string(),
            deleted: deletions.completed.len(),
            added: additions.completed.len(),
            expected: phones.len(),
            message: err.to_string(),
        });
    }

    Ok(PhoneSyncReport {
        deleted: deletions.completed.len(),
        added: additions.completed.len(),
    })
}
