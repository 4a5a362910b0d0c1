//! `rollcall` - student records kept in a document store
//!
//! The [`store`] module talks to the document database; the [`sync`] module
//! owns the list of records a presentation layer renders and keeps it equal
//! to the last full read of the store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod record;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use record::{StoreId, Student, StudentFields};
pub use store::{RecordStore, SqliteStore};
pub use sync::{Intent, SessionState, StudentForm, SyncController};
