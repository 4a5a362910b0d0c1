//! Student records and the document shapes they are stored as.
//!
//! A [`Student`] is what the presentation layer sees. On the store side it is
//! split into a flat main document ([`StudentDocument`]) and one
//! [`PhoneDocument`] per phone number in the record's phone subcollection.

use serde::{Deserialize, Serialize};

/// Opaque document identifier assigned by the record store.
///
/// The empty id marks a record that has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    /// Wrap an id handed out by the store.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id of a record that has never been written.
    #[must_use]
    pub fn unassigned() -> Self {
        Self(String::new())
    }

    /// Whether the store has assigned this id.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        !self.0.is_empty()
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StoreId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// User-editable fields of a student record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFields {
    /// Business key typed by the user. Not unique.
    pub external_id: String,
    /// Student name.
    pub name: String,
    /// Study program.
    pub program: String,
    /// Phone numbers in display order.
    pub phones: Vec<String>,
}

impl StudentFields {
    /// Build fields from their parts.
    #[must_use]
    pub fn new(
        external_id: impl Into<String>,
        name: impl Into<String>,
        program: impl Into<String>,
        phones: Vec<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            program: program.into(),
            phones,
        }
    }

    /// The flat main document for these fields. Phones are not part of it.
    #[must_use]
    pub fn to_document(&self) -> StudentDocument {
        StudentDocument {
            id: self.external_id.clone(),
            name: self.name.clone(),
            program: self.program.clone(),
        }
    }
}

/// A student record as published to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Store-assigned id; unassigned until the record is created.
    pub store_id: StoreId,
    /// Everything else.
    #[serde(flatten)]
    pub fields: StudentFields,
}

impl Student {
    /// A record that has not been persisted yet.
    #[must_use]
    pub fn draft(fields: StudentFields) -> Self {
        Self {
            store_id: StoreId::unassigned(),
            fields,
        }
    }

    /// A record read back from the store.
    #[must_use]
    pub fn persisted(store_id: StoreId, fields: StudentFields) -> Self {
        Self { store_id, fields }
    }

    /// Whether the store has ever seen this record.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.store_id.is_assigned()
    }
}

/// Main document body in the students collection.
///
/// Missing fields read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentDocument {
    /// External id (`externalId` of the record).
    pub id: String,
    /// Student name.
    pub name: String,
    /// Study program.
    pub program: String,
}

impl StudentDocument {
    /// Combine with phones read from the subcollection.
    #[must_use]
    pub fn into_fields(self, phones: Vec<String>) -> StudentFields {
        StudentFields {
            external_id: self.id,
            name: self.name,
            program: self.program,
            phones,
        }
    }
}

/// A document in a record's phone subcollection, with its store id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneDocument {
    /// Store-assigned id of the phone document.
    pub id: StoreId,
    /// The phone number.
    pub number: String,
}

/// Body of a phone document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneBody {
    /// The phone number.
    pub number: String,
}
