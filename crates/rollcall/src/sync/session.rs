//! Edit-session state shared between the controller and the presentation layer.

use crate::record::{StoreId, Student, StudentFields};

/// Where the current record-edit session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No record selected, nothing in flight.
    #[default]
    Idle,
    /// A record is selected in the form.
    Editing,
    /// A new record is being written.
    Creating,
    /// A selected record is being overwritten.
    Updating,
    /// A record is being deleted.
    Deleting,
    /// The full collection is being re-read.
    Refreshing,
}

impl SessionState {
    /// Whether a store operation is in flight.
    #[must_use]
    pub fn is_busy(self) -> bool {
        !matches!(self, Self::Idle | Self::Editing)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Editing => write!(f, "editing"),
            Self::Creating => write!(f, "creating"),
            Self::Updating => write!(f, "updating"),
            Self::Deleting => write!(f, "deleting"),
            Self::Refreshing => write!(f, "refreshing"),
        }
    }
}

/// Contents of the record form.
///
/// The selection can only be set through
/// [`SyncController::select_for_edit`](super::SyncController::select_for_edit).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentForm {
    /// External id field.
    pub external_id: String,
    /// Name field.
    pub name: String,
    /// Program field.
    pub program: String,
    /// Phones entered so far.
    pub phones: Vec<String>,
    selected: Option<StoreId>,
}

impl StudentForm {
    /// A form pre-filled from `student` and selecting it.
    #[must_use]
    pub fn for_record(student: &Student) -> Self {
        Self {
            external_id: student.fields.external_id.clone(),
            name: student.fields.name.clone(),
            program: student.fields.program.clone(),
            phones: student.fields.phones.clone(),
            selected: Some(student.store_id.clone()).filter(StoreId::is_assigned),
        }
    }

    /// Store id of the record being edited, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&StoreId> {
        self.selected.as_ref()
    }

    /// Whether the form is editing `store_id`.
    #[must_use]
    pub fn is_editing(&self, store_id: &StoreId) -> bool {
        self.selected.as_ref() == Some(store_id)
    }

    /// The record a submit of this form would write.
    ///
    /// Without a selection the record is a draft and gets created.
    #[must_use]
    pub fn to_record(&self) -> Student {
        let fields = StudentFields::new(
            self.external_id.clone(),
            self.name.clone(),
            self.program.clone(),
            self.phones.clone(),
        );
        match &self.selected {
            Some(store_id) => Student::persisted(store_id.clone(), fields),
            None => Student::draft(fields),
        }
    }

    /// Append a phone to the form.
    pub fn add_phone(&mut self, number: impl Into<String>) {
        self.phones.push(number.into());
    }

    /// Remove the phone at `index`, returning it. Out-of-range is a no-op.
    pub fn remove_phone_at(&mut self, index: usize) -> Option<String> {
        (index < self.phones.len()).then(|| self.phones.remove(index))
    }

    /// Empty every field and drop the selection.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// User intents emitted by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Persist a record: create it if unassigned, update it otherwise.
    Submit(Student),
    /// Load a record into the form for editing.
    SelectForEdit(Student),
    /// Delete a record.
    Delete(Student),
    /// Drop one phone from the form. Never reaches the store.
    RemovePhoneAtIndex(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> Student {
        Student::persisted(
            "d1".into(),
            StudentFields::new("S1", "Ann", "CS", vec!["111".to_string(), "222".to_string()]),
        )
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Refreshing.to_string(), "refreshing");
    }

    #[test]
    fn test_state_busy() {
        assert!(!SessionState::Idle.is_busy());
        assert!(!SessionState::Editing.is_busy());
        assert!(SessionState::Creating.is_busy());
        assert!(SessionState::Updating.is_busy());
        assert!(SessionState::Deleting.is_busy());
        assert!(SessionState::Refreshing.is_busy());
    }

    #[test]
    fn test_form_for_record_selects_it() {
        let form = StudentForm::for_record(&ann());
        assert_eq!(form.selected(), Some(&StoreId::from("d1")));
        assert!(form.is_editing(&"d1".into()));
        assert_eq!(form.to_record(), ann());
    }

    #[test]
    fn test_form_for_draft_selects_nothing() {
        let draft = Student::draft(ann().fields);
        let form = StudentForm::for_record(&draft);
        assert!(form.selected().is_none());
        assert!(!form.to_record().is_persisted());
    }

    #[test]
    fn test_remove_phone_at() {
        let mut form = StudentForm::for_record(&ann());
        assert_eq!(form.remove_phone_at(0), Some("111".to_string()));
        assert_eq!(form.phones, vec!["222"]);
        assert_eq!(form.remove_phone_at(5), None);
        assert_eq!(form.phones, vec!["222"]);
    }

    #[test]
    fn test_add_phone_and_clear() {
        let mut form = StudentForm::for_record(&ann());
        form.add_phone("333");
        assert_eq!(form.phones.len(), 3);

        form.clear();
        assert_eq!(form, StudentForm::default());
    }
}
