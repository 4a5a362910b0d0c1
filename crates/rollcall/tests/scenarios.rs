//! End-to-end scenarios through the public API on an in-memory store.

use std::sync::Arc;

use rollcall::{Intent, RecordStore, SessionState, SqliteStore, Student, StudentFields, SyncController};

fn phones(numbers: &[&str]) -> Vec<String> {
    numbers.iter().map(ToString::to_string).collect()
}

fn controller() -> SyncController<SqliteStore> {
    SyncController::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

#[tokio::test]
async fn create_then_list_shows_record_with_assigned_id() {
    let sync = controller();
    let ann = StudentFields::new("S1", "Ann", "CS", phones(&["111"]));

    sync.handle(Intent::Submit(Student::draft(ann.clone())))
        .await
        .unwrap();

    let records = sync.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].store_id.is_assigned());
    assert_eq!(records[0].fields, ann);
}

#[tokio::test]
async fn edit_phones_through_the_form() {
    let sync = controller();
    sync.submit(Student::draft(StudentFields::new(
        "S1",
        "Ann",
        "CS",
        phones(&["111"]),
    )))
    .await
    .unwrap();
    let ann = sync.records()[0].clone();

    sync.select_for_edit(&ann);
    sync.update_form(|form| {
        form.phones.clear();
        form.add_phone("222");
        form.add_phone("333");
    });
    sync.submit_form().await.unwrap();

    assert_eq!(sync.state(), SessionState::Idle);
    assert!(sync.form().selected().is_none());
    let stored = sync.store().list_phones(&ann.store_id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(sync.records()[0].fields.phones, phones(&["222", "333"]));
}

#[tokio::test]
async fn snapshot_matches_store_after_mixed_operations() {
    let sync = controller();
    for (id, name) in [("S1", "Ann"), ("S2", "Bob"), ("S3", "Cid")] {
        sync.submit(Student::draft(StudentFields::new(id, name, "CS", Vec::new())))
            .await
            .unwrap();
    }
    let bob = sync.records()[1].clone();
    sync.delete(&bob).await.unwrap();

    let mut cid = sync.records()[1].clone();
    cid.fields.program = "Math".to_string();
    cid.fields.phones = phones(&["999"]);
    sync.submit(cid).await.unwrap();

    let records = sync.records();
    assert_eq!(*records, sync.store().list_all().await.unwrap());
    let names: Vec<&str> = records.iter().map(|r| r.fields.name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "Cid"]);
    assert_eq!(records[1].fields.program, "Math");
    assert_eq!(records[1].fields.phones, phones(&["999"]));
}

#[tokio::test]
async fn concurrent_submits_each_land_once() {
    let sync = Arc::new(controller());
    let first = {
        let sync = Arc::clone(&sync);
        tokio::spawn(async move {
            sync.submit(Student::draft(StudentFields::new("S1", "Ann", "CS", Vec::new())))
                .await
        })
    };
    let second = {
        let sync = Arc::clone(&sync);
        tokio::spawn(async move {
            sync.submit(Student::draft(StudentFields::new("S2", "Bob", "CS", Vec::new())))
                .await
        })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let records = sync.records();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records.iter().filter(|r| r.fields.name == "Ann").count(),
        1
    );
    assert_eq!(
        records.iter().filter(|r| r.fields.name == "Bob").count(),
        1
    );
}

#[tokio::test]
async fn deleting_twice_is_harmless() {
    let sync = controller();
    sync.submit(Student::draft(StudentFields::new("S1", "Ann", "CS", Vec::new())))
        .await
        .unwrap();
    let ann = sync.records()[0].clone();

    sync.delete(&ann).await.unwrap();
    sync.delete(&ann).await.unwrap();

    assert!(sync.records().is_empty());
}
