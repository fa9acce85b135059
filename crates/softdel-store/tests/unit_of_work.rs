//! Unit-of-work behavior through the `Store` trait object.

use serde_json::json;
use softdel_core::{DeleteBehavior, EntityModel, EntityTypeDef, KeyKind, KeyValue, RelationshipDef};
use softdel_store::{Dataset, MemoryStore, Query, Store, StoreError};

fn employee_store() -> MemoryStore {
    let model = EntityModel::new()
        .with_entity(EntityTypeDef::new("Employee").key("Id", KeyKind::Int))
        .with_entity(EntityTypeDef::new("EmployeeContract").key("Id", KeyKind::Int))
        .with_relationship(
            RelationshipDef::one_to_many("Employee", "Employee", &["ManagerId"])
                .principal_navigation("WorksFromMe")
                .dependent_navigation("Manager")
                .on_delete(DeleteBehavior::ClientCascade),
        )
        .with_relationship(
            RelationshipDef::one_to_one("Employee", "EmployeeContract", &["EmployeeId"])
                .principal_navigation("Contract")
                .on_delete(DeleteBehavior::ClientCascade),
        );
    let dataset: Dataset = serde_json::from_value(json!({
        "model": model,
        "records": {
            "Employee": [
                {"Id": 1, "Name": "Boss", "ManagerId": null},
                {"Id": 2, "Name": "Dev", "ManagerId": 1}
            ],
            "EmployeeContract": [{"Id": 20, "EmployeeId": 2}]
        }
    }))
    .unwrap();
    MemoryStore::from_dataset(dataset).unwrap()
}

#[tokio::test]
async fn test_client_cascade_requires_tracked_dependents() {
    let mut store = employee_store();
    let boss = store.find("Employee", vec![KeyValue::Int(1)]).unwrap().unwrap();

    let dyn_store: &mut dyn Store = &mut store;
    dyn_store.remove(boss).unwrap();
    let err = dyn_store.save_changes().await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::ForeignKeyViolation { ref behavior, .. } if behavior == "ClientCascade"
    ));
    assert_eq!(store.row_count("Employee"), 2);
}

#[tokio::test]
async fn test_client_cascade_deletes_tracked_dependents() {
    let mut store = employee_store();
    let boss = store.find("Employee", vec![KeyValue::Int(1)]).unwrap().unwrap();
    let devs = store.include(boss, "WorksFromMe").unwrap();
    store.include(devs[0], "Contract").unwrap();

    store.remove(boss).unwrap();
    let written = store.save_changes().await.unwrap();
    assert_eq!(written, 3);
    assert_eq!(store.row_count("Employee"), 0);
    assert_eq!(store.row_count("EmployeeContract"), 0);
    assert_eq!(store.tracked_count(), 0);
}

#[tokio::test]
async fn test_batched_changes_commit_together() {
    let mut store = employee_store();
    let ids = store
        .fetch(&Query::new("Employee").ignore_query_filters())
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    for id in &ids {
        store.record_mut(*id).unwrap().set_property("Reviewed", true);
    }
    assert!(store.rows("Employee").iter().all(|r| !r.bool_property("Reviewed")));

    assert_eq!(store.save_changes().await.unwrap(), 2);
    assert!(store.rows("Employee").iter().all(|r| r.bool_property("Reviewed")));
}

#[tokio::test]
async fn test_pending_removal_hidden_from_queries() {
    let mut store = employee_store();
    let dev = store.find("Employee", vec![KeyValue::Int(2)]).unwrap().unwrap();
    store.include(dev, "Contract").unwrap();
    store.remove(dev).unwrap();

    let ids = store.fetch(&Query::new("Employee")).await.unwrap();
    assert_eq!(ids.len(), 1);
    assert!(!ids.contains(&dev));
}
