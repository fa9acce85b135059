//! Blocking and async services over a store whose calls suspend.

use async_trait::async_trait;
use serde_json::json;

use softdel_core::{
    CascadeSoftDelete, DeleteBehavior, EntityModel, EntityTypeDef, KeyKind, KeyValue, Record,
    RecordFilter, RecordId, RelationshipDef, SingleSoftDelete, SoftDeleteConfig,
    SOFT_DELETED_PROPERTY, SOFT_DELETE_LEVEL_PROPERTY,
};
use softdel_services::{
    CascadeSoftDeleteService, CascadeSoftDeleteServiceAsync, SingleSoftDeleteService,
    SingleSoftDeleteServiceAsync, SoftDeleteError,
};
use softdel_store::{Dataset, MemoryStore, Query, Store};

/// Delegates to a `MemoryStore`, yielding to the runtime before every
/// fetch and commit, the way a networked store would.
struct YieldingStore(MemoryStore);

#[async_trait]
impl Store for YieldingStore {
    fn model(&self) -> &EntityModel {
        self.0.model()
    }

    fn record(&self, id: RecordId) -> Option<&Record> {
        self.0.record(id)
    }

    fn record_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.0.record_mut(id)
    }

    fn loaded_navigation(&self, id: RecordId, navigation: &str) -> Option<Vec<RecordId>> {
        self.0.loaded_navigation(id, navigation)
    }

    fn add_query_filter(
        &mut self,
        entity_type: &str,
        filter: RecordFilter,
    ) -> softdel_store::Result<()> {
        self.0.add_query_filter(entity_type, filter)
    }

    fn add(&mut self, record: Record) -> softdel_store::Result<RecordId> {
        self.0.add(record)
    }

    fn remove(&mut self, id: RecordId) -> softdel_store::Result<()> {
        self.0.remove(id)
    }

    fn restore(&mut self, id: RecordId) -> softdel_store::Result<()> {
        self.0.restore(id)
    }

    async fn fetch(&mut self, query: &Query) -> softdel_store::Result<Vec<RecordId>> {
        tokio::task::yield_now().await;
        self.0.fetch(query).await
    }

    async fn save_changes(&mut self) -> softdel_store::Result<usize> {
        tokio::task::yield_now().await;
        self.0.save_changes().await
    }
}

/// One company with two quotes; every entity carries both capabilities.
fn company_store() -> MemoryStore {
    let model = EntityModel::new()
        .with_entity(
            EntityTypeDef::new("Company")
                .key("Id", KeyKind::Int)
                .capability::<CascadeSoftDelete>()
                .capability::<SingleSoftDelete>(),
        )
        .with_entity(
            EntityTypeDef::new("Quote")
                .key("Id", KeyKind::Int)
                .capability::<CascadeSoftDelete>()
                .capability::<SingleSoftDelete>(),
        )
        .with_relationship(
            RelationshipDef::one_to_many("Company", "Quote", &["CompanyId"])
                .principal_navigation("Quotes")
                .on_delete(DeleteBehavior::Cascade),
        );
    let dataset = Dataset {
        model,
        records: serde_json::from_value(json!({
            "Company": [{"Id": 1}],
            "Quote": [{"Id": 10, "CompanyId": 1}, {"Id": 11, "CompanyId": 1}]
        }))
        .unwrap(),
    };
    MemoryStore::from_dataset(dataset).unwrap()
}

fn company(store: &mut MemoryStore) -> RecordId {
    store
        .fetch_now(&Query::new("Company").key(vec![KeyValue::Int(1)]))
        .unwrap()[0]
}

fn cascade_config() -> SoftDeleteConfig<CascadeSoftDelete> {
    SoftDeleteConfig::level_property(SOFT_DELETE_LEVEL_PROPERTY)
}

fn single_config() -> SoftDeleteConfig<SingleSoftDelete> {
    SoftDeleteConfig::flag_property(SOFT_DELETED_PROPERTY)
}

#[test]
fn test_blocking_cascade_over_ready_store() {
    let mut store = company_store();
    let id = company(&mut store);
    let mut service = CascadeSoftDeleteService::new(store, cascade_config()).unwrap();

    let status = service.set_cascade_soft_delete(id, true).unwrap();
    assert_eq!(status.value(), 3);
}

#[tokio::test]
async fn test_blocking_cascade_rejects_suspending_store() {
    let mut store = company_store();
    let id = company(&mut store);
    let mut service =
        CascadeSoftDeleteService::new(YieldingStore(store), cascade_config()).unwrap();

    let err = service.set_cascade_soft_delete(id, true).unwrap_err();
    assert!(matches!(
        err,
        SoftDeleteError::SyncOverAsync {
            operation: "load collection"
        }
    ));
    let committed = service.store().0.rows("Company")[0].u8_property(SOFT_DELETE_LEVEL_PROPERTY);
    assert_eq!(committed, 0);
    let tracked = service.store().record(id).unwrap().u8_property(SOFT_DELETE_LEVEL_PROPERTY);
    assert_eq!(tracked, 0);

    let err = service
        .find_via_keys("Company", &[KeyValue::Int(1)])
        .unwrap_err();
    assert!(matches!(
        err,
        SoftDeleteError::SyncOverAsync {
            operation: "load by keys"
        }
    ));
}

#[tokio::test]
async fn test_async_cascade_over_suspending_store() {
    let mut store = company_store();
    let id = company(&mut store);
    let mut service =
        CascadeSoftDeleteServiceAsync::new(YieldingStore(store), cascade_config()).unwrap();

    let status = service.set_cascade_soft_delete(id, true).await.unwrap();
    assert_eq!(status.value(), 3);
    assert_eq!(status.message(), "You have soft deleted an entity and its 2 dependents");

    let status = service
        .hard_delete_soft_deleted_entries_via_keys("Company", &[KeyValue::Int(1)])
        .await
        .unwrap();
    assert_eq!(status.value(), 3);
    assert_eq!(service.store().0.row_count("Quote"), 0);
}

#[tokio::test]
async fn test_blocking_single_rejects_suspending_commit() {
    let mut store = company_store();
    let id = company(&mut store);
    let mut service = SingleSoftDeleteService::new(YieldingStore(store), single_config()).unwrap();

    // Nothing suspends until the commit.
    let status = service.set_soft_delete(id, false).unwrap();
    assert_eq!(status.value(), 1);

    let err = service.reset_soft_delete(id, true).unwrap_err();
    assert!(matches!(
        err,
        SoftDeleteError::SyncOverAsync {
            operation: "save changes"
        }
    ));
    // The reset is undone, the unsaved soft delete is kept.
    let flag = service.store().record(id).unwrap().bool_property(SOFT_DELETED_PROPERTY);
    assert!(flag);
}

#[tokio::test]
async fn test_async_single_over_suspending_store() {
    let store = YieldingStore(company_store());
    let mut service = SingleSoftDeleteServiceAsync::new(store, single_config()).unwrap();

    let status = service
        .set_soft_delete_via_keys("Quote", &[KeyValue::Int(10)])
        .await
        .unwrap();
    assert_eq!(status.value(), 1);

    let query = service.get_soft_deleted_entries("Quote").unwrap();
    assert_eq!(service.store_mut().fetch(&query).await.unwrap().len(), 1);
}
