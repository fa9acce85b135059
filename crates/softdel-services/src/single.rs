//! Single soft delete services: one boolean flag on one record.

use softdel_core::{
    Bindings, DeleteCapability, KeyValue, RecordId, SingleSoftDelete, SoftDeleteConfig,
    SoftDeleteStatus, ValidationError,
};
use softdel_store::{Query, Store, StoreError};

use crate::error::{Result, SoftDeleteError};
use crate::execution::{settle, Execution};
use crate::guard;
use crate::journal::Journal;
use crate::loader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Set,
    Reset,
    HardDelete,
}

struct SingleEngine<S, C: DeleteCapability> {
    store: S,
    config: SoftDeleteConfig<C>,
    bindings: Bindings<C>,
}

impl<S, C> SingleEngine<S, C>
where
    S: Store,
    C: DeleteCapability<Value = bool>,
{
    fn new(store: S, config: SoftDeleteConfig<C>) -> Result<Self> {
        let bindings = config.bindings()?;
        Ok(Self {
            store,
            config,
            bindings,
        })
    }

    fn flag_of(&self, id: RecordId) -> Result<(String, bool)> {
        let record = self
            .store
            .record(id)
            .ok_or(ValidationError::UnknownRecord(id))?;
        guard::ensure_capability::<C>(self.store.model(), &record.entity_type)?;
        Ok((record.entity_type.clone(), (self.bindings.get)(record)))
    }

    fn write_flag(&mut self, id: RecordId, value: bool) -> Result<Journal> {
        let record = self
            .store
            .record_mut(id)
            .ok_or(StoreError::UnknownRecord(id))?;
        let mut journal = Journal::new();
        journal.changed(id, record.clone());
        (self.bindings.set)(record, value);
        Ok(journal)
    }

    async fn run(
        &mut self,
        action: Action,
        id: RecordId,
        call_save_changes: bool,
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        match action {
            Action::Set => self.set(id, call_save_changes, execution).await,
            Action::Reset => self.reset(id, call_save_changes, execution).await,
            Action::HardDelete => self.hard_delete(id, call_save_changes, execution).await,
        }
    }

    async fn set(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        let (entity_type, deleted) = self.flag_of(id)?;
        guard::ensure_not_one_to_one(self.store.model(), &entity_type)?;
        let settings = &self.config.settings;
        if deleted {
            return Ok(SoftDeleteStatus::failure(format!(
                "This entry is already {}.",
                settings.text_soft_deleted_past_tense
            )));
        }
        let message = format!("Successfully {} this entry", settings.text_soft_deleted_past_tense);

        let journal = self.write_flag(id, true)?;
        self.save(journal, call_save_changes, execution).await?;
        tracing::info!(entity_type, record = %id, "Soft deleted");
        Ok(SoftDeleteStatus::success(1, message))
    }

    async fn reset(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        let (entity_type, deleted) = self.flag_of(id)?;
        if !deleted {
            return Ok(self.not_deleted());
        }
        let message = format!(
            "Successfully {} on this entry",
            self.config.settings.text_reset_soft_delete
        );

        let journal = self.write_flag(id, false)?;
        self.save(journal, call_save_changes, execution).await?;
        tracing::info!(entity_type, record = %id, "Reset soft delete");
        Ok(SoftDeleteStatus::success(1, message))
    }

    /// Removes the record. With a commit, the count is the number of rows
    /// the commit wrote, which includes any tracked dependents removed with it.
    async fn hard_delete(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        let (entity_type, deleted) = self.flag_of(id)?;
        if !deleted {
            return Ok(self.not_deleted());
        }
        let message = format!(
            "Successfully {} this entry",
            self.config.settings.text_hard_deleted_past_tense
        );

        self.store.remove(id)?;
        let mut journal = Journal::new();
        journal.removed(id);
        let count = self
            .save(journal, call_save_changes, execution)
            .await?
            .unwrap_or(1);
        tracing::info!(entity_type, record = %id, count, "Hard deleted");
        Ok(SoftDeleteStatus::success(count, message))
    }

    /// Commit when asked to. A failed commit undoes the journaled change.
    async fn save(
        &mut self,
        journal: Journal,
        call_save_changes: bool,
        execution: Execution,
    ) -> Result<Option<usize>> {
        if !call_save_changes {
            return Ok(None);
        }
        let result = match execution.run("save changes", self.store.save_changes()).await {
            Ok(written) => written.map_err(SoftDeleteError::from),
            Err(err) => Err(err),
        };
        if result.is_err() {
            journal.undo(&mut self.store);
        }
        result.map(Some)
    }

    async fn via_keys(
        &mut self,
        action: Action,
        entity_type: &str,
        keys: &[KeyValue],
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        match self.find(entity_type, keys, execution).await? {
            Some(id) => self.run(action, id, true, execution).await,
            None => Ok(self.not_found()),
        }
    }

    async fn find(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
        execution: Execution,
    ) -> Result<Option<RecordId>> {
        loader::load_by_keys(&mut self.store, &self.config, execution, entity_type, keys).await
    }

    fn soft_deleted_entries(&self, entity_type: &str) -> Result<Query> {
        guard::ensure_capability::<C>(self.store.model(), entity_type)?;
        let def = self
            .store
            .model()
            .entity_type(entity_type)
            .ok_or_else(|| ValidationError::UnknownEntityType(entity_type.to_string()))?;
        Ok(Query::new(entity_type)
            .ignore_query_filters()
            .filter_opt(self.config.value_filter(def, true)?))
    }

    fn not_deleted(&self) -> SoftDeleteStatus {
        SoftDeleteStatus::failure(format!(
            "This entry isn't {}.",
            self.config.settings.text_soft_deleted_past_tense
        ))
    }

    fn not_found(&self) -> SoftDeleteStatus {
        SoftDeleteStatus::not_found(self.config.settings.not_found_is_not_an_error)
    }
}

// ── Blocking service ─────────────────────────────────────────────

/// Single soft delete with blocking calls.
pub struct SingleSoftDeleteService<S, C: DeleteCapability = SingleSoftDelete> {
    engine: SingleEngine<S, C>,
}

impl<S, C> SingleSoftDeleteService<S, C>
where
    S: Store,
    C: DeleteCapability<Value = bool>,
{
    pub fn new(store: S, config: SoftDeleteConfig<C>) -> Result<Self> {
        Ok(Self {
            engine: SingleEngine::new(store, config)?,
        })
    }

    pub fn store(&self) -> &S {
        &self.engine.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.engine.store
    }

    pub fn into_store(self) -> S {
        self.engine.store
    }

    pub fn config(&self) -> &SoftDeleteConfig<C> {
        &self.engine.config
    }

    pub fn set_soft_delete(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        settle(
            "set soft delete",
            self.engine.set(id, call_save_changes, Execution::Blocking),
        )
    }

    pub fn reset_soft_delete(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        settle(
            "reset soft delete",
            self.engine.reset(id, call_save_changes, Execution::Blocking),
        )
    }

    pub fn hard_delete_soft_deleted_entry(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        settle(
            "hard delete soft deleted entry",
            self.engine.hard_delete(id, call_save_changes, Execution::Blocking),
        )
    }

    pub fn set_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        settle(
            "set soft delete",
            self.engine.via_keys(Action::Set, entity_type, keys, Execution::Blocking),
        )
    }

    pub fn reset_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        settle(
            "reset soft delete",
            self.engine.via_keys(Action::Reset, entity_type, keys, Execution::Blocking),
        )
    }

    pub fn hard_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        settle(
            "hard delete soft deleted entry",
            self.engine.via_keys(Action::HardDelete, entity_type, keys, Execution::Blocking),
        )
    }

    pub fn find_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<Option<RecordId>> {
        settle(
            "load by keys",
            self.engine.find(entity_type, keys, Execution::Blocking),
        )
    }

    /// Records of `entity_type` whose flag is set, within the extra scope filters.
    pub fn get_soft_deleted_entries(&self, entity_type: &str) -> Result<Query> {
        self.engine.soft_deleted_entries(entity_type)
    }
}

// ── Async service ────────────────────────────────────────────────

pub struct SingleSoftDeleteServiceAsync<S, C: DeleteCapability = SingleSoftDelete> {
    engine: SingleEngine<S, C>,
}

impl<S, C> SingleSoftDeleteServiceAsync<S, C>
where
    S: Store,
    C: DeleteCapability<Value = bool>,
{
    pub fn new(store: S, config: SoftDeleteConfig<C>) -> Result<Self> {
        Ok(Self {
            engine: SingleEngine::new(store, config)?,
        })
    }

    pub fn store(&self) -> &S {
        &self.engine.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.engine.store
    }

    pub fn into_store(self) -> S {
        self.engine.store
    }

    pub fn config(&self) -> &SoftDeleteConfig<C> {
        &self.engine.config
    }

    pub async fn set_soft_delete(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        self.engine.set(id, call_save_changes, Execution::Suspending).await
    }

    pub async fn reset_soft_delete(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        self.engine.reset(id, call_save_changes, Execution::Suspending).await
    }

    pub async fn hard_delete_soft_deleted_entry(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        self.engine.hard_delete(id, call_save_changes, Execution::Suspending).await
    }

    pub async fn set_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        self.engine
            .via_keys(Action::Set, entity_type, keys, Execution::Suspending)
            .await
    }

    pub async fn reset_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        self.engine
            .via_keys(Action::Reset, entity_type, keys, Execution::Suspending)
            .await
    }

    pub async fn hard_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        self.engine
            .via_keys(Action::HardDelete, entity_type, keys, Execution::Suspending)
            .await
    }

    pub async fn find_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<Option<RecordId>> {
        self.engine.find(entity_type, keys, Execution::Suspending).await
    }

    pub fn get_soft_deleted_entries(&self, entity_type: &str) -> Result<Query> {
        self.engine.soft_deleted_entries(entity_type)
    }
}
