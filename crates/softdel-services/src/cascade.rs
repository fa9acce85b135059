//! Cascade soft delete services.
//!
//! Soft deletes a record together with everything it cascades to, recording
//! in each record the depth at which it was deleted, so the same tree can
//! later be recovered, checked or hard deleted as a unit.

use softdel_core::{
    Bindings, CascadeSoftDelete, DeleteCapability, KeyValue, RecordId, SoftDeleteConfig,
    SoftDeleteStatus, ValidationError,
};
use softdel_store::{Query, Store};

use crate::error::Result;
use crate::execution::{settle, Execution};
use crate::guard;
use crate::loader;
use crate::walker::{CascadeWalker, WalkMode};

/// State and logic shared by the blocking and async services.
struct CascadeEngine<S, C: DeleteCapability> {
    store: S,
    config: SoftDeleteConfig<C>,
    bindings: Bindings<C>,
}

impl<S, C> CascadeEngine<S, C>
where
    S: Store,
    C: DeleteCapability<Value = u8>,
{
    fn new(store: S, config: SoftDeleteConfig<C>) -> Result<Self> {
        let bindings = config.bindings()?;
        Ok(Self {
            store,
            config,
            bindings,
        })
    }

    /// Entity type and current level of a tracked record.
    fn level_of(&self, id: RecordId) -> Result<(String, u8)> {
        let record = self
            .store
            .record(id)
            .ok_or(ValidationError::UnknownRecord(id))?;
        guard::ensure_capability::<C>(self.store.model(), &record.entity_type)?;
        Ok((record.entity_type.clone(), (self.bindings.get)(record)))
    }

    async fn run(
        &mut self,
        mode: WalkMode,
        id: RecordId,
        save: bool,
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        match mode {
            WalkMode::SoftDelete => self.set(id, save, execution).await,
            WalkMode::ResetSoftDelete => self.reset(id, save, execution).await,
            WalkMode::CheckWhatWillDelete => self.check(id, execution).await,
            WalkMode::HardDeleteSoftDeleted => self.hard_delete(id, save, execution).await,
        }
    }

    async fn set(
        &mut self,
        id: RecordId,
        save: bool,
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        let (entity_type, level) = self.level_of(id)?;
        guard::ensure_not_one_to_one(self.store.model(), &entity_type)?;
        if level != C::ACTIVE {
            return Ok(SoftDeleteStatus::failure(format!(
                "This entry is already {}.",
                self.config.settings.text_soft_deleted_past_tense
            )));
        }
        self.walk_and_save(WalkMode::SoftDelete, id, &entity_type, save, execution)
            .await
    }

    async fn reset(
        &mut self,
        id: RecordId,
        save: bool,
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        let (entity_type, level) = self.level_of(id)?;
        if level == C::ACTIVE {
            return Ok(self.not_deleted());
        }
        if level > 1 {
            let above = level - 1;
            return Ok(SoftDeleteStatus::failure(format!(
                "This entry was soft deleted {above} level{} above here",
                if level > 2 { "s" } else { "" }
            )));
        }
        self.walk_and_save(WalkMode::ResetSoftDelete, id, &entity_type, save, execution)
            .await
    }

    async fn check(&mut self, id: RecordId, execution: Execution) -> Result<SoftDeleteStatus> {
        let (entity_type, level) = self.level_of(id)?;
        if level == C::ACTIVE {
            return Ok(self.not_deleted());
        }
        self.walk_and_save(WalkMode::CheckWhatWillDelete, id, &entity_type, false, execution)
            .await
    }

    async fn hard_delete(
        &mut self,
        id: RecordId,
        save: bool,
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        let (entity_type, level) = self.level_of(id)?;
        if level == C::ACTIVE {
            return Ok(self.not_deleted());
        }
        self.walk_and_save(WalkMode::HardDeleteSoftDeleted, id, &entity_type, save, execution)
            .await
    }

    async fn walk_and_save(
        &mut self,
        mode: WalkMode,
        id: RecordId,
        entity_type: &str,
        save: bool,
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        let (count, journal) = {
            let mut walker =
                CascadeWalker::new(&mut self.store, &self.config, &self.bindings, mode, execution);
            walker.walk(id, 1).await?;
            (walker.count(), walker.into_journal())
        };
        if save {
            if let Err(err) = self.commit(execution).await {
                journal.undo(&mut self.store);
                return Err(err);
            }
        }
        tracing::info!(
            entity_type,
            record = %id,
            mode = ?mode,
            count,
            saved = save,
            "Cascade operation complete"
        );
        Ok(SoftDeleteStatus::success(count, self.message(mode, count)))
    }

    async fn commit(&mut self, execution: Execution) -> Result<usize> {
        Ok(execution
            .run("save changes", self.store.save_changes())
            .await??)
    }

    async fn via_keys(
        &mut self,
        mode: WalkMode,
        entity_type: &str,
        keys: &[KeyValue],
        execution: Execution,
    ) -> Result<SoftDeleteStatus> {
        match self.find(entity_type, keys, execution).await? {
            Some(id) => self.run(mode, id, true, execution).await,
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

    /// Roots of earlier cascades (level 1), the only records that can be reset.
    fn soft_deleted_entries(&self, entity_type: &str) -> Result<Query> {
        guard::ensure_capability::<C>(self.store.model(), entity_type)?;
        let def = self
            .store
            .model()
            .entity_type(entity_type)
            .ok_or_else(|| ValidationError::UnknownEntityType(entity_type.to_string()))?;
        Ok(Query::new(entity_type)
            .ignore_query_filters()
            .filter_opt(self.config.value_filter(def, 1)?))
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

    fn message(&self, mode: WalkMode, count: usize) -> String {
        let settings = &self.config.settings;
        let what = match mode {
            WalkMode::SoftDelete => settings.text_soft_deleted_past_tense.as_str(),
            WalkMode::ResetSoftDelete => "recovered",
            WalkMode::HardDeleteSoftDeleted => settings.text_hard_deleted_past_tense.as_str(),
            WalkMode::CheckWhatWillDelete => {
                return if count == 0 {
                    "No entries will be hard deleted".to_string()
                } else {
                    format!(
                        "Are you sure you want to hard delete this entity{}",
                        dependents_suffix(count)
                    )
                };
            }
        };
        if count == 0 {
            format!("No entries have been {what}")
        } else {
            format!("You have {what} an entity{}", dependents_suffix(count))
        }
    }
}

fn dependents_suffix(count: usize) -> String {
    match count {
        0 | 1 => String::new(),
        2 => " and its 1 dependent".to_string(),
        n => format!(" and its {} dependents", n - 1),
    }
}

// ── Blocking service ─────────────────────────────────────────────

/// Cascade soft delete with blocking calls. The store must complete every
/// call without suspending; otherwise the call fails with
/// `SoftDeleteError::SyncOverAsync`.
pub struct CascadeSoftDeleteService<S, C: DeleteCapability = CascadeSoftDelete> {
    engine: CascadeEngine<S, C>,
}

impl<S, C> CascadeSoftDeleteService<S, C>
where
    S: Store,
    C: DeleteCapability<Value = u8>,
{
    /// Fails when the configuration lacks a getter or setter, or its scope
    /// filters disagree on the binding name.
    pub fn new(store: S, config: SoftDeleteConfig<C>) -> Result<Self> {
        Ok(Self {
            engine: CascadeEngine::new(store, config)?,
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

    /// Soft delete `id` and every active record it cascades to. Pass
    /// `call_save_changes = true` unless batching several operations into
    /// one commit.
    pub fn set_cascade_soft_delete(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        settle(
            "set cascade soft delete",
            self.engine.set(id, call_save_changes, Execution::Blocking),
        )
    }

    /// Recover a record soft deleted as the root of a cascade, together with
    /// the records deleted by that same cascade.
    pub fn reset_cascade_soft_delete(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        settle(
            "reset cascade soft delete",
            self.engine.reset(id, call_save_changes, Execution::Blocking),
        )
    }

    /// Count what `hard_delete_soft_deleted_entries` would remove.
    pub fn check_cascade_soft_delete(&mut self, id: RecordId) -> Result<SoftDeleteStatus> {
        settle(
            "check cascade soft delete",
            self.engine.check(id, Execution::Blocking),
        )
    }

    pub fn hard_delete_soft_deleted_entries(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        settle(
            "hard delete soft deleted entries",
            self.engine.hard_delete(id, call_save_changes, Execution::Blocking),
        )
    }

    pub fn set_cascade_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        settle(
            "set cascade soft delete",
            self.engine.via_keys(WalkMode::SoftDelete, entity_type, keys, Execution::Blocking),
        )
    }

    pub fn reset_cascade_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        settle(
            "reset cascade soft delete",
            self.engine.via_keys(WalkMode::ResetSoftDelete, entity_type, keys, Execution::Blocking),
        )
    }

    pub fn check_cascade_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        settle(
            "check cascade soft delete",
            self.engine
                .via_keys(WalkMode::CheckWhatWillDelete, entity_type, keys, Execution::Blocking),
        )
    }

    pub fn hard_delete_soft_deleted_entries_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        settle(
            "hard delete soft deleted entries",
            self.engine
                .via_keys(WalkMode::HardDeleteSoftDeleted, entity_type, keys, Execution::Blocking),
        )
    }

    /// Load by primary key, bypassing the default scope but not the extra
    /// scope filters.
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

    pub fn get_soft_deleted_entries(&self, entity_type: &str) -> Result<Query> {
        self.engine.soft_deleted_entries(entity_type)
    }
}

// ── Async service ────────────────────────────────────────────────

/// Cascade soft delete awaiting every store call.
pub struct CascadeSoftDeleteServiceAsync<S, C: DeleteCapability = CascadeSoftDelete> {
    engine: CascadeEngine<S, C>,
}

impl<S, C> CascadeSoftDeleteServiceAsync<S, C>
where
    S: Store,
    C: DeleteCapability<Value = u8>,
{
    pub fn new(store: S, config: SoftDeleteConfig<C>) -> Result<Self> {
        Ok(Self {
            engine: CascadeEngine::new(store, config)?,
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

    pub async fn set_cascade_soft_delete(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        self.engine.set(id, call_save_changes, Execution::Suspending).await
    }

    pub async fn reset_cascade_soft_delete(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        self.engine.reset(id, call_save_changes, Execution::Suspending).await
    }

    pub async fn check_cascade_soft_delete(&mut self, id: RecordId) -> Result<SoftDeleteStatus> {
        self.engine.check(id, Execution::Suspending).await
    }

    pub async fn hard_delete_soft_deleted_entries(
        &mut self,
        id: RecordId,
        call_save_changes: bool,
    ) -> Result<SoftDeleteStatus> {
        self.engine.hard_delete(id, call_save_changes, Execution::Suspending).await
    }

    pub async fn set_cascade_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        self.engine
            .via_keys(WalkMode::SoftDelete, entity_type, keys, Execution::Suspending)
            .await
    }

    pub async fn reset_cascade_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        self.engine
            .via_keys(WalkMode::ResetSoftDelete, entity_type, keys, Execution::Suspending)
            .await
    }

    pub async fn check_cascade_soft_delete_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        self.engine
            .via_keys(WalkMode::CheckWhatWillDelete, entity_type, keys, Execution::Suspending)
            .await
    }

    pub async fn hard_delete_soft_deleted_entries_via_keys(
        &mut self,
        entity_type: &str,
        keys: &[KeyValue],
    ) -> Result<SoftDeleteStatus> {
        self.engine
            .via_keys(WalkMode::HardDeleteSoftDeleted, entity_type, keys, Execution::Suspending)
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
