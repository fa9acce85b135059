//! Cascade walker.
//!
//! Starting from a root record at level 1, visits every record reachable
//! through principal-side navigations whose delete behavior is `Cascade` or
//! `ClientCascade`, applying one transition per record. Each tracked record
//! is visited at most once per walk, so cycles and self-references
//! terminate. A record whose transition stops is neither changed nor
//! counted, and nothing below it is visited. A walk that fails puts every
//! record it changed back as it was.

use std::collections::HashSet;

use futures::future::BoxFuture;
use softdel_core::{Bindings, DeleteCapability, Navigation, RecordId, SoftDeleteConfig};
use softdel_store::{Store, StoreError};

use crate::error::{Result, SoftDeleteError};
use crate::execution::Execution;
use crate::journal::Journal;
use crate::loader;

/// What a walk does to each record it reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    SoftDelete = 0,
    ResetSoftDelete = 1,
    CheckWhatWillDelete = 2,
    HardDeleteSoftDeleted = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    SetLevel,
    ClearLevel,
    CountOnly,
    Remove,
}

struct Transition {
    /// `(current level, walk level)`: leave this record and its subtree alone.
    stop: fn(u8, u8) -> bool,
    effect: Effect,
}

fn already_deleted(current: u8, _level: u8) -> bool {
    current != 0
}

fn not_at_level(current: u8, level: u8) -> bool {
    current != level
}

fn not_deleted(current: u8, _level: u8) -> bool {
    current == 0
}

static TRANSITIONS: [Transition; 4] = [
    Transition {
        stop: already_deleted,
        effect: Effect::SetLevel,
    },
    Transition {
        stop: not_at_level,
        effect: Effect::ClearLevel,
    },
    Transition {
        stop: not_deleted,
        effect: Effect::CountOnly,
    },
    Transition {
        stop: not_deleted,
        effect: Effect::Remove,
    },
];

impl WalkMode {
    fn transition(self) -> &'static Transition {
        &TRANSITIONS[self as usize]
    }
}

/// One walk session: the visited set, the changes made and their count.
pub struct CascadeWalker<'a, S: Store + ?Sized, C: DeleteCapability<Value = u8>> {
    store: &'a mut S,
    config: &'a SoftDeleteConfig<C>,
    bindings: &'a Bindings<C>,
    mode: WalkMode,
    execution: Execution,
    read_every_time: bool,
    visited: HashSet<RecordId>,
    journal: Journal,
    count: usize,
}

impl<'a, S, C> CascadeWalker<'a, S, C>
where
    S: Store + ?Sized,
    C: DeleteCapability<Value = u8>,
{
    /// `read_every_time` is only honoured for `WalkMode::SoftDelete`.
    pub fn new(
        store: &'a mut S,
        config: &'a SoftDeleteConfig<C>,
        bindings: &'a Bindings<C>,
        mode: WalkMode,
        execution: Execution,
    ) -> Self {
        let read_every_time = config.settings.read_every_time && mode == WalkMode::SoftDelete;
        Self {
            store,
            config,
            bindings,
            mode,
            execution,
            read_every_time,
            visited: HashSet::new(),
            journal: Journal::new(),
            count: 0,
        }
    }

    /// Records whose state was changed (or, when checking, would be).
    pub fn count(&self) -> usize {
        self.count
    }

    /// The changes this walk made, for undoing them if the commit fails.
    pub fn into_journal(self) -> Journal {
        self.journal
    }

    /// Walk from `id` at `level`. On error, nothing the walk changed is left
    /// in the store.
    pub async fn walk(&mut self, id: RecordId, level: u8) -> Result<()> {
        let result = self.visit(id, level).await;
        if result.is_err() {
            std::mem::take(&mut self.journal).undo(&mut *self.store);
            self.count = 0;
        }
        result
    }

    fn visit(&mut self, id: RecordId, level: u8) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let Some(entity_type) = self.store.record(id).map(|r| r.entity_type.clone()) else {
                return Ok(());
            };
            let implements = self
                .store
                .model()
                .entity_type(&entity_type)
                .is_some_and(|def| def.implements::<C>());
            if !implements || !self.visited.insert(id) {
                return Ok(());
            }

            if !self.apply(id, level)? {
                return Ok(());
            }

            // No record is stored below the deepest level.
            if self.mode != WalkMode::SoftDelete && level == u8::MAX {
                return Ok(());
            }
            let navigations = self.store.model().cascade_navigations(&entity_type);
            for navigation in navigations {
                let children = self.children(id, &navigation, level).await?;
                for child in children {
                    match level.checked_add(1) {
                        Some(next) => self.visit(child, next).await?,
                        None => self.ensure_unchanged(child)?,
                    }
                }
            }
            Ok(())
        })
    }

    /// Apply the transition. `false` means stop here.
    fn apply(&mut self, id: RecordId, level: u8) -> Result<bool> {
        let record = self.store.record(id).ok_or(StoreError::UnknownRecord(id))?;
        let current = (self.bindings.get)(record);
        let transition = self.mode.transition();
        if (transition.stop)(current, level) {
            tracing::debug!(record = %id, current, level, mode = ?self.mode, "Stopped");
            return Ok(false);
        }

        match transition.effect {
            Effect::SetLevel => self.set_value(id, level)?,
            Effect::ClearLevel => self.set_value(id, C::ACTIVE)?,
            Effect::CountOnly => {}
            Effect::Remove => {
                self.store.remove(id)?;
                self.journal.removed(id);
            }
        }
        self.count += 1;
        tracing::debug!(record = %id, level, mode = ?self.mode, "Applied");
        Ok(true)
    }

    fn set_value(&mut self, id: RecordId, value: u8) -> Result<()> {
        let record = self
            .store
            .record_mut(id)
            .ok_or(StoreError::UnknownRecord(id))?;
        self.journal.changed(id, record.clone());
        (self.bindings.set)(record, value);
        Ok(())
    }

    /// Fails if `child`, found below a record at level 255, would be soft
    /// deleted.
    fn ensure_unchanged(&self, child: RecordId) -> Result<()> {
        let Some(record) = self.store.record(child) else {
            return Ok(());
        };
        let implements = self
            .store
            .model()
            .entity_type(&record.entity_type)
            .is_some_and(|def| def.implements::<C>());
        let active = (self.bindings.get)(record) == C::ACTIVE;
        if implements && active && !self.visited.contains(&child) {
            return Err(SoftDeleteError::CascadeTooDeep {
                entity_type: record.entity_type.clone(),
                max: u8::MAX,
            });
        }
        Ok(())
    }

    /// The children of `id` through `navigation` to visit next.
    async fn children(
        &mut self,
        id: RecordId,
        navigation: &Navigation,
        level: u8,
    ) -> Result<Vec<RecordId>> {
        let loaded = self
            .store
            .loaded_navigation(id, &navigation.name)
            .filter(|ids| navigation.is_collection || !ids.is_empty());
        if let Some(ids) = loaded {
            if !self.read_every_time {
                return Ok(ids);
            }
        }

        // Other modes never get here at the deepest level.
        let look_for = match self.mode {
            WalkMode::SoftDelete => C::ACTIVE,
            _ => level.saturating_add(1),
        };

        let store = &mut *self.store;
        if navigation.is_collection {
            loader::load_collection(store, self.config, self.execution, id, navigation, look_for)
                .await
        } else {
            let child =
                loader::load_singleton(store, self.config, self.execution, id, navigation, look_for)
                    .await?;
            Ok(child.into_iter().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        let soft = WalkMode::SoftDelete.transition();
        assert!(!(soft.stop)(0, 3));
        assert!((soft.stop)(1, 3));
        assert_eq!(soft.effect, Effect::SetLevel);

        let reset = WalkMode::ResetSoftDelete.transition();
        assert!(!(reset.stop)(2, 2));
        assert!((reset.stop)(1, 2));
        assert!((reset.stop)(0, 2));
        assert_eq!(reset.effect, Effect::ClearLevel);

        let check = WalkMode::CheckWhatWillDelete.transition();
        assert!((check.stop)(0, 1));
        assert!(!(check.stop)(5, 1));
        assert_eq!(check.effect, Effect::CountOnly);

        let hard = WalkMode::HardDeleteSoftDeleted.transition();
        assert!((hard.stop)(0, 1));
        assert_eq!(hard.effect, Effect::Remove);
    }
}
