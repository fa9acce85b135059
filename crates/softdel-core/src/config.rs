//! Configuration for the soft delete services.
//!
//! Two layers:
//! - `SoftDeleteSettings`: behavioral flags and message texts. Loaded from
//!   (in priority order) environment variables (`SOFTDEL__` prefix), a config
//!   file (`softdel.toml`), then defaults.
//! - `SoftDeleteConfig<C>`: the per-capability bindings built in code: how
//!   to read and write the delete value, and the extra scope filters.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capability::{CascadeSoftDelete, DeleteCapability, Marker, SingleSoftDelete};
use crate::error::ConfigError;
use crate::filter::{self, RecordFilter, ScopeFilter, ScopeFilters, ValueGetter, ValueSetter};
use crate::model::EntityTypeDef;
use crate::record::Record;

/// Conventional property holding the single-level flag.
pub const SOFT_DELETED_PROPERTY: &str = "SoftDeleted";

/// Conventional property holding the cascade level.
pub const SOFT_DELETE_LEVEL_PROPERTY: &str = "SoftDeleteLevel";

/// Behavioral flags and message texts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoftDeleteSettings {
    /// When a `..._via_keys` lookup finds nothing, succeed with a count of 0
    /// instead of reporting an error.
    #[serde(default)]
    pub not_found_is_not_an_error: bool,

    /// Reload children from the store on every soft delete step even when a
    /// navigation is already loaded. Only used by cascade soft delete.
    #[serde(default = "default_true")]
    pub read_every_time: bool,

    #[serde(default = "default_soft_deleted_text")]
    pub text_soft_deleted_past_tense: String,

    #[serde(default = "default_hard_deleted_text")]
    pub text_hard_deleted_past_tense: String,

    #[serde(default = "default_reset_text")]
    pub text_reset_soft_delete: String,
}

fn default_true() -> bool {
    true
}

fn default_soft_deleted_text() -> String {
    "soft deleted".to_string()
}

fn default_hard_deleted_text() -> String {
    "hard deleted".to_string()
}

fn default_reset_text() -> String {
    "reset the soft delete".to_string()
}

impl Default for SoftDeleteSettings {
    fn default() -> Self {
        Self {
            not_found_is_not_an_error: false,
            read_every_time: default_true(),
            text_soft_deleted_past_tense: default_soft_deleted_text(),
            text_hard_deleted_past_tense: default_hard_deleted_text(),
            text_reset_soft_delete: default_reset_text(),
        }
    }
}

impl SoftDeleteSettings {
    /// Load from `<file_prefix>.toml` (optional) overlaid with `SOFTDEL__*`
    /// environment variables.
    pub fn load(file_prefix: &str) -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("SOFTDEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let settings = Self::from_config(cfg)?;
        tracing::debug!(
            file_prefix,
            not_found_is_not_an_error = settings.not_found_is_not_an_error,
            read_every_time = settings.read_every_time,
            "Loaded soft delete settings"
        );
        Ok(settings)
    }

    pub fn from_config(cfg: config::Config) -> Result<Self, ConfigError> {
        Ok(cfg.try_deserialize()?)
    }
}

/// Getter and setter of a validated configuration.
pub struct Bindings<C: DeleteCapability> {
    pub get: ValueGetter<C::Value>,
    pub set: ValueSetter<C::Value>,
}

impl<C: DeleteCapability> Clone for Bindings<C> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

/// Bindings for one delete capability.
pub struct SoftDeleteConfig<C: DeleteCapability> {
    get_soft_delete_value: Option<ValueGetter<C::Value>>,
    set_soft_delete_value: Option<ValueSetter<C::Value>>,
    other_filters: ScopeFilters,
    pub settings: SoftDeleteSettings,
    _capability: PhantomData<C>,
}

impl<C: DeleteCapability> SoftDeleteConfig<C> {
    /// A configuration with no bindings. The getter and setter must be set
    /// before a service accepts it.
    pub fn new() -> Self {
        Self {
            get_soft_delete_value: None,
            set_soft_delete_value: None,
            other_filters: ScopeFilters::new(),
            settings: SoftDeleteSettings::default(),
            _capability: PhantomData,
        }
    }

    pub fn with_getter(
        mut self,
        get: impl Fn(&Record) -> C::Value + Send + Sync + 'static,
    ) -> Self {
        self.get_soft_delete_value = Some(Arc::new(get));
        self
    }

    pub fn with_setter(
        mut self,
        set: impl Fn(&mut Record, C::Value) + Send + Sync + 'static,
    ) -> Self {
        self.set_soft_delete_value = Some(Arc::new(set));
        self
    }

    /// Add an extra scope filter applied to entity types declaring `marker`.
    pub fn with_scope_filter(mut self, marker: impl Into<Marker>, filter: ScopeFilter) -> Self {
        self.other_filters.insert(marker.into(), filter);
        self
    }

    pub fn with_settings(mut self, settings: SoftDeleteSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn other_filters(&self) -> &ScopeFilters {
        &self.other_filters
    }

    /// Resolve the getter and setter and check the scope filter bindings.
    pub fn bindings(&self) -> Result<Bindings<C>, ConfigError> {
        let get = self
            .get_soft_delete_value
            .clone()
            .ok_or(ConfigError::MissingGetter {
                capability: C::MARKER,
            })?;
        let set = self
            .set_soft_delete_value
            .clone()
            .ok_or(ConfigError::MissingSetter {
                capability: C::MARKER,
            })?;
        filter::check_bindings(&self.other_filters)?;
        Ok(Bindings { get, set })
    }

    fn getter(&self) -> Result<&ValueGetter<C::Value>, ConfigError> {
        self.get_soft_delete_value
            .as_ref()
            .ok_or(ConfigError::MissingGetter {
                capability: C::MARKER,
            })
    }

    /// Default scope: delete value is active, plus the applicable scope filters.
    pub fn default_scope(
        &self,
        entity: &EntityTypeDef,
    ) -> Result<Option<RecordFilter>, ConfigError> {
        self.value_filter(entity, C::ACTIVE)
    }

    /// Delete value equals `value`, plus the applicable scope filters.
    pub fn value_filter(
        &self,
        entity: &EntityTypeDef,
        value: C::Value,
    ) -> Result<Option<RecordFilter>, ConfigError> {
        filter::delete_state_filter::<C>(self.getter()?, value, &self.other_filters, entity)
    }

    /// The applicable scope filters alone.
    pub fn scope_only(&self, entity: &EntityTypeDef) -> Result<Option<RecordFilter>, ConfigError> {
        filter::scope_filters_only(&self.other_filters, entity)
    }
}

impl<C: DeleteCapability> Default for SoftDeleteConfig<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: DeleteCapability> Clone for SoftDeleteConfig<C> {
    fn clone(&self) -> Self {
        Self {
            get_soft_delete_value: self.get_soft_delete_value.clone(),
            set_soft_delete_value: self.set_soft_delete_value.clone(),
            other_filters: self.other_filters.clone(),
            settings: self.settings.clone(),
            _capability: PhantomData,
        }
    }
}

impl<C: DeleteCapability> fmt::Debug for SoftDeleteConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftDeleteConfig")
            .field("capability", &C::MARKER)
            .field("has_getter", &self.get_soft_delete_value.is_some())
            .field("has_setter", &self.set_soft_delete_value.is_some())
            .field("other_filters", &self.other_filters.keys().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish()
    }
}

impl SoftDeleteConfig<SingleSoftDelete> {
    /// Bind the flag to a boolean property (conventional or shadow).
    pub fn flag_property(name: &str) -> Self {
        let get_name = name.to_string();
        let set_name = name.to_string();
        Self::new()
            .with_getter(move |r| r.bool_property(&get_name))
            .with_setter(move |r, v| r.set_property(&set_name, v))
    }
}

impl SoftDeleteConfig<CascadeSoftDelete> {
    /// Bind the level to a numeric property (conventional or shadow).
    pub fn level_property(name: &str) -> Self {
        let get_name = name.to_string();
        let set_name = name.to_string();
        Self::new()
            .with_getter(move |r| r.u8_property(&get_name))
            .with_setter(move |r, v| r.set_property(&set_name, v))
    }
}
