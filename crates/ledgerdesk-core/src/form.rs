// ── Entity form ──
//
// Binds a validated request type to a create/update mutation pair. The
// mode follows id presence alone; a successful create moves the form into
// update mode for the new record so dependent line items can be added.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;
use validator::Validate;

use crate::data_layer::DataLayer;
use crate::error::CoreError;
use crate::model::{EntityId, Record};
use crate::mutation::{Mutation, MutationOptions};
use crate::query::QueryOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Update(EntityId),
}

impl FormMode {
    pub fn from_id(id: Option<EntityId>) -> Self {
        id.map_or(Self::Create, Self::Update)
    }

    pub fn id(&self) -> Option<&EntityId> {
        match self {
            Self::Create => None,
            Self::Update(id) => Some(id),
        }
    }
}

/// Caller-supplied form configuration.
pub struct FormProps<T> {
    /// JSON object overlaid on `R::default()`; `Value::Null` for none.
    pub default_values: Value,
    pub on_success: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    pub on_error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub read_only: bool,
    pub disabled_fields: BTreeSet<String>,
    pub hidden_fields: BTreeSet<String>,
    /// In update mode, every `edit` submits immediately.
    pub auto_save: bool,
    pub show_message: bool,
}

impl<T> Default for FormProps<T> {
    fn default() -> Self {
        Self {
            default_values: Value::Null,
            on_success: None,
            on_error: None,
            read_only: false,
            disabled_fields: BTreeSet::new(),
            hidden_fields: BTreeSet::new(),
            auto_save: false,
            show_message: true,
        }
    }
}

impl<T> FormProps<T> {
    #[must_use]
    pub fn default_values(mut self, values: Value) -> Self {
        self.default_values = values;
        self
    }

    #[must_use]
    pub fn on_success(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn disable_field(mut self, field: impl Into<String>) -> Self {
        self.disabled_fields.insert(field.into());
        self
    }

    #[must_use]
    pub fn hide_field(mut self, field: impl Into<String>) -> Self {
        self.hidden_fields.insert(field.into());
        self
    }

    #[must_use]
    pub fn auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    #[must_use]
    pub fn show_message(mut self, show: bool) -> Self {
        self.show_message = show;
        self
    }
}

/// Busy state of one form, readable while `submit` holds the form itself.
pub struct FormActivity<T, R> {
    read_only: bool,
    create: Mutation<R, T>,
    update: Mutation<(EntityId, R), T>,
}

impl<T, R> Clone for FormActivity<T, R> {
    fn clone(&self) -> Self {
        Self {
            read_only: self.read_only,
            create: self.create.clone(),
            update: self.update.clone(),
        }
    }
}

impl<T, R> fmt::Debug for FormActivity<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormActivity")
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl<T, R> FormActivity<T, R>
where
    T: Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn is_pending(&self) -> bool {
        self.create.is_pending() || self.update.is_pending()
    }

    /// The whole field set is disabled while saving or when read-only.
    pub fn is_disabled(&self) -> bool {
        self.read_only || self.is_pending()
    }
}

pub struct EntityForm<T, R> {
    layer: DataLayer<T, R>,
    mode: FormMode,
    props: FormProps<T>,
    /// What `reset` restores in update mode.
    defaults: R,
    values: R,
    create: Mutation<R, T>,
    update: Mutation<(EntityId, R), T>,
    validation_error: Option<CoreError>,
}

impl<T, R: fmt::Debug> fmt::Debug for EntityForm<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityForm")
            .field("mode", &self.mode)
            .field("values", &self.values)
            .field("read_only", &self.props.read_only)
            .finish_non_exhaustive()
    }
}

impl<T, R> EntityForm<T, R>
where
    T: Record + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    R: Validate + Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static,
{
    pub fn new(
        layer: DataLayer<T, R>,
        id: Option<EntityId>,
        props: FormProps<T>,
    ) -> Result<Self, CoreError> {
        let defaults: R = overlay_defaults(&props.default_values)?;

        let create = layer.create_mutation(Self::mutation_options(&props));
        let update = layer.update_mutation(Self::mutation_options(&props));

        Ok(Self {
            layer,
            mode: FormMode::from_id(id),
            values: defaults.clone(),
            defaults,
            props,
            create,
            update,
            validation_error: None,
        })
    }

    fn mutation_options<V: 'static>(props: &FormProps<T>) -> MutationOptions<V, T> {
        let mut options = MutationOptions::new().show_message(props.show_message);
        if let Some(on_success) = props.on_success.clone() {
            options = options.on_success(move |record: &T, _: &V| on_success(record));
        }
        if let Some(on_error) = props.on_error.clone() {
            options = options.on_error(move |message: &str, _: &CoreError| on_error(message));
        }
        options
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn id(&self) -> Option<&EntityId> {
        self.mode.id()
    }

    pub fn values(&self) -> &R {
        &self.values
    }

    pub fn props(&self) -> &FormProps<T> {
        &self.props
    }

    /// A detached view of pending and disabled state.
    pub fn activity(&self) -> FormActivity<T, R> {
        FormActivity {
            read_only: self.props.read_only,
            create: self.create.clone(),
            update: self.update.clone(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.create.is_pending() || self.update.is_pending()
    }

    /// The whole field set is disabled while saving or when read-only.
    pub fn is_disabled(&self) -> bool {
        self.props.read_only || self.is_pending()
    }

    pub fn is_field_disabled(&self, field: &str) -> bool {
        self.is_disabled() || self.props.disabled_fields.contains(field)
    }

    pub fn is_field_hidden(&self, field: &str) -> bool {
        self.props.hidden_fields.contains(field)
    }

    /// The one message to render near the submit control, whether it came
    /// from local validation or from the server.
    pub fn error_message(&self) -> Option<String> {
        if let Some(err) = &self.validation_error {
            return Some(err.message());
        }
        let active = match self.mode {
            FormMode::Create => self.create.error(),
            FormMode::Update(_) => self.update.error(),
        };
        active.map(|err| err.message())
    }

    /// Field-scoped validation messages from the last submit.
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.validation_error
            .as_ref()
            .and_then(CoreError::field_errors)
            .and_then(|fields| fields.get(field))
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    // ── Editing ──────────────────────────────────────────────────────

    /// Change values in place. With `auto_save` in update mode the change
    /// is submitted straight away and the outcome returned.
    pub async fn edit(&mut self, f: impl FnOnce(&mut R)) -> Option<Result<T, CoreError>> {
        if self.is_disabled() {
            debug!("edit ignored, form disabled");
            return None;
        }
        f(&mut self.values);

        if self.props.auto_save && matches!(self.mode, FormMode::Update(_)) {
            Some(self.submit().await)
        } else {
            None
        }
    }

    /// Replace the default values (and current values) from a fetched
    /// record. Used when opening an existing record.
    pub fn load_record(&mut self, record: &T) -> Result<(), CoreError> {
        let value = serde_json::to_value(record)
            .map_err(|e| CoreError::Internal(format!("record is not serializable: {e}")))?;
        self.defaults = overlay_defaults(&value)?;
        self.values = self.defaults.clone();
        Ok(())
    }

    /// In update mode, fetch the record through the detail query and load it.
    pub async fn load(&mut self) -> Result<(), CoreError> {
        let Some(id) = self.mode.id().cloned() else {
            return Ok(());
        };
        let result = self.layer.query_by_id(&id, QueryOptions::default()).fetch().await;
        if let Some(err) = result.error {
            return Err(err);
        }
        match result.data.as_ref() {
            Some(record) => self.load_record(record),
            None => Err(CoreError::NotFound {
                message: format!("{} {id} not found", self.layer.label()),
            }),
        }
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Validate, then run the mutation the current mode selects.
    pub async fn submit(&mut self) -> Result<T, CoreError> {
        if self.props.read_only {
            return Err(CoreError::ClientValidation {
                message: "Form is read-only".into(),
                fields: ledgerdesk_api::FieldErrors::new(),
            });
        }

        if let Err(errors) = self.values.validate() {
            let err = CoreError::from(errors);
            debug!(error = %err, "form rejected before submit");
            if let Some(on_error) = &self.props.on_error {
                on_error(&err.message());
            }
            self.validation_error = Some(err.clone());
            return Err(err);
        }
        self.validation_error = None;

        match self.mode.clone() {
            FormMode::Create => {
                let record = self.create.mutate(self.values.clone()).await?;
                let id = record.record_id().clone();
                debug!(%id, "created, switching to update mode");
                self.mode = FormMode::Update(id);
                if self.load_record(&record).is_err() {
                    self.defaults = self.values.clone();
                }
                Ok(record)
            }
            FormMode::Update(id) => self.update.mutate((id, self.values.clone())).await,
        }
    }

    /// Restore defaults for the current mode and clear all error state.
    ///
    /// Create mode goes back to the request type's own defaults; update
    /// mode goes back to the values the form was opened (or loaded) with.
    pub fn reset(&mut self) {
        self.values = match self.mode {
            FormMode::Create => R::default(),
            FormMode::Update(_) => self.defaults.clone(),
        };
        self.validation_error = None;
        self.create.reset();
        self.update.reset();
    }
}

/// Overlay a JSON object on `R::default()`. Only keys `R` already has are
/// taken, and `null` leaves the default in place.
fn overlay_defaults<R>(overlay: &Value) -> Result<R, CoreError>
where
    R: Serialize + DeserializeOwned + Default,
{
    let Value::Object(overlay) = overlay else {
        return Ok(R::default());
    };

    let base = serde_json::to_value(R::default())
        .map_err(|e| CoreError::Internal(format!("defaults are not serializable: {e}")))?;
    let Value::Object(mut merged) = base else {
        return Ok(R::default());
    };

    merge_known(&mut merged, overlay);
    serde_json::from_value(Value::Object(merged)).map_err(|e| CoreError::ClientValidation {
        message: format!("Invalid default values: {e}"),
        fields: ledgerdesk_api::FieldErrors::new(),
    })
}

fn merge_known(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        if value.is_null() {
            continue;
        }
        if let Some(slot) = base.get_mut(key) {
            *slot = value.clone();
        }
    }
}
