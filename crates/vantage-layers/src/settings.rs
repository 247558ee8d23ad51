// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings-tree description and the edit protocol that feeds it.
//!
//! # Projection
//!
//! Extensions emit [`SettingsTreeEntry`]s: a path plus a node describing the
//! editable fields at that path. Nodes are computed from the persisted layout
//! and the settings type's defaults only, so emitting the tree twice without an
//! intervening edit yields identical output.
//!
//! # Edits
//!
//! The settings host sends back [`SettingsAction`]s. Field edits are written
//! into the layout with [`apply_field_edit`], which diffs against the settings
//! type's defaults: storing a value equal to the default (or clearing it) removes
//! the key, so layouts only record what the user actually changed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use vantage_app_core::FieldMap;

use crate::error::LayerError;

/// Ordered keys locating a node (or a field, as the last segment) in the tree.
pub type SettingsPath = Vec<String>;

/// Builds a [`SettingsPath`] from string-like segments.
pub fn settings_path<I, S>(segments: I) -> SettingsPath
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    segments.into_iter().map(Into::into).collect()
}

/// One choice of a select input.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectOption {
    /// Display label.
    pub label: String,
    /// Value stored when chosen.
    pub value: Value,
}

/// Widget kind and bounds of a field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "input", rename_all = "camelCase")]
pub enum FieldInput {
    /// Numeric input.
    Number {
        /// Inclusive lower bound.
        min: Option<f64>,
        /// Inclusive upper bound.
        max: Option<f64>,
        /// Increment used by spinners.
        step: Option<f64>,
        /// Displayed decimal places.
        precision: Option<u32>,
    },
    /// Checkbox / toggle.
    Boolean,
    /// Free text.
    String {
        /// Hint shown when the value is empty.
        placeholder: Option<String>,
    },
    /// `#rrggbb` / `#rrggbbaa` color.
    Rgba,
    /// Three-component vector.
    Vec3 {
        /// Increment used by spinners.
        step: Option<f64>,
    },
    /// Choice among fixed options.
    Select {
        /// Available options.
        options: Vec<SelectOption>,
    },
}

impl FieldInput {
    /// Clamps numeric values into the field bounds; other inputs pass through.
    pub fn clamp(&self, value: Value) -> Value {
        match (self, value.as_f64()) {
            (Self::Number { min, max, .. }, Some(number)) => {
                let mut clamped = number;
                if let Some(min) = min {
                    clamped = clamped.max(*min);
                }
                if let Some(max) = max {
                    clamped = clamped.min(*max);
                }
                if values_equal(&Value::from(clamped), &value) {
                    value
                } else {
                    Value::from(clamped)
                }
            }
            _ => value,
        }
    }
}

/// Description of one editable field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SettingsTreeField {
    /// Field key (last path segment of edits).
    pub key: String,
    /// Display label.
    pub label: String,
    /// Widget kind and bounds.
    #[serde(flatten)]
    pub input: FieldInput,
    /// Current effective value.
    pub value: Value,
    /// Value used when the layout does not record one.
    pub default: Value,
    /// Optional help text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl SettingsTreeField {
    fn with_input(key: &str, label: &str, input: FieldInput, value: Value, default: Value) -> Self {
        Self {
            key: key.to_owned(),
            label: label.to_owned(),
            input,
            value,
            default,
            help: None,
        }
    }

    /// Unbounded numeric field.
    pub fn number(key: &str, label: &str, value: f64, default: f64) -> Self {
        let input = FieldInput::Number {
            min: None,
            max: None,
            step: None,
            precision: None,
        };
        Self::with_input(key, label, input, Value::from(value), Value::from(default))
    }

    /// Boolean field.
    pub fn boolean(key: &str, label: &str, value: bool, default: bool) -> Self {
        let input = FieldInput::Boolean;
        Self::with_input(key, label, input, value.into(), default.into())
    }

    /// Text field; `None` values are shown empty with `placeholder`.
    pub fn string(key: &str, label: &str, value: Option<&str>, placeholder: Option<&str>) -> Self {
        let input = FieldInput::String {
            placeholder: placeholder.map(str::to_owned),
        };
        let value = value.map_or(Value::Null, Value::from);
        Self::with_input(key, label, input, value, Value::Null)
    }

    /// Color field.
    pub fn rgba(key: &str, label: &str, value: &str, default: &str) -> Self {
        Self::with_input(key, label, FieldInput::Rgba, value.into(), default.into())
    }

    /// Vector field.
    pub fn vec3(key: &str, label: &str, value: [f64; 3], default: [f64; 3]) -> Self {
        let input = FieldInput::Vec3 { step: Some(0.1) };
        let value = Value::from(value.to_vec());
        let default = Value::from(default.to_vec());
        Self::with_input(key, label, input, value, default)
    }

    /// Sets inclusive numeric bounds.
    pub fn with_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        if let FieldInput::Number { min, max, .. } = &mut self.input {
            *min = lower;
            *max = upper;
        }
        self
    }

    /// Sets the numeric step and display precision.
    pub fn with_step(mut self, increment: f64, digits: u32) -> Self {
        if let FieldInput::Number {
            step, precision, ..
        } = &mut self.input
        {
            *step = Some(increment);
            *precision = Some(digits);
        }
        self
    }

    /// Attaches help text.
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_owned());
        self
    }
}

/// A node-level action such as "delete".
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettingsNodeAction {
    /// Identifier sent back in [`SettingsAction::PerformNodeAction`].
    pub id: String,
    /// Display label.
    pub label: String,
}

impl SettingsNodeAction {
    /// Creates an action.
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_owned(),
            label: label.to_owned(),
        }
    }
}

/// One node of the settings tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SettingsTreeNode {
    /// Display label.
    pub label: String,
    /// Visibility toggle state; `None` hides the toggle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// Editable fields in display order.
    pub fields: Vec<SettingsTreeField>,
    /// Node-level actions.
    pub actions: Vec<SettingsNodeAction>,
    /// Problem shown on the node (e.g. a missing transform).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sort key among siblings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl SettingsTreeNode {
    /// Looks up a field by key.
    pub fn field(&self, key: &str) -> Option<&SettingsTreeField> {
        self.fields.iter().find(|field| field.key == key)
    }

    /// Whether the node offers action `id`.
    pub fn has_action(&self, id: &str) -> bool {
        self.actions.iter().any(|action| action.id == id)
    }
}

/// A node together with its location.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SettingsTreeEntry {
    /// Location of the node.
    pub path: SettingsPath,
    /// The node.
    pub node: SettingsTreeNode,
}

/// Edits produced by the settings host.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsAction {
    /// Set (or with `None`, reset) the field at `path` (node path + field key).
    Update {
        /// Node path followed by the field key.
        path: SettingsPath,
        /// New value; `None` restores the default.
        value: Option<Value>,
    },
    /// Run action `id` on the node at `path`.
    PerformNodeAction {
        /// Node path.
        path: SettingsPath,
        /// Action identifier.
        id: String,
    },
}

impl SettingsAction {
    /// Field edit helper.
    pub fn update<I, S>(path: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Update {
            path: settings_path(path),
            value: Some(value.into()),
        }
    }

    /// Node action helper.
    pub fn node_action<I, S>(path: I, id: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::PerformNodeAction {
            path: settings_path(path),
            id: id.to_owned(),
        }
    }

    /// The path the action addresses.
    pub fn path(&self) -> &[String] {
        match self {
            Self::Update { path, .. } | Self::PerformNodeAction { path, .. } => path,
        }
    }
}

/// JSON equality that treats `30` and `30.0` as the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

/// Decodes typed settings from a layout entry; a missing entry is all defaults.
pub fn decode_settings<S>(key: &str, fields: Option<&FieldMap>) -> Result<S, LayerError>
where
    S: DeserializeOwned + Default,
{
    let Some(fields) = fields else {
        return Ok(S::default());
    };
    let value = Value::Object(fields.clone());
    serde_json::from_value(value).map_err(|source| LayerError::InvalidSettings {
        key: key.to_owned(),
        source,
    })
}

/// [`decode_settings`], falling back to defaults (with a warning) on bad data.
pub fn settings_or_default<S>(key: &str, fields: Option<&FieldMap>) -> S
where
    S: DeserializeOwned + Default,
{
    decode_settings(key, fields).unwrap_or_else(|err| {
        warn!(%err, "using default settings");
        S::default()
    })
}

/// Writes one field edit into `fields`, diffing against `S::default()`.
///
/// Returns whether `fields` changed. The edit is validated by decoding the
/// result as `S`; on error `fields` may be partially edited, so callers run
/// this inside an atomic [`SettingsStore::update`](vantage_app_core::SettingsStore::update).
pub fn apply_field_edit<S>(
    key: &str,
    fields: &mut FieldMap,
    field: &str,
    value: Option<Value>,
) -> Result<bool, LayerError>
where
    S: Serialize + DeserializeOwned + Default,
{
    let defaults = serde_json::to_value(S::default()).map_err(|source| LayerError::InvalidSettings {
        key: key.to_owned(),
        source,
    })?;
    let Some(default) = defaults.get(field) else {
        return Err(LayerError::UnknownField {
            field: field.to_owned(),
        });
    };

    let before = fields.get(field).cloned();
    match value {
        Some(value) if !value.is_null() && !values_equal(&value, default) => {
            let unchanged = before.as_ref().is_some_and(|b| values_equal(b, &value));
            if unchanged {
                return Ok(false);
            }
            fields.insert(field.to_owned(), value);
        }
        _ => {
            fields.remove(field);
        }
    }
    decode_settings::<S>(key, Some(fields))?;
    Ok(before.as_ref() != fields.get(field))
}

/// Parses `#rrggbb` or `#rrggbbaa` into linear-ish `[r, g, b, a]` in `0..=1`.
pub fn parse_rgba(text: &str) -> Option<[f32; 4]> {
    let hex = text.strip_prefix('#')?;
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| -> Option<f32> {
        let byte = u8::from_str_radix(hex.get(i * 2..i * 2 + 2)?, 16).ok()?;
        Some(f32::from(byte) / 255.0)
    };
    let alpha = if hex.len() == 8 { channel(3)? } else { 1.0 };
    Some([channel(0)?, channel(1)?, channel(2)?, alpha])
}
