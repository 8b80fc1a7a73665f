use seqkit_domain::{BlockKind, OnExists};
use serde_yaml::Value;

use crate::error::ValidationError;
use crate::policy::{ON_EXISTS_FIELD, OVERWRITE_FIELD, resolve_policy};

/// One declared resource with its control fields already consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceItem {
    pub block: BlockKind,
    pub fields: Vec<(String, Value)>,
    pub on_exists: OnExists,
}

impl ResourceItem {
    /// Parse a raw YAML entry of `block`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is not a mapping with string keys or its
    /// on-exists controls are invalid.
    pub fn parse(
        block: BlockKind,
        raw: &Value,
        global: Option<OnExists>,
    ) -> Result<Self, ValidationError> {
        let Value::Mapping(mapping) = raw else {
            return Err(ValidationError::ItemNotMapping { block });
        };

        let mut fields = Vec::with_capacity(mapping.len());
        let mut on_exists = None;
        let mut overwrite = None;
        for (key, value) in mapping {
            let Value::String(name) = key else {
                return Err(ValidationError::NonStringField { block });
            };
            match name.as_str() {
                ON_EXISTS_FIELD => on_exists = Some(value),
                OVERWRITE_FIELD => overwrite = Some(value),
                _ => fields.push((name.clone(), value.clone())),
            }
        }

        let on_exists = resolve_policy(block, global, on_exists, overwrite)?;
        Ok(Self {
            block,
            fields,
            on_exists,
        })
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
            .filter(|value| !value.is_null())
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Scalar field rendered as text; `None` for absent, null or nested values.
    #[must_use]
    pub fn text_field(&self, name: &str) -> Option<String> {
        self.field(name).and_then(scalar_text)
    }
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
