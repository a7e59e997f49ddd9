use std::fmt;

use jsonschema::Validator;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::error::{Result, SchemaError};
use crate::message::{SecurityLevel, ValidatedMessage, SECURITY_LEVEL_KEY};
use crate::source::{SchemaSource, StaticSchemaSource};

/// Compiled producer schema plus the default-filling rules around it.
///
/// Compiled once, then shared read-only; `validate` takes `&self` and holds
/// no per-call state.
pub struct SchemaValidator {
    validator: Validator,
    config: ValidatorConfig,
    origin: String,
}

impl SchemaValidator {
    /// Load and compile the schema from `source` with default config.
    pub fn from_source(source: &dyn SchemaSource) -> Result<Self> {
        Self::from_source_with_config(source, ValidatorConfig::default())
    }

    /// Load and compile the schema from `source` with explicit config.
    pub fn from_source_with_config(
        source: &dyn SchemaSource,
        config: ValidatorConfig,
    ) -> Result<Self> {
        let bytes = source.load()?;
        let schema: Value = serde_json::from_slice(&bytes)?;
        let mut validator = Self::from_value(&schema, config)?;
        validator.origin = source.describe();
        debug!(origin = %validator.origin, strict = config.strict_mode, "schema compiled");
        Ok(validator)
    }

    /// Compile an already-parsed schema document.
    pub fn from_value(schema: &Value, config: ValidatorConfig) -> Result<Self> {
        let mut schema_to_compile = schema.clone();
        if config.strict_mode {
            apply_strict_mode(&mut schema_to_compile);
        }

        let validator = jsonschema::validator_for(&schema_to_compile)
            .map_err(|err| SchemaError::CompileFailed(err.to_string()))?;

        Ok(Self {
            validator,
            config,
            origin: "in-memory".to_string(),
        })
    }

    /// Validator for the schema compiled into this crate.
    pub fn bundled() -> Result<Self> {
        Self::from_source(&StaticSchemaSource::bundled())
    }

    /// Validate `message`, returning a new copy with defaults applied.
    ///
    /// A missing `security_level` is filled with `"normal"` before the
    /// schema check. Nothing else is added, removed, or rewritten, and the
    /// input value is never modified.
    pub fn validate(&self, message: &Value) -> Result<ValidatedMessage> {
        let Value::Object(fields) = message else {
            return Err(SchemaError::ValidationFailed {
                message: format!("message must be a JSON object, got {}", type_name(message)),
            });
        };

        let mut fields = fields.clone();
        fill_defaults(&mut fields);
        let candidate = Value::Object(fields);

        if let Err(err) = self.check(&candidate) {
            debug!(error = %err, "message rejected by schema");
            return Err(err);
        }

        let fields: Map<String, Value> = serde_json::from_value(candidate)?;
        let security_level = resolve_security_level(&fields)?;
        let validated = ValidatedMessage::new(fields, security_level);
        debug!(
            event_type = validated.event_type().unwrap_or_default(),
            security_level = %security_level,
            "message validated"
        );
        Ok(validated)
    }

    /// True if `message` would pass `validate`.
    pub fn is_valid(&self, message: &Value) -> bool {
        self.validate(message).is_ok()
    }

    /// Where the schema was loaded from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Validator configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    fn check(&self, value: &Value) -> Result<()> {
        let mut errors = self.validator.iter_errors(value);
        if let Some(first) = errors.next() {
            let mut message = first.to_string();
            for err in errors.take(self.config.max_reported_violations) {
                message.push_str("; ");
                message.push_str(&err.to_string());
            }
            return Err(SchemaError::ValidationFailed { message });
        }
        Ok(())
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("origin", &self.origin)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn fill_defaults(fields: &mut Map<String, Value>) {
    fields
        .entry(SECURITY_LEVEL_KEY)
        .or_insert_with(|| Value::String(SecurityLevel::default().as_str().to_string()));
}

// A caller-supplied schema may not constrain security_level, so the
// resolved value is checked here as well.
fn resolve_security_level(fields: &Map<String, Value>) -> Result<SecurityLevel> {
    fields
        .get(SECURITY_LEVEL_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| "security_level must be a string".to_string())
        .and_then(|value| value.parse::<SecurityLevel>())
        .map_err(|message| SchemaError::ValidationFailed { message })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Only schemas that enumerate their keys are closed. Objects without
// `properties`, such as the opaque payload, keep accepting any key.
fn apply_strict_mode(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if declares_properties(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for key in ["properties", "patternProperties", "$defs", "definitions"] {
                if let Some(Value::Object(children)) = map.get_mut(key) {
                    children.values_mut().for_each(apply_strict_mode);
                }
            }
            for key in ["items", "not", "if", "then", "else"] {
                if let Some(child) = map.get_mut(key) {
                    apply_strict_mode(child);
                }
            }
            for key in ["prefixItems", "allOf", "anyOf", "oneOf"] {
                if let Some(Value::Array(children)) = map.get_mut(key) {
                    children.iter_mut().for_each(apply_strict_mode);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(apply_strict_mode),
        _ => {}
    }
}

fn declares_properties(map: &Map<String, Value>) -> bool {
    if !matches!(map.get("properties"), Some(Value::Object(_))) {
        return false;
    }
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Value::String(kind) if kind == "object")),
        _ => true,
    }
}
