//! Building fully-defaulted layer records from partial overrides.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::data::{serialize_fields, BaseProps, FieldMap, LayerData, LayerVariant, ID_KEY, TYPE_KEY};
use crate::id::LayerId;

/// View an override value as a field map. Anything but an object is ignored.
pub fn overrides_of(value: &Value) -> FieldMap {
    match value {
        Value::Object(map) => map.clone(),
        Value::Null => FieldMap::new(),
        other => {
            tracing::warn!(kind = %value_kind(other), "layer overrides must be an object; ignoring");
            FieldMap::new()
        }
    }
}

/// Merge `overrides` onto `defaults` one field at a time.
///
/// Keys unknown to `T` are skipped. A value that does not deserialize keeps
/// the default for that field, so one corrupted field never discards the rest
/// of the record.
pub fn merge_onto<T>(defaults: T, overrides: &FieldMap) -> T
where
    T: Serialize + DeserializeOwned,
{
    let mut current = defaults;
    let mut fields = serialize_fields(&current);

    for (key, value) in overrides {
        if !fields.contains_key(key) {
            continue;
        }
        let mut candidate = fields.clone();
        candidate.insert(key.clone(), value.clone());
        match serde_json::from_value::<T>(Value::Object(candidate)) {
            Ok(merged) => {
                current = merged;
                fields = serialize_fields(&current);
            }
            Err(err) => {
                tracing::warn!(field = %key, error = %err, "invalid layer field; using default");
            }
        }
    }

    current
}

/// The identity requested by `overrides`, or a fresh one.
pub fn identity_from(overrides: &FieldMap) -> LayerId {
    match overrides.get(ID_KEY) {
        Some(Value::String(id)) if !id.is_empty() => LayerId::from(id.as_str()),
        Some(other) => {
            tracing::warn!(kind = %value_kind(other), "ignoring unusable layer id; generating one");
            LayerId::generate()
        }
        None => LayerId::generate(),
    }
}

/// Build a record of `type_tag` from base and variant defaults plus overrides.
pub fn build_layer<V>(type_tag: &str, overrides: &Value, base_defaults: BaseProps, variant_defaults: V) -> LayerData
where
    V: LayerVariant + Serialize + DeserializeOwned,
{
    let overrides = overrides_of(overrides);

    if let Some(requested) = overrides.get(TYPE_KEY).and_then(Value::as_str) {
        if requested != type_tag {
            tracing::warn!(requested, type_tag, "override type tag ignored");
        }
    }

    let id = identity_from(&overrides);
    let base = merge_onto(base_defaults, &overrides);
    let variant = merge_onto(variant_defaults, &overrides);

    LayerData::new(id, type_tag, base, variant)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
