//! Layer records.
//!
//! A [`LayerData`] is one visual element: identity and type tag (both fixed at
//! creation), the [`BaseProps`] every variant shares, and a type-erased
//! [`LayerVariant`] owned by the plugin that registered the type tag.
//!
//! Records convert to a flat JSON object (`id`, `type`, base fields, variant
//! fields, and `children` for groups). Field-level change detection and the
//! options panel both work on that flat view.

use common::{Color, EditorError, EditorResult, Point, Size};
use scene::BlendMode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt::Debug;

use crate::id::LayerId;

/// Flat field map of a record or a variant.
pub type FieldMap = serde_json::Map<String, Value>;

/// Record keys that are not editable fields.
pub const ID_KEY: &str = "id";
pub const TYPE_KEY: &str = "type";
pub const CHILDREN_KEY: &str = "children";

/// Drop shadow settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShadowSpec {
    pub enabled: bool,
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur: f32,
    pub color: Color,
}

impl Default for ShadowSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            offset_x: 0.0,
            offset_y: 0.0,
            blur: 0.0,
            color: Color::rgba(0, 0, 0, 128),
        }
    }
}

/// Border stroke settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BorderSpec {
    pub enabled: bool,
    pub stroke: Color,
    pub stroke_width: f32,
    pub dash: Vec<f32>,
    pub dash_offset: f32,
}

impl Default for BorderSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            stroke: Color::BLACK,
            stroke_width: 1.0,
            dash: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

/// Fields shared by every layer variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseProps {
    /// Human-readable name shown in the layer list.
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Rotation in degrees.
    pub rotation: f32,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub shadow: ShadowSpec,
    pub border: BorderSpec,
    pub blur: f32,
    /// Force-update marker; toggling it resyncs everything.
    pub dirty: bool,
    pub lock: bool,
    pub hide: bool,
    /// Resize handles may change the aspect ratio freely.
    pub unkeep_ratio: bool,
    /// Preferred width / height ratio for resize handles.
    pub ratio: Option<f32>,
    /// Open-ended extension bag.
    pub extra: FieldMap,
}

impl Default for BaseProps {
    fn default() -> Self {
        Self {
            name: String::new(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            shadow: ShadowSpec::default(),
            border: BorderSpec::default(),
            blur: 0.0,
            dirty: false,
            lock: false,
            hide: false,
            unkeep_ratio: false,
            ratio: None,
            extra: FieldMap::new(),
        }
    }
}

/// Record keys owned by [`BaseProps`].
pub const BASE_FIELDS: &[&str] = &[
    "name",
    "x",
    "y",
    "rotation",
    "opacity",
    "blendMode",
    "shadow",
    "border",
    "blur",
    "dirty",
    "lock",
    "hide",
    "unkeepRatio",
    "ratio",
    "extra",
];

/// Variant-specific part of a layer record.
///
/// Most variants implement this with [`layer_variant!`](crate::layer_variant)
/// on a plain serde struct.
pub trait LayerVariant: Any + Debug + Send + Sync {
    /// Variant fields as a flat map.
    fn to_value(&self) -> FieldMap;

    /// Assign one field; `Ok(false)` when the variant has no such field.
    fn set_field(&mut self, field: &str, value: Value) -> EditorResult<bool>;

    fn clone_variant(&self) -> Box<dyn LayerVariant>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Owned children, for composition variants.
    fn children(&self) -> Option<&[LayerData]> {
        None
    }

    fn children_mut(&mut self) -> Option<&mut Vec<LayerData>> {
        None
    }
}

/// Implement [`LayerVariant`] for a `Serialize + DeserializeOwned + Clone` struct.
#[macro_export]
macro_rules! layer_variant {
    ($ty:ty) => {
        impl $crate::data::LayerVariant for $ty {
            fn to_value(&self) -> $crate::data::FieldMap {
                $crate::data::serialize_fields(self)
            }

            fn set_field(
                &mut self,
                field: &str,
                value: $crate::serde_json::Value,
            ) -> $crate::EditorResult<bool> {
                $crate::data::assign_field(self, field, value)
            }

            fn clone_variant(&self) -> ::std::boxed::Box<dyn $crate::data::LayerVariant> {
                ::std::boxed::Box::new(::std::clone::Clone::clone(self))
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}

/// Serialize a struct into its field map; non-object values map to empty.
pub fn serialize_fields<T: Serialize>(value: &T) -> FieldMap {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        Ok(_) => FieldMap::new(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize layer fields");
            FieldMap::new()
        }
    }
}

/// Replace one field of a serde struct, validating the new value.
///
/// Returns `Ok(false)` when the struct has no such field and leaves the
/// target untouched when the value does not deserialize.
pub fn assign_field<T>(target: &mut T, field: &str, value: Value) -> EditorResult<bool>
where
    T: Serialize + DeserializeOwned,
{
    let mut fields = serialize_fields(target);
    if !fields.contains_key(field) {
        return Ok(false);
    }
    fields.insert(field.to_string(), value);
    let updated: T = serde_json::from_value(Value::Object(fields))
        .map_err(|err| EditorError::invalid_field(field, err.to_string()))?;
    *target = updated;
    Ok(true)
}

/// One visual element.
#[derive(Debug)]
pub struct LayerData {
    id: LayerId,
    type_tag: String,
    /// Fields shared by every variant.
    pub base: BaseProps,
    variant: Box<dyn LayerVariant>,
    /// Enclosing group, for layout queries only.
    group: Option<LayerId>,
}

impl LayerData {
    pub fn new(
        id: LayerId,
        type_tag: impl Into<String>,
        base: BaseProps,
        variant: impl LayerVariant,
    ) -> Self {
        Self {
            id,
            type_tag: type_tag.into(),
            base,
            variant: Box::new(variant),
            group: None,
        }
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    /// Type identity of the plugin that owns this record.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Downcast the variant part.
    pub fn variant<T: LayerVariant>(&self) -> Option<&T> {
        self.variant.as_any().downcast_ref::<T>()
    }

    /// Downcast the variant part mutably.
    pub fn variant_mut<T: LayerVariant>(&mut self) -> Option<&mut T> {
        self.variant.as_any_mut().downcast_mut::<T>()
    }

    pub fn is_group(&self) -> bool {
        self.variant.children().is_some()
    }

    /// Owned children; empty for non-group variants.
    pub fn children(&self) -> &[LayerData] {
        self.variant.children().unwrap_or(&[])
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<LayerData>> {
        self.variant.children_mut()
    }

    /// Enclosing group, if this record is a group child.
    pub fn group(&self) -> Option<&LayerId> {
        self.group.as_ref()
    }

    pub(crate) fn set_group(&mut self, group: Option<LayerId>) {
        self.group = group;
    }

    /// Point the back references of all descendants at their groups.
    pub(crate) fn fix_back_references(&mut self) {
        let id = self.id.clone();
        if let Some(children) = self.children_mut() {
            for child in children.iter_mut() {
                child.set_group(Some(id.clone()));
                child.fix_back_references();
            }
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.base.x, self.base.y)
    }

    /// Geometric size, for variants with `width` and `height` fields.
    pub fn size(&self) -> Option<Size> {
        let fields = self.variant.to_value();
        let width = fields.get("width")?.as_f64()?;
        let height = fields.get("height")?.as_f64()?;
        Some(Size::new(width as f32, height as f32))
    }

    /// Identities of this record and all descendants, parents first.
    pub fn descendant_ids(&self) -> Vec<LayerId> {
        let mut ids = vec![self.id.clone()];
        for child in self.children() {
            ids.extend(child.descendant_ids());
        }
        ids
    }

    /// Flat plain-value record.
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_field_map())
    }

    pub fn to_field_map(&self) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert(ID_KEY.into(), Value::String(self.id.to_string()));
        map.insert(TYPE_KEY.into(), Value::String(self.type_tag.clone()));
        map.extend(serialize_fields(&self.base));
        map.extend(self.variant.to_value());
        map
    }

    /// Variant fields only.
    pub fn variant_fields(&self) -> FieldMap {
        self.variant.to_value()
    }

    /// Read one field of the flat record.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.to_field_map().remove(name)
    }

    /// Assign one field of the flat record.
    pub fn set_field(&mut self, name: &str, value: Value) -> EditorResult<()> {
        match name {
            ID_KEY | TYPE_KEY => {
                return Err(EditorError::invalid_field(name, "fixed at creation"));
            }
            CHILDREN_KEY => {
                return Err(EditorError::invalid_field(name, "children are edited structurally"));
            }
            _ => {}
        }
        if BASE_FIELDS.contains(&name) && assign_field(&mut self.base, name, value.clone())? {
            return Ok(());
        }
        if self.variant.set_field(name, value)? {
            return Ok(());
        }
        Err(EditorError::invalid_field(
            name,
            format!("no such field on '{}'", self.type_tag),
        ))
    }

    /// Assign every editable field present in `record`, all or nothing.
    pub fn assign(&mut self, record: &Value) -> EditorResult<()> {
        let Some(fields) = record.as_object() else {
            return Err(EditorError::invalid_field("record", "expected an object"));
        };
        let mut next = self.clone();
        for (name, value) in fields {
            if matches!(name.as_str(), ID_KEY | TYPE_KEY | CHILDREN_KEY) {
                continue;
            }
            next.set_field(name, value.clone())?;
        }
        *self = next;
        Ok(())
    }
}

impl Clone for LayerData {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            type_tag: self.type_tag.clone(),
            base: self.base.clone(),
            variant: self.variant.clone_variant(),
            group: self.group.clone(),
        }
    }
}

impl PartialEq for LayerData {
    fn eq(&self, other: &Self) -> bool {
        self.to_field_map() == other.to_field_map()
    }
}

/// Top-level keys whose values differ between two flat records.
pub fn diff_fields(before: &FieldMap, after: &FieldMap) -> Vec<String> {
    let mut changed: Vec<String> = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect();
    changed.extend(
        before
            .keys()
            .filter(|key| !after.contains_key(*key))
            .cloned(),
    );
    changed
}
