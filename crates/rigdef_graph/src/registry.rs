// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of constructible type names.
//!
//! The registry is an ordered table. When a record is loaded, the first
//! registered type name that appears anywhere in the record's ancestry
//! picks the constructor, so the table order (most specific first) decides
//! and not the order of the ancestry itself.

use crate::error::ValueError;
use crate::kind::{
    Attribute, AttributeGroup, AttributeValue, Constraint, ConstraintType, ItemKind, KindTag,
    Object3D, Operator,
};
use crate::value::ValueBridge;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How to build the item for a registered type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constructor {
    /// Plain scene item
    SceneItem,
    /// 3D object with an identity transform
    Object3D,
    /// Empty attribute group
    AttributeGroup,
    /// Boolean attribute
    BoolAttribute,
    /// Floating point attribute
    ScalarAttribute,
    /// Integer attribute
    IntegerAttribute,
    /// String attribute
    StringAttribute,
    /// Color attribute
    ColorAttribute,
    /// Attribute whose value type is taken from the record's value
    Attribute,
    /// Constraint of the given flavour
    Constraint(ConstraintType),
    /// Operator
    Operator,
}

impl Constructor {
    /// Kind of item this constructor builds
    pub fn tag(&self) -> KindTag {
        match self {
            Self::SceneItem => KindTag::SceneItem,
            Self::Object3D => KindTag::Object3D,
            Self::AttributeGroup => KindTag::AttributeGroup,
            Self::BoolAttribute
            | Self::ScalarAttribute
            | Self::IntegerAttribute
            | Self::StringAttribute
            | Self::ColorAttribute
            | Self::Attribute => KindTag::Attribute,
            Self::Constraint(_) => KindTag::Constraint,
            Self::Operator => KindTag::Operator,
        }
    }

    /// Build default kind data.
    ///
    /// `value` is the record's serialized value; only the generic
    /// [`Attribute`](Self::Attribute) constructor looks at it.
    pub fn instantiate(&self, bridge: &dyn ValueBridge, value: Option<&Value>) -> Result<ItemKind, ValueError> {
        let attribute = |value| ItemKind::Attribute(Attribute::new(value));
        Ok(match self {
            Self::SceneItem => ItemKind::SceneItem,
            Self::Object3D => ItemKind::Object3D(Object3D::new(bridge.construct("Xfo")?)),
            Self::AttributeGroup => ItemKind::AttributeGroup(AttributeGroup::default()),
            Self::BoolAttribute => attribute(AttributeValue::Bool(false)),
            Self::ScalarAttribute => attribute(AttributeValue::Scalar(0.0)),
            Self::IntegerAttribute => attribute(AttributeValue::Integer(0)),
            Self::StringAttribute => attribute(AttributeValue::String(String::new())),
            Self::ColorAttribute => attribute(AttributeValue::Color(bridge.construct("Color")?)),
            Self::Attribute => attribute(match value {
                Some(Value::Bool(_)) => AttributeValue::Bool(false),
                Some(Value::Number(n)) if n.is_i64() || n.is_u64() => AttributeValue::Integer(0),
                Some(Value::String(_)) => AttributeValue::String(String::new()),
                Some(Value::Object(_)) => AttributeValue::Color(bridge.construct("Color")?),
                _ => AttributeValue::Scalar(0.0),
            }),
            Self::Constraint(constraint_type) => ItemKind::Constraint(Constraint::new(*constraint_type)),
            Self::Operator => ItemKind::Operator(Operator::default()),
        })
    }
}

/// Extra type name registration, as read from settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRegistration {
    /// Type name to match in record ancestries
    pub type_name: String,
    /// Constructor to use
    pub constructor: Constructor,
    /// Registered name this entry takes priority over; appended when unset
    #[serde(default)]
    pub before: Option<String>,
}

/// Ordered table of type names
#[derive(Debug, Clone)]
pub struct ConstructorRegistry {
    /// Constructors by type name, highest priority first
    types: IndexMap<String, Constructor>,
}

impl ConstructorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Create the registry of the built-in rig types
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Hierarchical objects
        for name in [
            "Container",
            "Layer",
            "Component",
            "ComponentInput",
            "ComponentOutput",
            "Joint",
            "Control",
            "CtrlSpace",
            "Locator",
            "Curve",
            "HierarchyGroup",
            "Transform",
            "Object3D",
        ] {
            registry.register(name, Constructor::Object3D);
        }

        // Attributes
        registry.register("BoolAttribute", Constructor::BoolAttribute);
        registry.register("ScalarAttribute", Constructor::ScalarAttribute);
        registry.register("IntegerAttribute", Constructor::IntegerAttribute);
        registry.register("StringAttribute", Constructor::StringAttribute);
        registry.register("ColorAttribute", Constructor::ColorAttribute);
        registry.register("NumberAttribute", Constructor::Attribute);
        registry.register("Attribute", Constructor::Attribute);
        registry.register("AttributeGroup", Constructor::AttributeGroup);

        // Constraints
        for constraint_type in [
            ConstraintType::Orientation,
            ConstraintType::Pose,
            ConstraintType::Position,
            ConstraintType::Scale,
            ConstraintType::Generic,
        ] {
            registry.register(constraint_type.type_name(), Constructor::Constraint(constraint_type));
        }

        // Operators
        registry.register("KLOperator", Constructor::Operator);
        registry.register("CanvasOperator", Constructor::Operator);
        registry.register("Operator", Constructor::Operator);

        registry.register("SceneItem", Constructor::SceneItem);
        registry
    }

    /// Register a type name at the lowest priority.
    ///
    /// Re-registering a name replaces its constructor and keeps its place.
    pub fn register(&mut self, type_name: impl Into<String>, constructor: Constructor) {
        self.types.insert(type_name.into(), constructor);
    }

    /// Register a type name just ahead of `anchor`.
    ///
    /// Falls back to [`register`](Self::register) when `anchor` is unknown.
    pub fn register_before(&mut self, anchor: &str, type_name: impl Into<String>, constructor: Constructor) {
        let type_name = type_name.into();
        self.types.shift_remove(&type_name);
        match self.types.get_index_of(anchor) {
            Some(index) => {
                self.types.shift_insert(index, type_name, constructor);
            }
            None => self.register(type_name, constructor),
        }
    }

    /// Apply a list of registrations in order
    pub fn apply(&mut self, registrations: &[TypeRegistration]) {
        for registration in registrations {
            match &registration.before {
                Some(anchor) => {
                    self.register_before(anchor, registration.type_name.clone(), registration.constructor);
                }
                None => self.register(registration.type_name.clone(), registration.constructor),
            }
        }
    }

    /// Get a constructor by type name
    pub fn get(&self, type_name: &str) -> Option<Constructor> {
        self.types.get(type_name).copied()
    }

    /// Registered type names, highest priority first
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Pick the constructor for a record ancestry
    pub fn resolve(&self, type_hierarchy: &[String]) -> Option<(&str, Constructor)> {
        self.types
            .iter()
            .find(|(name, _)| type_hierarchy.iter().any(|t| t == *name))
            .map(|(name, constructor)| (name.as_str(), *constructor))
    }
}

impl Default for ConstructorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DefaultValueBridge;
    use serde_json::json;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_priority_beats_hierarchy_order() {
        let registry = ConstructorRegistry::default();

        // Ancestry order puts the generic name first; table order wins
        let (name, constructor) = registry
            .resolve(&names(&["SceneItem", "Object3D", "Joint"]))
            .unwrap();
        assert_eq!(name, "Joint");
        assert_eq!(constructor, Constructor::Object3D);

        let (name, _) = registry
            .resolve(&names(&["MyCustomConstraint", "PoseConstraint", "Constraint", "SceneItem"]))
            .unwrap();
        assert_eq!(name, "PoseConstraint");

        assert!(registry.resolve(&names(&["Spline", "Shape"])).is_none());
    }

    #[test]
    fn test_register_before() {
        let mut registry = ConstructorRegistry::default();
        registry.register_before("SceneItem", "RigNote", Constructor::StringAttribute);
        registry.apply(&[TypeRegistration {
            type_name: "IKSolver".into(),
            constructor: Constructor::Operator,
            before: Some("Container".into()),
        }]);

        assert_eq!(registry.type_names().next(), Some("IKSolver"));
        let names_in_order: Vec<_> = registry.type_names().collect();
        let note = names_in_order.iter().position(|n| *n == "RigNote").unwrap();
        assert_eq!(names_in_order[note + 1], "SceneItem");

        let (name, constructor) = registry.resolve(&names(&["RigNote", "SceneItem"])).unwrap();
        assert_eq!((name, constructor), ("RigNote", Constructor::StringAttribute));
    }

    #[test]
    fn test_instantiate() {
        let bridge = DefaultValueBridge;
        let kind = Constructor::ColorAttribute.instantiate(&bridge, None).unwrap();
        assert_eq!(kind.tag(), KindTag::Attribute);
        let kind = Constructor::Constraint(ConstraintType::Scale).instantiate(&bridge, None).unwrap();
        assert_eq!(kind.as_constraint().unwrap().constraint_type, ConstraintType::Scale);
        assert_eq!(Constructor::IntegerAttribute.tag(), KindTag::Attribute);
    }

    #[test]
    fn test_generic_attribute_follows_value() {
        let bridge = DefaultValueBridge;
        let built = |value: Value| {
            Constructor::Attribute
                .instantiate(&bridge, Some(&value))
                .unwrap()
                .as_attribute()
                .unwrap()
                .value
                .attribute_type_name()
        };
        assert_eq!(built(json!(true)), "BoolAttribute");
        assert_eq!(built(json!(3)), "IntegerAttribute");
        assert_eq!(built(json!(0.5)), "ScalarAttribute");
        assert_eq!(built(json!("wrist")), "StringAttribute");
        assert_eq!(built(json!({ "r": 1.0 })), "ColorAttribute");

        let registry = ConstructorRegistry::default();
        let (name, constructor) = registry
            .resolve(&names(&["NumberAttribute", "Attribute", "SceneItem"]))
            .unwrap();
        assert_eq!((name, constructor), ("NumberAttribute", Constructor::Attribute));
        let (name, _) = registry
            .resolve(&names(&["ScalarAttribute", "NumberAttribute", "Attribute"]))
            .unwrap();
        assert_eq!(name, "ScalarAttribute");
    }
}
