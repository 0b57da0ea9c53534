// SPDX-License-Identifier: MIT OR Apache-2.0
//! Item kinds and their kind-specific data.
//!
//! Every item shares the [`SceneItem`](crate::SceneItem) contract; the
//! variants below add what a 3D object, an attribute, a constraint or an
//! operator needs on top of it.

use crate::item::ItemId;
use crate::value::BridgeValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kind category of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindTag {
    /// Plain scene item
    SceneItem,
    /// Hierarchical 3D object (transforms, joints, controls, ...)
    Object3D,
    /// Group of attributes hanging off a 3D object
    AttributeGroup,
    /// Single animatable value
    Attribute,
    /// Constraint driving a constrainee from constrainers
    Constraint,
    /// Operator with named input and output ports
    Operator,
}

impl KindTag {
    /// Base type name for this kind
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SceneItem => "SceneItem",
            Self::Object3D => "Object3D",
            Self::AttributeGroup => "AttributeGroup",
            Self::Attribute => "Attribute",
            Self::Constraint => "Constraint",
            Self::Operator => "Operator",
        }
    }

    /// Whether this kind drives the items it is a source of
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Constraint | Self::Operator)
    }

    /// Check if items of this kind can own items of `child` kind
    pub fn can_own(&self, child: KindTag) -> bool {
        match self {
            Self::Object3D => child != Self::Attribute,
            Self::AttributeGroup => child == Self::Attribute,
            _ => false,
        }
    }
}

/// Hierarchical 3D object data
#[derive(Debug, Clone, PartialEq)]
pub struct Object3D {
    /// Transform as an opaque `Xfo` bridge value
    pub xfo: BridgeValue,
    /// Visibility flag
    pub visible: bool,
    /// Display color name
    pub color: Option<String>,
    /// Owned child items
    pub children: Vec<ItemId>,
    /// Owned attribute groups
    pub attribute_groups: Vec<ItemId>,
}

impl Object3D {
    /// Create an object with the given transform
    pub fn new(xfo: BridgeValue) -> Self {
        Self {
            xfo,
            visible: true,
            color: None,
            children: Vec::new(),
            attribute_groups: Vec::new(),
        }
    }
}

/// Attribute group data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeGroup {
    /// Owned attributes
    pub attributes: Vec<ItemId>,
}

/// Value held by an attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Boolean
    Bool(bool),
    /// Floating point
    Scalar(f64),
    /// Integer
    Integer(i64),
    /// String
    String(String),
    /// Color bridge value
    Color(BridgeValue),
}

impl AttributeValue {
    /// Type name an attribute holding this value is registered under
    pub fn attribute_type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "BoolAttribute",
            Self::Scalar(_) => "ScalarAttribute",
            Self::Integer(_) => "IntegerAttribute",
            Self::String(_) => "StringAttribute",
            Self::Color(_) => "ColorAttribute",
        }
    }

    /// Check if this is a numeric value that accepts a range
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Integer(_))
    }
}

/// Attribute data
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Current value
    pub value: AttributeValue,
    /// Lower bound for numeric attributes
    pub min: Option<f64>,
    /// Upper bound for numeric attributes
    pub max: Option<f64>,
    /// Attribute driving this one
    pub connection: Option<ItemId>,
}

impl Attribute {
    /// Create an unconnected attribute
    pub fn new(value: AttributeValue) -> Self {
        Self {
            value,
            min: None,
            max: None,
            connection: None,
        }
    }
}

/// Constraint flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    /// Rotation only
    Orientation,
    /// Full transform
    Pose,
    /// Translation only
    Position,
    /// Scale only
    Scale,
    /// Unspecialized constraint
    Generic,
}

impl ConstraintType {
    /// Type name constraints of this flavour are registered under
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Orientation => "OrientationConstraint",
            Self::Pose => "PoseConstraint",
            Self::Position => "PositionConstraint",
            Self::Scale => "ScaleConstraint",
            Self::Generic => "Constraint",
        }
    }
}

/// Constraint data
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Constraint flavour
    pub constraint_type: ConstraintType,
    /// Keep the constrainee's initial offset
    pub maintain_offset: bool,
    /// Item being driven
    pub constrainee: Option<ItemId>,
    /// Driving items, in order
    pub constrainers: Vec<ItemId>,
}

impl Constraint {
    /// Create an unbound constraint
    pub fn new(constraint_type: ConstraintType) -> Self {
        Self {
            constraint_type,
            maintain_offset: false,
            constrainee: None,
            constrainers: Vec::new(),
        }
    }
}

/// Operator data.
///
/// Only port names and their bound items are modelled; evaluation lives
/// outside this crate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operator {
    /// Solver type name
    pub solver_type: Option<String>,
    /// Input ports by name
    pub inputs: IndexMap<String, Vec<ItemId>>,
    /// Output ports by name
    pub outputs: IndexMap<String, Vec<ItemId>>,
}

impl Operator {
    /// Every item bound to an output port, in port order
    pub fn output_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.outputs.values().flatten().copied()
    }

    /// Every item bound to an input port, in port order
    pub fn input_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.inputs.values().flatten().copied()
    }
}

/// Kind-specific data of an item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// Plain scene item
    SceneItem,
    /// 3D object
    Object3D(Object3D),
    /// Attribute group
    AttributeGroup(AttributeGroup),
    /// Attribute
    Attribute(Attribute),
    /// Constraint
    Constraint(Constraint),
    /// Operator
    Operator(Operator),
}

impl ItemKind {
    /// Get the kind tag
    pub fn tag(&self) -> KindTag {
        match self {
            Self::SceneItem => KindTag::SceneItem,
            Self::Object3D(_) => KindTag::Object3D,
            Self::AttributeGroup(_) => KindTag::AttributeGroup,
            Self::Attribute(_) => KindTag::Attribute,
            Self::Constraint(_) => KindTag::Constraint,
            Self::Operator(_) => KindTag::Operator,
        }
    }

    /// Ids held in this item's owning containers
    pub fn owned_items(&self) -> Vec<ItemId> {
        match self {
            Self::Object3D(object) => object
                .attribute_groups
                .iter()
                .chain(&object.children)
                .copied()
                .collect(),
            Self::AttributeGroup(group) => group.attributes.clone(),
            _ => Vec::new(),
        }
    }

    /// Get the 3D object data
    pub fn as_object3d(&self) -> Option<&Object3D> {
        match self {
            Self::Object3D(object) => Some(object),
            _ => None,
        }
    }

    /// Get the attribute data
    pub fn as_attribute(&self) -> Option<&Attribute> {
        match self {
            Self::Attribute(attribute) => Some(attribute),
            _ => None,
        }
    }

    /// Get the constraint data
    pub fn as_constraint(&self) -> Option<&Constraint> {
        match self {
            Self::Constraint(constraint) => Some(constraint),
            _ => None,
        }
    }

    /// Get the operator data
    pub fn as_operator(&self) -> Option<&Operator> {
        match self {
            Self::Operator(operator) => Some(operator),
            _ => None,
        }
    }
}
