// SPDX-License-Identifier: MIT OR Apache-2.0
//! Primitive attribute values carried by scene objects and node fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a [`PropertyValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Floating point
    Float,
    /// 3D vector
    Vector3,
    /// RGBA color
    Color,
    /// Text
    String,
}

/// Value stored in an attribute field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 3D vector
    Vector3([f32; 3]),
    /// Color
    Color([f32; 4]),
    /// String
    String(String),
}

impl PropertyValue {
    /// Get the kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Vector3(_) => ValueKind::Vector3,
            Self::Color(_) => ValueKind::Color,
            Self::String(_) => ValueKind::String,
        }
    }

    /// Borrow the text of a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read an integer value
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Vector3([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Self::Color([r, g, b, a]) => write!(f, "rgba({r}, {g}, {b}, {a})"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}
