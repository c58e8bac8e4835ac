use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    Bool,
    Int,
    Float,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
        };
        f.write_str(name)
    }
}

/// A typed value held in a state slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn kind(&self) -> VarKind {
        match self {
            Self::Bool(_) => VarKind::Bool,
            Self::Int(_) => VarKind::Int,
            Self::Float(_) => VarKind::Float,
        }
    }

    /// Numeric view used by predicates: booleans coerce to 1.0 / 0.0.
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Int(i) => *i as f64,
            Self::Float(x) => *x,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:.2}", x),
        }
    }
}

/// Declaration of one state variable: its name, baseline and optional clamp.
///
/// The variable's type is the type of its default value. `bounds` is only
/// meaningful for floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub default: Value,
    #[serde(default)]
    pub bounds: Option<(f64, f64)>,
}

impl VariableDecl {
    pub fn kind(&self) -> VarKind {
        self.default.kind()
    }
}
