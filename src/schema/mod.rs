//! Authored story data: nodes, choices, effects, and state declarations.

pub mod choice;
pub mod node;
pub mod value;
