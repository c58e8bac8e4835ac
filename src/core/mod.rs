//! Runtime: state store, graph, evaluators, and turn sequencing.

pub mod backdrop;
pub mod branch;
pub mod config;
pub mod ending;
pub mod explore;
pub mod graph;
pub mod presentation;
pub mod session;
pub mod state;
pub mod turn;
