//! Dialogue Engine — branching-dialogue runtime for visual novels.
//!
//! Walks an authored graph of story nodes in response to player choices,
//! mutating a typed world-state store, evaluating conditional routing and
//! resolving competing ending rules deterministically every turn.

pub mod core;
pub mod schema;
