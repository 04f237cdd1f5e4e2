//! inv-daemon library target.
//!
//! Exposes the node host, its lifecycle and the in-process API for
//! integration tests. The binary `main.rs` depends on this library target.

pub mod api;
pub mod lifecycle;
pub mod state;
