//! # wirehub-api
//!
//! HTTP host layer for Wirehub built on Axum.
//!
//! Exposes the engine's public surface as admin endpoints under `/api`,
//! and dispatches every other request dynamically through the engine's
//! plugin route table (guard chain first, handler second).

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
