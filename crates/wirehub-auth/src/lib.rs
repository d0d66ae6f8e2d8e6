//! # wirehub-auth
//!
//! Token-group authentication for Wirehub.
//!
//! A [`TokenStore`] holds the static `{group: {label: secret}}` table. The
//! [`AuthGateway`] verifies credentials extracted from a request (query
//! parameter, then header, then cookie) against allowed groups, and
//! produces the route guards the engine splices in front of routes that
//! declare a token requirement.

pub mod gateway;
pub mod tokens;

pub use gateway::AuthGateway;
pub use tokens::TokenStore;
