//! Integration test suite: engine, discovery, and the HTTP surface.

mod api_test;
mod discovery_test;
mod engine_test;
mod helpers;
