//! Integration test suite for the UTCP client runtime.
//!
//! Every test runs against loopback axum servers; nothing leaves the
//! machine.

pub mod support;

pub mod client_integration_tests;
pub mod http_auth_tests;
pub mod scenario_tests;
pub mod streaming_tests;
