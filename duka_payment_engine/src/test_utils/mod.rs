//! Helpers for tests that need a real database or scripted payment gateways.
pub mod fake_gateways;
pub mod prepare_env;
