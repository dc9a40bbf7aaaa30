//! Helpers for integration tests: database setup, a scriptable payment gateway and catalogue seeding.

pub mod gateway;
pub mod prepare_env;
pub mod seed;
