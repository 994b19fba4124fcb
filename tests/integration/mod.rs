//! Integration test modules

mod auth_pipeline_tests;
mod token_purge_tests;
