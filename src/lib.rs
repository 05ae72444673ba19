//! CI regression-test synthesis: find changed source files, extract
//! their structure, ask a model backend for tests, sanitize the reply
//! and merge it into the test suite without duplicating sections.

pub mod config;
pub mod detectors;
pub mod error;
pub mod git;
pub mod llm;
pub mod logger;
pub mod pipeline;
pub mod state;
pub mod testgen;
