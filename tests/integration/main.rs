//! Integration tests for the scan engine
//!
//! Scan-level behaviour is exercised with in-memory collaborators; the
//! end-to-end tests run the built-in HTTP client and spider against wiremock
//! servers.

mod common;
mod e2e_tests;
mod report_tests;
mod scan_tests;
