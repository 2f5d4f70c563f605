//! Conformance test suite for `FieldStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `FieldStore`
//! implementation can run to verify it honours the contract the field-visit
//! core relies on. The suite covers:
//!
//! - **Documents**: create assigns ids, get returns what was written, update
//!   shallow-merges
//! - **Server timestamps**: sentinels resolved by the store, never stored raw
//! - **Queries**: equality filters, ordering, limits, sub-collections
//! - **Error handling**: correct error variants for missing documents and bad paths
//! - **Concurrency**: parallel creates all land with distinct ids
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use fieldkit_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn remote_conformance() {
//!     let report = run_conformance_suite(|| async { connect_test_store().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod documents;
mod error;
mod query;
mod timestamp;

use std::fmt;
use std::future::Future;

use serde_json::Value;

use crate::document::Document;
use crate::FieldStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "documents", "query").
    pub category: String,
    /// Test name (e.g. "create_assigns_distinct_ids").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: result.is_ok(),
            message: result.err(),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(documents::run_document_tests(&factory).await);
    results.extend(timestamp::run_timestamp_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}
