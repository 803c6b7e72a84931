#![allow(dead_code)]

use std::future::Future;

pub use edgewatch_test_utils::{expect_no_restart, expect_restart, init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// [`with_timeout`] for test bodies that use `?`.
pub async fn run_with_timeout<F>(f: F) -> TestResult
where
    F: Future<Output = TestResult>,
{
    with_timeout(f).await
}
