//! A small in-process test runner that drives [`TestHooks`].
//!
//! Each registered test gets its own [`TestContext`]. Before-hooks run, then
//! the body (a panic counts as a failure), then after-hooks, whatever the
//! body did.

use crate::lifecycle::{Hook, TestContext, TestHooks};
use std::any::Any;
use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};

pub type TestResult = Result<(), Box<dyn StdError + Send + Sync>>;

type TestBody = Box<dyn Fn(&mut TestContext) -> TestResult + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestStatus {
    Passed,
    Failed(String),
    Panicked(String),
}

impl TestStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    pub title: String,
    pub status: TestStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    pub tests: Vec<TestReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.tests.iter().filter(|t| t.status.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.tests.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn status_of(&self, title: &str) -> Option<&TestStatus> {
        self.tests
            .iter()
            .find(|t| t.title == title)
            .map(|t| &t.status)
    }
}

#[derive(Default)]
pub struct Suite {
    before: Vec<Hook>,
    after: Vec<Hook>,
    tests: Vec<(String, TestBody)>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test<F>(&mut self, title: &str, body: F) -> &mut Self
    where
        F: Fn(&mut TestContext) -> TestResult + Send + Sync + 'static,
    {
        self.tests.push((title.to_string(), Box::new(body)));
        self
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Runs every test in registration order on the calling thread.
    pub fn run(&self) -> SuiteReport {
        SuiteReport {
            tests: self
                .tests
                .iter()
                .map(|(title, body)| self.run_one(title, body))
                .collect(),
        }
    }

    /// Runs every test on its own scoped thread. Reports keep registration
    /// order.
    pub fn run_parallel(&self) -> SuiteReport {
        let tests = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .tests
                .iter()
                .map(|(title, body)| {
                    (
                        title,
                        scope.spawn(move || self.run_one(title, body)),
                    )
                })
                .collect();
            handles
                .into_iter()
                .map(|(title, handle)| {
                    handle.join().unwrap_or_else(|payload| TestReport {
                        title: title.clone(),
                        status: TestStatus::Panicked(panic_message(payload.as_ref())),
                    })
                })
                .collect()
        });
        SuiteReport { tests }
    }

    fn run_one(&self, title: &str, body: &TestBody) -> TestReport {
        let mut ctx = TestContext::new(title);
        let mut status = guarded(|| {
            for hook in &self.before {
                hook(&mut ctx);
            }
        })
        .err()
        .map(TestStatus::Panicked);

        if status.is_none() {
            status = Some(match guarded(|| body(&mut ctx)) {
                Ok(Ok(())) => TestStatus::Passed,
                Ok(Err(err)) => TestStatus::Failed(err.to_string()),
                Err(message) => TestStatus::Panicked(message),
            });
        }

        for hook in &self.after {
            if let Err(message) = guarded(|| hook(&mut ctx)) {
                if status.as_ref().is_some_and(TestStatus::is_passed) {
                    status = Some(TestStatus::Panicked(message));
                }
            }
        }

        TestReport {
            title: title.to_string(),
            status: status.unwrap_or(TestStatus::Passed),
        }
    }
}

impl TestHooks for Suite {
    fn before_each(&mut self, hook: Hook) {
        self.before.push(hook);
    }

    fn after_each(&mut self, hook: Hook) {
        self.after.push(hook);
    }
}

fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic".to_string()
    }
}
