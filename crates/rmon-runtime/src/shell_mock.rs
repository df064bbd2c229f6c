//! Test mock for [`crate::shell::Runner`].
//!
//! Provides a thread-local handler that intercepts every command a runner
//! would spawn, records it, and answers with a canned response.

use std::cell::RefCell;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};

/// Mock response for a command.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i32,
    pub stdout: String,
}

impl MockResponse {
    pub fn ok(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
        }
    }

    pub fn empty() -> Self {
        Self::ok("")
    }

    pub fn fail(exit_code: i32, stdout: &str) -> Self {
        Self {
            exit_code,
            stdout: stdout.to_string(),
        }
    }

    pub(crate) fn to_output(&self) -> Output {
        Output {
            // Unix exit code encoding: status = code << 8
            status: ExitStatus::from_raw(self.exit_code << 8),
            stdout: self.stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }
    }
}

/// One intercepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Account the runner was bound to; `None` for root.
    pub user: Option<String>,
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    /// `program arg1 arg2 ...`
    pub fn line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

type MockHandler = Box<dyn Fn(&Invocation) -> MockResponse>;

thread_local! {
    static HANDLER: RefCell<Option<(MockHandler, Calls)>> = const { RefCell::new(None) };
}

/// Guard that clears the mock handler on drop.
pub struct MockGuard;

impl Drop for MockGuard {
    fn drop(&mut self) {
        HANDLER.with(|h| *h.borrow_mut() = None);
    }
}

/// Every invocation seen while the mock was installed, in order.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<Invocation>>>);

impl Calls {
    pub fn all(&self) -> Vec<Invocation> {
        self.0.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.all().iter().map(Invocation::line).collect()
    }

    /// Position of the first call whose line starts with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.lines().iter().position(|l| l.starts_with(prefix))
    }

    fn push(&self, invocation: Invocation) {
        self.0.lock().unwrap().push(invocation);
    }
}

/// Try to intercept a command via the installed mock handler.
pub(crate) fn intercept(
    user: Option<&str>,
    program: &str,
    args: &[&str],
    stdin: Option<&[u8]>,
) -> Option<Output> {
    HANDLER.with(|h| {
        h.borrow().as_ref().map(|(handler, calls)| {
            let invocation = Invocation {
                user: user.map(str::to_string),
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                stdin: stdin.map(<[u8]>::to_vec),
            };
            let response = handler(&invocation);
            calls.push(invocation);
            response.to_output()
        })
    })
}

/// Install an arbitrary handler. Use for stateful scenarios.
pub fn install_handler(handler: impl Fn(&Invocation) -> MockResponse + 'static) -> (MockGuard, Calls) {
    let calls = Calls::default();
    let recorded = calls.clone();
    HANDLER.with(|h| *h.borrow_mut() = Some((Box::new(handler), recorded)));
    (MockGuard, calls)
}

/// Build a mock from prefix rules. Unmatched commands succeed silently.
pub fn mock() -> MockBuilder {
    MockBuilder { rules: Vec::new() }
}

pub struct MockBuilder {
    rules: Vec<(String, MockResponse)>,
}

impl MockBuilder {
    /// Answer any command line starting with `prefix`. First match wins.
    pub fn respond(mut self, prefix: &str, response: MockResponse) -> Self {
        self.rules.push((prefix.to_string(), response));
        self
    }

    /// Install the mock. Returns a guard (clears on drop) and the call log.
    pub fn install(self) -> (MockGuard, Calls) {
        let rules = self.rules;
        install_handler(move |invocation| {
            let line = invocation.line();
            rules
                .iter()
                .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(MockResponse::empty)
        })
    }
}
