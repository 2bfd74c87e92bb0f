use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dockship::exec::{CommandOutput, CommandRunner, Outcome, RunFuture};

type Responder = dyn Fn(&str) -> Outcome + Send + Sync;

/// A command runner that:
/// - records every command line it is asked to run
/// - answers with a scripted `Outcome` (success unless told otherwise)
/// - tracks how many commands were in flight at once.
///
/// Clones share state, so a test can keep one while the pipeline owns another.
#[derive(Clone)]
pub struct FakeRunner {
    commands: Arc<Mutex<Vec<String>>>,
    responder: Arc<Responder>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeRunner {
    /// Every command succeeds with empty output.
    pub fn new() -> Self {
        Self::with_responder(|_| Outcome::Success)
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Outcome + Send + Sync + 'static,
    {
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
            delay: Duration::ZERO,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Commands containing `needle` exit with `code`; everything else succeeds.
    pub fn failing_on(needle: &'static str, code: i32) -> Self {
        Self::with_responder(move |cmd| {
            if cmd.contains(needle) {
                Outcome::NonZeroExit {
                    code,
                    output: format!("scripted failure for {needle}"),
                }
            } else {
                Outcome::Success
            }
        })
    }

    /// Make every command take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Recorded commands containing `needle`.
    pub fn commands_matching(&self, needle: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for FakeRunner {
    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> RunFuture<'a> {
        Box::pin(async move {
            self.commands.lock().unwrap().push(command.to_string());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let outcome = (self.responder)(command);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let output = match &outcome {
                Outcome::NonZeroExit { output, .. } => output.clone(),
                _ => String::new(),
            };
            Ok(CommandOutput {
                command: command.to_string(),
                output,
                outcome,
                timeout,
                elapsed: self.delay,
            })
        })
    }
}
