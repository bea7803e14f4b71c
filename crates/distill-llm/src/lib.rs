//! Distill Oracle Layer
//!
//! Implementations of the `ExtractionOracle` trait from `distill-domain`.
//!
//! # Oracles
//!
//! - `MockOracle`: deterministic, scriptable oracle for tests
//! - `OllamaOracle`: local Ollama API integration
//!
//! # Examples
//!
//! ```
//! use distill_llm::MockOracle;
//! use distill_domain::ExtractionOracle;
//!
//! # tokio_test_block_on(async {
//! let oracle = MockOracle::new("[]");
//! oracle.add_response("Acme", r#"{"kind":"entity","name":"Acme"}"#);
//!
//! assert_eq!(oracle.complete("about Acme").await.unwrap(), r#"{"kind":"entity","name":"Acme"}"#);
//! assert_eq!(oracle.complete("unrelated").await.unwrap(), "[]");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

#![warn(missing_docs)]

pub mod ollama;

use async_trait::async_trait;
use distill_domain::ExtractionOracle;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

pub use ollama::OllamaOracle;

/// Errors that can occur during oracle calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from the model
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(String),
    Fail,
    /// Fail this many more times, then respond
    FailThenRespond(usize, String),
}

#[derive(Debug, Clone)]
struct Rule {
    trigger: String,
    action: Scripted,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<Rule>,
    prompts: Vec<String>,
}

/// Mock oracle for deterministic testing
///
/// Responses are keyed by a trigger substring. Triggers are checked in the
/// order they were added and the first one contained in the prompt wins;
/// prompts matching no trigger get the default response.
///
/// Clones share state, so a test can keep a handle for inspecting
/// `call_count` and `prompts` after handing the oracle to an extractor.
#[derive(Debug, Clone)]
pub struct MockOracle {
    default_response: String,
    state: Arc<Mutex<MockState>>,
}

impl MockOracle {
    /// Create a mock that answers every prompt with `response`
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Answer prompts containing `trigger` with `response`
    pub fn add_response(&self, trigger: impl Into<String>, response: impl Into<String>) {
        self.push_rule(trigger.into(), Scripted::Respond(response.into()));
    }

    /// Fail every prompt containing `trigger`
    pub fn add_error(&self, trigger: impl Into<String>) {
        self.push_rule(trigger.into(), Scripted::Fail);
    }

    /// Fail the first `times` prompts containing `trigger`, then answer with `response`
    pub fn add_transient_error(
        &self,
        trigger: impl Into<String>,
        times: usize,
        response: impl Into<String>,
    ) {
        self.push_rule(trigger.into(), Scripted::FailThenRespond(times, response.into()));
    }

    /// Delay answers to prompts containing `trigger`
    ///
    /// Applies to the most recently added rule with that trigger, or registers
    /// a delayed default response when there is none.
    pub fn set_delay(&self, trigger: &str, delay: Duration) {
        let mut state = self.lock();
        match state.rules.iter_mut().rev().find(|r| r.trigger == trigger) {
            Some(rule) => rule.delay = Some(delay),
            None => state.rules.push(Rule {
                trigger: trigger.to_string(),
                action: Scripted::Respond(self.default_response.clone()),
                delay: Some(delay),
            }),
        }
    }

    /// Number of times `complete` was called
    pub fn call_count(&self) -> usize {
        self.lock().prompts.len()
    }

    /// Every prompt received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    /// Forget recorded prompts
    pub fn reset_call_count(&self) {
        self.lock().prompts.clear();
    }

    fn push_rule(&self, trigger: String, action: Scripted) {
        self.lock().rules.push(Rule {
            trigger,
            action,
            delay: None,
        });
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the prompt and resolve the scripted outcome without awaiting
    fn resolve(&self, prompt: &str) -> (Result<String, LlmError>, Option<Duration>) {
        let mut state = self.lock();
        state.prompts.push(prompt.to_string());

        let Some(rule) = state.rules.iter_mut().find(|r| prompt.contains(&r.trigger)) else {
            return (Ok(self.default_response.clone()), None);
        };

        let outcome = match &mut rule.action {
            Scripted::Respond(response) => Ok(response.clone()),
            Scripted::Fail => Err(LlmError::Other(format!("Mock error for '{}'", rule.trigger))),
            Scripted::FailThenRespond(remaining, response) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Err(LlmError::Communication(format!(
                        "Mock transient error for '{}'",
                        rule.trigger
                    )))
                } else {
                    Ok(response.clone())
                }
            }
        };
        (outcome, rule.delay)
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new("")
    }
}

#[async_trait]
impl ExtractionOracle for MockOracle {
    type Error = LlmError;

    async fn complete(&self, prompt: &str) -> Result<String, Self::Error> {
        let (outcome, delay) = self.resolve(prompt);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
