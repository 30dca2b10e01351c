//! Capability-scoped automatic validation.
//!
//! Automatic checks are performed by external providers (linters, static
//! analyzers, benchmark harnesses) that plug in through [`AutoValidator`].
//! The registry only routes work to providers that declare support for the
//! task at hand. Dispatch fails closed: a task no registered provider can
//! assess is an error, never a default pass.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use meritum_core::error::MeritumError;
use meritum_core::submission::Submission;
use meritum_core::task::Task;
use meritum_core::types::Score;
use meritum_core::validation::AutoCheck;

// ── Assessment ──────────────────────────────────────────────────────────────

/// What one capability provider reports back for a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoAssessment {
    pub checks: Vec<AutoCheck>,
    pub confidence: f64,
}

impl AutoAssessment {
    /// Overall score is the mean of the individual checks, zero when the
    /// provider produced none.
    pub fn overall_score(&self) -> Score {
        if self.checks.is_empty() {
            return 0;
        }
        let sum: u32 = self.checks.iter().map(|c| c.score as u32).sum();
        (sum / self.checks.len() as u32) as Score
    }
}

// ── Provider contract ───────────────────────────────────────────────────────

/// An automatic-check capability. Implementations live outside this crate;
/// the contract deliberately knows nothing about how a check is executed.
#[async_trait]
pub trait AutoValidator: Send + Sync {
    /// Short tag recorded on every result this provider produces.
    fn tag(&self) -> &'static str;

    /// Whether this provider can assess the given task.
    fn supports(&self, task: &Task) -> bool;

    async fn assess(
        &self,
        task: &Task,
        submission: &Submission,
        content: &[u8],
    ) -> Result<AutoAssessment, MeritumError>;
}

// ── Registry ────────────────────────────────────────────────────────────────

/// Registry of automatic-check providers.
#[derive(Default)]
pub struct CapabilityRegistry {
    providers: Vec<Arc<dyn AutoValidator>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn AutoValidator>) {
        debug!(provider = provider.tag(), "capability registered");
        self.providers.push(provider);
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers that support the task. Fails closed when none do.
    pub fn supporting(&self, task: &Task) -> Result<Vec<Arc<dyn AutoValidator>>, MeritumError> {
        let matching: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.supports(task))
            .cloned()
            .collect();
        if matching.is_empty() {
            return Err(MeritumError::AutoValidationNotSupported {
                task_kind: task.kind.tag().to_string(),
            });
        }
        Ok(matching)
    }
}
