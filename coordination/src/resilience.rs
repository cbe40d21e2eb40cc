//! Resilience: per-stage guard for specialist calls
//!
//! Every `analyze` / `generate_recommendations` call runs under a
//! [`StageGuard`]. Instead of propagating a hard error, the guard converts a
//! failure, a timeout or a cancellation into a [`StageFailure`] that the engine
//! records as a degraded consultation.
//!
//! ```text
//! stage future
//!   ├─ completes Ok          → Ok(value)
//!   ├─ completes Err(e)      → StageFailure { kind: Error, .. }
//!   ├─ exceeds stage timeout → StageFailure { kind: Timeout, .. }
//!   └─ request cancelled     → StageFailure { kind: Cancelled, .. }
//! ```

use crate::specialist::SpecialistError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Which half of a consultation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analyze,
    Recommend,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analyze => write!(f, "analyze"),
            Self::Recommend => write!(f, "recommend"),
        }
    }
}

/// How a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The specialist returned an error.
    Error,
    /// The stage exceeded its timeout.
    Timeout,
    /// The request was cancelled while the stage was in flight.
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A recovered stage failure, stored on the degraded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
    pub elapsed_ms: u64,
}

impl StageFailure {
    pub fn new(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
            elapsed_ms: 0,
        }
    }

    fn after(mut self, started: Instant) -> Self {
        self.elapsed_ms = started.elapsed().as_millis() as u64;
        self
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stage {}: {}", self.stage, self.kind, self.message)
    }
}

/// Applies a per-stage timeout and the request's cancellation token.
#[derive(Debug, Clone)]
pub struct StageGuard {
    timeout: Duration,
    cancel: CancellationToken,
}

impl StageGuard {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Await `fut` fully, unless the timeout elapses or the request is
    /// cancelled first.
    pub async fn run<T, F>(&self, stage: Stage, fut: F) -> Result<T, StageFailure>
    where
        F: Future<Output = Result<T, SpecialistError>>,
    {
        let started = Instant::now();
        if self.cancel.is_cancelled() {
            return Err(StageFailure::new(stage, FailureKind::Cancelled, "cancelled before start"));
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(
                StageFailure::new(stage, FailureKind::Cancelled, "request cancelled").after(started),
            ),
            outcome = tokio::time::timeout(self.timeout, fut) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(StageFailure::new(stage, FailureKind::Error, e.to_string()).after(started)),
                Err(_) => Err(StageFailure::new(
                    stage,
                    FailureKind::Timeout,
                    format!("exceeded {}ms stage timeout", self.timeout.as_millis()),
                )
                .after(started)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(ms: u64) -> StageGuard {
        StageGuard::new(Duration::from_millis(ms), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let out = guard(100)
            .run(Stage::Analyze, async { Ok::<_, SpecialistError>(42) })
            .await;
        assert_eq!(out.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_error_is_recovered() {
        let out = guard(100)
            .run(Stage::Recommend, async {
                Err::<(), _>(SpecialistError::Recommendation("no data".into()))
            })
            .await;
        let failure = out.unwrap_err();
        assert_eq!(failure.stage, Stage::Recommend);
        assert_eq!(failure.kind, FailureKind::Error);
        assert!(failure.message.contains("no data"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_recovered() {
        let out = guard(50)
            .run(Stage::Analyze, async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, SpecialistError>(())
            })
            .await;
        let failure = out.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(failure.to_string(), "analyze stage timeout: exceeded 50ms stage timeout");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let guard = StageGuard::new(Duration::from_secs(1), cancel);
        let out = guard
            .run(Stage::Analyze, async { Ok::<_, SpecialistError>(1) })
            .await;
        assert!(out.unwrap_err().is_cancellation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_in_flight() {
        let cancel = CancellationToken::new();
        let guard = StageGuard::new(Duration::from_secs(60), cancel.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        let out = guard
            .run(Stage::Analyze, async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, SpecialistError>(())
            })
            .await;
        canceller.await.unwrap();
        assert_eq!(out.unwrap_err().kind, FailureKind::Cancelled);
    }
}
