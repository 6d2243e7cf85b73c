pub mod twocaptcha;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::CaptchaConfig;
use crate::error::Result;

pub use twocaptcha::TwoCaptchaClient;

/// Challenge shown by the application when a registry refresh is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeArtifact {
    /// Interactive hCaptcha widget embedded in a page.
    Hcaptcha { site_key: String, page_url: String },
    /// Plain image captcha.
    Image { bytes: Vec<u8> },
}

/// Answer to a single poll of a submitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Solved(String),
    Pending,
    Failed(String),
}

#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Submit a challenge, returning the solver's task id.
    async fn submit(&self, artifact: &ChallengeArtifact) -> Result<String>;

    async fn poll(&self, task_id: &str) -> Result<PollStatus>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Submitted,
    Pending,
    Solved,
    Failed,
}

/// A challenge handed to the solver, tracked until it reaches a terminal state.
#[derive(Debug)]
pub struct CaptchaTask {
    pub external_task_id: String,
    pub state: TaskState,
    pub polls: u32,
}

impl CaptchaTask {
    fn submitted(external_task_id: String) -> Self {
        Self {
            external_task_id,
            state: TaskState::Submitted,
            polls: 0,
        }
    }
}

/// Outcome of one solve attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaOutcome {
    Solved { token: String, polls: u32 },
    /// The solver reported a terminal error, or submission failed.
    Failed { reason: String },
    /// No terminal answer within the poll budget.
    Exhausted { polls: u32 },
}

/// Submits a challenge and polls on a fixed interval until a terminal answer.
pub struct CaptchaResolver<S> {
    solver: S,
    poll_interval: Duration,
    max_polls: u32,
}

impl<S: CaptchaSolver> CaptchaResolver<S> {
    pub fn new(solver: S, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            solver,
            poll_interval,
            max_polls,
        }
    }

    pub fn from_config(solver: S, config: &CaptchaConfig) -> Self {
        Self::new(
            solver,
            Duration::from_secs(config.poll_interval_secs),
            config.max_polls,
        )
    }

    pub async fn solve(&self, artifact: &ChallengeArtifact) -> CaptchaOutcome {
        let task_id = match self.solver.submit(artifact).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Captcha submission failed");
                return CaptchaOutcome::Failed {
                    reason: format!("submission failed: {e}"),
                };
            }
        };

        let mut task = CaptchaTask::submitted(task_id);
        tracing::info!(task_id = %task.external_task_id, "Captcha submitted");

        while task.polls < self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            task.polls += 1;

            match self.solver.poll(&task.external_task_id).await {
                Ok(PollStatus::Solved(token)) => {
                    task.state = TaskState::Solved;
                    tracing::info!(
                        task_id = %task.external_task_id,
                        polls = task.polls,
                        "Captcha solved"
                    );
                    return CaptchaOutcome::Solved {
                        token,
                        polls: task.polls,
                    };
                }
                Ok(PollStatus::Pending) => {
                    task.state = TaskState::Pending;
                    tracing::debug!(
                        task_id = %task.external_task_id,
                        polls = task.polls,
                        "Captcha not ready"
                    );
                }
                Ok(PollStatus::Failed(reason)) => {
                    task.state = TaskState::Failed;
                    tracing::warn!(
                        task_id = %task.external_task_id,
                        reason = %reason,
                        "Captcha solver gave up"
                    );
                    return CaptchaOutcome::Failed { reason };
                }
                Err(e) => {
                    task.state = TaskState::Failed;
                    tracing::warn!(
                        task_id = %task.external_task_id,
                        error = %e,
                        "Captcha poll failed"
                    );
                    return CaptchaOutcome::Failed {
                        reason: format!("poll failed: {e}"),
                    };
                }
            }
        }

        tracing::warn!(
            task_id = %task.external_task_id,
            polls = task.polls,
            state = ?task.state,
            "Captcha poll budget exhausted"
        );
        CaptchaOutcome::Exhausted { polls: task.polls }
    }
}

#[async_trait]
impl<S: CaptchaSolver + ?Sized> CaptchaSolver for std::sync::Arc<S> {
    async fn submit(&self, artifact: &ChallengeArtifact) -> Result<String> {
        (**self).submit(artifact).await
    }

    async fn poll(&self, task_id: &str) -> Result<PollStatus> {
        (**self).poll(task_id).await
    }
}
