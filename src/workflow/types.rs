use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::AppError;

/// A company registered in the accounting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub name: String,
    /// Digits only; empty until the record has been read.
    pub tax_id: String,
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tax_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Success,
    DivergenceFound,
    CaptchaFailed,
    Error,
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStatus::Success => f.write_str("updated"),
            UpdateStatus::DivergenceFound => f.write_str("shareholder divergence"),
            UpdateStatus::CaptchaFailed => f.write_str("captcha failed"),
            UpdateStatus::Error => f.write_str("error"),
        }
    }
}

/// Final record for one attempted company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    pub company: String,
    pub tax_id: String,
    pub status: UpdateStatus,
    pub local_shareholders: Vec<String>,
    pub registry_shareholders: Vec<String>,
    pub divergent: bool,
    pub differences: Vec<String>,
    pub notes: String,
}

/// Steps of the per-company update, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    Select,
    OpenRecord,
    ReadTaxId,
    TriggerRefresh,
    CaptchaResolution,
    Import,
    ErrorDialogRecovery,
    Reconcile,
    ConditionalCommit,
    CloseRecord,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStage::Select => "select company",
            WorkflowStage::OpenRecord => "open record",
            WorkflowStage::ReadTaxId => "read tax id",
            WorkflowStage::TriggerRefresh => "trigger refresh",
            WorkflowStage::CaptchaResolution => "captcha resolution",
            WorkflowStage::Import => "import",
            WorkflowStage::ErrorDialogRecovery => "dialog recovery",
            WorkflowStage::Reconcile => "reconcile",
            WorkflowStage::ConditionalCommit => "save",
            WorkflowStage::CloseRecord => "close record",
        };
        f.write_str(name)
    }
}

/// A failure pinned to the stage it happened in.
#[derive(Debug, Error)]
#[error("{stage}: {source}")]
pub struct StageError {
    pub stage: WorkflowStage,
    #[source]
    pub source: AppError,
}

pub(crate) trait AtStage<T> {
    fn at(self, stage: WorkflowStage) -> Result<T, StageError>;
}

impl<T> AtStage<T> for crate::error::Result<T> {
    fn at(self, stage: WorkflowStage) -> Result<T, StageError> {
        self.map_err(|source| StageError { stage, source })
    }
}
