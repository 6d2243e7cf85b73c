use std::sync::Arc;
use std::time::Duration;

use crate::captcha::{CaptchaOutcome, CaptchaResolver, CaptchaSolver};
use crate::config::AppConfig;
use crate::driver::{Action, ApplicationDriver, Dialog, Field, Table};
use crate::error::Result;
use crate::reconcile::{Difference, ReconciliationEngine};
use crate::workflow::types::{
    AtStage, Company, StageError, UpdateResult, UpdateStatus, WorkflowStage,
};

/// Pacing and retry bounds for one company update.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Pause after quick UI actions (tab switches, dialog dismissals).
    pub settle: Duration,
    /// Pause after actions that load a view.
    pub long_settle: Duration,
    /// Pause after the import, which rewrites the whole record.
    pub import_settle: Duration,
    pub dialog_recovery_attempts: u32,
    pub captcha_attempts: u32,
    pub captcha_retry_delay: Duration,
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            settle: config.workflow.settle(),
            long_settle: config.workflow.long_settle(),
            import_settle: config.workflow.import_settle(),
            dialog_recovery_attempts: config.workflow.dialog_recovery_attempts,
            captcha_attempts: config.captcha.max_attempts,
            captcha_retry_delay: Duration::from_secs(config.captcha.retry_delay_secs),
        }
    }
}

/// Runs the update of a single company, from selection to closing its record.
pub struct UpdateWorkflow {
    driver: Arc<dyn ApplicationDriver>,
    captcha: CaptchaResolver<Arc<dyn CaptchaSolver>>,
    reconciler: ReconciliationEngine,
    settings: WorkflowSettings,
}

/// What has been learned about the company so far.
#[derive(Debug, Default)]
struct Progress {
    local: Vec<String>,
    registry: Vec<String>,
    divergent: bool,
    differences: Vec<Difference>,
    notes: Vec<String>,
}

impl Progress {
    fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    fn finish(self, company: &Company, status: UpdateStatus) -> UpdateResult {
        let status = if self.divergent {
            UpdateStatus::DivergenceFound
        } else {
            status
        };

        UpdateResult {
            company: company.name.clone(),
            tax_id: company.tax_id.clone(),
            status,
            local_shareholders: self.local,
            registry_shareholders: self.registry,
            divergent: self.divergent,
            differences: self.differences.iter().map(ToString::to_string).collect(),
            notes: self.notes.join("; "),
        }
    }
}

impl UpdateWorkflow {
    pub fn new(
        driver: Arc<dyn ApplicationDriver>,
        captcha: CaptchaResolver<Arc<dyn CaptchaSolver>>,
        reconciler: ReconciliationEngine,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            driver,
            captcha,
            reconciler,
            settings,
        }
    }

    /// Update one company. Always yields a result and always attempts to
    /// close the record, whatever happened before.
    pub async fn run(&self, company: &mut Company) -> UpdateResult {
        let mut progress = Progress::default();

        let status = match self.execute(company, &mut progress).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    company = %company.name,
                    stage = %e.stage,
                    error = %e.source,
                    "Company update failed"
                );
                progress.note(e.to_string());
                UpdateStatus::Error
            }
        };

        if let Err(e) = self.close_record().await {
            tracing::warn!(
                company = %company.name,
                error = %e,
                "Failed to close record"
            );
        }

        progress.finish(company, status)
    }

    async fn execute(
        &self,
        company: &mut Company,
        progress: &mut Progress,
    ) -> std::result::Result<UpdateStatus, StageError> {
        let driver = &self.driver;

        tracing::debug!(company = %company.name, "Selecting company");
        let found = driver
            .select_company(&company.name)
            .await
            .at(WorkflowStage::Select)?;
        if !found {
            tracing::warn!(company = %company.name, "Company not found");
            progress.note("company not found");
            return Ok(UpdateStatus::Error);
        }
        self.pause(self.settings.settle).await;

        driver
            .invoke_action(Action::OpenRecord)
            .await
            .at(WorkflowStage::OpenRecord)?;
        self.pause(self.settings.long_settle).await;

        let raw = driver
            .read_field(Field::TaxId)
            .await
            .at(WorkflowStage::ReadTaxId)?;
        company.tax_id = match parse_tax_id(&raw) {
            Ok(tax_id) => tax_id,
            Err(count) => {
                tracing::warn!(company = %company.name, digits = count, "Tax id field too long");
                progress.note(format!(
                    "tax id field holds {count} digits, expected at most {TAX_ID_MAX_DIGITS}"
                ));
                String::new()
            }
        };
        tracing::debug!(company = %company.name, tax_id = %company.tax_id, "Tax id read");

        driver
            .invoke_action(Action::UpdateRegistration)
            .await
            .at(WorkflowStage::TriggerRefresh)?;
        self.pause(self.settings.long_settle).await;

        if let Err(reason) = self.resolve_captcha(&company.name).await {
            progress.note(format!(
                "captcha unresolved after {} attempts: {reason}",
                self.settings.captcha_attempts
            ));
            return Ok(UpdateStatus::CaptchaFailed);
        }

        driver
            .invoke_action(Action::Import)
            .await
            .at(WorkflowStage::Import)?;
        self.pause(self.settings.import_settle).await;

        self.recover_dialogs(progress)
            .await
            .at(WorkflowStage::ErrorDialogRecovery)?;

        self.reconcile(&company.tax_id, progress)
            .await
            .at(WorkflowStage::Reconcile)?;

        if progress.divergent {
            tracing::warn!(
                company = %company.name,
                differences = progress.differences.len(),
                "Shareholder divergence found, record left unsaved for review"
            );
            return Ok(UpdateStatus::DivergenceFound);
        }

        self.commit().await.at(WorkflowStage::ConditionalCommit)?;
        Ok(UpdateStatus::Success)
    }

    /// Up to `captcha_attempts` full solve attempts, each on a fresh challenge.
    /// Returns the last failure reason when none succeeds.
    async fn resolve_captcha(&self, company: &str) -> std::result::Result<(), String> {
        let mut last_failure = String::from("no attempt made");

        for attempt in 1..=self.settings.captcha_attempts {
            match self.attempt_captcha().await {
                Ok(()) => return Ok(()),
                Err(reason) => {
                    tracing::warn!(
                        company = company,
                        attempt = attempt,
                        reason = %reason,
                        "Captcha attempt failed"
                    );
                    last_failure = reason;
                }
            }

            if matches!(
                self.driver.is_dialog_visible(Dialog::CaptchaRejected).await,
                Ok(true)
            ) {
                if let Err(e) = self.driver.dismiss_dialog(Dialog::CaptchaRejected).await {
                    tracing::warn!(error = %e, "Failed to dismiss captcha rejection");
                }
            }

            if attempt < self.settings.captcha_attempts {
                self.pause(self.settings.captcha_retry_delay).await;
            }
        }

        Err(last_failure)
    }

    async fn attempt_captcha(&self) -> std::result::Result<(), String> {
        let artifact = self
            .driver
            .captcha_challenge()
            .await
            .map_err(|e| format!("challenge unavailable: {e}"))?;

        match self.captcha.solve(&artifact).await {
            CaptchaOutcome::Solved { token, .. } => self
                .driver
                .inject_captcha_token(&token)
                .await
                .map_err(|e| format!("token injection failed: {e}")),
            CaptchaOutcome::Failed { reason } => Err(reason),
            CaptchaOutcome::Exhausted { polls } => Err(format!("no answer after {polls} polls")),
        }
    }

    async fn recover_dialogs(&self, progress: &mut Progress) -> Result<()> {
        let invalid_url = self.clear_dialog(Dialog::InvalidUrl, progress).await?;
        if invalid_url.seen {
            self.move_website_to_notes(progress).await?;
        }

        let duplicate = self
            .clear_dialog(Dialog::DuplicateShareholder, progress)
            .await?;

        // A known dialog left open is already noted and is the active modal.
        if invalid_url.stuck || duplicate.stuck {
            return Ok(());
        }

        if let Some(text) = self.driver.active_dialog().await? {
            tracing::warn!(dialog = %text, "Unexpected dialog after import");
            progress.note(format!("unexpected dialog after import: {text}"));
            self.driver.dismiss_active_dialog().await?;
            self.pause(self.settings.settle).await;
        }

        Ok(())
    }

    /// Dismiss `dialog` while it keeps showing, within the recovery budget.
    async fn clear_dialog(&self, dialog: Dialog, progress: &mut Progress) -> Result<Cleared> {
        let mut seen = false;

        for _ in 0..self.settings.dialog_recovery_attempts {
            if !self.driver.is_dialog_visible(dialog).await? {
                return Ok(Cleared { seen, stuck: false });
            }
            seen = true;
            tracing::info!(dialog = %dialog, "Dismissing dialog");
            self.driver.dismiss_dialog(dialog).await?;
            self.pause(self.settings.settle).await;
        }

        let stuck = self.driver.is_dialog_visible(dialog).await?;
        if stuck {
            progress.note(format!(
                "{dialog} dialog still open after {} attempts",
                self.settings.dialog_recovery_attempts
            ));
        }

        Ok(Cleared { seen, stuck })
    }

    /// The registry rejects websites with a scheme; keep the address in the
    /// record's notes instead.
    async fn move_website_to_notes(&self, progress: &mut Progress) -> Result<()> {
        let website = self.driver.read_field(Field::Website).await?;
        let Some((_, address)) = website.split_once("https://") else {
            return Ok(());
        };

        self.driver.invoke_action(Action::ShowNotesTab).await?;
        self.pause(self.settings.settle).await;
        self.driver.write_field(Field::Notes, address).await?;
        self.driver.invoke_action(Action::ShowCompanyTab).await?;
        self.pause(self.settings.settle).await;

        progress.note(format!("website moved to notes: {address}"));
        Ok(())
    }

    async fn reconcile(&self, tax_id: &str, progress: &mut Progress) -> Result<()> {
        self.driver
            .invoke_action(Action::ShowShareholdersTab)
            .await?;
        self.pause(self.settings.long_settle).await;

        let cells = self.driver.read_column(Table::Shareholders, 0).await?;
        progress.local = cells
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        self.driver.invoke_action(Action::ShowCompanyTab).await?;
        self.pause(self.settings.settle).await;

        if tax_id.is_empty() {
            progress.note("tax id unavailable; registry not consulted");
            return Ok(());
        }

        match self.reconciler.reconcile(&progress.local, tax_id).await {
            Ok(reconciliation) => {
                progress.registry = reconciliation.registry_names;
                progress.divergent = reconciliation.divergent;
                progress.differences = reconciliation.differences;
            }
            Err(e) => {
                tracing::warn!(tax_id = tax_id, error = %e, "Registry unavailable");
                progress.note(format!("registry unavailable, shareholders unverified: {e}"));
            }
        }

        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.driver.invoke_action(Action::Save).await?;
        self.pause(self.settings.long_settle).await;

        if self.driver.is_dialog_visible(Dialog::ConfirmSave).await? {
            self.driver.dismiss_dialog(Dialog::ConfirmSave).await?;
            self.pause(self.settings.settle).await;
        }

        if self.driver.is_dialog_visible(Dialog::ChangesDetected).await? {
            if let Err(e) = self.driver.invoke_action(Action::Save).await {
                tracing::warn!(error = %e, "Second save after detected changes failed");
            }
            self.pause(self.settings.settle).await;
        }

        Ok(())
    }

    /// Leave the record. Dialog handling is best effort; the close action is
    /// always sent.
    async fn close_record(&self) -> Result<()> {
        match self.driver.active_dialog().await {
            Ok(Some(_)) => {
                if let Err(e) = self.driver.dismiss_active_dialog().await {
                    tracing::warn!(error = %e, "Failed to dismiss dialog before closing record");
                }
                self.pause(self.settings.settle).await;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to query dialogs before closing record"),
        }

        self.driver.invoke_action(Action::CloseRecord).await?;
        self.pause(self.settings.settle).await;
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// What `clear_dialog` saw of one dialog.
#[derive(Debug, Clone, Copy)]
struct Cleared {
    /// The dialog was showing at least once.
    seen: bool,
    /// Still showing after the recovery budget.
    stuck: bool,
}

const TAX_ID_MAX_DIGITS: usize = 14;

fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Digits of the tax-id field, or the digit count when it exceeds
/// [`TAX_ID_MAX_DIGITS`].
fn parse_tax_id(raw: &str) -> std::result::Result<String, usize> {
    let digits = digits_only(raw);
    if digits.len() > TAX_ID_MAX_DIGITS {
        Err(digits.len())
    } else {
        Ok(digits)
    }
}
