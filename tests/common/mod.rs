#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use shareholder_sync::captcha::{
    CaptchaResolver, CaptchaSolver, ChallengeArtifact, PollStatus,
};
use shareholder_sync::driver::{Action, ApplicationDriver, Dialog, Field, LaunchSpec, Table};
use shareholder_sync::error::{AppError, Result};
use shareholder_sync::reconcile::ReconciliationEngine;
use shareholder_sync::registry::RegistryClient;
use shareholder_sync::workflow::{UpdateWorkflow, WorkflowSettings};

/// In-memory accounting client with scripted behavior and a call log.
#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    pub companies: Vec<String>,
    /// Raw tax-id field text per company (upper-cased name).
    pub tax_ids: HashMap<String, String>,
    /// Shareholder grid per company (upper-cased name).
    pub shareholders: HashMap<String, Vec<String>>,
    pub website: String,

    pub fail_launch: bool,
    pub fail_list: bool,
    pub fail_credential: bool,
    pub fail_keys: bool,
    pub fail_read_tax_id: bool,
    pub fail_challenge: bool,
    pub fail_active_dialog: bool,
    /// Companies whose selection raises a driver error (upper-cased).
    pub fail_select: HashSet<String>,

    /// Dialogs raised by an action, with how many dismissals each needs.
    pub dialogs_after: HashMap<Action, Vec<(Dialog, u32)>>,
    /// Text of an unrecognized dialog raised by the import.
    pub unknown_after_import: Option<String>,

    pub selected: Option<String>,
    pub visible: HashMap<Dialog, u32>,
    pub unknown_dialog: Option<String>,

    pub actions: Vec<Action>,
    pub dismissed: Vec<Dialog>,
    pub selections: Vec<String>,
    pub written: Vec<(Field, String)>,
    pub credentials: Vec<String>,
    pub keystrokes: Vec<String>,
    pub tokens: Vec<String>,
    pub launched: u32,
    pub shut_down: u32,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A company with a tax id and a shareholder grid.
    pub fn with_company(self, name: &str, tax_id: &str, shareholders: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.companies.push(name.to_string());
            state
                .tax_ids
                .insert(name.to_uppercase(), tax_id.to_string());
            state.shareholders.insert(
                name.to_uppercase(),
                shareholders.iter().map(|s| s.to_string()).collect(),
            );
        }
        self
    }

    pub fn configure(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn inspect<R>(&self, f: impl FnOnce(&FakeState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }

    pub fn count(&self, action: Action) -> usize {
        self.inspect(|s| s.actions.iter().filter(|a| **a == action).count())
    }

    fn driver_error(msg: &str) -> AppError {
        AppError::Driver(msg.to_string())
    }
}

#[async_trait]
impl ApplicationDriver for FakeDriver {
    async fn launch(&self, _spec: &LaunchSpec) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_launch {
            return Err(Self::driver_error("window did not appear"));
        }
        state.launched += 1;
        Ok(())
    }

    async fn fill_credential(&self, _field: Field, secret: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_credential {
            return Err(Self::driver_error("password control not found"));
        }
        state.credentials.push(secret.to_string());
        Ok(())
    }

    async fn send_keys(&self, keys: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_keys {
            return Err(Self::driver_error("keyboard unavailable"));
        }
        state.keystrokes.push(keys.to_string());
        Ok(())
    }

    async fn list_companies(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(Self::driver_error("company switcher did not open"));
        }
        Ok(state.companies.clone())
    }

    async fn select_company(&self, name: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let key = name.to_uppercase();
        state.selections.push(name.to_string());
        if state.fail_select.contains(&key) {
            return Err(Self::driver_error("list control vanished"));
        }
        let found = state.companies.iter().any(|c| c.to_uppercase() == key);
        state.selected = found.then_some(key);
        Ok(found)
    }

    async fn read_field(&self, field: Field) -> Result<String> {
        let state = self.state.lock().unwrap();
        match field {
            Field::TaxId => {
                if state.fail_read_tax_id {
                    return Err(Self::driver_error("edit control not found"));
                }
                let selected = state.selected.clone().unwrap_or_default();
                Ok(state.tax_ids.get(&selected).cloned().unwrap_or_default())
            }
            Field::Website => Ok(state.website.clone()),
            _ => Ok(String::new()),
        }
    }

    async fn write_field(&self, field: Field, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.written.push((field, value.to_string()));
        Ok(())
    }

    async fn read_column(&self, _table: Table, _column: usize) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let selected = state.selected.clone().unwrap_or_default();
        Ok(state.shareholders.get(&selected).cloned().unwrap_or_default())
    }

    async fn invoke_action(&self, action: Action) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(action);

        if let Some(dialogs) = state.dialogs_after.get(&action).cloned() {
            for (dialog, times) in dialogs {
                state.visible.insert(dialog, times);
            }
        }
        if action == Action::Import {
            state.unknown_dialog = state.unknown_after_import.clone();
        }
        if action == Action::CloseRecord {
            state.selected = None;
        }
        Ok(())
    }

    async fn is_dialog_visible(&self, dialog: Dialog) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.visible.get(&dialog).copied().unwrap_or(0) > 0)
    }

    async fn dismiss_dialog(&self, dialog: Dialog) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.dismissed.push(dialog);
        if let Some(remaining) = state.visible.get_mut(&dialog) {
            *remaining = remaining.saturating_sub(1);
        }
        Ok(())
    }

    async fn active_dialog(&self) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        if state.fail_active_dialog {
            return Err(Self::driver_error("window enumeration failed"));
        }
        if let Some(text) = &state.unknown_dialog {
            return Ok(Some(text.clone()));
        }
        Ok(state
            .visible
            .iter()
            .find(|(_, remaining)| **remaining > 0)
            .map(|(dialog, _)| dialog.to_string()))
    }

    async fn dismiss_active_dialog(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.unknown_dialog.take().is_some() {
            return Ok(());
        }
        for remaining in state.visible.values_mut() {
            *remaining = 0;
        }
        Ok(())
    }

    async fn captcha_challenge(&self) -> Result<ChallengeArtifact> {
        let state = self.state.lock().unwrap();
        if state.fail_challenge {
            return Err(Self::driver_error("captcha frame not found"));
        }
        Ok(ChallengeArtifact::Hcaptcha {
            site_key: "site-key".to_string(),
            page_url: "https://registry.example/form".to_string(),
        })
    }

    async fn inject_captcha_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.tokens.push(token.to_string());
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.shut_down += 1;
        Ok(())
    }
}

/// Solver that answers `Pending` a fixed number of times per task.
pub struct StubSolver {
    pending_polls: Option<u32>,
    pub submits: AtomicU32,
    pub polls: AtomicU32,
    current: AtomicU32,
}

impl StubSolver {
    /// Solved after `pending` not-ready answers.
    pub fn solving_after(pending: u32) -> Self {
        Self {
            pending_polls: Some(pending),
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            current: AtomicU32::new(0),
        }
    }

    /// Never leaves `Pending`.
    pub fn never() -> Self {
        Self {
            pending_polls: None,
            ..Self::solving_after(0)
        }
    }
}

#[async_trait]
impl CaptchaSolver for StubSolver {
    async fn submit(&self, _artifact: &ChallengeArtifact) -> Result<String> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        self.current.store(0, Ordering::SeqCst);
        Ok(format!("task-{n}"))
    }

    async fn poll(&self, _task_id: &str) -> Result<PollStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let seen = self.current.fetch_add(1, Ordering::SeqCst);
        match self.pending_polls {
            Some(pending) if seen >= pending => Ok(PollStatus::Solved("solved-token".to_string())),
            _ => Ok(PollStatus::Pending),
        }
    }
}

/// Registry with canned rosters per tax id.
#[derive(Default)]
pub struct StubRegistry {
    rosters: HashMap<String, Vec<String>>,
    fallback: Option<Vec<String>>,
    unavailable: bool,
    pub calls: Mutex<Vec<String>>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster(mut self, tax_id: &str, names: &[&str]) -> Self {
        self.rosters.insert(
            tax_id.to_string(),
            names.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Roster returned for any tax id without its own entry.
    pub fn with_fallback(mut self, names: &[&str]) -> Self {
        self.fallback = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RegistryClient for StubRegistry {
    async fn lookup(&self, tax_id: &str) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push(tax_id.to_string());
        if self.unavailable {
            return Err(AppError::Registry("Registry returned 429 Too Many Requests".to_string()));
        }
        self.rosters
            .get(tax_id)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| AppError::Registry(format!("unknown tax id {tax_id}")))
    }
}

/// Settings with every pause set to zero.
pub fn instant_settings() -> WorkflowSettings {
    WorkflowSettings {
        settle: Duration::ZERO,
        long_settle: Duration::ZERO,
        import_settle: Duration::ZERO,
        dialog_recovery_attempts: 3,
        captcha_attempts: 3,
        captcha_retry_delay: Duration::ZERO,
    }
}

pub fn workflow(
    driver: Arc<FakeDriver>,
    solver: Arc<StubSolver>,
    registry: Arc<StubRegistry>,
) -> UpdateWorkflow {
    let solver: Arc<dyn CaptchaSolver> = solver;
    UpdateWorkflow::new(
        driver,
        CaptchaResolver::new(solver, Duration::ZERO, 5),
        ReconciliationEngine::new(registry),
        instant_settings(),
    )
}
