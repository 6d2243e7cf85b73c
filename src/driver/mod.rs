pub mod remote;
pub mod types;

use async_trait::async_trait;

use crate::captcha::ChallengeArtifact;
use crate::error::Result;

pub use remote::RemoteDriver;
pub use types::{Action, Dialog, Field, LaunchSpec, Table};

/// Drives the accounting client on behalf of the workflow.
///
/// Every call is best effort: the UI can be slow, stuck behind a modal or
/// simply different from what was expected, so callers never assume success.
#[async_trait]
pub trait ApplicationDriver: Send + Sync {
    /// Start the application and wait for its main window.
    async fn launch(&self, spec: &LaunchSpec) -> Result<()>;

    /// Put a secret directly into a field, bypassing the keyboard.
    async fn fill_credential(&self, field: Field, secret: &str) -> Result<()>;

    /// Type raw keystrokes into the focused window.
    async fn send_keys(&self, keys: &str) -> Result<()>;

    /// Names in the company switcher, in display order.
    async fn list_companies(&self) -> Result<Vec<String>>;

    /// Select a company by case-insensitive exact name.
    /// Returns `false` when no entry matches.
    async fn select_company(&self, name: &str) -> Result<bool>;

    async fn read_field(&self, field: Field) -> Result<String>;

    async fn write_field(&self, field: Field, value: &str) -> Result<()>;

    /// Cell texts of one column of a grid, top to bottom.
    async fn read_column(&self, table: Table, column: usize) -> Result<Vec<String>>;

    async fn invoke_action(&self, action: Action) -> Result<()>;

    async fn is_dialog_visible(&self, dialog: Dialog) -> Result<bool>;

    /// Close a dialog through its default (affirmative) button.
    async fn dismiss_dialog(&self, dialog: Dialog) -> Result<()>;

    /// Text of whatever modal dialog is open, recognized or not.
    async fn active_dialog(&self) -> Result<Option<String>>;

    /// Close the open modal dialog, whatever it is.
    async fn dismiss_active_dialog(&self) -> Result<()>;

    async fn captcha_challenge(&self) -> Result<ChallengeArtifact>;

    async fn inject_captcha_token(&self, token: &str) -> Result<()>;

    /// Terminate the application.
    async fn shutdown(&self) -> Result<()>;
}
