use std::fmt;

use serde::Serialize;

/// Commands the accounting client exposes as buttons or shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Default confirmation of the focused window (Alt+O).
    Accept,
    /// "Dados" view of the selected company (Alt+D).
    OpenRecord,
    /// "Atualizar Cadastro": pull the company's data from the federal registry.
    UpdateRegistration,
    /// "Importar": apply the refreshed registry data to the record.
    Import,
    /// "Gravar" (Alt+G).
    Save,
    /// Escape out of the record and the company switcher.
    CloseRecord,
    ShowCompanyTab,
    ShowShareholdersTab,
    ShowNotesTab,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::OpenRecord => "open_record",
            Action::UpdateRegistration => "update_registration",
            Action::Import => "import",
            Action::Save => "save",
            Action::CloseRecord => "close_record",
            Action::ShowCompanyTab => "show_company_tab",
            Action::ShowShareholdersTab => "show_shareholders_tab",
            Action::ShowNotesTab => "show_notes_tab",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Password,
    TaxId,
    Website,
    Notes,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Password => "password",
            Field::TaxId => "tax_id",
            Field::Website => "website",
            Field::Notes => "notes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Shareholders,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Shareholders => "shareholders",
        }
    }
}

/// Modal dialogs the workflow knows how to recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialog {
    /// "Captcha não validado".
    CaptchaRejected,
    /// "Página na Internet inválida".
    InvalidUrl,
    /// "Sócio em mais de uma empresa".
    DuplicateShareholder,
    /// Confirmation asked after saving.
    ConfirmSave,
    /// "Alterações detectadas".
    ChangesDetected,
}

impl Dialog {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialog::CaptchaRejected => "captcha_rejected",
            Dialog::InvalidUrl => "invalid_url",
            Dialog::DuplicateShareholder => "duplicate_shareholder",
            Dialog::ConfirmSave => "confirm_save",
            Dialog::ChangesDetected => "changes_detected",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(Action, Field, Table, Dialog);

/// How to start the target application.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchSpec {
    pub command: String,
    pub window_title: String,
    pub timeout_secs: u64,
}
