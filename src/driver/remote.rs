use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::captcha::ChallengeArtifact;
use crate::config::DriverConfig;
use crate::driver::{Action, ApplicationDriver, Dialog, Field, LaunchSpec, Table};
use crate::error::{AppError, Result};

/// Talks JSON over HTTP to an automation bridge running on the machine that
/// hosts the accounting client.
///
/// The bridge owns the window handles and keyboard; this side only names
/// controls through the typed identifiers in [`crate::driver::types`].
pub struct RemoteDriver {
    client: Client,
    endpoint: String,
}

impl RemoteDriver {
    pub fn new(config: &DriverConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.endpoint)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::check(path, response).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = Self::check(path, response).await?;
        Ok(response.json::<R>().await?)
    }

    async fn check(path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);

        Err(AppError::Driver(format!("{path} returned {status}: {message}")))
    }
}

#[async_trait]
impl ApplicationDriver for RemoteDriver {
    async fn launch(&self, spec: &LaunchSpec) -> Result<()> {
        self.post("application/launch", spec).await?;
        Ok(())
    }

    async fn fill_credential(&self, field: Field, secret: &str) -> Result<()> {
        self.post(
            &format!("fields/{field}/credential"),
            &json!({ "value": secret }),
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&self, keys: &str) -> Result<()> {
        self.post("keyboard", &json!({ "keys": keys })).await?;
        Ok(())
    }

    async fn list_companies(&self) -> Result<Vec<String>> {
        let body: CompaniesBody = self.get("companies").await?;
        Ok(body.companies)
    }

    async fn select_company(&self, name: &str) -> Result<bool> {
        let response = self
            .post("companies/select", &json!({ "name": name }))
            .await?;
        let body = response.json::<SelectBody>().await?;
        Ok(body.selected)
    }

    async fn read_field(&self, field: Field) -> Result<String> {
        let body: ValueBody = self.get(&format!("fields/{field}")).await?;
        Ok(body.value)
    }

    async fn write_field(&self, field: Field, value: &str) -> Result<()> {
        self.post(&format!("fields/{field}"), &json!({ "value": value }))
            .await?;
        Ok(())
    }

    async fn read_column(&self, table: Table, column: usize) -> Result<Vec<String>> {
        let body: ValuesBody = self
            .get(&format!("tables/{table}/columns/{column}"))
            .await?;
        Ok(body.values)
    }

    async fn invoke_action(&self, action: Action) -> Result<()> {
        self.post(&format!("actions/{action}"), &json!({})).await?;
        Ok(())
    }

    async fn is_dialog_visible(&self, dialog: Dialog) -> Result<bool> {
        let body: VisibleBody = self.get(&format!("dialogs/{dialog}")).await?;
        Ok(body.visible)
    }

    async fn dismiss_dialog(&self, dialog: Dialog) -> Result<()> {
        self.post(&format!("dialogs/{dialog}/dismiss"), &json!({}))
            .await?;
        Ok(())
    }

    async fn active_dialog(&self) -> Result<Option<String>> {
        let body: ActiveDialogBody = self.get("dialogs/active").await?;
        Ok(body.text)
    }

    async fn dismiss_active_dialog(&self) -> Result<()> {
        self.post("dialogs/active/dismiss", &json!({})).await?;
        Ok(())
    }

    async fn captcha_challenge(&self) -> Result<ChallengeArtifact> {
        let body: ChallengeBody = self.get("captcha/challenge").await?;
        body.into_artifact()
    }

    async fn inject_captcha_token(&self, token: &str) -> Result<()> {
        self.post("captcha/token", &json!({ "token": token })).await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.post("application/shutdown", &json!({})).await?;
        Ok(())
    }
}

// --- Response types ---

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct CompaniesBody {
    companies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    selected: bool,
}

#[derive(Debug, Deserialize)]
struct ValueBody {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ValuesBody {
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VisibleBody {
    visible: bool,
}

#[derive(Debug, Deserialize)]
struct ActiveDialogBody {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ChallengeBody {
    Hcaptcha { site_key: String, page_url: String },
    Image { image_base64: String },
}

impl ChallengeBody {
    fn into_artifact(self) -> Result<ChallengeArtifact> {
        match self {
            ChallengeBody::Hcaptcha { site_key, page_url } => {
                Ok(ChallengeArtifact::Hcaptcha { site_key, page_url })
            }
            ChallengeBody::Image { image_base64 } => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(image_base64.as_bytes())
                    .map_err(|e| AppError::Driver(format!("Invalid captcha image: {e}")))?;
                Ok(ChallengeArtifact::Image { bytes })
            }
        }
    }
}
