use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use crate::captcha::{CaptchaSolver, ChallengeArtifact, PollStatus};
use crate::config::CaptchaConfig;
use crate::error::{AppError, Result};

const NOT_READY: &str = "CAPCHA_NOT_READY";

/// Client for the 2Captcha `in.php` / `res.php` protocol.
pub struct TwoCaptchaClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TwoCaptchaClient {
    pub fn new(config: &CaptchaConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn parse(response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Captcha(format!(
                "Captcha service returned {status}: {body}"
            )));
        }
        Ok(response.json::<ApiResponse>().await?)
    }
}

#[async_trait]
impl CaptchaSolver for TwoCaptchaClient {
    async fn submit(&self, artifact: &ChallengeArtifact) -> Result<String> {
        let mut form: Vec<(&str, String)> = vec![
            ("key", self.api_key.clone()),
            ("json", "1".to_string()),
        ];

        match artifact {
            ChallengeArtifact::Hcaptcha { site_key, page_url } => {
                form.push(("method", "hcaptcha".to_string()));
                form.push(("sitekey", site_key.clone()));
                form.push(("pageurl", page_url.clone()));
            }
            ChallengeArtifact::Image { bytes } => {
                form.push(("method", "base64".to_string()));
                form.push((
                    "body",
                    base64::engine::general_purpose::STANDARD.encode(bytes),
                ));
            }
        }

        let response = self
            .client
            .post(format!("{}/in.php", self.base_url))
            .form(&form)
            .send()
            .await?;

        let body = Self::parse(response).await?;
        if body.status != 1 {
            return Err(AppError::Captcha(body.error_message()));
        }

        Ok(body.request)
    }

    async fn poll(&self, task_id: &str) -> Result<PollStatus> {
        let response = self
            .client
            .get(format!("{}/res.php", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "get"),
                ("id", task_id),
                ("json", "1"),
            ])
            .send()
            .await?;

        let body = Self::parse(response).await?;

        Ok(match body.status {
            1 => PollStatus::Solved(body.request),
            _ if body.request == NOT_READY => PollStatus::Pending,
            _ => PollStatus::Failed(body.error_message()),
        })
    }
}

// --- Response types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: u8,
    request: String,
    #[serde(default)]
    error_text: Option<String>,
}

impl ApiResponse {
    fn error_message(&self) -> String {
        match &self.error_text {
            Some(text) if !text.is_empty() => format!("{}: {text}", self.request),
            _ => self.request.clone(),
        }
    }
}
