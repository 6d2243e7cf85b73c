use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::RegistryConfig;
use crate::error::{AppError, Result};
use crate::registry::RegistryClient;

/// Client for the public ReceitaWS company lookup.
pub struct ReceitaWsClient {
    client: Client,
    base_url: String,
}

impl ReceitaWsClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RegistryClient for ReceitaWsClient {
    async fn lookup(&self, tax_id: &str) -> Result<Vec<String>> {
        if tax_id.is_empty() || !tax_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::Registry(format!("Invalid tax id: {tax_id:?}")));
        }

        let url = format!("{}/v1/cnpj/{tax_id}", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Registry(format!(
                "Registry returned {status}: {body}"
            )));
        }

        let company = response.json::<CompanyResponse>().await?;

        if company.status.as_deref() == Some("ERROR") {
            return Err(AppError::Registry(
                company
                    .message
                    .unwrap_or_else(|| "registry reported an error".to_string()),
            ));
        }

        Ok(company.qsa.into_iter().map(|s| s.nome).collect())
    }
}

// --- Response types ---

#[derive(Debug, Deserialize)]
struct CompanyResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    qsa: Vec<Shareholder>,
}

#[derive(Debug, Deserialize)]
struct Shareholder {
    nome: String,
}
