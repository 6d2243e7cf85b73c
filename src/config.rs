use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub run: RunConfig,
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationConfig {
    #[serde(default = "default_launch_command")]
    pub launch_command: String,
    #[serde(default = "default_window_title")]
    pub window_title: String,
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriverConfig {
    /// Base URL of the automation bridge running next to the desktop client.
    #[serde(default = "default_driver_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_driver_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Deserialize, Clone)]
pub struct AuthConfig {
    pub password: String,
    #[serde(default)]
    pub manual_login: bool,
}

// Manual Debug impl to avoid leaking the application password
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("password", &"[REDACTED]")
            .field("manual_login", &self.manual_login)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Process only the first `dry_run_limit` companies.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_dry_run_limit")]
    pub dry_run_limit: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Deserialize, Clone)]
pub struct CaptchaConfig {
    pub api_key: String,
    #[serde(default = "default_captcha_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for CaptchaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptchaConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("max_polls", &self.max_polls)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_base_url")]
    pub base_url: String,
    /// Minimum spacing between two registry calls, across the whole run.
    #[serde(default = "default_registry_interval")]
    pub min_interval_secs: u64,
    #[serde(default = "default_registry_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_long_settle_ms")]
    pub long_settle_ms: u64,
    #[serde(default = "default_import_settle_ms")]
    pub import_settle_ms: u64,
    #[serde(default = "default_dialog_recovery_attempts")]
    pub dialog_recovery_attempts: u32,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            launch_command: default_launch_command(),
            window_title: default_window_title(),
            launch_timeout_secs: default_launch_timeout(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            endpoint: default_driver_endpoint(),
            request_timeout_secs: default_driver_timeout(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            dry_run_limit: default_dry_run_limit(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_registry_base_url(),
            min_interval_secs: default_registry_interval(),
            request_timeout_secs: default_registry_timeout(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            long_settle_ms: default_long_settle_ms(),
            import_settle_ms: default_import_settle_ms(),
            dialog_recovery_attempts: default_dialog_recovery_attempts(),
        }
    }
}

fn default_launch_command() -> String {
    r"C:\Contabil\contabil.exe /registro".to_string()
}

fn default_window_title() -> String {
    ".*Domínio.*".to_string()
}

fn default_launch_timeout() -> u64 {
    60
}

fn default_driver_endpoint() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_driver_timeout() -> u64 {
    90
}

fn default_dry_run_limit() -> usize {
    3
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_captcha_base_url() -> String {
    "http://2captcha.com".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_polls() -> u32 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2
}

fn default_registry_base_url() -> String {
    "https://receitaws.com.br".to_string()
}

fn default_registry_interval() -> u64 {
    30
}

fn default_registry_timeout() -> u64 {
    30
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_long_settle_ms() -> u64 {
    2000
}

fn default_import_settle_ms() -> u64 {
    3000
}

fn default_dialog_recovery_attempts() -> u32 {
    3
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(
                config::File::with_name("shareholder-sync").required(false),
            );
        }

        // Environment variable overrides with SHAREHOLDER_SYNC_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("SHAREHOLDER_SYNC")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.captcha.max_polls == 0 || self.captcha.max_attempts == 0 {
            return Err(AppError::Config(
                "captcha.max_polls and captcha.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.run.dry_run && self.run.dry_run_limit == 0 {
            return Err(AppError::Config(
                "run.dry_run_limit must be at least 1 when dry_run is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Company cap for this run, if any.
    pub fn company_limit(&self) -> Option<usize> {
        self.run.dry_run.then_some(self.run.dry_run_limit)
    }
}

impl WorkflowConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn long_settle(&self) -> Duration {
        Duration::from_millis(self.long_settle_ms)
    }

    pub fn import_settle(&self) -> Duration {
        Duration::from_millis(self.import_settle_ms)
    }
}
