use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::{AppConfig, AuthConfig};
use crate::driver::{Action, ApplicationDriver, Field, LaunchSpec};
use crate::error::{AppError, Result};
use crate::report::RunReporter;
use crate::shutdown::ShutdownSignal;
use crate::workflow::{Company, UpdateResult, UpdateWorkflow};

/// Login material for the accounting client.
#[derive(Clone)]
pub struct Credentials {
    pub password: String,
    /// Let the operator log in by hand instead of injecting the password.
    pub manual: bool,
}

impl From<&AuthConfig> for Credentials {
    fn from(config: &AuthConfig) -> Self {
        Self {
            password: config.password.clone(),
            manual: config.manual_login,
        }
    }
}

// Manual Debug impl to avoid leaking the password
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &"[REDACTED]")
            .field("manual", &self.manual)
            .finish()
    }
}

/// Starts the application and hands out a [`Session`] once it is up.
pub struct SessionController {
    driver: Arc<dyn ApplicationDriver>,
    launch: LaunchSpec,
    company_limit: Option<usize>,
}

impl SessionController {
    pub fn new(
        driver: Arc<dyn ApplicationDriver>,
        launch: LaunchSpec,
        company_limit: Option<usize>,
    ) -> Self {
        Self {
            driver,
            launch,
            company_limit,
        }
    }

    pub fn from_config(driver: Arc<dyn ApplicationDriver>, config: &AppConfig) -> Self {
        let launch = LaunchSpec {
            command: config.application.launch_command.clone(),
            window_title: config.application.window_title.clone(),
            timeout_secs: config.application.launch_timeout_secs,
        };
        Self::new(driver, launch, config.company_limit())
    }

    /// Launch the application and wait for its main window.
    pub async fn connect(&self) -> Result<Session> {
        tracing::info!(command = %self.launch.command, "Launching application");

        self.driver
            .launch(&self.launch)
            .await
            .map_err(|e| AppError::Session(format!("Failed to launch application: {e}")))?;

        tracing::info!("Application ready");

        Ok(Session {
            driver: Arc::clone(&self.driver),
            company_limit: self.company_limit,
        })
    }
}

/// A running, connected instance of the accounting client.
pub struct Session {
    driver: Arc<dyn ApplicationDriver>,
    company_limit: Option<usize>,
}

impl Session {
    /// Log in. Tries structured injection of the password first and falls
    /// back to typing it; failure of both is fatal.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        if credentials.manual {
            tracing::info!("Waiting for manual login; press Enter once logged in");
            wait_for_enter().await?;
            return Ok(());
        }

        if let Err(e) = self
            .driver
            .fill_credential(Field::Password, &credentials.password)
            .await
        {
            tracing::warn!(error = %e, "Credential injection failed, falling back to keystrokes");
            self.driver
                .send_keys(&credentials.password)
                .await
                .map_err(|e| AppError::Session(format!("Failed to type password: {e}")))?;
        }

        self.driver
            .invoke_action(Action::Accept)
            .await
            .map_err(|e| AppError::Session(format!("Failed to confirm login: {e}")))?;

        tracing::info!("Logged in");
        Ok(())
    }

    /// Companies in the switcher, in display order. A driver failure yields
    /// an empty list rather than an error.
    pub async fn list_companies(&self) -> Vec<Company> {
        let names = match self.driver.list_companies().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list companies");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let companies: Vec<Company> = names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .filter(|n| {
                let fresh = seen.insert(n.to_uppercase());
                if !fresh {
                    tracing::warn!(company = %n, "Skipping duplicate company name");
                }
                fresh
            })
            .map(Company::new)
            .collect();

        if companies.is_empty() {
            tracing::warn!("No companies found");
        } else {
            tracing::info!(count = companies.len(), "Companies found");
        }

        companies
    }

    /// Run `per_company` over the companies in order, one at a time, handing
    /// each result to `reporter` as soon as it is available.
    ///
    /// Applies the dry-run cap and stops early (between companies) once
    /// `shutdown` has been requested. Returns how many companies were processed.
    pub async fn iterate<F, Fut>(
        &self,
        companies: Vec<Company>,
        shutdown: &ShutdownSignal,
        reporter: &mut RunReporter,
        mut per_company: F,
    ) -> usize
    where
        F: FnMut(Company) -> Fut,
        Fut: Future<Output = UpdateResult>,
    {
        let mut companies = companies;
        if let Some(limit) = self.company_limit {
            if companies.len() > limit {
                tracing::info!(limit = limit, "Dry run: processing only the first companies");
                companies.truncate(limit);
            }
        }

        let total = companies.len();
        let mut processed = 0;

        for (index, company) in companies.into_iter().enumerate() {
            if shutdown.is_requested() {
                tracing::warn!(
                    processed = processed,
                    remaining = total - index,
                    "Shutdown requested, stopping before next company"
                );
                break;
            }

            tracing::info!(
                company = %company.name,
                position = index + 1,
                total = total,
                "Processing company"
            );
            let result = per_company(company).await;
            reporter.record(result);
            processed += 1;
        }

        processed
    }

    /// Close the application. Failures are only logged.
    pub async fn close(&self) {
        if let Err(e) = self.driver.shutdown().await {
            tracing::warn!(error = %e, "Failed to shut down application");
        }
    }
}

async fn wait_for_enter() -> Result<()> {
    wait_for_line(BufReader::new(tokio::io::stdin())).await
}

/// Block until a line arrives on `reader`. End of input is a failed login.
async fn wait_for_line<R: AsyncBufRead + Unpin>(mut reader: R) -> Result<()> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| AppError::Session(format!("Failed to read from stdin: {e}")))?;
    if read == 0 {
        return Err(AppError::Session(
            "stdin closed before manual login was confirmed".to_string(),
        ));
    }
    Ok(())
}

/// Authenticate, enumerate and update every company, recording each result.
///
/// Only session failures escape; every per-company problem ends up in its
/// [`UpdateResult`].
pub async fn run(
    controller: &SessionController,
    credentials: &Credentials,
    workflow: &UpdateWorkflow,
    reporter: &mut RunReporter,
    shutdown: &ShutdownSignal,
) -> Result<()> {
    let session = controller.connect().await?;

    if let Err(e) = session.authenticate(credentials).await {
        session.close().await;
        return Err(e);
    }

    let companies = session.list_companies().await;

    session
        .iterate(companies, shutdown, reporter, |mut company| async move {
            workflow.run(&mut company).await
        })
        .await;

    session.close().await;
    Ok(())
}
