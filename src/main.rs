use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shareholder_sync::captcha::{CaptchaResolver, CaptchaSolver, TwoCaptchaClient};
use shareholder_sync::config::AppConfig;
use shareholder_sync::driver::{ApplicationDriver, RemoteDriver};
use shareholder_sync::reconcile::ReconciliationEngine;
use shareholder_sync::registry::{ReceitaWsClient, RegistryClient, ThrottledRegistry};
use shareholder_sync::report::RunReporter;
use shareholder_sync::session::{self, Credentials, SessionController};
use shareholder_sync::shutdown::{self, ShutdownSignal};
use shareholder_sync::workflow::{UpdateWorkflow, WorkflowSettings};

#[derive(Parser)]
#[command(
    name = "shareholder-sync",
    about = "Refresh company registrations and reconcile shareholder rosters"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Process only the first few companies
    #[arg(long)]
    dry_run: bool,

    /// Directory for the CSV and JSON reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.run.dry_run = true;
    }
    if let Some(dir) = cli.output_dir {
        config.run.output_dir = dir;
    }

    tracing::info!(
        driver = %config.driver.endpoint,
        dry_run = config.run.dry_run,
        output_dir = %config.run.output_dir.display(),
        "Starting shareholder sync"
    );

    let driver: Arc<dyn ApplicationDriver> = Arc::new(RemoteDriver::new(&config.driver)?);

    let solver: Arc<dyn CaptchaSolver> = Arc::new(TwoCaptchaClient::new(&config.captcha)?);
    let captcha = CaptchaResolver::from_config(solver, &config.captcha);

    let receita: Arc<dyn RegistryClient> = Arc::new(ReceitaWsClient::new(&config.registry)?);
    let registry: Arc<dyn RegistryClient> = Arc::new(ThrottledRegistry::new(
        receita,
        Duration::from_secs(config.registry.min_interval_secs),
    ));

    let workflow = UpdateWorkflow::new(
        Arc::clone(&driver),
        captcha,
        ReconciliationEngine::new(registry),
        WorkflowSettings::from_config(&config),
    );

    let controller = SessionController::from_config(driver, &config);
    let credentials = Credentials::from(&config.auth);

    let shutdown_signal = ShutdownSignal::new();
    shutdown::listen(shutdown_signal.clone());

    let mut reporter = RunReporter::new();

    if let Err(e) = session::run(
        &controller,
        &credentials,
        &workflow,
        &mut reporter,
        &shutdown_signal,
    )
    .await
    {
        tracing::error!(error = %e, "Run aborted");
        return Err(e.into());
    }

    let files = reporter.export(&config.run.output_dir)?;
    let summary = reporter.summary();

    tracing::info!(%summary, "Run complete");
    println!("{summary}");
    println!("Reports: {} and {}", files.csv.display(), files.json.display());

    Ok(())
}
