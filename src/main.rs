use std::fs;
use std::process::ExitCode;

use stepdown_harness::exit_status;
use stepdown_harness::HarnessConfig;
use stepdown_harness::InfrastructureError;
use stepdown_harness::LoggingConfig;
use stepdown_harness::Result;
use stepdown_harness::ScenarioReport;
use stepdown_harness::ScenarioRunner;
use stepdown_harness::EXIT_REPRODUCED;
use stepdown_harness::LOG_FILE_NAME;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let settings = match HarnessConfig::new().and_then(HarnessConfig::validate) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initializing Logs
    let _guard = match init_observability(&settings.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("starting step-down race with {:?}", settings);

    let result = run(&settings).await;
    let (code, diagnostic) = exit_status(&result);
    if code == EXIT_REPRODUCED {
        info!("{}", diagnostic);
        println!("{diagnostic}");
    } else {
        error!("{}", diagnostic);
        eprintln!("{diagnostic}");
    }
    ExitCode::from(code)
}

async fn run(settings: &HarnessConfig) -> Result<ScenarioReport> {
    let mut runner = ScenarioRunner::launch(settings).await?;
    runner.run().await
}

/// Logs to stdout, and to `LOG_FILE_NAME` under `log_dir` when one is configured.
///
/// `RUST_LOG` takes precedence over the configured filter.
fn init_observability(settings: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));

    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(filter());

    let Some(log_dir) = &settings.log_dir else {
        tracing_subscriber::registry().with(stdout_layer).init();
        return Ok(None);
    };

    fs::create_dir_all(log_dir).map_err(InfrastructureError::from)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE_NAME));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(filter());
    tracing_subscriber::registry().with(stdout_layer).with(file_layer).init();

    Ok(Some(guard))
}
