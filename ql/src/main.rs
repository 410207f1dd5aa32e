//! ql - quantized line processor
//!
//! Demo driver that streams a file through a QuantizedIterator on a chosen
//! executor. It exercises the library; the `quantloop` API is the contract
//! and this binary's flags and output are not.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result, eyre};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use quantloop::cli::{Cli, Command, OutputFormat};
use quantloop::config::{Config, ExecutorKind};
use quantloop::{LoopState, PacingConfig, Progress, QuantizedIterator, RunQueue, SerialQueue, TokioExecutor};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quantloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // CLI flag wins over config, default to info
    let level = cli_log_level.or(config_log_level).unwrap_or("info");
    let directive = format!("quantloop={level},ql={level}");
    let log_file = fs::File::create(log_dir.join("ql.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&directive))
                .context("Invalid log level")?,
        )
        .init();

    info!(%level, "Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    info!(executor = %config.executor, "ql loaded config");

    match cli.command {
        Command::Run {
            input,
            step,
            budget_ms,
            executor,
            cancel_after_ms,
            format,
        } => {
            let pacing = config.pacing.merge(&PacingConfig { step, budget_ms });
            let executor = executor.unwrap_or(config.executor);
            cmd_run(&input, &pacing, executor, cancel_after_ms, format).await
        }
    }
}

async fn cmd_run(
    input: &Path,
    pacing: &PacingConfig,
    executor: ExecutorKind,
    cancel_after_ms: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    debug!(input = %input.display(), ?pacing, %executor, ?cancel_after_ms, "cmd_run: called");
    let content = fs::read_to_string(input).context(format!("Failed to read {}", input.display()))?;
    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    let pacing = pacing.pacing()?;

    let write_errors = Arc::new(Mutex::new(0usize));
    let errors = Arc::clone(&write_errors);
    let it = QuantizedIterator::new(lines, pacing, move |line: &String| {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", line) {
            debug!(error = %e, "cmd_run: write failed");
            if let Ok(mut count) = errors.lock() {
                *count += 1;
            }
        }
    });

    let (done_tx, done_rx) = oneshot::channel::<LoopState>();
    let done_tx = Arc::new(Mutex::new(Some(done_tx)));
    it.on_done(notifier(&done_tx, LoopState::Done));
    it.on_cancel(notifier(&done_tx, LoopState::Canceled));

    if let Some(ms) = cancel_after_ms {
        let canceler = it.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            if canceler.cancel() {
                info!(cursor = canceler.cursor(), "cmd_run: canceled");
            }
        });
    }

    // Held until the traversal ends so the worker stays alive
    let mut serial = None;
    match executor {
        ExecutorKind::Tokio => {
            it.set_executor(Arc::new(TokioExecutor::current()?))?;
            it.run();
        }
        ExecutorKind::Serial => {
            let queue = Arc::new(SerialQueue::new("ql-serial").context("Failed to start serial queue")?);
            it.set_executor(queue.clone())?;
            let first = it.clone();
            queue.dispatch(move || first.run())?;
            serial = Some(queue);
        }
        ExecutorKind::Main => {
            let main = RunQueue::main();
            it.set_executor(main.clone())?;
            it.run();
            // One job per turn so the cancel task gets a chance to run
            while main.run_next() {
                tokio::task::yield_now().await;
            }
        }
    }

    let state = done_rx.await.map_err(|_| eyre!("Iterator dropped before finishing"))?;
    drop(serial);

    let failed = write_errors.lock().map(|count| *count).unwrap_or(0);
    if failed > 0 {
        warn!(failed, "cmd_run: some lines could not be written");
    }

    let progress = it.progress();
    info!(?progress, %state, "cmd_run: finished");
    print_summary(&progress, format)
}

/// Callback that reports the terminal state once, whichever fires first
fn notifier(
    slot: &Arc<Mutex<Option<oneshot::Sender<LoopState>>>>,
    state: LoopState,
) -> impl FnOnce() + Send + 'static {
    let slot = Arc::clone(slot);
    move || {
        let tx = slot.lock().ok().and_then(|mut tx| tx.take());
        if let Some(tx) = tx {
            let _ = tx.send(state);
        }
    }
}

fn print_summary(progress: &Progress, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string(progress).context("Failed to serialize summary")?;
            eprintln!("{}", json);
        }
        OutputFormat::Text => {
            eprintln!(
                "{}: {}/{} lines in {} quanta",
                progress.state, progress.cursor, progress.len, progress.quanta
            );
        }
    }
    Ok(())
}
