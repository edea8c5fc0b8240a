use anyhow::{Context, Result};
use clap::Parser;
use repcount::{
    LocalArchiveUploader, RepCountConfig, Recording, SessionController, TracingDisplaySink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "repcount")]
#[command(about = "Squat repetition counter driven by pose landmarks")]
#[command(version)]
#[command(long_about = "Counts squat repetitions from the knee angle of a tracked leg. \
Frames are replayed from a landmark recording, every measurement is kept for the session, \
and the session can be exported as CSV and archived.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "repcount.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Landmark recording to replay, overrides `source.recording`
    #[arg(short, long, value_name = "FILE")]
    recording: Option<PathBuf>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting a session")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Write the session's measurements as CSV when it ends
    #[arg(long)]
    export: bool,

    /// Export and hand the CSV to the archive uploader when the session ends
    #[arg(long)]
    upload: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args);

    info!("Starting repcount v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match RepCountConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    if let Some(recording) = args.recording.clone() {
        config.source.recording = Some(recording);
    }
    let recording_path = config
        .source
        .recording
        .clone()
        .context("no landmark recording given; pass --recording or set source.recording")?;

    let recording = Recording::load(&recording_path)?;
    if recording.is_empty() {
        warn!("Recording {} contains no frames", recording_path.display());
    }

    let source = recording.frames(config.source.resolution, config.source.replay_fps);
    let uploader = Arc::new(LocalArchiveUploader::new(&config.upload.archive_dir));
    let mut controller = SessionController::new(
        config,
        Arc::new(recording.estimator()),
        Arc::new(TracingDisplaySink::new()),
        uploader,
    )?;

    controller.start(Box::new(source)).await?;

    let mut status = controller.watch_status();
    tokio::select! {
        _ = status.wait_for(|s| !s.active) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, stopping session");
        }
    }

    let summary = match controller.stop().await? {
        Some(summary) => summary,
        None => controller
            .last_summary()
            .cloned()
            .context("session ended without a summary")?,
    };

    info!(
        "Session {} finished: {} reps, final stage {}",
        summary.session_id, summary.reps, summary.final_stage
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if args.upload {
        let artifact = controller.export_local().await?;
        println!("Exported {} rows to {}", artifact.rows, artifact.path.display());
        match controller.retry_upload(&artifact).await {
            Ok(receipt) => println!("Uploaded: {}", receipt.viewer_url),
            Err(e) => {
                eprintln!(
                    "✗ Upload failed, local export kept at {}: {}",
                    artifact.path.display(),
                    e
                );
                std::process::exit(2);
            }
        }
    } else if args.export {
        let artifact = controller.export_local().await?;
        println!("Exported {} rows to {}", artifact.rows, artifact.path.display());
    }

    Ok(())
}

fn init_logging(args: &Args) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("repcount={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# repcount configuration file");
    println!("# Every key is optional; REPCOUNT_<SECTION>__<KEY> environment variables override it");
    println!();
    print!("{}", RepCountConfig::default().to_toml()?);
    Ok(())
}
