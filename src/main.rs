use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use sukashi::{
    Config,
    directory_batch::watermark_directory,
    settings::{DynSettingsStore, create_store},
    startup_checks,
    watermark::{Compositor, ImagePayload, OverlaySpec},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "sukashi.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watermark a single image
    Apply {
        input: PathBuf,
        output: PathBuf,
        /// Overlay spec JSON file (defaults to the saved settings)
        #[arg(long)]
        spec: Option<PathBuf>,
    },

    /// Watermark every image under a directory
    Batch {
        input_dir: PathBuf,
        output_dir: PathBuf,
        /// Overlay spec JSON file (defaults to the saved settings)
        #[arg(long)]
        spec: Option<PathBuf>,
    },

    /// Inspect or change the saved overlay settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Verify fonts and settings storage
    Check,
}

#[derive(Subcommand, Debug)]
enum SettingsCommands {
    /// Print the saved overlay spec and auto-apply flag
    Show,
    /// Save an overlay spec from a JSON file
    Save { file: PathBuf },
    /// Turn watermarking of new uploads on or off
    AutoApply { state: Toggle },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    // Set up logging first
    let log_level = cli.log_level.as_deref().unwrap_or(&config.app.log_level);
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store = create_store(&config.settings);

    match cli.command {
        Commands::Apply {
            input,
            output,
            spec,
        } => apply_one(&config, &store, &input, &output, spec.as_deref()).await,
        Commands::Batch {
            input_dir,
            output_dir,
            spec,
        } => apply_directory(&config, &store, &input_dir, &output_dir, spec.as_deref()).await,
        Commands::Settings(cmd) => handle_settings_command(&store, cmd).await,
        Commands::Check => run_checks(&config).await,
    }
}

async fn resolve_spec(
    store: &DynSettingsStore,
    spec_path: Option<&Path>,
) -> Result<OverlaySpec, Box<dyn std::error::Error>> {
    if let Some(path) = spec_path {
        let contents = tokio::fs::read_to_string(path).await?;
        return Ok(serde_json::from_str(&contents)?);
    }
    match store.overlay_spec().await? {
        Some(spec) => Ok(spec),
        None => Err(format!(
            "No overlay spec saved in {} settings; pass --spec or run `settings save`",
            store.name()
        )
        .into()),
    }
}

async fn apply_one(
    config: &Config,
    store: &DynSettingsStore,
    input: &Path,
    output: &Path,
    spec_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = resolve_spec(store, spec_path).await?;
    let compositor = Compositor::from_config(config);

    let source = ImagePayload::from(tokio::fs::read(input).await?);
    let result = compositor.composite(&source, &spec).await?;
    let ImagePayload::Bytes(bytes) = result else {
        return Err("unexpected data URL output for a file input".into());
    };
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, bytes).await?;
    println!("Watermarked {} -> {}", input.display(), output.display());
    Ok(())
}

async fn apply_directory(
    config: &Config,
    store: &DynSettingsStore,
    input_dir: &Path,
    output_dir: &Path,
    spec_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = resolve_spec(store, spec_path).await?;
    let compositor = Compositor::from_config(config);

    // Ctrl+C stops the batch after the current image
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received (Ctrl+C), finishing current image");
            signal_token.cancel();
        }
    });

    let report =
        watermark_directory(&compositor, &spec, input_dir, output_dir, token).await?;
    println!("{}", report.summary());
    Ok(())
}

async fn handle_settings_command(
    store: &DynSettingsStore,
    cmd: SettingsCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        SettingsCommands::Show => {
            match store.overlay_spec().await? {
                Some(spec) => println!("{}", serde_json::to_string_pretty(&spec)?),
                None => println!("No overlay spec saved"),
            }
            let auto_apply = store.is_auto_apply_enabled().await?;
            println!("Auto-apply: {}", if auto_apply { "on" } else { "off" });
        }
        SettingsCommands::Save { file } => {
            let contents = tokio::fs::read_to_string(&file).await?;
            let spec: OverlaySpec = serde_json::from_str(&contents)?;
            store.save_overlay_spec(&spec).await?;
            println!("Saved overlay spec from {}", file.display());
        }
        SettingsCommands::AutoApply { state } => {
            let enabled = matches!(state, Toggle::On);
            store.set_auto_apply(enabled).await?;
            println!("Auto-apply turned {}", if enabled { "on" } else { "off" });
        }
    }
    Ok(())
}

async fn run_checks(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match startup_checks::perform_startup_checks(config).await {
        Ok(()) => {
            println!("All startup checks passed");
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }
            if errors.iter().any(|e| e.is_critical()) {
                Err("Critical startup check failed".into())
            } else {
                warn!("Non-critical startup checks failed");
                Ok(())
            }
        }
    }
}
