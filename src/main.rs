//! # Project Consolidator - Main Entry Point
//!
//! Interfaccia a riga di comando sopra il [`ConsolidationEngine`].
//!
//! ## Responsabilità:
//! - Parsing degli argomenti con `clap` (un sottocomando per operazione)
//! - Inizializzazione del logging con `tracing-subscriber` (`RUST_LOG` o `--verbose`)
//! - Caricamento della configurazione
//! - Output leggibile oppure JSON (`--json`)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! project-consolidate analyze Edit.prproj --handles 25
//! project-consolidate consolidate Edit.prproj --output /Volumes/Archive/Edit --mode trim --optimization minimize
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use project_consolidator::{
    progress::ProgressManager,
    tool_resolver::ToolPathResolver,
    Config, ConsolidationEngine, ConsolidationOptions, ConsolidationStatus, FolderStructure,
    OptimizationMode, ProcessingMode, ProxyMode, TranscodePreset,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "project-consolidate")]
#[command(about = "Copy only the media an editing project actually uses")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Project summary
    Info { project: PathBuf },
    /// List the sequences of a project
    Sequences { project: PathBuf },
    /// List the media referenced by a project
    Media { project: PathBuf },
    /// Show which media the selected sequences use
    Analyze {
        project: PathBuf,
        /// Sequence ids to analyze (default: all)
        #[arg(short, long)]
        sequence: Vec<String>,
        /// Extra frames kept around every used range
        #[arg(long, default_value = "0")]
        handles: u32,
        /// Count every multicam angle, not only the selected one
        #[arg(long)]
        all_angles: bool,
    },
    /// Estimate the bytes a consolidation would write
    Estimate {
        project: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Run a consolidation
    Consolidate {
        project: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Check that ffmpeg can be run
    CheckFfmpeg,
}

#[derive(Args)]
struct OptionArgs {
    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Sequence ids to consolidate (default: all)
    #[arg(short, long)]
    sequence: Vec<String>,

    /// trim, transcode, copy or no_process
    #[arg(long, default_value = "trim", value_parser = parse_name::<ProcessingMode>)]
    mode: ProcessingMode,

    /// Transcode preset, e.g. prores422 or h264high
    #[arg(long, value_parser = parse_name::<TranscodePreset>)]
    preset: Option<TranscodePreset>,

    /// keep_files, minimize or unique_clips
    #[arg(long, default_value = "keep_files", value_parser = parse_name::<OptimizationMode>)]
    optimization: OptimizationMode,

    /// flat, bins or original
    #[arg(long, default_value = "flat", value_parser = parse_name::<FolderStructure>)]
    folders: FolderStructure,

    /// both, proxy_only, main_only or preserve
    #[arg(long, default_value = "both", value_parser = parse_name::<ProxyMode>)]
    proxies: ProxyMode,

    #[arg(long, default_value = "0")]
    handles: u32,

    #[arg(long)]
    all_angles: bool,

    /// Overwrite-safe `_ppNNN` names are the default; this turns them off
    #[arg(long)]
    no_unique_names: bool,

    /// Name outputs after their master clip
    #[arg(long)]
    project_item_names: bool,

    /// Append `_{first}-{last}` frames to trimmed names
    #[arg(long)]
    frame_range: bool,

    #[arg(long)]
    no_sidecars: bool,

    /// Fail offline media instead of skipping them
    #[arg(long)]
    fail_offline: bool,
}

impl From<OptionArgs> for ConsolidationOptions {
    fn from(args: OptionArgs) -> Self {
        Self {
            output_path: args.output,
            sequences: args.sequence,
            processing_mode: args.mode,
            transcode_preset: args.preset,
            optimization_mode: args.optimization,
            folder_structure: args.folders,
            proxy_mode: args.proxies,
            handle_frames: args.handles,
            include_all_multicam_angles: args.all_angles,
            generate_unique_filenames: !args.no_unique_names,
            use_project_item_names: args.project_item_names,
            add_frame_range_to_filename: args.frame_range,
            copy_sidecar_files: !args.no_sidecars,
            skip_offline_media: !args.fail_offline,
        }
    }
}

/// Parse an option value by its serde name.
fn parse_name<T: DeserializeOwned>(value: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown value '{}'", value))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.config.clone().or_else(Config::default_path) {
        Some(path) => Config::from_file(&path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    let engine = ConsolidationEngine::new(config);

    match cli.command {
        Command::Info { project } => {
            let info = engine.get_project_info(&project).await?;
            if cli.json {
                return print_json(&info);
            }
            println!("📁 {} ({})", info.name, info.file_path.display());
            println!("  Version:   {}", info.version.as_deref().unwrap_or("unknown"));
            println!("  Sequences: {}", info.sequence_count);
            println!("  Media:     {}", info.media_count);
            println!("  Bins:      {}", info.bin_count);
        }
        Command::Sequences { project } => {
            let sequences = engine.get_sequences(&project).await?;
            if cli.json {
                return print_json(&sequences);
            }
            for s in &sequences {
                println!(
                    "{}  {}  {:.2}s @ {:.3} fps  V{} A{}  nested: {}",
                    s.object_id,
                    s.name,
                    s.duration_seconds,
                    s.frame_rate,
                    s.video_track_count,
                    s.audio_track_count,
                    s.nested_count
                );
            }
        }
        Command::Media { project } => {
            let media = engine.get_media_items(&project).await?;
            if cli.json {
                return print_json(&media);
            }
            for m in &media {
                let status = if m.is_online { "online " } else { "OFFLINE" };
                println!(
                    "{} {:>10}  {:<8} {}",
                    status,
                    m.file_size_formatted,
                    m.media_type,
                    m.file_path.display()
                );
            }
        }
        Command::Analyze {
            project,
            sequence,
            handles,
            all_angles,
        } => {
            let report = engine
                .analyze_media_usage(&project, &sequence, handles, all_angles)
                .await?;
            if cli.json {
                return print_json(&report);
            }
            println!(
                "📊 Used: {} ({}) | Unused: {} ({})",
                report.used_count,
                engine.format_file_size(report.used_size),
                report.unused_count,
                engine.format_file_size(report.unused_size)
            );
            for m in &report.used_media {
                println!(
                    "  {}  x{}  [{:.2}s - {:.2}s]",
                    m.file_name, m.usage_count, m.time_range_seconds[0], m.time_range_seconds[1]
                );
            }
            for warning in &report.warnings {
                warn!("{}", warning);
            }
        }
        Command::Estimate { project, options } => {
            let options = ConsolidationOptions::from(options);
            let bytes = engine.estimate_output_size(&project, &options).await?;
            if cli.json {
                return print_json(&serde_json::json!({ "bytes": bytes }));
            }
            println!("Estimated output size: {}", engine.format_file_size(bytes));
        }
        Command::Consolidate { project, options } => {
            let options = ConsolidationOptions::from(options);
            if !engine.validate_output_path(&options.output_path) {
                anyhow::bail!("Output path is not writable: {}", options.output_path.display());
            }
            let job_id = engine.start_consolidation(&project, options).await?;
            info!("Started job {}", job_id);

            let mut bar = (!cli.json).then(ProgressManager::new);
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            let mut interrupted = false;

            let progress = loop {
                let progress = engine.get_consolidation_progress(&job_id).await?;
                if let Some(bar) = bar.as_mut() {
                    bar.update(&progress);
                }
                if progress.status.is_terminal() {
                    break progress;
                }
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(500)) => {}
                    _ = &mut ctrl_c, if !interrupted => {
                        warn!("Interrupted, cancelling job {}", job_id);
                        interrupted = true;
                        engine.cancel_consolidation(&job_id).await?;
                    }
                }
            };

            match &bar {
                Some(bar) => bar.finish(&progress),
                None => print_json(&progress)?,
            }
            if progress.status == ConsolidationStatus::Failed {
                anyhow::bail!("Consolidation failed");
            }
        }
        Command::CheckFfmpeg => {
            let version = engine.check_ffmpeg().await.map_err(|e| {
                anyhow::anyhow!("{}\n{}", e, ToolPathResolver::install_instructions("ffmpeg"))
            })?;
            if cli.json {
                return print_json(&serde_json::json!({ "version": version }));
            }
            println!("✅ {}", version);
        }
    }

    Ok(())
}
