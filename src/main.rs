// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

use dualsub::app_config::{self, Config, TranslationProvider};
use dualsub::providers::MockClient;
use dualsub::subtitle_merger::{RawCue, SubtitleMerger};
use dualsub::session::derive_video_id;
use dualsub::translation::{RunOutcome, SchedulerHandle, TranslationCache};
use dualsub::{EventBus, Orchestrator, PipelineEvent};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    OpenAI,
    Anthropic,
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge a caption file into subtitle groups and print them as JSON
    Merge {
        #[command(flatten)]
        captions: CaptionArgs,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge and translate a caption file
    Translate(TranslateArgs),

    /// Manage the durable translation cache
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Generate shell completions for dualsub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Forget the cached translations of one or more videos
    Clear {
        /// Video URL or id, repeatable
        #[arg(long = "video", required = true)]
        videos: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
struct CaptionArgs {
    /// JSON file of {start, duration, text} caption triples
    #[arg(value_name = "CAPTIONS")]
    captions: PathBuf,

    /// Caption times are in seconds rather than milliseconds
    #[arg(long)]
    seconds: bool,
}

#[derive(clap::Args, Debug)]
struct TranslateArgs {
    #[command(flatten)]
    captions: CaptionArgs,

    /// Video URL or id the captions belong to
    #[arg(long)]
    video: String,

    /// Stay paused until 'r' is entered
    #[arg(long)]
    wait: bool,

    /// Write translated subtitles here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use the built-in mock backend instead of a real provider
    #[arg(long)]
    mock: bool,
}

/// dualsub - bilingual subtitles through resilient batch translation
#[derive(Parser, Debug)]
#[command(name = "dualsub")]
#[command(version)]
#[command(about = "Merge caption streams and translate them in resilient batches")]
#[command(long_about = "dualsub merges raw timed captions into readable subtitle groups and translates them
through an LLM provider in ordered, retryable, cached batches.

EXAMPLES:
    dualsub merge captions.json                          # Print merged subtitles
    dualsub translate captions.json --video dQw4w9WgXcQ  # Translate with the configured provider
    dualsub translate captions.json --video URL --wait   # Start paused, control with p/r/a + Enter
    dualsub -p openai -t ja translate captions.json --video URL
    dualsub cache clear --video URL --video ID           # Forget cached translations
    dualsub completions bash > dualsub.bash              # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: PathBuf,

    /// Translation provider to use
    #[arg(short, long, value_enum, global = true)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Target language code (e.g., 'zh', 'ja', 'fr')
    #[arg(short, long, global = true)]
    target_language: Option<String>,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    /// ANSI colour and tag for a level
    fn style(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "ERROR"),
            Level::Warn => ("1;33", "WARN "),
            Level::Info => ("1;32", "INFO "),
            Level::Debug => ("1;36", "DEBUG"),
            Level::Trace => ("1;35", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, tag) = Self::style(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                colour,
                now,
                tag,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "dualsub", &mut std::io::stdout());
            Ok(())
        }
        Commands::Merge { ref captions, ref output } => {
            let config = load_config(&cli, false)?;
            run_merge(&config, captions, output.as_deref())
        }
        Commands::Translate(ref args) => {
            let config = load_config(&cli, !args.mock)?;
            run_translate(config, args).await
        }
        Commands::Cache {
            action: CacheCommands::Clear { ref videos },
        } => {
            let config = load_config(&cli, false)?;
            let store = Orchestrator::open_store(&config)?;
            let cache = TranslationCache::with_store(store, config.storage.key_prefix.clone());
            let video_ids: Vec<String> = videos.iter().map(|v| derive_video_id(v)).collect();
            let cleared = join_all(video_ids.iter().map(|id| cache.clear_session(id))).await;

            for (video_id, was_cached) in video_ids.iter().zip(cleared) {
                if was_cached {
                    info!("Cleared cached translations for '{}'", video_id);
                } else {
                    warn!("No cached translations found for '{}'", video_id);
                }
            }
            Ok(())
        }
    }
}

/// Load the config file and apply command line overrides
fn load_config(cli: &CommandLineOptions, require_provider: bool) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config_path)?;

    if let Some(provider) = &cli.provider {
        config.translation.provider = provider.clone().into();
    }

    if let Some(model) = &cli.model {
        config.translation.active_provider_mut().model = model.clone();
    }

    if let Some(target_language) = &cli.target_language {
        config.target_language = target_language.clone();
    }

    match &cli.log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    if require_provider {
        config.validate().context("Configuration validation failed")?;
    } else {
        dualsub::language_utils::validate_language_code(&config.target_language)?;
    }

    Ok(config)
}

/// Read a caption file, rescaling second-based times to milliseconds
fn load_captions(args: &CaptionArgs) -> Result<Vec<RawCue>> {
    let content = std::fs::read_to_string(&args.captions)
        .with_context(|| format!("Failed to read caption file: {}", args.captions.display()))?;
    let cues: Vec<RawCue> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse caption file: {}", args.captions.display()))?;

    debug!("Read {} caption cues from {}", cues.len(), args.captions.display());

    Ok(if args.seconds {
        cues.into_iter().map(|cue| cue.scaled(1000.0)).collect()
    } else {
        cues
    })
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Success: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn run_merge(config: &Config, captions: &CaptionArgs, output: Option<&Path>) -> Result<()> {
    let cues = load_captions(captions)?;
    let groups = SubtitleMerger::new(config.merge.clone()).merge(&cues);
    info!("Merged {} cues into {} subtitles", cues.len(), groups.len());
    write_json(&groups, output)
}

async fn run_translate(mut config: Config, args: &TranslateArgs) -> Result<()> {
    let cues = load_captions(&args.captions)?;
    config.scheduler.start_paused = args.wait;

    let mut orchestrator = if args.mock {
        info!("Using the mock translation backend");
        let store = Orchestrator::open_store(&config)?;
        Orchestrator::with_parts(config, Arc::new(MockClient::working()), store)
    } else {
        Orchestrator::from_config(config)?
    };

    let progress = spawn_progress(orchestrator.events());
    let total = orchestrator.load_video(&args.video, &cues).groups().len();
    if total == 0 {
        warn!("No subtitles to translate");
    }

    let handle = orchestrator
        .handle()
        .ok_or_else(|| anyhow!("No scheduler for the loaded video"))?;
    spawn_stdin_control(handle);
    if args.wait {
        info!("Paused. Enter 'r' to start, 'p' to pause, 'a' to abort");
    }

    let started = std::time::Instant::now();
    let result = orchestrator.translate().await;

    progress.abort();

    match result? {
        RunOutcome::Aborted => {
            warn!("Translation aborted, nothing was persisted");
            return Ok(());
        }
        RunOutcome::CacheHit => info!("All {} subtitles served from the session cache", total),
        RunOutcome::Completed => info!(
            "Translated {} subtitles in {}",
            total,
            format_duration(started.elapsed())
        ),
    }

    write_json(&orchestrator.translated_subtitles(), args.output.as_deref())
}

/// Mirror status events onto a progress bar
fn spawn_progress(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    let progress_bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} subtitles ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(PipelineEvent::ProcessingStatusUpdated(status)) => {
                    progress_bar.set_length(status.total as u64);
                    progress_bar.set_position(status.processed as u64);
                    progress_bar.set_message(if status.is_paused { "paused" } else { "translating" });
                    if !status.is_processing {
                        progress_bar.finish_and_clear();
                    }
                }
                Ok(PipelineEvent::TranslationCompleted {
                    original_text,
                    translated_data,
                }) => debug!("{} => {}", original_text, translated_data.translation),
                Ok(PipelineEvent::ProcessingFailed { message }) => {
                    progress_bar.abandon();
                    error!("{}", message);
                }
                Ok(PipelineEvent::SubtitlesUpdated(groups)) => debug!("{} subtitles loaded", groups.len()),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Progress display skipped {} events", skipped)
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Pause, resume and abort from stdin lines.
///
/// Runs on a detached thread so a pending read never holds up shutdown.
fn spawn_stdin_control(handle: SchedulerHandle) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "p" | "pause" => {
                    handle.pause();
                }
                "r" | "resume" => {
                    handle.resume();
                }
                "a" | "abort" => {
                    handle.abort();
                }
                "" => {}
                other => warn!("Unknown command '{}', use p, r or a", other),
            }
        }
    });
}

fn format_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;

    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, duration.subsec_millis())
    }
}
