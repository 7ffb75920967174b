use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use citeverify_core::config_file::{self, ConfigFile};
use citeverify_core::{CitationStyle, Config, VerifyEvent, VerifyStats};
use citeverify_parsing::CitationExtractor;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Citation verifier - check Japanese and English citations against literature databases
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify citations (one per line) and print corrected versions
    Verify {
        /// File with one citation per line (stdin if omitted or "-")
        file: Option<PathBuf>,

        /// Output citation style: apa, mla or chicago
        #[arg(long)]
        style: Option<CitationStyle>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Comma-separated list of sources to disable
        #[arg(long, value_delimiter = ',')]
        disable_sources: Vec<String>,

        /// Contact address for the CrossRef polite pool
        #[arg(long)]
        mailto: Option<String>,

        /// Semantic Scholar API key
        #[arg(long)]
        s2_api_key: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Config file to use instead of the platform and working-directory files
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Parse citations without querying any source
    Parse {
        /// File with one citation per line (stdin if omitted or "-")
        file: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Config file to use instead of the platform and working-directory files
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Verify {
            file,
            style,
            json,
            no_color,
            disable_sources,
            mailto,
            s2_api_key,
            timeout,
            config,
        } => {
            let file_config = load_file_config(config.as_deref())?;
            let style = match style {
                Some(style) => style,
                None => file_style(&file_config)?,
            };
            let mut config = build_config(&file_config)?;

            // CLI flags override env vars and config files
            if let Some(mailto) = mailto {
                config.crossref_mailto = Some(mailto);
            }
            if let Some(key) = s2_api_key {
                config.s2_api_key = Some(key);
            }
            if let Some(secs) = timeout {
                config.timeout_secs = secs;
            }
            config.disabled_sources.extend(disable_sources);
            config.refresh_rate_limiters();

            verify(file, config, style, json, color_mode(no_color)).await
        }
        Command::Parse {
            file,
            json,
            no_color,
            config,
        } => {
            let file_config = load_file_config(config.as_deref())?;
            let config = build_config(&file_config)?;
            parse(file, config, json, color_mode(no_color))
        }
    }
}

fn color_mode(no_color: bool) -> ColorMode {
    ColorMode(!no_color && std::io::stdout().is_terminal())
}

fn load_file_config(path: Option<&Path>) -> anyhow::Result<ConfigFile> {
    match path {
        Some(path) => config_file::load_from_path(path)?
            .with_context(|| format!("config file not found: {}", path.display())),
        None => Ok(config_file::load_config()?),
    }
}

fn file_style(file_config: &ConfigFile) -> anyhow::Result<CitationStyle> {
    match file_config.output.as_ref().and_then(|o| o.style.as_deref()) {
        Some(style) => style.parse().map_err(anyhow::Error::msg),
        None => Ok(CitationStyle::default()),
    }
}

/// Resolve configuration: config files, then env vars. Flags are applied by the caller.
fn build_config(file_config: &ConfigFile) -> anyhow::Result<Config> {
    let mut config = Config::default();
    file_config.apply(&mut config)?;

    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    if let Some(key) = env("S2_API_KEY") {
        config.s2_api_key = Some(key);
    }
    if let Some(mailto) = env("CROSSREF_MAILTO") {
        config.crossref_mailto = Some(mailto);
    }
    if let Some(key) = env("GOOGLE_BOOKS_API_KEY") {
        config.google_books_api_key = Some(key);
    }
    if let Some(appid) = env("CINII_APPID") {
        config.cinii_appid = Some(appid);
    }
    if let Some(secs) = env("CITEVERIFY_TIMEOUT").and_then(|v| v.parse().ok()) {
        config.timeout_secs = secs;
    }
    config.refresh_rate_limiters();

    tracing::debug!(?config, "resolved configuration");
    Ok(config)
}

/// Read citation lines from a file or stdin, skipping blank lines.
fn read_lines(file: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let lines: Vec<String> = match file {
        Some(path) if path != Path::new("-") => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            content.lines().map(str::to_string).collect()
        }
        _ => std::io::stdin()
            .lock()
            .lines()
            .collect::<Result<_, _>>()
            .context("failed to read stdin")?,
    };
    Ok(lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

async fn verify(
    file: Option<PathBuf>,
    config: Config,
    style: CitationStyle,
    json: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    let lines = read_lines(file.as_deref())?;
    if lines.is_empty() {
        eprintln!("No citations to verify.");
        return Ok(());
    }

    let bar = if std::io::stderr().is_terminal() {
        let bar = indicatif::ProgressBar::new(lines.len() as u64);
        bar.set_style(
            indicatif::ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.cyan/dim}] {pos}/{len} {msg}",
            )?
            .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    } else {
        indicatif::ProgressBar::hidden()
    };

    let stdout = Mutex::new(std::io::stdout());
    let progress = |event: VerifyEvent| match event {
        VerifyEvent::Checking { line, .. } => {
            bar.set_message(output::truncate(&line, 40));
        }
        VerifyEvent::Source {
            source, progress, ..
        } => {
            if let citeverify_core::SourceProgress::Searching = progress {
                bar.set_message(format!("searching {source}"));
            }
        }
        VerifyEvent::Result { index, result, .. } => {
            bar.inc(1);
            if !json {
                bar.suspend(|| {
                    if let Ok(mut w) = stdout.lock() {
                        let _ = output::print_result(&mut *w, index, &result, color);
                        let _ = w.flush();
                    }
                });
            }
        }
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let results = citeverify_core::verify_lines(lines, config, style, progress, cancel).await?;
    bar.finish_and_clear();

    let mut out = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &results)?;
        writeln!(out)?;
    } else {
        output::print_summary(&mut out, &VerifyStats::from_results(&results), color)?;
    }
    Ok(())
}

fn parse(file: Option<PathBuf>, config: Config, json: bool, color: ColorMode) -> anyhow::Result<()> {
    let lines = read_lines(file.as_deref())?;
    let extractor = CitationExtractor::with_config(config.parsing);
    let parsed: Vec<_> = lines.iter().map(|l| extractor.parse(l)).collect();

    let mut out = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &parsed)?;
        writeln!(out)?;
    } else {
        for (i, p) in parsed.iter().enumerate() {
            output::print_parsed(&mut out, i, p, color)?;
        }
        writeln!(out, "Total: {} citations", parsed.len())?;
    }
    Ok(())
}
