use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hgtrace::config::Config;
use hgtrace::hg::{split_diff, FileChange, FileStatus, HgClient, IssueId, MatchMode, RepoLocation};
use hgtrace::llm::{ChangedFile, LlmClient, ModificationWriter};
use hgtrace::report::{file_changes_summary, ReportPeriod};
use hgtrace::server;

const CONFIG_FILE: &str = "hgtrace.toml";

#[derive(Parser)]
#[command(name = "hgtrace")]
#[command(about = "Resolve tracker issues to Mercurial changesets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: hgtrace.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API used by the browser extension
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the most recent changeset referencing an issue
    Changeset {
        issue: String,

        /// Repository path
        #[arg(short, long)]
        repo: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List files changed for an issue
    Files {
        issue: String,

        /// Repository path
        #[arg(short, long)]
        repo: String,

        /// Merge files from every matching changeset, not just the latest
        #[arg(long)]
        all: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the diff of the most recent changeset referencing an issue
    Diff {
        issue: String,

        /// Repository path
        #[arg(short, long)]
        repo: String,

        /// Print only the names of the files in the diff
        #[arg(long)]
        split: bool,
    },

    /// List every issue id mentioned in the repository log
    Issues {
        /// Repository path
        #[arg(short, long)]
        repo: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Draft a modification note for an issue with the configured LLM
    Summarize {
        issue: String,

        /// Repository path
        #[arg(short, long)]
        repo: String,

        /// Use files from every matching changeset
        #[arg(long)]
        all: bool,

        /// Issue description passed to the model
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Show the weekly reporting period (Thursday to Wednesday)
    Period {
        /// Any date inside the period, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Without RUST_LOG the server logs at INFO, one-shot commands only warn
    let default_level = if cli.verbose {
        Level::DEBUG
    } else if matches!(cli.command, Commands::Serve { .. }) {
        Level::INFO
    } else {
        Level::WARN
    };
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(rust_log.as_deref(), default_level))
        .try_init();

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = if cli.config.is_some() {
        Config::load(&config_path)?
    } else {
        Config::load_or_default(&config_path)?
    };

    match cli.command {
        Commands::Serve { port } => cmd_serve(config, port),
        Commands::Changeset { issue, repo, json } => cmd_changeset(&config, &issue, &repo, json),
        Commands::Files { issue, repo, all, json } => cmd_files(&config, &issue, &repo, all, json),
        Commands::Diff { issue, repo, split } => cmd_diff(&config, &issue, &repo, split),
        Commands::Issues { repo, json } => cmd_issues(&config, &repo, json),
        Commands::Summarize { issue, repo, all, description } => {
            cmd_summarize(&config, &issue, &repo, all, &description)
        }
        Commands::Period { date } => cmd_period(date.as_deref()),
    }
}

/// `RUST_LOG` directives when set, otherwise `default_level` for everything
fn log_filter(rust_log: Option<&str>, default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .parse_lossy(rust_log.unwrap_or_default())
}

fn parse_target(issue: &str, repo: &str) -> Result<(IssueId, RepoLocation)> {
    let issue = IssueId::parse(issue)?;
    let repo = RepoLocation::new(repo)?;
    Ok((issue, repo))
}

fn status_colored(status: &FileStatus) -> colored::ColoredString {
    let code = status.code().to_string();
    match status {
        FileStatus::Added => code.green(),
        FileStatus::Deleted => code.red(),
        FileStatus::Modified => code.yellow(),
        FileStatus::Other(_) => code.magenta(),
    }
}

fn print_files(files: &[FileChange]) {
    for file in files {
        println!(
            "  {} {} {}",
            status_colored(&file.status),
            file.path,
            format!("(r{})", file.revision).dimmed()
        );
    }
}

#[tokio::main]
async fn cmd_serve(mut config: Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("{}", "━".repeat(50).dimmed());
    println!("  {} {}", "hgtrace".bold().cyan(), env!("CARGO_PKG_VERSION").dimmed());
    println!("{}", "━".repeat(50).dimmed());

    server::start_server(&config).await
}

#[tokio::main]
async fn cmd_changeset(config: &Config, issue: &str, repo: &str, json: bool) -> Result<()> {
    let (issue, repo) = parse_target(issue, repo)?;
    let hg = HgClient::from_config(&config.hg);

    let Some(changeset) = hg.changeset(&issue, &repo).await else {
        anyhow::bail!("No changeset references issue {} in {}", issue, repo);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&changeset)?);
        return Ok(());
    }

    let commit = &changeset.commit;
    println!(
        "\n{} {}:{}  {}",
        "●".cyan(),
        commit.revision.to_string().bold(),
        commit.short_hash.yellow(),
        commit.summary
    );
    println!("  {} {}", "author:".dimmed(), commit.author);
    println!("  {} {}", "date:".dimmed(), commit.date);
    println!("\n{}", "Files:".bold());
    print_files(&changeset.files);
    println!();

    Ok(())
}

#[tokio::main]
async fn cmd_files(config: &Config, issue: &str, repo: &str, all: bool, json: bool) -> Result<()> {
    let (issue, repo) = parse_target(issue, repo)?;
    let hg = HgClient::from_config(&config.hg);
    let files = hg.files(&issue, &repo, MatchMode::from_all_history(all)).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    if files.is_empty() {
        println!("  {}", format!("No files found for issue {}", issue).dimmed());
        return Ok(());
    }

    println!("\n{} {} file(s) for issue {}\n", "📄".cyan(), files.len(), issue.to_string().bold());
    print_files(&files);
    println!("\n{}", "Summary:".bold());
    println!("{}", file_changes_summary(&files));

    Ok(())
}

#[tokio::main]
async fn cmd_diff(config: &Config, issue: &str, repo: &str, split: bool) -> Result<()> {
    let (issue, repo) = parse_target(issue, repo)?;
    let hg = HgClient::from_config(&config.hg);
    let diff = hg.diff_for_latest_match(&issue, &repo).await;

    if diff.is_empty() {
        println!("  {}", format!("No diff found for issue {}", issue).dimmed());
        return Ok(());
    }

    if split {
        for file in split_diff(&diff) {
            let lines = file.content.lines().count();
            println!("  {} {}", file.filename, format!("({} lines)", lines).dimmed());
        }
    } else {
        print!("{}", diff);
    }

    Ok(())
}

#[tokio::main]
async fn cmd_issues(config: &Config, repo: &str, json: bool) -> Result<()> {
    let repo = RepoLocation::new(repo)?;
    let hg = HgClient::from_config(&config.hg);
    let issues = hg.scan_all_issue_ids(&repo).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
    } else if issues.is_empty() {
        println!("  {}", "No issue references found".dimmed());
    } else {
        println!("\n{} {} issue(s) referenced\n", "🔎".cyan(), issues.len());
        println!("  {}", issues.join(", "));
    }

    Ok(())
}

#[tokio::main]
async fn cmd_summarize(config: &Config, issue: &str, repo: &str, all: bool, description: &str) -> Result<()> {
    let llm = config
        .llm
        .as_ref()
        .context("No [llm] section in the config file")?;
    let writer = ModificationWriter::new(LlmClient::new(llm)?);

    let (issue, repo) = parse_target(issue, repo)?;
    let hg = HgClient::from_config(&config.hg);
    let files = hg.files(&issue, &repo, MatchMode::from_all_history(all)).await;
    let changed: Vec<ChangedFile> = files.iter().map(ChangedFile::from).collect();

    let note = writer.generate(&changed, description).await?;
    println!("{}", note);

    Ok(())
}

fn cmd_period(date: Option<&str>) -> Result<()> {
    let period = match date {
        Some(date) => {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date))?;
            ReportPeriod::containing(date)
        }
        None => ReportPeriod::current(),
    };

    println!("{}", period.label());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_overrides_default_level() {
        assert_eq!(log_filter(Some("debug"), Level::WARN).to_string(), "debug");
        assert_eq!(
            log_filter(Some("hgtrace=trace"), Level::WARN).to_string(),
            "hgtrace=trace"
        );
    }

    #[test]
    fn test_default_level_without_rust_log() {
        assert_eq!(log_filter(None, Level::INFO).to_string(), "info");
        assert_eq!(log_filter(Some(""), Level::WARN).to_string(), "warn");
    }
}
