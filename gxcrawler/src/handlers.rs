use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::ArgMatches;
use colored::Colorize;
use gxcrawler_core::config::ConfigSource;
use gxcrawler_core::crawl::{CrawlOptions, execute_crawl};
use gxcrawler_core::data::Database;
use gxcrawler_core::report::{ReportFormat, generate_crawl_report};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DB_PATH: &str = "~/.config/gxcrawler/gxcrawler.db";

const BANNER: &str = r#"
   __ ___  __                    __
  / _` \ \/ / ___ _ __ __ ___ __ _| | ___ _ __
 | (_| |>  < / __| '__/ _` \ \ /\ / / |/ _ \ '__|
  \__, /_/\_\ (__| | | (_| |\ V  V /| |  __/ |
  |___/      \___|_|  \__,_| \_/\_/ |_|\___|_|
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} v{}\n",
        "GeneXus Server revision crawler".bright_white(),
        env!("CARGO_PKG_VERSION")
    );
}

/// The banner is skipped under `--quiet` and when stdout carries JSON.
pub fn wants_banner(matches: &ArgMatches) -> bool {
    if matches.get_flag("quiet") {
        return false;
    }
    match matches.subcommand() {
        Some(("show", show)) => {
            show.get_one::<String>("format").map(String::as_str) != Some("json")
        }
        _ => true,
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `warn` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Calendar dates are given as `YYYY-MM-DD`.
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}' (expected YYYY-MM-DD): {}", value, e))
}

pub fn expand_db_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// `--config` wins over `--env`; neither means environment then `./.env`.
pub fn config_source_from_args(config: Option<&PathBuf>, env: bool) -> ConfigSource {
    match (config, env) {
        (Some(path), _) => ConfigSource::File(path.clone()),
        (None, true) => ConfigSource::Environment,
        (None, false) => ConfigSource::Auto,
    }
}

/// Read revisions back from the store and render them.
pub fn render_stored_revisions(
    db_path: &Path,
    build: Option<i64>,
    limit: usize,
    format: ReportFormat,
) -> Result<String> {
    if !Database::exists(db_path) {
        bail!(
            "no database at {} (run `gxcrawler init` first)",
            db_path.display()
        );
    }
    let db = Database::new(db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    let revisions = match build {
        Some(build) => match db.get_revision(build)? {
            Some(revision) => vec![revision],
            None => bail!("build {} is not stored", build),
        },
        None => db.list_revisions(limit)?,
    };

    Ok(generate_crawl_report(&revisions, format)?)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn db_path_arg(args: &ArgMatches) -> PathBuf {
    let raw = args
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or(DEFAULT_DB_PATH);
    expand_db_path(raw)
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  GXCRAWLER INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let db_path = db_path_arg(args);
    let force = args.get_flag("force");

    println!(
        "{} Target: {}",
        "→".blue(),
        db_path.display().to_string().bright_white()
    );
    println!();

    if Database::exists(&db_path) {
        if !force {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!("A database already exists and will be replaced.");
            let response = print_prompt("Do you want to continue? [y/N]:")?;
            if response != "y" && response != "yes" {
                println!("\n{}", "Initialization cancelled.".yellow());
                return Ok(());
            }
        }
        Database::drop(&db_path)
            .with_context(|| format!("failed to remove {}", db_path.display()))?;
        println!("{} Removed existing database", "✓".green().bold());
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let db = Database::new(&db_path)
        .with_context(|| format!("failed to create database at {}", db_path.display()))?;
    drop(db);

    println!("{} Database: {}", "✓".green().bold(), db_path.display());
    println!();
    println!("{}", "Initialization complete!".bright_green().bold());
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let database_path = db_path_arg(args);
    let config_source =
        config_source_from_args(args.get_one::<PathBuf>("config"), args.get_flag("env"));
    let start = args.get_one::<NaiveDate>("from").copied();
    let end = args.get_one::<NaiveDate>("to").copied();
    let timeout_secs = *args.get_one::<u64>("timeout").unwrap_or(&30);
    debug!("Configuration source: {:?}", config_source);

    if let Some(parent) = database_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let range = match (start, end) {
        (Some(start), Some(end)) => format!("{} to {}", start, end),
        (None, None) => "today".to_string(),
        _ => {
            println!(
                "{} Both --from and --to are needed for a range; crawling today only",
                "⚠".yellow().bold()
            );
            "today".to_string()
        }
    };
    println!(
        "\n{} Crawling revisions from {}",
        "→".blue(),
        range.as_str().bright_white()
    );
    println!("Database: {}\n", database_path.display());

    let options = CrawlOptions {
        config_source,
        database_path,
        start,
        end,
        timeout_secs,
        show_progress_bars: true,
    };

    let summary = match execute_crawl(options, None).await {
        Ok(summary) => summary,
        Err(e) if e.is_interrupted() => {
            println!("\n{}", "Crawl interrupted, nothing stored.".yellow());
            return Err(e.into());
        }
        Err(e) => return Err(e).context("crawl failed"),
    };

    println!();
    print_divider();
    println!(
        "{} Range:      {} to {}",
        "✓".green().bold(),
        summary.range.start,
        summary.range.end
    );
    println!("{} Pages:      {}", "✓".green().bold(), summary.pages);
    println!("{} Revisions:  {}", "✓".green().bold(), summary.revisions);
    println!("{} Objects:    {}", "✓".green().bold(), summary.objects);
    println!(
        "{} Database:   {}",
        "✓".green().bold(),
        summary.database_path.display()
    );
    print_divider();
    Ok(())
}

pub fn handle_show(args: &ArgMatches) -> Result<()> {
    let db_path = db_path_arg(args);
    let build = args.get_one::<i64>("build").copied();
    let limit = *args.get_one::<usize>("limit").unwrap_or(&20);
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    let report = render_stored_revisions(&db_path, build, limit, format)?;
    println!("{}", report);
    Ok(())
}
