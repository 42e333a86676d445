//! CLI for publishing a markdown file to note.com
//!
//! `post` runs the full workflow (browser login, images, draft, publish);
//! `render` converts a file offline and prints the editor HTML.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use note_publisher::markdown::{estimate_length, render_html};
use note_publisher::{
    write_back_note_id, Config, Document, DocumentOverrides, EventLevel, PublishEvent,
    PublishReport,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "note-publish")]
#[command(about = "Publish markdown documents to note.com")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update an article from a markdown file
    Post {
        file: PathBuf,

        /// Article title (overrides front matter and the first heading)
        #[arg(long)]
        title: Option<String>,

        /// Cover image URL or local path
        #[arg(long)]
        image: Option<String>,

        /// Publish after saving the draft
        #[arg(long)]
        publish: bool,

        /// Show the browser window during login
        #[arg(long)]
        show_browser: bool,

        /// Store the article id in the file's front matter
        #[arg(long)]
        write_back: bool,

        /// Skip draft version verification
        #[arg(long)]
        no_verify_version: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print rendered HTML and body length without contacting note.com
    Render { file: PathBuf },
}

#[derive(Serialize)]
struct JsonReport<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    article: Option<&'a note_publisher::PublishedArticle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    events: &'a [PublishEvent],
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,note_publisher=debug,note_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render { file } => render(&file),
        Commands::Post {
            file,
            title,
            image,
            publish,
            show_browser,
            write_back,
            no_verify_version,
            json,
        } => {
            let overrides = DocumentOverrides {
                title,
                eyecatch_url: image,
                publish,
            };
            post(
                &file,
                &overrides,
                PostFlags {
                    show_browser,
                    write_back,
                    verify_version: !no_verify_version,
                    json,
                },
            )
            .await
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn render(file: &Path) -> Result<bool> {
    let document = Document::load(file, &DocumentOverrides::default())
        .with_context(|| format!("Failed to load {}", file.display()))?;

    println!("{}", render_html(&document.body));
    eprintln!(
        "{} {} ({} characters)",
        "✓".green(),
        document.title.bold(),
        estimate_length(&document.body)
    );
    Ok(true)
}

struct PostFlags {
    show_browser: bool,
    write_back: bool,
    verify_version: bool,
    json: bool,
}

async fn post(file: &Path, overrides: &DocumentOverrides, flags: PostFlags) -> Result<bool> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let document = Document::load(file, overrides)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    if !flags.json {
        println!("{} {}", "→".blue(), document.title.bold());
    }

    let report = run_publisher(&config, &document, &flags).await?;

    if flags.json {
        print_json(&report)?;
    } else {
        print_events(&report);
    }

    let article = match &report.outcome {
        Ok(article) => article,
        Err(e) => {
            if !flags.json {
                eprintln!("{} {}", "✗ Publishing failed:".red().bold(), e);
            }
            return Ok(false);
        }
    };

    if flags.write_back && document.note_id.as_deref() != Some(article.id.as_str()) {
        let changed = write_back_note_id(file, &article.id)
            .with_context(|| format!("Failed to write note_id to {}", file.display()))?;
        if changed && !flags.json {
            println!("{} note_id {} saved to {}", "✓".green(), article.id, file.display());
        }
    }

    if !flags.json {
        let status = if article.published { "Published" } else { "Draft saved" };
        println!("{} {}: {}", "✓".green().bold(), status, article.url.underline());
    }
    Ok(true)
}

#[cfg(feature = "browser")]
async fn run_publisher(
    config: &Config,
    document: &Document,
    flags: &PostFlags,
) -> Result<PublishReport> {
    use note_client::{NoteClient, Timeouts};
    use note_publisher::auth::BrowserAuthenticator;
    use note_publisher::{PublishOptions, Publisher};

    let timeouts = Timeouts {
        api: config.http_timeout,
        ..Timeouts::default()
    };
    let client = NoteClient::with_timeouts(timeouts)
        .context("Failed to create HTTP client")?
        .with_base_url(config.base_url.clone());
    let auth = BrowserAuthenticator::new()
        .with_base_url(config.base_url.clone())
        .show_browser(flags.show_browser || config.show_browser);

    let options = PublishOptions {
        verify_version: flags.verify_version,
        site_url: config.base_url.clone(),
        ..PublishOptions::default()
    };

    let publisher = Publisher::new(client, auth).with_options(options);
    Ok(publisher.run(document, &config.credentials()).await)
}

#[cfg(not(feature = "browser"))]
async fn run_publisher(
    _config: &Config,
    _document: &Document,
    _flags: &PostFlags,
) -> Result<PublishReport> {
    anyhow::bail!("note-publish was built without the `browser` feature; login is unavailable")
}

fn print_events(report: &PublishReport) {
    for event in report.events.events() {
        let tag = format!("[{}]", event.step);
        match event.level {
            EventLevel::Debug => {}
            EventLevel::Info => println!("  {} {}", tag.dimmed(), event.message),
            EventLevel::Warn => println!("  {} {}", tag.yellow(), event.message.yellow()),
            EventLevel::Error => println!("  {} {}", tag.red(), event.message.red()),
        }
    }
}

fn print_json(report: &PublishReport) -> Result<()> {
    let body = JsonReport {
        success: report.is_success(),
        article: report.outcome.as_ref().ok(),
        error: report.outcome.as_ref().err().map(|e| e.to_string()),
        events: report.events.events(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&body).context("Failed to serialize report")?
    );
    Ok(())
}
