mod config;
mod github;
mod markdown;
mod pr;

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use pr::PrError;

/// pr2md: fetch a GitHub pull request (description, comments, reviews and
/// file changes) and convert it into a single Markdown summary.
#[derive(Parser, Debug)]
#[command(name = "pr2md", version, about)]
struct Cli {
    /// GitHub Pull Request URL (e.g., https://github.com/owner/repo/pull/123)
    pr_url: String,

    /// GitHub token (optional, but recommended to avoid rate-limiting).
    /// Falls back to the config file, then GITHUB_TOKEN.
    #[arg(short, long)]
    token: Option<String>,

    /// Write the markdown to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save as PR_<number>.md in the current directory
    #[arg(short, long, conflicts_with = "output")]
    download: bool,

    /// REST endpoint, for GitHub Enterprise (default: https://api.github.com)
    #[arg(long)]
    api_base: Option<String>,

    /// Give up fetching after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Suppress progress messages on stderr
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", user_message(err.as_ref()).red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let _main_span = info_span!("pr2md", pr_url = %cli.pr_url).entered();

    info!("parsing PR URL");
    let pull_ref = pr::parse_pr_url(&cli.pr_url)?;
    debug!(owner = %pull_ref.owner, repo = %pull_ref.repo, pr = pull_ref.number, "parsed PR URL");

    info!("loading configuration");
    let config = config::Config::load()?;
    let token = cli.token.clone().or_else(|| config.github_token());
    let api_base = cli.api_base.as_deref().unwrap_or(config.api_base());
    let timeout = cli.timeout.map(Duration::from_secs).unwrap_or(config.timeout());

    if !cli.quiet {
        eprintln!(
            "{}",
            format!(
                "Fetching PR #{} from {}/{} ...",
                pull_ref.number, pull_ref.owner, pull_ref.repo
            )
            .cyan()
        );
    }

    let session = github::GitHubSession::new(token.as_deref(), api_base)
        .map_err(|e| PrError::FetchFailure(e.to_string()))?;
    let md_content = markdown::assemble_within(&session, &pull_ref, timeout).await?;
    info!(bytes = md_content.len(), "assembled markdown");

    let output_path = if cli.download {
        Some(PathBuf::from(markdown::suggested_file_name(&pull_ref)))
    } else {
        cli.output.clone()
    };
    markdown::output(&md_content, output_path.as_deref())?;

    if let (Some(path), false) = (&output_path, cli.quiet) {
        eprintln!(
            "{}",
            format!("Saved {} ({})", path.display(), markdown::MARKDOWN_MIME).green()
        );
    }
    info!("done");

    Ok(())
}

/// The line shown to the user for a failed run.
fn user_message(err: &(dyn std::error::Error + 'static)) -> String {
    match err.downcast_ref::<PrError>() {
        Some(PrError::InvalidUrlFormat(_)) => {
            "Invalid PR URL format. Please use a URL like https://github.com/owner/repo/pull/123"
                .to_string()
        }
        Some(PrError::FetchFailure(message)) => {
            format!("An error occurred while fetching the PR: {}", message)
        }
        None => err.to_string(),
    }
}
