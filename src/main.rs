use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::future::join_all;
use tracing::info;

use perspective::config::Config;
use perspective::models::{AnalysisResponse, AnalyzeRequest, AttributeName};

/// Perspective: score text for toxicity with Google's Perspective API.
///
/// Requests are paced client-side to stay within the project's quota.
#[derive(Parser)]
#[command(name = "perspective", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one or more texts
    Analyze {
        /// Texts to score; each one is a separate request
        #[arg(required = true)]
        texts: Vec<String>,

        /// Attribute to request, repeatable (default: the six stable attributes)
        #[arg(long = "attribute", short = 'a')]
        attributes: Vec<AttributeName>,

        /// Language of the text, repeatable (default: auto-detect)
        #[arg(long = "language", short = 'l')]
        languages: Vec<String>,

        /// Ask Perspective not to store the text
        #[arg(long)]
        do_not_store: bool,

        /// Print the raw scores as JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the attributes Perspective can score
    Attributes,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("perspective=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            texts,
            attributes,
            languages,
            do_not_store,
            json,
        } => {
            let mut config = Config::load()?;
            config.do_not_store |= do_not_store;
            let client = config.client()?;

            let attributes = if attributes.is_empty() {
                AttributeName::STABLE.to_vec()
            } else {
                attributes
            };

            info!(
                count = texts.len(),
                qps = config.qps,
                "Analyzing {} text(s)",
                texts.len()
            );

            // Every request is queued up front; the client's gate paces them.
            let requests: Vec<AnalyzeRequest> = texts
                .iter()
                .map(|text| {
                    let mut request =
                        AnalyzeRequest::new(text.as_str()).attributes(attributes.iter().copied());
                    request.languages = languages.clone();
                    request
                })
                .collect();
            let results = join_all(requests.iter().map(|request| client.analyze(request))).await;

            let mut failures = 0;
            for (text, result) in texts.iter().zip(results) {
                match result {
                    Ok(response) if json => print_json(text, &response)?,
                    Ok(response) => print_table(text, &response),
                    Err(e) => {
                        failures += 1;
                        if e.is_quota_exceeded() {
                            println!("{} {}", "Quota exceeded:".red().bold(), e);
                        } else {
                            println!("{} {}", "Error:".red(), e);
                        }
                    }
                }
            }

            if failures > 0 {
                anyhow::bail!("{failures} of {} request(s) failed", texts.len());
            }
        }

        Commands::Attributes => {
            println!("{}", "Stable".bold());
            for name in &AttributeName::ALL[..6] {
                println!("  {name}");
            }
            println!("{}", "Experimental".bold());
            for name in &AttributeName::ALL[6..14] {
                println!("  {name}");
            }
            println!("{}", "New York Times (English only)".bold());
            for name in AttributeName::ALL.iter().filter(|n| n.english_only()) {
                println!("  {name}");
            }
        }
    }

    Ok(())
}

fn print_table(text: &str, response: &AnalysisResponse) {
    println!("\n{}", text.bold());
    if !response.detected_languages.is_empty() {
        println!(
            "  {}",
            format!("detected: {}", response.detected_languages.join(", ")).dimmed()
        );
    }
    for score in &response.attribute_scores {
        let value = score.summary.value;
        let shown = format!("{value:.3}");
        let shown = if value >= 0.8 {
            shown.red().bold().to_string()
        } else if value >= 0.5 {
            shown.yellow().to_string()
        } else {
            shown.green().to_string()
        };
        println!("  {:<30} {}", score.name.as_str(), shown);
    }
}

fn print_json(text: &str, response: &AnalysisResponse) -> Result<()> {
    let scores: serde_json::Map<String, serde_json::Value> = response
        .attribute_scores
        .iter()
        .map(|score| (score.name.to_string(), score.summary.value.into()))
        .collect();
    let line = serde_json::json!({
        "text": text,
        "languages": response.languages,
        "scores": scores,
    });
    println!(
        "{}",
        serde_json::to_string(&line).context("Failed to encode scores")?
    );
    Ok(())
}
