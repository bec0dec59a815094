//! outreach-cli — streaming frontend for the outreach message-generation API
//!
//! Consumes the chunked `event-name: json` frame stream from the server and
//! prints drafts as they arrive.
//!
//! # Subcommands
//! - `generate [--prospect <id>]... [--instructions <text>]` — draft messages
//! - `regenerate --message <id>... [--auto | --feedback <text>]` — redo drafts
//! - `status`                                                  — server health

use std::io::{BufRead, BufReader};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8790";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "outreach-cli",
    version,
    about = "Outreach message generation — streaming CLI"
)]
struct Cli {
    /// Outreach HTTP server URL (overrides OUTREACH_HTTP_URL env var)
    #[arg(long, env = "OUTREACH_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Bearer credential (overrides OUTREACH_TOKEN env var)
    #[arg(long, env = "OUTREACH_TOKEN")]
    token: Option<String>,

    /// Print raw wire frames instead of formatted output
    #[arg(long)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate message drafts for saved prospects
    Generate {
        /// Restrict to specific prospect ids (repeatable; default: all)
        #[arg(long = "prospect")]
        prospects: Vec<String>,

        /// Free-text instructions appended to the prompt
        #[arg(long)]
        instructions: Option<String>,

        /// Use the relationship-building variant (no job mention)
        #[arg(long)]
        no_job_mention: bool,
    },

    /// Regenerate existing drafts
    Regenerate {
        /// Message ids to regenerate (repeatable, required)
        #[arg(long = "message", required = true)]
        messages: Vec<String>,

        /// Let the server vary highlight/challenge selection
        #[arg(long)]
        auto: bool,

        /// Feedback on the previous draft (disables --auto selection)
        #[arg(long)]
        feedback: Option<String>,

        /// Free-text instructions appended to the prompt
        #[arg(long)]
        instructions: Option<String>,

        /// Use the relationship-building variant (no job mention)
        #[arg(long)]
        no_job_mention: bool,
    },

    /// Show Outreach server status
    Status,
}

// ============================================================================
// Stream frame payloads
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusFrame {
    total: usize,
    generated: usize,
    remaining: usize,
    processed: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageFrame {
    prospect: ProspectFrame,
    #[serde(rename = "match")]
    contact: ContactFrame,
    content: String,
    subject: String,
    message_id: String,
    cached: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProspectFrame {
    company: String,
    job_title: String,
}

#[derive(Debug, Deserialize)]
struct ContactFrame {
    name: String,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteFrame {
    total: usize,
    generated: usize,
    newly_generated: usize,
    quota: QuotaFrame,
}

#[derive(Debug, Deserialize)]
struct QuotaFrame {
    used: i64,
    limit: i64,
    remaining: i64,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate {
            prospects,
            instructions,
            no_job_mention,
        } => {
            let mut body = serde_json::json!({
                "mentionJobInMessages": !no_job_mention,
            });
            if !prospects.is_empty() {
                body["prospectIds"] = serde_json::json!(prospects);
            }
            if let Some(instructions) = instructions {
                body["customInstructions"] = serde_json::json!(instructions);
            }
            run_stream(&cli, "/messages/generate", &body)
        }
        Commands::Regenerate {
            messages,
            auto,
            feedback,
            instructions,
            no_job_mention,
        } => {
            let mut body = serde_json::json!({
                "autoGenerate": *auto,
                "messageIds": messages,
                "mentionJobInMessages": !no_job_mention,
            });
            if let Some(feedback) = feedback {
                body["feedback"] = serde_json::json!(feedback);
            }
            if let Some(instructions) = instructions {
                body["customInstructions"] = serde_json::json!(instructions);
            }
            run_stream(&cli, "/messages/regenerate", &body)
        }
        Commands::Status => run_status(&cli.server),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_stream(cli: &Cli, route: &str, body: &serde_json::Value) -> anyhow::Result<()> {
    let token = cli
        .token
        .as_deref()
        .context("no credential: pass --token or set OUTREACH_TOKEN")?;

    let client = reqwest::blocking::Client::new();
    let response = client
        .post(format!("{}{}", cli.server, route))
        .bearer_auth(token)
        .json(body)
        .send()
        .with_context(|| format!("request to {} failed", cli.server))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().unwrap_or_default();
        bail!("server returned {}: {}", status, text);
    }

    let reader = BufReader::new(response);
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        if cli.raw {
            println!("{line}");
        } else {
            print_frame(&line);
        }
    }

    Ok(())
}

fn run_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::new();

    let health: serde_json::Value = client
        .get(format!("{server}/health"))
        .send()
        .with_context(|| format!("request to {server} failed"))?
        .json()?;
    let version: serde_json::Value = client.get(format!("{server}/version")).send()?.json()?;

    println!("server:     {server}");
    println!(
        "status:     {}",
        health["status"].as_str().unwrap_or("unknown")
    );
    println!(
        "version:    {}",
        version["version"].as_str().unwrap_or("unknown")
    );
    println!(
        "postgresql: {}",
        health["postgresql"].as_str().unwrap_or("unavailable")
    );

    Ok(())
}

// ============================================================================
// Frame formatting
// ============================================================================

fn print_frame(line: &str) {
    let Some((name, payload)) = line.split_once(": ") else {
        println!("{line}");
        return;
    };

    match name {
        "status" => {
            if let Ok(frame) = serde_json::from_str::<StatusFrame>(payload) {
                eprintln!(
                    "[{}/{} processed, {} generated, {} remaining]",
                    frame.processed, frame.total, frame.generated, frame.remaining
                );
            }
        }
        "message" => {
            if let Ok(frame) = serde_json::from_str::<MessageFrame>(payload) {
                let tag = if frame.cached { " (cached)" } else { "" };
                println!(
                    "── {} — {} ({}, {}){}",
                    frame.prospect.company,
                    frame.contact.name,
                    frame.contact.title,
                    frame.prospect.job_title,
                    tag
                );
                println!("   id: {}", frame.message_id);
                println!("   subject: {}", frame.subject);
                println!("   {}\n", frame.content);
            }
        }
        "complete" => {
            if let Ok(frame) = serde_json::from_str::<CompleteFrame>(payload) {
                println!(
                    "done: {}/{} messages ({} new) — quota {}/{}, {} left today",
                    frame.generated,
                    frame.total,
                    frame.newly_generated,
                    frame.quota.used,
                    frame.quota.limit,
                    frame.quota.remaining
                );
            }
        }
        _ => println!("{line}"),
    }
}
