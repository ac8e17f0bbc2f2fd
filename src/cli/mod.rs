//! CLI commands for HabitCoach using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::checkin::{normalize_checkin_status, ReplyStatus};
use crate::config::{validate_settings, Settings};
use crate::habits::catalog;

/// HabitCoach - daily habit check-ins with a proactive coach.
#[derive(Parser)]
#[command(name = "habitcoach")]
#[command(version = "0.1.0")]
#[command(about = "HabitCoach - habit progression and proactive daily check-ins", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP API and the check-in scheduler
    Serve {
        /// Port to listen on (overrides settings)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print focus areas, task tiers and progression chains
    Catalog,

    /// Show how a check-in reply is read
    Normalize {
        /// Reply text
        #[arg(required = true)]
        text: Vec<String>,
    },
}

impl Commands {
    pub async fn run(&self, settings: Settings) -> Result<()> {
        match &self.command {
            Command::Serve { port } => cmd_serve(settings, *port).await,
            Command::Catalog => cmd_catalog(),
            Command::Normalize { text } => cmd_normalize(&text.join(" ")),
        }
    }
}

async fn cmd_serve(settings: Settings, port: Option<u16>) -> Result<()> {
    use crate::web::run_web_server;

    validate_settings(&settings)?;

    let port_shown = port.unwrap_or(settings.server.port);
    println!("Starting HabitCoach on port {}...", port_shown);
    println!("  http://localhost:{}/api/goals", port_shown);
    println!("  http://localhost:{}/stream/<user_id>", port_shown);
    println!("  http://localhost:{}/health", port_shown);
    println!();
    println!("Press Ctrl+C to stop");

    run_web_server(settings, port).await
}

fn cmd_catalog() -> Result<()> {
    println!("Focus areas:\n");
    for area in catalog::FOCUS_AREAS {
        println!("{}", area);
        for (i, task) in catalog::tasks_for(area).iter().enumerate() {
            println!("  {}. {}", i + 1, task);
        }
    }

    println!("\nProgression chains:\n");
    for (task, chain) in catalog::PROGRESSIONS {
        println!("{}", task);
        for step in chain.iter() {
            println!("  -> {}", step);
        }
    }
    Ok(())
}

fn cmd_normalize(text: &str) -> Result<()> {
    let status = normalize_checkin_status(text);
    let label = match status {
        ReplyStatus::Done => "done",
        ReplyStatus::Miss => "miss",
        ReplyStatus::Unclear => "unclear",
    };
    println!("{}", label);
    Ok(())
}
