//! Headless simulation runner.
//!
//! Fabricates scenarios for a company, runs the full five-phase
//! orchestration, echoes the chat as it completes, and prints the
//! exported dossier summary.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use collective::generate::{GenerationBackend, HttpBackend, ScriptedBackend};
use collective::model::{CompanyProfile, Horizon};
use collective::personas::{display_name, persona};
use collective::session::{fabricate_scenarios, Session};
use collective::Config;

#[derive(Parser, Debug)]
#[command(name = "collective", about = "Run a doomsday campaign simulation")]
struct Args {
    /// Company to doom
    #[arg(long, default_value = "Vantage Corp")]
    company: String,

    /// Company sector
    #[arg(long, default_value = "Logistics")]
    sector: String,

    /// One-line company description
    #[arg(long, default_value = "")]
    description: String,

    /// Horizon to pull scenarios from
    #[arg(long, default_value = "5_year")]
    horizon: String,

    /// Force the scripted fallback backend even when an API key is set
    #[arg(long)]
    offline: bool,

    /// Collapse all scripted delays (demo runs in seconds)
    #[arg(long)]
    fast: bool,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    if args.offline {
        config.api_key = None;
    }
    if args.fast {
        config.pacing.scale = 0.0;
    }

    let company = CompanyProfile {
        name: args.company.clone(),
        domain: String::new(),
        sector: args.sector.clone(),
        description: args.description.clone(),
    };

    let backend: Arc<dyn GenerationBackend> = if config.has_backend() {
        Arc::new(HttpBackend::new(&config)?)
    } else {
        Arc::new(ScriptedBackend::new(config.pacing.scale))
    };

    println!("{}", "THE COLLECTIVE".bold());
    println!("Fabricating doomsday scenarios for {}...\n", args.company.bold());

    let scenario_set =
        fabricate_scenarios(backend.as_ref(), &company, config.generation_timeout_secs).await;

    let horizon = Horizon::ALL
        .into_iter()
        .find(|h| h.key() == args.horizon)
        .unwrap_or(Horizon::FiveYear);
    let scenarios = scenario_set.for_horizon(horizon).to_vec();
    for scenario in &scenarios {
        println!(
            "  {} {} ({}% probability, severity {}/5)",
            "•".red(),
            scenario.title.bold(),
            scenario.probability,
            scenario.severity
        );
    }
    println!();

    let session = Arc::new(Session::with_backend(
        config,
        company,
        scenarios,
        backend,
    ));

    // Echo chat messages and phase changes while the run progresses
    let observer = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let mut printed = 0usize;
            let mut last_phase = None;
            loop {
                if let Some(phase) = session.store().phase() {
                    if last_phase != Some(phase) {
                        println!("\n{} {}\n", "== PHASE:".bold(), phase.label().to_uppercase().bold());
                        last_phase = Some(phase);
                    }
                }

                let messages = session.store().messages();
                while printed < messages.len() {
                    let message = &messages[printed];
                    if !message.is_complete {
                        break;
                    }
                    let name = display_name(&message.agent_id);
                    let tag = format!("[{}]", name);
                    let line = if persona(&message.agent_id).is_some() {
                        tag.as_str().bold()
                    } else {
                        tag.as_str().normal()
                    };
                    println!("{} {}", line, message.content);
                    printed += 1;
                }

                if session.store().is_complete() && printed >= messages.len() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(120)).await;
            }
        })
    };

    session.run().await;
    let _ = observer.await;

    let bundle = session.export_bundle();
    println!("\n{}", "== DOSSIER ==".bold());
    println!(
        "{} final assets, {} chat messages",
        bundle.final_assets.len(),
        bundle.chat_log.len()
    );
    if let Some(manifesto) = &bundle.manifesto {
        println!("\n{}\n", manifesto.markdown);
    }
    println!("{}", bundle.brief_markdown);

    session.shutdown();
    Ok(())
}
