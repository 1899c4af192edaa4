use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands::*, TraceLevel};
use colored::Colorize;
use opanel::{ui, web};
use opanel_client::prelude::*;
use tracing::{debug, info, trace, Level};
use tracing_subscriber::{util::SubscriberInitExt, FmtSubscriber};

mod cli;

fn preprocess(trace_level: Level) -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(trace_level)
        .finish()
        .try_init()?;
    Ok(())
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.trace {
        TraceLevel::Trace => Level::TRACE,
        TraceLevel::Debug => Level::DEBUG,
        TraceLevel::Info => Level::INFO,
        TraceLevel::Warn => Level::WARN,
        TraceLevel::Error => Level::ERROR,
    };

    preprocess(log_level)?;
    trace!("Command line input recorded: {cli:#?}");

    // credential and upstream settings are resolved once, here, and handed down
    let config = Config::load(&cli.secrets)?;
    let polygon = Polygon::new(&config)?;

    ////////////////////////////////////////////////////////////////////////////////////////////////////

    // cli framework:
    // "> opanel <COMMAND>"
    match cli.command {
        // "> opanel serve [--bind ADDR]"
        Serve { bind } => {
            info!("Starting dashboard");
            web::run(&bind, web::AppState::polygon(polygon)?).await?;
        }

        // "> opanel fetch <TICKER> [--limit N] [--json]"
        Fetch {
            ticker,
            limit,
            json,
        } => {
            let request = PanelRequest::new(&ticker, limit as usize)?;
            let pb = ui::spinner("Fetching data...");
            let result = fetch_panel(&request, &polygon, &polygon).await;
            pb.finish_and_clear();

            let panel = match result {
                Ok(panel) => panel,
                Err(e) => {
                    eprintln!("{}", ui::failure_message(&e).red());
                    return Err(e.into());
                }
            };
            debug!(
                "[{}] {} rows, {} skipped",
                panel.ticker,
                panel.rows.len(),
                panel.skipped.len()
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&panel)?);
            } else {
                match panel.status {
                    PanelStatus::NoContracts => {
                        println!("{}", ui::no_contracts_message(&panel.ticker).yellow());
                    }
                    PanelStatus::PricesUnavailable => {
                        eprintln!("{}", ui::prices_unavailable_message(&panel).red());
                    }
                    PanelStatus::Rows => print!("{}", ui::render_table(&panel)),
                }
                for skipped in &panel.skipped {
                    eprintln!("{}", ui::skipped_message(skipped).yellow());
                }
            }
        }
    }

    Ok(())
}
