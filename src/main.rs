use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod corpus;
mod loader;
mod search;
#[cfg(test)]
mod tests;
mod web;

use app::{AppFactory, SearchRequest};

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let paths = AppFactory::get_paths()?;
    let app = AppFactory::create_app_service(&paths)?;

    match args.command {
        cli::Command::Serve { listen, no_load } => {
            if app.config().corpus.load_on_startup && !no_load {
                // the server stays up; /load_data can retry later
                match app.load_data() {
                    Ok(summary) => {
                        log::info!("{} (generation {})", summary.message(), summary.generation)
                    }
                    Err(err) => log::error!("initial load failed: {err}"),
                }
            }

            let listen_addr = listen.unwrap_or_else(|| app.config().server.listen_addr.clone());
            web::start_daemon(Arc::new(app), &listen_addr)?;
        }

        cli::Command::Load => {
            let summary = app.load_data()?;
            println!("{}", summary.message());
        }

        cli::Command::Search {
            query,
            approach,
            page,
            per_page,
        } => {
            app.load_data()?;
            let response = app.search(SearchRequest {
                query: Some(query),
                approach,
                page,
                per_page,
            })?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
