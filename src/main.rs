use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use portal_sync::messaging::SenderPool;
use portal_sync::models::{Operation, ScrapeSource};
use portal_sync::scrapers::{create_source, import_listing, ScrapeFilters, ScrapeRequest, ScrapeRunner};
use portal_sync::services::{BroadcastProcessor, PublicationService};
use portal_sync::store::{PgStore, Store};
use portal_sync::Config;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "portal-sync", about = "Publish, scrape and broadcast real-estate listings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape listing pages from a source into the scraped listings table
    Scrape {
        #[arg(long, default_value = "inmuebles24")]
        source: ScrapeSource,
        #[arg(long)]
        agency: Uuid,
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=1000))]
        pages: u32,
        #[arg(long)]
        city: Option<String>,
        /// venta | renta
        #[arg(long)]
        operation: Option<Operation>,
    },
    /// Turn a scraped listing into an agency property
    Import {
        #[arg(long)]
        listing: Uuid,
        #[arg(long)]
        agency: Uuid,
    },
    /// Publish a property to one or more portals
    Publish {
        #[arg(long)]
        property: Uuid,
        #[arg(long = "portal", required = true, value_delimiter = ',')]
        portals: Vec<String>,
        #[arg(long)]
        user: Uuid,
    },
    /// Push current property data to every portal it is live on
    Update {
        #[arg(long)]
        property: Uuid,
        #[arg(long)]
        user: Uuid,
    },
    Unpublish {
        #[arg(long)]
        property: Uuid,
        #[arg(long = "portal", required = true, value_delimiter = ',')]
        portals: Vec<String>,
        #[arg(long)]
        user: Uuid,
    },
    /// Refresh views and contacts from the portals
    SyncStatus {
        #[arg(long)]
        property: Uuid,
    },
    TestPortals {
        #[arg(long)]
        agency: Uuid,
    },
    /// Send the next batch of a broadcast
    Broadcast {
        #[arg(long)]
        broadcast: Uuid,
        /// Keep sending batches until every recipient is done
        #[arg(long)]
        until_complete: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = Arc::new(
        PgStore::connect(&config.database_url, config.database_max_connections)
            .await
            .context("Failed to connect to database")?,
    );
    let http = reqwest::Client::builder()
        .timeout(config.portal_http_timeout)
        .user_agent(config.scraper_user_agent.clone())
        .build()?;

    match cli.command {
        Command::Scrape {
            source,
            agency,
            pages,
            city,
            operation,
        } => {
            info!("🏠 Portal Sync - scraping {}", source);
            let scraper = create_source(source, http);
            let runner = ScrapeRunner::new(store, config.scraper_page_delay);
            let request = ScrapeRequest {
                pages,
                filters: ScrapeFilters { city, operation },
            };

            let job = runner.run(agency, scraper.as_ref(), request).await?;
            info!(
                "✅ Job {} {}: {} pages, {} new, {} updated, {} unchanged",
                job.id,
                job.status.as_str(),
                job.pages_scraped,
                job.listings_new,
                job.listings_updated,
                job.listings_duplicate
            );
            print_json(&job)?;
        }
        Command::Import { listing, agency } => {
            let property_id = import_listing(store.as_ref(), listing, agency).await?;
            info!("💾 Listing {} imported as property {}", listing, property_id);
        }
        Command::Publish {
            property,
            portals,
            user,
        } => {
            let service = PublicationService::new(store, http);
            let summary = service.publish_property(property, &portals, user).await?;
            info!("✅ Published on {} portals, {} failed", summary.succeeded(), summary.failed());
            print_json(&summary)?;
        }
        Command::Update { property, user } => {
            let service = PublicationService::new(store, http);
            print_json(&service.update_property(property, user).await?)?;
        }
        Command::Unpublish {
            property,
            portals,
            user,
        } => {
            let service = PublicationService::new(store, http);
            print_json(&service.unpublish_property(property, &portals, user).await?)?;
        }
        Command::SyncStatus { property } => {
            let service = PublicationService::new(store, http);
            print_json(&service.sync_status(property).await?)?;
        }
        Command::TestPortals { agency } => {
            let service = PublicationService::new(store, http);
            print_json(&service.test_connections(agency).await?)?;
        }
        Command::Broadcast {
            broadcast,
            until_complete,
        } => {
            let url = config
                .whatsapp_gateway_url
                .clone()
                .context("WHATSAPP_GATEWAY_URL must be set")?;
            let token = config
                .whatsapp_gateway_token
                .clone()
                .context("WHATSAPP_GATEWAY_TOKEN must be set")?;
            let senders = Arc::new(SenderPool::whatsapp(url, token, config.portal_http_timeout));
            let processor = BroadcastProcessor::new(store, senders.clone(), config.broadcast_settings());

            loop {
                let summary = processor.process_batch(broadcast).await?;
                print_json(&summary)?;
                if summary.completed || !until_complete || summary.processed == 0 {
                    break;
                }
            }
            senders.shutdown().await;
        }
    }

    Ok(())
}
