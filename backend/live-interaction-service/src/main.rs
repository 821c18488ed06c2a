use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use live_interaction_service::{
    config::Config,
    db, handlers, logging,
    services::{
        reaction::{InMemoryReactionStore, PgReactionStore},
        stream_status::{InMemoryStreamStatusLookup, PgStreamStatusLookup},
    },
    state::{AppState, Backends},
};
use std::sync::Arc;
use tracing::{info, warn};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);

    let backends = match &config.database {
        Some(database) => {
            let pool = db::init_pool(database)
                .await
                .context("Failed to initialize database pool")?;
            Backends {
                reactions: Arc::new(PgReactionStore::new(pool.clone())),
                statuses: Arc::new(PgStreamStatusLookup::new(pool)),
            }
        }
        None => {
            warn!("DATABASE_URL not set; reactions and stream status are kept in memory");
            Backends {
                reactions: Arc::new(InMemoryReactionStore::new()),
                statuses: Arc::new(InMemoryStreamStatusLookup::new()),
            }
        }
    };

    let (state, scheduler) = AppState::assemble(config.clone(), backends).start();

    let bind_addr = config.bind_addr();
    info!(%bind_addr, "Starting live-interaction-service");

    let result = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {bind_addr}"))?
    .run()
    .await;

    scheduler.shutdown().await;
    info!("live-interaction-service stopped");

    result.context("HTTP server error")
}
