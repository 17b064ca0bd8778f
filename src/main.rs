use actix_web::web::Data;
use actix_web::{App, HttpServer};
use league_time::args::{self, CacheBackend};
use league_time::cache::ResultCache;
use league_time::controller::upstream::UpstreamClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match args::args_checks() {
        Ok(args) => args,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    info!(config = ?args, "starting");

    let cache = Arc::new(match &args.cache_backend {
        CacheBackend::Memory => {
            ResultCache::in_memory(args.identity_capacity, args.result_capacity, args.ttls)
        }
        CacheBackend::Memcached(config) => {
            info!(servers = ?config.servers, "using memcached cache");
            ResultCache::memcached(config, args.ttls).await?
        }
    });
    let shutdown = CancellationToken::new();
    let sweeper = Arc::clone(&cache).spawn_sweeper(args.cache_check_period, shutdown.clone());

    let upstream = Arc::new(UpstreamClient::new(args.upstream.clone())?);
    let service = league_time::build_service(&args, upstream, Arc::clone(&cache));

    let bind = (args.bind.clone(), args.port);
    info!(host = %bind.0, port = bind.1, "server listening");
    let served = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(service.clone()))
            .configure(league_time::routes)
    })
    .bind(bind)?
    .run()
    .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!(error = %e, "cache sweeper did not stop cleanly");
    }
    served?;
    Ok(())
}
