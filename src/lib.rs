pub mod args;
pub mod cache;
pub mod error;
pub mod model;
pub mod controller {
    pub mod aggregator;
    pub mod identity;
    pub mod matches;
    pub mod stream;
    pub mod upstream;
}
pub mod view {
    pub mod index;
}

use actix_web::web::{self, Data};
use actix_web::HttpResponse;
use std::sync::Arc;

use crate::args::CleanArgs;
use crate::cache::ResultCache;
use crate::controller::aggregator::MatchAggregator;
use crate::controller::identity::IdentityResolver;
use crate::controller::matches::{self as matches_ctl, MatchService};
use crate::controller::upstream::UpstreamApi;

/// Wires resolver and aggregator around one shared cache and upstream.
#[must_use]
pub fn build_service(
    args: &CleanArgs,
    api: Arc<dyn UpstreamApi>,
    cache: Arc<ResultCache>,
) -> MatchService {
    let resolver = IdentityResolver::new(Arc::clone(&api), Arc::clone(&cache));
    let aggregator = MatchAggregator::new(api, Arc::clone(&cache))
        .with_page_size(args.page_size)
        .with_detail_concurrency(args.detail_concurrency);
    MatchService::new(resolver, aggregator, cache, args.window)
}

/// Registers every route. Expects `Data<MatchService>` in app data.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/matches", web::get().to(matches_ctl::matches))
        .route("/info", web::get().to(matches_ctl::matches))
        .route("/regions", web::get().to(matches_ctl::regions))
        .route("/health", web::get().to(health));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn index(service: Data<MatchService>) -> HttpResponse {
    let markup = view::index::render_index_template(service.default_window());
    HttpResponse::Ok()
        .content_type("text/html")
        .body(markup.into_string())
}
