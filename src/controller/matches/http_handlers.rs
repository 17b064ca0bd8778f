use actix_web::http::StatusCode;
use actix_web::web::{self, Data};
use actix_web::HttpResponse;
use std::collections::HashMap;
use tracing::debug;

use super::service::MatchService;
use crate::controller::stream::error_document;
use crate::error::AppError;
use crate::model::Region;

/// `GET /matches?region=<code>&summoner=<name>[&days=<n>]`
pub async fn matches(
    query: web::Query<HashMap<String, String>>,
    service: Data<MatchService>,
) -> HttpResponse {
    fn get_param<'a>(query: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
        query.get(key).map(String::as_str)
    }

    let opened = service
        .open(
            get_param(&query, "region"),
            get_param(&query, "summoner"),
            get_param(&query, "days"),
        )
        .await;

    match opened {
        Ok(body) => HttpResponse::Ok()
            .content_type("application/json")
            .streaming(body),
        Err(e) => {
            debug!(error = %e, code = e.code(), "match request failed before streaming");
            error_response(&e)
        }
    }
}

/// `GET /regions`
pub async fn regions() -> HttpResponse {
    HttpResponse::Ok().json(Region::ALL)
}

#[must_use]
pub fn error_response(err: &AppError) -> HttpResponse {
    let status = StatusCode::from_u16(err.code())
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status)
        .content_type("application/json")
        .body(error_document(err))
}
