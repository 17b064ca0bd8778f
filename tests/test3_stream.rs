mod common;
use crate::common::{FakeUpstream, collect_body, hourly_games, setup_test_context};

use league_time::error::AppError;
use league_time::model::{AccountId, HistoryWindow, Region};
use serde_json::Value;
use std::time::Duration;

#[tokio::test]
async fn test3_streams_full_document() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = setup_test_context(FakeUpstream::new(3, hourly_games(18)).with_name("rekkles", 3), 4);
    let body = ctx.service.open(Some("EUW"), Some("Rekkles"), Some("7")).await?;
    let doc: Value = serde_json::from_str(&collect_body(body).await)?;

    assert_eq!(doc["days"], 7);
    let matches = doc["matches"].as_array().expect("matches array");
    assert_eq!(matches.len(), 18);
    assert_eq!(matches[0]["matchId"], 5_000);
    assert_eq!(matches[0]["winner"], true);
    assert_eq!(matches[1]["winner"], false);
    assert!(matches[0]["matchDuration"].is_i64());
    assert!(doc.get("error").is_none());
    Ok(())
}

#[tokio::test]
async fn test3_failure_mid_stream_keeps_document_valid() -> Result<(), Box<dyn std::error::Error>> {
    // With sequential detail lookups, the third match fails after two were written.
    let upstream = FakeUpstream::new(3, hourly_games(6))
        .failing_detail(5_002, AppError::Transient { status: 503 });
    let ctx = setup_test_context(upstream, 1);

    let body = ctx
        .service
        .stream_for(Region::Na, AccountId(3), HistoryWindow(30))
        .await?;
    let doc: Value = serde_json::from_str(&collect_body(body).await)?;

    assert_eq!(doc["matches"].as_array().map(Vec::len), Some(2));
    assert_eq!(doc["error"]["code"], 503);
    assert!(doc["error"]["message"].is_string());

    // Partial results are not cached.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ctx.cache.get_aggregate(Region::Na, AccountId(3)).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test3_failure_on_first_match_is_whole_error() -> Result<(), Box<dyn std::error::Error>> {
    let upstream = FakeUpstream::new(3, hourly_games(6))
        .failing_detail(5_000, AppError::RateLimited { status: 429 });
    let ctx = setup_test_context(upstream, 1);

    let err = ctx
        .service
        .stream_for(Region::Na, AccountId(3), HistoryWindow(30))
        .await
        .err()
        .expect("nothing was committed");
    assert_eq!(err.code(), 429);
    assert_eq!(err.to_string(), "too many attempts");
    Ok(())
}

#[tokio::test]
async fn test3_completed_aggregate_is_replayed() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = setup_test_context(FakeUpstream::new(3, hourly_games(5)), 4);

    let first = collect_body(
        ctx.service
            .stream_for(Region::Na, AccountId(3), HistoryWindow(30))
            .await?,
    )
    .await;

    // The aggregate is stored right after the last chunk is sent.
    for _ in 0..100 {
        if ctx.cache.get_aggregate(Region::Na, AccountId(3)).await.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let lists = ctx.upstream.lists();

    let second = collect_body(
        ctx.service
            .stream_for(Region::Na, AccountId(3), HistoryWindow(30))
            .await?,
    )
    .await;
    assert_eq!(ctx.upstream.lists(), lists);
    assert_eq!(
        serde_json::from_str::<Value>(&first)?,
        serde_json::from_str::<Value>(&second)?
    );

    // A wider window cannot be served from the cached one.
    let _ = collect_body(
        ctx.service
            .stream_for(Region::Na, AccountId(3), HistoryWindow(-1))
            .await?,
    )
    .await;
    assert_eq!(ctx.upstream.lists(), lists + 1);
    Ok(())
}

#[tokio::test]
async fn test3_empty_history_is_empty_document() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = setup_test_context(FakeUpstream::new(3, Vec::new()), 4);
    let body = ctx
        .service
        .stream_for(Region::Na, AccountId(3), HistoryWindow(-1))
        .await?;
    let doc: Value = serde_json::from_str(&collect_body(body).await)?;
    assert_eq!(doc, serde_json::json!({"days": -1, "matches": []}));
    Ok(())
}

#[tokio::test]
async fn test3_bad_days_is_invalid_input() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = setup_test_context(FakeUpstream::new(3, Vec::new()), 4);
    let err = ctx
        .service
        .open(Some("na"), Some("#3"), Some("week"))
        .await
        .err()
        .expect("rejected");
    assert_eq!(err, AppError::InvalidInput("invalid days".to_string()));
    Ok(())
}

#[tokio::test]
async fn test3_failure_mid_stream_with_parallel_details() -> Result<(), Box<dyn std::error::Error>> {
    // Lookups run four at a time, yet only the two matches ahead of the failure are written.
    let upstream = FakeUpstream::new(3, hourly_games(6))
        .failing_detail(5_002, AppError::Transient { status: 503 });
    let ctx = setup_test_context(upstream, 4);

    let body = ctx
        .service
        .stream_for(Region::Na, AccountId(3), HistoryWindow(30))
        .await?;
    let doc: Value = serde_json::from_str(&collect_body(body).await)?;

    let matches = doc["matches"].as_array().expect("matches array");
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0]["matchId"], 5_000);
    assert_eq!(matches[1]["matchId"], 5_001);
    assert_eq!(doc["error"]["code"], 503);
    Ok(())
}

#[tokio::test]
async fn test3_failure_on_second_page_keeps_first() -> Result<(), Box<dyn std::error::Error>> {
    let upstream = FakeUpstream::new(3, hourly_games(20))
        .failing_page(15, AppError::Transient { status: 503 });
    let ctx = setup_test_context(upstream, 4);

    let body = ctx
        .service
        .stream_for(Region::Na, AccountId(3), HistoryWindow(30))
        .await?;
    let doc: Value = serde_json::from_str(&collect_body(body).await)?;

    assert_eq!(doc["matches"].as_array().map(Vec::len), Some(15));
    assert_eq!(doc["error"]["code"], 503);
    assert_eq!(ctx.upstream.lists(), 2);
    assert_eq!(ctx.upstream.details(), 15);
    Ok(())
}

#[tokio::test]
async fn test3_client_disconnect_stops_upstream_work() -> Result<(), Box<dyn std::error::Error>> {
    use futures::StreamExt;

    // The first page resolves freely; second-page lookups hang until the gate opens.
    let (upstream, gate) = FakeUpstream::new(3, hourly_games(30)).gated_from(15);
    let ctx = setup_test_context(upstream, 4);

    let mut body = ctx
        .service
        .stream_for(Region::Na, AccountId(3), HistoryWindow(30))
        .await?;
    assert!(body.next().await.is_some());
    drop(body);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = ctx.upstream.details();
    assert!(started <= 15 + 4, "{started} lookups started");
    gate.add_permits(1_000);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // No lookups after the disconnect, and nothing cached from the abandoned run.
    assert_eq!(ctx.upstream.details(), started);
    assert!(ctx.cache.get_aggregate(Region::Na, AccountId(3)).await.is_none());
    Ok(())
}
