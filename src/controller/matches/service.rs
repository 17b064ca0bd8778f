use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::cache::ResultCache;
use crate::controller::aggregator::{MatchAggregator, MatchBatches};
use crate::controller::identity::IdentityResolver;
use crate::controller::stream::{StreamError, StreamingResponder, render_document};
use crate::error::AppError;
use crate::model::{AccountId, AggregateResult, HistoryWindow, MatchSummary, Region};

/// Response body: document chunks in write order.
pub type MatchBody = BoxStream<'static, Result<Bytes, Infallible>>;

const STREAM_BUFFER: usize = 8;

/// Serves one `/matches` request end to end.
#[derive(Clone)]
pub struct MatchService {
    resolver: IdentityResolver,
    aggregator: MatchAggregator,
    cache: Arc<ResultCache>,
    default_window: HistoryWindow,
}

impl MatchService {
    #[must_use]
    pub fn new(
        resolver: IdentityResolver,
        aggregator: MatchAggregator,
        cache: Arc<ResultCache>,
        default_window: HistoryWindow,
    ) -> Self {
        Self {
            resolver,
            aggregator,
            cache,
            default_window,
        }
    }

    #[must_use]
    pub fn default_window(&self) -> HistoryWindow {
        self.default_window
    }

    /// Validates the raw query values, resolves the player and starts the document.
    ///
    /// # Errors
    ///
    /// Will return `Err` if validation, identity resolution or the first batch fails;
    /// later failures are written into the streamed document instead
    pub async fn open(
        &self,
        region: Option<&str>,
        summoner: Option<&str>,
        days: Option<&str>,
    ) -> Result<MatchBody, AppError> {
        let region = Region::from_query(region)?;
        let window = self.window_from_query(days)?;
        let account = self.resolver.resolve(region, summoner).await?;
        self.stream_for(region, account, window).await
    }

    fn window_from_query(&self, days: Option<&str>) -> Result<HistoryWindow, AppError> {
        match days.map(str::trim).filter(|d| !d.is_empty()) {
            None => Ok(self.default_window),
            Some(raw) => raw
                .parse::<i64>()
                .map(HistoryWindow)
                .map_err(|_| AppError::InvalidInput("invalid days".to_string())),
        }
    }

    /// # Errors
    ///
    /// Will return `Err` if the first batch cannot be produced
    pub async fn stream_for(
        &self,
        region: Region,
        account: AccountId,
        window: HistoryWindow,
    ) -> Result<MatchBody, AppError> {
        let now_ms = chrono::Utc::now().timestamp_millis();

        if let Some(matches) = self
            .cache
            .get_aggregate(region, account)
            .await
            .and_then(|cached| cached.replay(window, now_ms))
        {
            debug!(%region, %account, matches = matches.len(), "replaying cached aggregate");
            let document = render_document(window, &matches)?;
            return Ok(Box::pin(stream::once(async move { Ok(document) })));
        }

        let mut batches = self.aggregator.aggregate_at(region, account, window, now_ms);
        // Nothing is committed until the first batch is in hand, so an early failure is a plain error response.
        let first = batches.next().await.transpose()?;

        let (responder, rx) = StreamingResponder::channel(window, STREAM_BUFFER);
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        let cache = Arc::clone(&self.cache);

        tokio::spawn(async move {
            match pump(responder, first, batches, cancel).await {
                Ok(Some(matches)) => {
                    cache
                        .set_aggregate(region, account, &AggregateResult { window, matches })
                        .await;
                }
                Ok(None) => {}
                Err(StreamError::ClientGone) => {
                    debug!(%region, %account, "client went away, abandoning aggregation");
                }
                Err(StreamError::Encode(e)) => {
                    warn!(%region, %account, error = %e, "could not encode match batch");
                }
            }
        });

        Ok(body_stream(rx, guard))
    }
}

/// Writes every batch through `responder`.
///
/// Returns the streamed summaries when the document closed cleanly, `None` when it closed with an
/// error object.
async fn pump(
    mut responder: StreamingResponder,
    first: Option<Vec<MatchSummary>>,
    mut batches: MatchBatches,
    cancel: CancellationToken,
) -> Result<Option<Vec<MatchSummary>>, StreamError> {
    let mut streamed = Vec::new();
    responder.open().await?;

    if let Some(batch) = first {
        responder.write_batch(&batch).await?;
        streamed.extend(batch);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StreamError::ClientGone),
                next = batches.next() => next,
            };
            match next {
                Some(Ok(batch)) => {
                    responder.write_batch(&batch).await?;
                    streamed.extend(batch);
                }
                Some(Err(e)) => {
                    warn!(written = responder.written(), error = %e, "match stream ended with an error");
                    responder.close_with_error(&e).await?;
                    return Ok(None);
                }
                None => break,
            }
        }
    }

    responder.close_ok().await?;
    Ok(Some(streamed))
}

/// The guard cancels the producing task once the HTTP layer drops the body.
fn body_stream(mut rx: mpsc::Receiver<Bytes>, guard: DropGuard) -> MatchBody {
    Box::pin(async_stream::stream! {
        let _guard = guard;
        while let Some(chunk) = rx.recv().await {
            yield Ok::<Bytes, Infallible>(chunk);
        }
    })
}
