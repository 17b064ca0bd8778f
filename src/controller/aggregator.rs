use async_stream::try_stream;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::cache::ResultCache;
use crate::controller::upstream::{UpstreamApi, match_detail_path, match_list_path};
use crate::error::AppError;
use crate::model::{AccountId, HistoryWindow, MatchListPage, MatchRecord, MatchRef, MatchSummary, Region};

pub const DEFAULT_PAGE_SIZE: usize = 15;
pub const DEFAULT_DETAIL_CONCURRENCY: usize = 4;

/// Batches of summaries, one per match-list page, in upstream order (newest first).
///
/// A failure after some batches were yielded arrives as the final item.
pub type MatchBatches = BoxStream<'static, Result<Vec<MatchSummary>, AppError>>;

/// Walks the paged match list of one account and resolves each match inside the window.
#[derive(Clone)]
pub struct MatchAggregator {
    api: Arc<dyn UpstreamApi>,
    cache: Arc<ResultCache>,
    page_size: usize,
    detail_concurrency: usize,
}

impl MatchAggregator {
    #[must_use]
    pub fn new(api: Arc<dyn UpstreamApi>, cache: Arc<ResultCache>) -> Self {
        Self {
            api,
            cache,
            page_size: DEFAULT_PAGE_SIZE,
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// 1 fetches match details strictly one after another.
    #[must_use]
    pub fn with_detail_concurrency(mut self, detail_concurrency: usize) -> Self {
        self.detail_concurrency = detail_concurrency.max(1);
        self
    }

    #[must_use]
    pub fn aggregate(&self, region: Region, account: AccountId, window: HistoryWindow) -> MatchBatches {
        self.aggregate_at(region, account, window, chrono::Utc::now().timestamp_millis())
    }

    /// Same as [`aggregate`](Self::aggregate) with an explicit "now" in epoch milliseconds.
    ///
    /// Paging stops at the first empty or short page, or at the first reference older than the
    /// cutoff; the list is reverse-chronological so nothing past that point can be inside the window.
    /// Dropping the stream abandons any in-flight upstream calls.
    #[must_use]
    pub fn aggregate_at(
        &self,
        region: Region,
        account: AccountId,
        window: HistoryWindow,
        now_ms: i64,
    ) -> MatchBatches {
        let this = self.clone();
        let batches = try_stream! {
            let cutoff = window.cutoff(now_ms);
            let mut begin = 0usize;

            loop {
                let page = this.fetch_page(region, account, begin).await?;
                let fetched = page.len();
                if fetched == 0 {
                    break;
                }

                let within: Vec<MatchRef> = page
                    .into_iter()
                    .take_while(|r| cutoff.is_none_or(|c| r.timestamp >= c))
                    .collect();
                let reached_cutoff = within.len() < fetched;
                debug!(%region, %account, begin, fetched, within = within.len(), "match list page");

                let mut details = stream::iter(within)
                    .map(|r| this.resolve_match(region, r.match_id))
                    .buffered(this.detail_concurrency);
                let mut batch = Vec::new();
                while let Some(record) = details.next().await {
                    match record.and_then(|rec| rec.summary_for(account)) {
                        // The list timestamp and the detail's creation time can disagree.
                        Ok(summary) if !window.contains(summary.match_creation, now_ms) => {
                            debug!(%region, match_id = summary.match_id, "match created before the window");
                        }
                        Ok(summary) => batch.push(summary),
                        Err(e) => {
                            if !batch.is_empty() {
                                yield std::mem::take(&mut batch);
                            }
                            Err::<(), AppError>(e)?;
                        }
                    }
                }
                if !batch.is_empty() {
                    yield batch;
                }

                if reached_cutoff || fetched < this.page_size {
                    break;
                }
                begin += this.page_size;
            }
        };
        Box::pin(batches)
    }

    async fn fetch_page(
        &self,
        region: Region,
        account: AccountId,
        begin: usize,
    ) -> Result<Vec<MatchRef>, AppError> {
        let params = [
            ("beginIndex", begin.to_string()),
            ("endIndex", (begin + self.page_size).to_string()),
        ];
        let body = self
            .api
            .fetch(region, &match_list_path(account), &params)
            .await?;
        Ok(MatchListPage::from_json(body)?.matches)
    }

    /// Match records never change once played, so a cached record is reused until capacity evicts it.
    async fn resolve_match(&self, region: Region, match_id: u64) -> Result<MatchRecord, AppError> {
        if let Some(record) = self.cache.get_match(match_id).await {
            return Ok(record);
        }
        let body = self
            .api
            .fetch(region, &match_detail_path(match_id), &[])
            .await?;
        let record = MatchRecord::from_detail(body)?;
        self.cache.set_match(&record).await;
        Ok(record)
    }
}
