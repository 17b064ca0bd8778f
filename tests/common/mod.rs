#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

use league_time::cache::{CacheTtls, ResultCache};
use league_time::controller::aggregator::MatchAggregator;
use league_time::controller::identity::IdentityResolver;
use league_time::controller::matches::{MatchBody, MatchService};
use league_time::controller::upstream::UpstreamApi;
use league_time::error::AppError;
use league_time::model::{HistoryWindow, Region};

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;
pub const OPPONENT_OFFSET: u64 = 1_000_000;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Clone, Copy, Debug)]
pub struct Game {
    pub match_id: u64,
    /// Time shown in the match list.
    pub timestamp: i64,
    /// `matchCreation` in the detail; normally equal to `timestamp`.
    pub creation: i64,
    pub winner: bool,
}

/// `count` games, one per hour going back from now, newest first. Even ids win.
pub fn hourly_games(count: u64) -> Vec<Game> {
    let now = now_ms();
    (0..count)
        .map(|i| {
            let timestamp = now - (i as i64 + 1) * 60 * 60 * 1000;
            Game {
                match_id: 5_000 + i,
                timestamp,
                creation: timestamp,
                winner: i % 2 == 0,
            }
        })
        .collect()
}

/// Games at the given ages in days, newest first.
pub fn games_days_ago(ages: &[i64]) -> Vec<Game> {
    let now = now_ms();
    ages.iter()
        .enumerate()
        .map(|(i, age)| Game {
            match_id: 9_000 + i as u64,
            timestamp: now - age * DAY_MS,
            creation: now - age * DAY_MS,
            winner: true,
        })
        .collect()
}

/// In-process stand-in for the game-statistics API.
///
/// Every account sees the same history. Each detail lists the requesting owner (`owner`) and an
/// opponent (`owner + OPPONENT_OFFSET`) with opposite outcomes.
#[derive(Default)]
pub struct FakeUpstream {
    pub names: HashMap<String, u64>,
    pub owner: u64,
    pub games: Vec<Game>,
    /// Detail lookups for this match id fail with the given error.
    pub failing_match: Option<(u64, AppError)>,
    /// The match-list page starting at this index fails with the given error.
    pub failing_list: Option<(usize, AppError)>,
    /// Detail lookups for games at this position or later wait on `gate` after being counted.
    pub gate_from: usize,
    pub gate: Option<Arc<Semaphore>>,
    pub name_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

impl FakeUpstream {
    pub fn new(owner: u64, games: Vec<Game>) -> Self {
        Self {
            owner,
            games,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: &str, id: u64) -> Self {
        self.names.insert(name.to_string(), id);
        self
    }

    pub fn failing_detail(mut self, match_id: u64, err: AppError) -> Self {
        self.failing_match = Some((match_id, err));
        self
    }

    pub fn failing_page(mut self, begin: usize, err: AppError) -> Self {
        self.failing_list = Some((begin, err));
        self
    }

    /// Holds detail lookups from position `from` on until permits are added to the returned gate.
    pub fn gated_from(mut self, from: usize) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate_from = from;
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn names(&self) -> usize {
        self.name_calls.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn details(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    fn list_page(&self, params: &[(&str, String)]) -> Result<Value, AppError> {
        let index = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(0)
        };
        if let Some((failing, err)) = &self.failing_list {
            if *failing == index("beginIndex") {
                return Err(err.clone());
            }
        }
        let begin = index("beginIndex").min(self.games.len());
        let end = index("endIndex").min(self.games.len()).max(begin);
        let matches: Vec<Value> = self.games[begin..end]
            .iter()
            .map(|g| json!({"matchId": g.match_id, "timestamp": g.timestamp, "queue": "RANKED_SOLO_5x5"}))
            .collect();
        Ok(json!({"matches": matches, "totalGames": self.games.len(), "startIndex": begin, "endIndex": end}))
    }

    fn detail(&self, match_id: u64) -> Result<Value, AppError> {
        if let Some((failing, err)) = &self.failing_match {
            if *failing == match_id {
                return Err(err.clone());
            }
        }
        let game = self
            .games
            .iter()
            .find(|g| g.match_id == match_id)
            .ok_or_else(|| AppError::NotFound("not found".to_string()))?;
        Ok(json!({
            "matchId": game.match_id,
            "matchCreation": game.creation,
            "matchDuration": 1800,
            "participantIdentities": [
                {"participantId": 1, "player": {"summonerId": self.owner}},
                {"participantId": 2, "player": {"summonerId": self.owner + OPPONENT_OFFSET}}
            ],
            "participants": [
                {"participantId": 1, "stats": {"winner": game.winner}},
                {"participantId": 2, "stats": {"winner": !game.winner}}
            ]
        }))
    }
}

#[async_trait]
impl UpstreamApi for FakeUpstream {
    async fn fetch(
        &self,
        _region: Region,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, AppError> {
        if let Some(name) = path.strip_prefix("/v1.4/summoner/by-name/") {
            self.name_calls.fetch_add(1, Ordering::SeqCst);
            let id = self
                .names
                .get(name)
                .ok_or_else(|| AppError::NotFound("not found".to_string()))?;
            let mut by_name = serde_json::Map::new();
            by_name.insert(
                name.to_string(),
                json!({"id": id, "name": name, "summonerLevel": 30}),
            );
            return Ok(Value::Object(by_name));
        }
        if path.starts_with("/v2.2/matchlist/by-summoner/") {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            return self.list_page(params);
        }
        if let Some(id) = path.strip_prefix("/v2.2/match/") {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            let id = id
                .parse::<u64>()
                .map_err(|_| AppError::NotFound("not found".to_string()))?;
            let position = self.games.iter().position(|g| g.match_id == id);
            if let (Some(gate), Some(position)) = (&self.gate, position) {
                if position >= self.gate_from {
                    let _permit = gate
                        .acquire()
                        .await
                        .map_err(|_| AppError::Transport("gate closed".to_string()))?;
                }
            }
            return self.detail(id);
        }
        Err(AppError::NotFound(format!("no fake route for {path}")))
    }
}

pub struct TestContext {
    pub upstream: Arc<FakeUpstream>,
    pub cache: Arc<ResultCache>,
    pub service: MatchService,
}

pub fn setup_test_context(upstream: FakeUpstream, detail_concurrency: usize) -> TestContext {
    let cache = ResultCache::in_memory(1_000, 1_000, CacheTtls::default());
    setup_with_cache(upstream, cache, detail_concurrency)
}

pub fn setup_with_cache(
    upstream: FakeUpstream,
    cache: ResultCache,
    detail_concurrency: usize,
) -> TestContext {
    let upstream = Arc::new(upstream);
    let cache = Arc::new(cache);
    let api: Arc<dyn UpstreamApi> = upstream.clone();
    let resolver = IdentityResolver::new(Arc::clone(&api), Arc::clone(&cache));
    let aggregator = MatchAggregator::new(api, Arc::clone(&cache))
        .with_detail_concurrency(detail_concurrency);
    let service = MatchService::new(resolver, aggregator, Arc::clone(&cache), HistoryWindow(30));
    TestContext {
        upstream,
        cache,
        service,
    }
}

pub async fn collect_body(mut body: MatchBody) -> String {
    let mut out = Vec::new();
    while let Some(Ok(chunk)) = body.next().await {
        out.extend_from_slice(&chunk);
    }
    String::from_utf8(out).expect("document is utf-8")
}
