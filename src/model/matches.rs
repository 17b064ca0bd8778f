use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AccountId;
use crate::error::AppError;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// One played match, seen from the requesting account.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: u64,
    /// Epoch milliseconds.
    pub match_creation: i64,
    /// Seconds.
    pub match_duration: i64,
    pub winner: bool,
}

/// Entry of a match-list page. Pages come newest first.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRef {
    pub match_id: u64,
    pub timestamp: i64,
}

#[derive(Deserialize, Debug, Default)]
pub struct MatchListPage {
    #[serde(default)]
    pub matches: Vec<MatchRef>,
}

impl MatchListPage {
    /// # Errors
    ///
    /// Will return `Err` if the body is not a match-list object
    pub fn from_json(body: Value) -> Result<Self, AppError> {
        if body.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(body)?)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantOutcome {
    pub account_id: AccountId,
    pub winner: bool,
}

/// Account-independent match detail, the value stored under `game:<matchId>`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub match_id: u64,
    pub match_creation: i64,
    pub match_duration: i64,
    pub participants: Vec<ParticipantOutcome>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailDto {
    match_id: u64,
    match_creation: i64,
    match_duration: i64,
    #[serde(default)]
    participant_identities: Vec<IdentityDto>,
    #[serde(default)]
    participants: Vec<ParticipantDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDto {
    participant_id: u32,
    player: Option<PlayerDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDto {
    summoner_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantDto {
    participant_id: u32,
    #[serde(default)]
    stats: StatsDto,
}

#[derive(Deserialize, Default)]
struct StatsDto {
    #[serde(default)]
    winner: bool,
}

impl MatchRecord {
    /// Builds a record from an upstream match-detail body.
    ///
    /// # Errors
    ///
    /// Will return `Err` if required detail fields are missing or mistyped
    pub fn from_detail(body: Value) -> Result<Self, AppError> {
        let dto: DetailDto = serde_json::from_value(body)?;
        let participants = dto
            .participant_identities
            .iter()
            .filter_map(|identity| {
                let player = identity.player.as_ref()?;
                let stats = dto
                    .participants
                    .iter()
                    .find(|p| p.participant_id == identity.participant_id)?;
                Some(ParticipantOutcome {
                    account_id: AccountId(player.summoner_id),
                    winner: stats.stats.winner,
                })
            })
            .collect();

        Ok(Self {
            match_id: dto.match_id,
            match_creation: dto.match_creation,
            match_duration: dto.match_duration,
            participants,
        })
    }

    /// The outcome is read from the participant whose identity is `account`, never from a fixed slot.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `account` did not play in this match
    pub fn summary_for(&self, account: AccountId) -> Result<MatchSummary, AppError> {
        let outcome = self
            .participants
            .iter()
            .find(|p| p.account_id == account)
            .ok_or_else(|| {
                AppError::Parse(format!(
                    "account {account} not among participants of match {}",
                    self.match_id
                ))
            })?;
        Ok(MatchSummary {
            match_id: self.match_id,
            match_creation: self.match_creation,
            match_duration: self.match_duration,
            winner: outcome.winner,
        })
    }
}

/// How far back history is considered. Negative means unlimited.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct HistoryWindow(pub i64);

impl HistoryWindow {
    #[must_use]
    pub fn days(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn is_unlimited(self) -> bool {
        self.0 < 0
    }

    /// Oldest creation timestamp (epoch ms) still inside the window.
    #[must_use]
    pub fn cutoff(self, now_ms: i64) -> Option<i64> {
        if self.is_unlimited() {
            None
        } else {
            Some(now_ms.saturating_sub(self.0.saturating_mul(MS_PER_DAY)))
        }
    }

    #[must_use]
    pub fn contains(self, timestamp_ms: i64, now_ms: i64) -> bool {
        self.cutoff(now_ms).is_none_or(|cutoff| timestamp_ms >= cutoff)
    }

    /// True when every match inside `other` is also inside `self`.
    #[must_use]
    pub fn covers(self, other: HistoryWindow) -> bool {
        self.is_unlimited() || (!other.is_unlimited() && self.0 >= other.0)
    }
}

/// Aggregate for one `(region, account)`, newest first.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub window: HistoryWindow,
    pub matches: Vec<MatchSummary>,
}

impl AggregateResult {
    /// Returns the cached matches still inside `window`, or `None` when the cached window is too narrow.
    #[must_use]
    pub fn replay(&self, window: HistoryWindow, now_ms: i64) -> Option<Vec<MatchSummary>> {
        if !self.window.covers(window) {
            return None;
        }
        Some(
            self.matches
                .iter()
                .filter(|m| window.contains(m.match_creation, now_ms))
                .cloned()
                .collect(),
        )
    }
}
