pub mod client;
pub mod retry;

pub use client::*;
pub use retry::*;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::model::{AccountId, Region, StandardName};

/// One region-scoped call to the game-statistics API, returning the decoded JSON body.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    async fn fetch(
        &self,
        region: Region,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, AppError>;
}

#[must_use]
pub fn summoner_by_name_path(name: &StandardName) -> String {
    format!("/v1.4/summoner/by-name/{}", urlencoding::encode(name.as_str()))
}

#[must_use]
pub fn match_list_path(account: AccountId) -> String {
    format!("/v2.2/matchlist/by-summoner/{account}")
}

#[must_use]
pub fn match_detail_path(match_id: u64) -> String {
    format!("/v2.2/match/{match_id}")
}
