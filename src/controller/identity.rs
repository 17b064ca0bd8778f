use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::cache::ResultCache;
use crate::controller::upstream::{UpstreamApi, summoner_by_name_path};
use crate::error::AppError;
use crate::model::{AccountId, PlayerQuery, Region, StandardName};

#[derive(Deserialize)]
struct SummonerDto {
    id: u64,
}

/// Maps a player name to an account id, cache first.
#[derive(Clone)]
pub struct IdentityResolver {
    api: Arc<dyn UpstreamApi>,
    cache: Arc<ResultCache>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(api: Arc<dyn UpstreamApi>, cache: Arc<ResultCache>) -> Self {
        Self { api, cache }
    }

    /// Validates `raw` and resolves it.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a missing or malformed name, `NotFound` when the player does not exist,
    /// otherwise whatever the upstream call failed with
    pub async fn resolve(&self, region: Region, raw: Option<&str>) -> Result<AccountId, AppError> {
        match PlayerQuery::parse(raw)? {
            PlayerQuery::ById(id) => Ok(id),
            PlayerQuery::Name(name) => self.resolve_name(region, &name).await,
        }
    }

    /// # Errors
    ///
    /// Will return `Err` if the lookup fails or the player does not exist
    pub async fn resolve_name(
        &self,
        region: Region,
        name: &StandardName,
    ) -> Result<AccountId, AppError> {
        if let Some(id) = self.cache.get_identity(region, name).await {
            return Ok(id);
        }

        let body = self
            .api
            .fetch(region, &summoner_by_name_path(name), &[])
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => summoner_not_found(),
                other => other,
            })?;
        let id = extract_account_id(body, name)?;
        debug!(%region, name = %name, account = %id, "resolved summoner");

        self.cache.set_identity(region, name, id).await;
        Ok(id)
    }
}

fn summoner_not_found() -> AppError {
    AppError::NotFound("summoner not found".to_string())
}

fn extract_account_id(body: Value, name: &StandardName) -> Result<AccountId, AppError> {
    let Value::Object(mut by_name) = body else {
        return Err(AppError::Parse("summoner lookup did not return an object".to_string()));
    };
    let entry = by_name.remove(name.as_str()).ok_or_else(summoner_not_found)?;
    let dto: SummonerDto = serde_json::from_value(entry)?;
    Ok(AccountId(dto.id))
}
