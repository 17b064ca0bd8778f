use std::fs;
use std::path::PathBuf;

use super::types::Args;

impl Args {
    /// Checks ranges and fills in the API key and memcached settings from their files when they
    /// were not given directly.
    ///
    /// # Errors
    ///
    /// Will return `Err` if a setting is out of range or no API key can be found
    pub fn validate(&mut self) -> Result<(), String> {
        if self.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            self.api_key = Some(read_key_file(&self.api_key_file)?);
        }
        if self
            .memcached_servers
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
        {
            if let Some((servers, username, password)) =
                read_memcached_key_file(&self.memcached_key_file)?
            {
                self.memcached_servers = Some(servers);
                self.memcached_username = username;
                self.memcached_password = password;
            }
        }
        if self.page_size == 0 {
            return Err("page size must be at least 1".to_string());
        }
        if self.max_retries == 0 {
            return Err("max retries must be at least 1".to_string());
        }
        if self.retry_max_delay_ms == 0 {
            return Err("retry max delay must be at least 1 ms".to_string());
        }
        if self.detail_concurrency == 0 {
            return Err("detail concurrency must be at least 1".to_string());
        }
        if self.identity_capacity == 0 || self.result_capacity == 0 {
            return Err("cache capacities must be at least 1".to_string());
        }
        if self.cache_check_period_secs == 0 {
            return Err("cache check period must be at least 1 second".to_string());
        }
        if self.user_agent.trim().is_empty() {
            return Err("user agent must not be empty".to_string());
        }
        if let Some(bad) = self
            .retry_statuses
            .iter()
            .find(|s| !(400..=599).contains(*s))
        {
            return Err(format!("retry status {bad} is not an HTTP error status"));
        }
        Ok(())
    }
}

/// # Errors
///
/// Will return `Err` if the file is not readable or holds only whitespace
pub fn read_key_file(file: &str) -> Result<String, String> {
    let path = PathBuf::from(file);
    if !path.is_file() {
        return Err(format!(
            "No API key given and the key file '{file}' is not readable."
        ));
    }
    let contents = fs::read_to_string(&path)
        .map_err(|e| format!("The key file '{file}' could not be read: {e}"))?;
    let key = contents.trim();
    if key.is_empty() {
        return Err(format!("The key file '{file}' is empty."));
    }
    Ok(key.to_string())
}

type MemcachedSettings = (String, Option<String>, Option<String>);

/// Reads `server|username|password` from `file`. A missing file means no memcached.
///
/// # Errors
///
/// Will return `Err` if the file exists but cannot be read or names no server
pub fn read_memcached_key_file(file: &str) -> Result<Option<MemcachedSettings>, String> {
    let path = PathBuf::from(file);
    if !path.is_file() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path)
        .map_err(|e| format!("The memcached key file '{file}' could not be read: {e}"))?;
    parse_memcached_settings(&contents)
        .map(Some)
        .ok_or_else(|| format!("The memcached key file '{file}' names no server."))
}

fn parse_memcached_settings(contents: &str) -> Option<MemcachedSettings> {
    let mut parts = contents.trim().splitn(3, '|').map(str::trim);
    let servers = parts.next().filter(|s| !s.is_empty())?.to_string();
    let mut optional = || parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    let username = optional();
    let password = optional();
    Some((servers, username, password))
}
