//! Pool configuration from `WORKER_*` environment variables.

use std::time::Duration;

use actors::PoolConfig;
use db::DbConfig;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{name} must be a non-negative integer, got {value:?}")]
    NotANumber { name: &'static str, value: String },
}

/// Build the pool config, starting from defaults and overriding with whatever is set.
///
/// `lookup` returns the value of an environment variable, if set.
pub fn from_env<F>(lookup: F) -> Result<PoolConfig, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup("WORKER_QUEUES") {
        Some(queues) => PoolConfig::new(
            queues
                .split(',')
                .map(str::trim)
                .filter(|q| !q.is_empty()),
        ),
        None => PoolConfig::default(),
    };

    if let Some(endpoint) = lookup("WORKER_DB_ENDPOINT") {
        config = config.with_connection(DbConfig::remote(endpoint));
    }
    if let Some(min) = count(&lookup, "WORKER_MIN_PROCESSORS")? {
        config = config.with_min_task_processors(min);
    }
    if let Some(max) = count(&lookup, "WORKER_MAX_PROCESSORS")? {
        config = config.with_max_task_processors(max);
    }
    if let Some(ms) = number(&lookup, "WORKER_CHECK_TIMEOUT_MS")? {
        config = config.with_check_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = number(&lookup, "WORKER_TIMEOUT_MS")? {
        config = config.with_timeout(Duration::from_millis(ms));
    }

    Ok(config)
}

/// Parse an optional numeric variable.
pub fn number<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SettingsError::NotANumber { name, value }),
    }
}

/// Parse an optional variable that must fit in a `usize`.
fn count<F>(lookup: &F, name: &'static str) -> Result<Option<usize>, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    number(lookup, name)?
        .map(|n| {
            usize::try_from(n).map_err(|_| SettingsError::NotANumber {
                name,
                value: n.to_string(),
            })
        })
        .transpose()
}
