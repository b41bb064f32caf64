//! Utility functions shared by the pipeline stages and the CLI.
//!

use anyhow::{Context, Result};
use std::str::FromStr;
use std::thread;

/// Split `items` into `n` contiguous groups whose sizes differ by at most
/// one. The first `len % n` groups get the extra item. Some groups are empty
/// when `n > len`.
///
/// Returns no groups when `n == 0`.
pub fn divide<T>(items: Vec<T>, n: usize) -> Vec<Vec<T>> {
    if n == 0 {
        return Vec::new();
    }
    let (base, extra) = (items.len() / n, items.len() % n);
    let mut iter = items.into_iter();
    (0..n)
        .map(|i| {
            let size = base + usize::from(i < extra);
            iter.by_ref().take(size).collect()
        })
        .collect()
}

/// Twice the available hardware parallelism.
pub fn default_pool_size() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

/// Whether an environment variable value reads as true.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse the value of the environment variable `name`, if it is set. A
/// malformed value is an error rather than a silent fallback.
pub fn parse_env_value<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed = value
        .trim()
        .parse::<T>()
        .with_context(|| format!("invalid value {value:?} for {name}"))?;
    Ok(Some(parsed))
}
