//! Per-request cache policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::client::ApiError;

/// Where a request may be served from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchOption {
    /// Serve from the cache only. A miss is `NotFound`; the network is never used.
    CacheOnly,
    /// Always query the network and refresh the cache.
    OnlineOnly,
    /// Serve cache hits, otherwise query the network and refresh the cache.
    #[default]
    OnlineIfNotFound,
    /// Answer from the cache and refresh the cache from the network in the
    /// background. The refreshed value is visible to later requests only.
    CacheWithUpdate,
}

impl fmt::Display for FetchOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchOption::CacheOnly => "cache-only",
            FetchOption::OnlineOnly => "online-only",
            FetchOption::OnlineIfNotFound => "online-if-not-found",
            FetchOption::CacheWithUpdate => "cache-with-update",
        };
        f.write_str(name)
    }
}

impl FromStr for FetchOption {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "cache-only" => Ok(FetchOption::CacheOnly),
            "online-only" => Ok(FetchOption::OnlineOnly),
            "online-if-not-found" => Ok(FetchOption::OnlineIfNotFound),
            "cache-with-update" => Ok(FetchOption::CacheWithUpdate),
            other => Err(ApiError::invalid_request(format!(
                "Unknown fetch option '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_online_if_not_found() {
        assert_eq!(FetchOption::default(), FetchOption::OnlineIfNotFound);
    }

    #[test]
    fn test_parse_names() {
        for option in [
            FetchOption::CacheOnly,
            FetchOption::OnlineOnly,
            FetchOption::OnlineIfNotFound,
            FetchOption::CacheWithUpdate,
        ] {
            assert_eq!(option.to_string().parse::<FetchOption>().unwrap(), option);
        }
        assert_eq!(
            "CACHE_ONLY".parse::<FetchOption>().unwrap(),
            FetchOption::CacheOnly
        );
        assert!("sometimes".parse::<FetchOption>().is_err());
    }
}
