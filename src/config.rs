//! Engine configuration (C12, §4.12): durable-store location, delegation
//! durations, identity cache freshness, and scoring/limit constants. Every field
//! has a `serde(default = ...)` constant that falls back to an environment
//! variable before a hardcoded default, the same layering the teacher's
//! `config_defaults` module uses for `PORT`/`HOST`.

use serde::{Deserialize, Serialize};

/// Engine-wide configuration. Deserializable from a config file; every field
/// falls back to `OPCHAN_*` environment variables, then a hardcoded default,
/// when absent from the file (§4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "config_defaults::default_durable_store_path")]
    pub durable_store_path: String,
    #[serde(default = "config_defaults::default_wallet_delegation_duration_ms")]
    pub wallet_delegation_duration_ms: u64,
    #[serde(default = "config_defaults::default_anonymous_delegation_duration_ms")]
    pub anonymous_delegation_duration_ms: u64,
    #[serde(default = "config_defaults::default_identity_cache_freshness_ms")]
    pub identity_cache_freshness_ms: u64,
    #[serde(default = "config_defaults::default_score_half_life_ms")]
    pub score_half_life_ms: u64,
    #[serde(default = "config_defaults::default_max_title_len")]
    pub max_title_len: usize,
    #[serde(default = "config_defaults::default_max_body_len")]
    pub max_body_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            durable_store_path: config_defaults::default_durable_store_path(),
            wallet_delegation_duration_ms: config_defaults::default_wallet_delegation_duration_ms(),
            anonymous_delegation_duration_ms:
                config_defaults::default_anonymous_delegation_duration_ms(),
            identity_cache_freshness_ms: config_defaults::default_identity_cache_freshness_ms(),
            score_half_life_ms: config_defaults::default_score_half_life_ms(),
            max_title_len: config_defaults::default_max_title_len(),
            max_body_len: config_defaults::default_max_body_len(),
        }
    }
}

impl EngineConfig {
    pub fn limits(&self) -> crate::message::validate::Limits {
        crate::message::validate::Limits {
            max_title_len: self.max_title_len,
            max_body_len: self.max_body_len,
        }
    }
}

pub mod config_defaults {
    use std::env;

    pub const DEFAULT_DURABLE_STORE_PATH: &str = "./opchan-data";
    pub const DEFAULT_WALLET_DELEGATION_DURATION_MS: u64 = 7 * 24 * 60 * 60 * 1000;
    pub const DEFAULT_ANONYMOUS_DELEGATION_DURATION_MS: u64 = 30 * 24 * 60 * 60 * 1000;
    pub const DEFAULT_IDENTITY_CACHE_FRESHNESS_MS: u64 = 5 * 60 * 1000;
    pub const DEFAULT_SCORE_HALF_LIFE_MS: u64 = 7 * 24 * 60 * 60 * 1000;
    pub const DEFAULT_MAX_TITLE_LEN: usize = 300;
    pub const DEFAULT_MAX_BODY_LEN: usize = 10_000;

    /// `$OPCHAN_DURABLE_STORE_PATH` -> `./opchan-data`.
    pub fn default_durable_store_path() -> String {
        env::var("OPCHAN_DURABLE_STORE_PATH").unwrap_or_else(|_| DEFAULT_DURABLE_STORE_PATH.to_string())
    }

    /// `$OPCHAN_WALLET_DELEGATION_DURATION_MS` -> 7 days.
    pub fn default_wallet_delegation_duration_ms() -> u64 {
        env_u64(
            "OPCHAN_WALLET_DELEGATION_DURATION_MS",
            DEFAULT_WALLET_DELEGATION_DURATION_MS,
        )
    }

    /// `$OPCHAN_ANONYMOUS_DELEGATION_DURATION_MS` -> 30 days.
    pub fn default_anonymous_delegation_duration_ms() -> u64 {
        env_u64(
            "OPCHAN_ANONYMOUS_DELEGATION_DURATION_MS",
            DEFAULT_ANONYMOUS_DELEGATION_DURATION_MS,
        )
    }

    /// `$OPCHAN_IDENTITY_CACHE_FRESHNESS_MS` -> 5 minutes.
    pub fn default_identity_cache_freshness_ms() -> u64 {
        env_u64(
            "OPCHAN_IDENTITY_CACHE_FRESHNESS_MS",
            DEFAULT_IDENTITY_CACHE_FRESHNESS_MS,
        )
    }

    /// `$OPCHAN_SCORE_HALF_LIFE_MS` -> 7 days.
    pub fn default_score_half_life_ms() -> u64 {
        env_u64("OPCHAN_SCORE_HALF_LIFE_MS", DEFAULT_SCORE_HALF_LIFE_MS)
    }

    /// `$OPCHAN_MAX_TITLE_LEN` -> 300.
    pub fn default_max_title_len() -> usize {
        env_usize("OPCHAN_MAX_TITLE_LEN", DEFAULT_MAX_TITLE_LEN)
    }

    /// `$OPCHAN_MAX_BODY_LEN` -> 10000.
    pub fn default_max_body_len() -> usize {
        env_usize("OPCHAN_MAX_BODY_LEN", DEFAULT_MAX_BODY_LEN)
    }

    fn env_u64(key: &str, default: u64) -> u64 {
        env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
    }

    fn env_usize(key: &str, default: usize) -> usize {
        env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
    }
}
