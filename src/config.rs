// =============================================================================
// config.rs — KNOBS
// =============================================================================
//
// Everything tunable lives here and comes from the environment, with a
// `.env` file honoured when present. Every variable is prefixed with
// RANKINGS_ so it doesn't collide with whatever else lives in your shell.
//
// Query parameters (years, age groups, events) are NOT configuration; they
// come from the command line because they change on every run.
// =============================================================================

use std::env;

/// Runtime configuration for the importer and the stats endpoint.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // UPSTREAM
    // =========================================================================

    /// Rankings page endpoint. Query parameters are appended per query.
    /// Default: https://www.mastersrankings.com/rankings/
    pub rankings_url: String,

    /// Per-request timeout for the rankings fetch, in seconds.
    pub http_timeout_secs: u64,

    /// User agent sent with every fetch. Be honest about who is scraping.
    pub user_agent: String,

    // =========================================================================
    // STORAGE
    // =========================================================================

    /// Path of the SQLite database file. Created on first use.
    pub database_path: String,

    /// How many athlete and meet keys the writer remembers per run so it can
    /// skip inserts it already knows are no-ops.
    pub seen_cache_size: usize,

    // =========================================================================
    // STATS ENDPOINT
    // =========================================================================

    /// Address the `serve` subcommand listens on.
    pub stats_bind_addr: String,
}

impl Config {
    /// Load configuration from environment variables with defaults that work
    /// out of the box.
    pub fn from_env() -> Self {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        Config {
            rankings_url: env_or_default(
                "RANKINGS_BASE_URL",
                "https://www.mastersrankings.com/rankings/",
            ),
            http_timeout_secs: env_or_default("RANKINGS_HTTP_TIMEOUT_SECS", "30")
                .parse()
                .unwrap_or(30),
            user_agent: env_or_default(
                "RANKINGS_USER_AGENT",
                "MastersRankingsEngine/0.1 (rankings-statistics; personal-project)",
            ),

            database_path: env_or_default("RANKINGS_DATABASE", "masterstrack.db"),
            seen_cache_size: env_or_default("RANKINGS_SEEN_CACHE_SIZE", "10000")
                .parse()
                .unwrap_or(10_000),

            stats_bind_addr: env_or_default("RANKINGS_STATS_BIND", "127.0.0.1:9090"),
        }
    }
}

/// Read an environment variable, falling back to `default` when unset.
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_default_falls_back() {
        assert_eq!(
            env_or_default("RANKINGS_TEST_SURELY_UNSET_VARIABLE", "fallback"),
            "fallback"
        );
    }
}
