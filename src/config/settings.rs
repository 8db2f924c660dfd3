// src/config/settings.rs
//! Runtime knobs read from the environment (a `.env` file is loaded by the binary).

use std::path::PathBuf;

pub const ENV_KEYWORDS_PATH: &str = "INSIGHT_KEYWORDS_PATH";
pub const ENV_ALIASES_PATH: &str = "INSIGHT_ALIASES_PATH";
pub const ENV_CONCURRENCY: &str = "INGEST_CONCURRENCY";
pub const ENV_DEFAULT_HOURS: &str = "INGEST_DEFAULT_HOURS";
pub const ENV_SNIPPET_MAX: &str = "SNIPPET_MAX_LENGTH";

pub const DEFAULT_KEYWORDS_PATH: &str = "config/keywords.json";
pub const DEFAULT_ALIASES_PATH: &str = "config/tool_aliases.json";
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_HOURS_BACK: i64 = 24;
/// Longest look-back window a run accepts, in hours.
pub const MAX_HOURS_BACK: i64 = 24 * 30;
pub const DEFAULT_SNIPPET_MAX: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub keywords_path: PathBuf,
    pub aliases_path: PathBuf,
    pub concurrency_limit: usize,
    pub default_hours_back: i64,
    pub snippet_max_length: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keywords_path: PathBuf::from(DEFAULT_KEYWORDS_PATH),
            aliases_path: PathBuf::from(DEFAULT_ALIASES_PATH),
            concurrency_limit: DEFAULT_CONCURRENCY,
            default_hours_back: DEFAULT_HOURS_BACK,
            snippet_max_length: DEFAULT_SNIPPET_MAX,
        }
    }
}

// parse optional integer env and clamp; anything unparsable falls back
fn parse_clamped<T>(raw: Option<String>, lo: T, hi: T) -> Option<T>
where
    T: std::str::FromStr + Ord,
{
    raw.and_then(|s| s.trim().parse::<T>().ok())
        .map(|v| v.clamp(lo, hi))
}

/// Clamp a requested look-back window to `1..=MAX_HOURS_BACK`.
pub fn clamp_hours_back(hours: i64) -> i64 {
    hours.clamp(1, MAX_HOURS_BACK)
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Self::default();
        let var = |k: &str| std::env::var(k).ok();
        Self {
            keywords_path: var(ENV_KEYWORDS_PATH)
                .map(PathBuf::from)
                .unwrap_or(d.keywords_path),
            aliases_path: var(ENV_ALIASES_PATH)
                .map(PathBuf::from)
                .unwrap_or(d.aliases_path),
            concurrency_limit: parse_clamped(var(ENV_CONCURRENCY), 1, 64)
                .unwrap_or(d.concurrency_limit),
            default_hours_back: parse_clamped(var(ENV_DEFAULT_HOURS), 1, MAX_HOURS_BACK)
                .unwrap_or(d.default_hours_back),
            snippet_max_length: parse_clamped(var(ENV_SNIPPET_MAX), 20, 2000)
                .unwrap_or(d.snippet_max_length),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn clamp_and_fallback() {
        assert_eq!(parse_clamped::<usize>(Some(" 200 ".into()), 1, 64), Some(64));
        assert_eq!(parse_clamped::<usize>(Some("0".into()), 1, 64), Some(1));
        assert_eq!(parse_clamped::<usize>(Some("ten".into()), 1, 64), None);
        assert_eq!(parse_clamped::<i64>(None, 1, 10), None);
    }

    #[test]
    fn hours_back_is_bounded() {
        assert_eq!(clamp_hours_back(0), 1);
        assert_eq!(clamp_hours_back(48), 48);
        assert_eq!(clamp_hours_back(i64::MAX), MAX_HOURS_BACK);
    }

    #[serial_test::serial]
    #[test]
    fn reads_env_overrides() {
        env::set_var(ENV_CONCURRENCY, "3");
        env::set_var(ENV_SNIPPET_MAX, "nope");
        env::set_var(ENV_KEYWORDS_PATH, "/tmp/kw.json");
        let s = Settings::from_env();
        assert_eq!(s.concurrency_limit, 3);
        assert_eq!(s.snippet_max_length, DEFAULT_SNIPPET_MAX);
        assert_eq!(s.keywords_path, PathBuf::from("/tmp/kw.json"));
        env::remove_var(ENV_CONCURRENCY);
        env::remove_var(ENV_SNIPPET_MAX);
        env::remove_var(ENV_KEYWORDS_PATH);
    }
}
