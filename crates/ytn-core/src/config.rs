use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Fixed delays and sizes used by the polling pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    /// Sleep between two polling cycles.
    pub check_interval: Duration,
    /// Pause between launching two channel checks.
    pub launch_stagger: Duration,
    /// Pause after a channel check fails, before the task returns.
    pub failure_cooldown: Duration,
    /// Back-off after an unexpected error in a whole cycle.
    pub cycle_error_backoff: Duration,
    /// Upper bound on channel checks running at the same time.
    pub max_concurrent_checks: usize,
    /// Activity page size requested per check.
    pub page_size: u32,
    pub batch_size: usize,
    pub per_destination_pause: Duration,
    pub inter_batch_pause: Duration,
    pub transient_retry_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            launch_stagger: Duration::from_secs(2),
            failure_cooldown: Duration::from_secs(5),
            cycle_error_backoff: Duration::from_secs(30),
            max_concurrent_checks: 5,
            page_size: 5,
            batch_size: 3,
            per_destination_pause: Duration::from_secs(2),
            inter_batch_pause: Duration::from_secs(3),
            transient_retry_delay: Duration::from_secs(5),
        }
    }
}

/// Typed process configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub youtube_api_key: String,
    pub youtube_api_base: String,
    pub admin_users: Vec<i64>,
    pub data_dir: PathBuf,
    pub http_timeout: Duration,
    pub pacing: Pacing,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let youtube_api_key = required("YOUTUBE_API_KEY")?;

        let admin_users = parse_csv_i64(env_str("ADMIN_USERS"));
        if admin_users.is_empty() {
            return Err(Error::Config(
                "ADMIN_USERS environment variable is required".to_string(),
            ));
        }

        let youtube_api_base = env_str("YOUTUBE_API_BASE")
            .and_then(non_empty)
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_YOUTUBE_API_BASE.to_string());

        let data_dir = env_path("DATA_DIR").unwrap_or_else(|| PathBuf::from("data"));
        let http_timeout = Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS").unwrap_or(30));

        let mut pacing = Pacing::default();
        if let Some(secs) = env_u64("CHECK_INTERVAL") {
            if secs == 0 {
                return Err(Error::Config("CHECK_INTERVAL must be > 0".to_string()));
            }
            pacing.check_interval = Duration::from_secs(secs);
        }
        if let Some(n) = env_usize("MAX_CONCURRENT_CHECKS") {
            pacing.max_concurrent_checks = n.max(1);
        }

        Ok(Self {
            telegram_bot_token,
            youtube_api_key,
            youtube_api_base,
            admin_users,
            data_dir,
            http_timeout,
            pacing,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env_str(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_skips_garbage() {
        assert_eq!(
            parse_csv_i64(Some(" 1, 2,,abc, -3 ".to_string())),
            vec![1, 2, -3]
        );
        assert!(parse_csv_i64(None).is_empty());
    }

    #[test]
    fn dotenv_parses_quotes_comments_and_export() {
        let parsed = parse_dotenv(
            "# comment\nTELEGRAM_BOT_TOKEN=\"abc:def\"\nexport CHECK_INTERVAL=60\nbroken line\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "abc:def".to_string()),
                ("CHECK_INTERVAL".to_string(), "60".to_string()),
            ]
        );
    }

    #[test]
    fn default_pacing_matches_documented_units() {
        let p = Pacing::default();
        assert_eq!(p.check_interval, Duration::from_secs(300));
        assert_eq!(p.batch_size, 3);
        assert_eq!(p.page_size, 5);
        assert_eq!(p.cycle_error_backoff, Duration::from_secs(30));
    }
}
