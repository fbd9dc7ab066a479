use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Credentials for the Sheets API. Token acquisition happens outside the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetsAuth {
    ApiKey(String),
    BearerToken(String),
}

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub recipients: Vec<i64>,
    pub telegram_allowed_users: Vec<i64>,

    // Data source
    pub spreadsheet_id: String,
    pub worksheet_name: String,
    pub sheets_auth: SheetsAuth,
    pub sheets_api_base: String,

    // Polling
    pub poll_interval: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub force_scan_rows: usize,

    // Behavior flags
    pub skip_existing_rows: bool,
    pub auto_start: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let recipients = parse_id_list("CHAT_IDS", env_str("CHAT_IDS"))?;
        if recipients.is_empty() {
            return Err(Error::Config(
                "CHAT_IDS environment variable is required".to_string(),
            ));
        }

        // Control surface defaults to the recipients themselves.
        let telegram_allowed_users = match parse_id_list(
            "TELEGRAM_ALLOWED_USERS",
            env_str("TELEGRAM_ALLOWED_USERS"),
        )? {
            v if v.is_empty() => recipients.clone(),
            v => v,
        };

        let spreadsheet_id = env_str("SPREADSHEET_ID")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("SPREADSHEET_ID environment variable is required".to_string())
            })?;
        let worksheet_name = env_str("WORKSHEET_NAME")
            .and_then(non_empty)
            .unwrap_or_else(|| "Sheet1".to_string());

        let sheets_auth = match (
            env_str("GOOGLE_ACCESS_TOKEN").and_then(non_empty),
            env_str("GOOGLE_API_KEY").and_then(non_empty),
        ) {
            (Some(token), _) => SheetsAuth::BearerToken(token),
            (None, Some(key)) => SheetsAuth::ApiKey(key),
            (None, None) => {
                return Err(Error::Config(
                    "GOOGLE_ACCESS_TOKEN or GOOGLE_API_KEY environment variable is required"
                        .to_string(),
                ))
            }
        };
        let sheets_api_base = env_str("SHEETS_API_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://sheets.googleapis.com/v4".to_string())
            .trim_end_matches('/')
            .to_string();

        // Polling cadence and retry budget
        let poll_interval = Duration::from_secs(env_u64("POLLING_INTERVAL").unwrap_or(300));
        if poll_interval.is_zero() {
            return Err(Error::Config("POLLING_INTERVAL must be > 0".to_string()));
        }
        let max_retries = env_u32("MAX_RETRIES").unwrap_or(3).max(1);
        let initial_backoff = Duration::from_secs(env_u64("INITIAL_BACKOFF").unwrap_or(5));
        let force_scan_rows = env_usize("FORCE_SCAN_ROWS").unwrap_or(3).max(1);

        let skip_existing_rows = env_bool("SKIP_EXISTING_ROWS").unwrap_or(false);
        let auto_start = env_bool("AUTO_START").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            recipients,
            telegram_allowed_users,
            spreadsheet_id,
            worksheet_name,
            sheets_auth,
            sheets_api_base,
            poll_interval,
            max_retries,
            initial_backoff,
            force_scan_rows,
            skip_existing_rows,
            auto_start,
        })
    }
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

        let key = k.trim();
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

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

/// Comma-separated chat/user ids. Blank entries are ignored, malformed ones
/// are an error so a typo never silently drops a recipient.
fn parse_id_list(key: &str, raw: Option<String>) -> Result<Vec<i64>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("{key}: invalid id {s:?}")))
        })
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
    fn id_lists_skip_blanks() {
        let ids = parse_id_list("CHAT_IDS", Some(" 105162170, ,-100123 ".to_string())).unwrap();
        assert_eq!(ids, vec![105162170, -100123]);
        assert!(parse_id_list("CHAT_IDS", None).unwrap().is_empty());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let err = parse_id_list("CHAT_IDS", Some("1,abc".to_string())).unwrap_err();
        assert!(err.to_string().contains("CHAT_IDS: invalid id \"abc\""));
    }

    #[test]
    fn dotenv_strips_quotes_and_comments() {
        let parsed = parse_dotenv("# comment\nCHAT_IDS=\"1,2\"\n\nWORKSHEET_NAME='Form Responses 1'\nbroken\n");
        assert_eq!(
            parsed,
            vec![
                ("CHAT_IDS".to_string(), "1,2".to_string()),
                ("WORKSHEET_NAME".to_string(), "Form Responses 1".to_string()),
            ]
        );
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert!(parse_bool("yes"));
        assert!(parse_bool(" TRUE "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("off"));
        assert!(!parse_bool(""));
    }
}
