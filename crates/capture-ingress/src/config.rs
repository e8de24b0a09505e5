//! Ingress-only configuration: the bot token and an optional access
//! allowlist.
//!
//! `spec.md` explicitly excludes message *authentication* from the core,
//! but says nothing about the thin adapter's own access list, so this
//! supplements it with the same allowlist shape `astrid-telegram`'s
//! `TelegramConfig` uses — empty allowlist means "no restriction".

use std::env;

const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
const ENV_ALLOWED_USER_IDS: &str = "TELEGRAM_ALLOWED_USER_IDS";

#[derive(Debug, Clone)]
pub struct IngressConfig {
    pub bot_token: String,
    pub allowed_user_ids: Vec<i64>,
}

impl IngressConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bot_token = env::var(ENV_BOT_TOKEN)
            .map_err(|_| anyhow::anyhow!("missing env var {ENV_BOT_TOKEN}"))?;

        let allowed_user_ids = env::var(ENV_ALLOWED_USER_IDS)
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .filter_map(|s| s.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bot_token,
            allowed_user_ids,
        })
    }

    /// An empty allowlist means every user is allowed.
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        self.allowed_user_ids.is_empty() || self.allowed_user_ids.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowlist_allows_everyone() {
        let cfg = IngressConfig {
            bot_token: "x".into(),
            allowed_user_ids: vec![],
        };
        assert!(cfg.is_user_allowed(42));
    }

    #[test]
    fn nonempty_allowlist_restricts_to_listed_ids() {
        let cfg = IngressConfig {
            bot_token: "x".into(),
            allowed_user_ids: vec![7, 11],
        };
        assert!(cfg.is_user_allowed(7));
        assert!(!cfg.is_user_allowed(42));
    }
}
