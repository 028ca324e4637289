//! One-time tokens for private log delivery.
//!
//! When a build fails in a group chat the log is never posted there; the
//! failure message carries a deep link (`t.me/<bot>?start=sendlog_<token>`)
//! into a private chat with the bot, where redeeming the token delivers
//! the log. Tokens are single-use and expire after a bounded window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// How long an issued token stays redeemable.
const TOKEN_TTL: Duration = Duration::from_secs(600);

struct IssuedToken {
    chat_id: i64,
    issued_at: Instant,
}

/// In-memory registry of outstanding log tokens.
///
/// Only this bot process issues and redeems tokens, so they don't need to
/// survive a restart; a lost token just means re-running the failed build.
pub struct LogTokens {
    ttl: Duration,
    entries: Mutex<HashMap<String, IssuedToken>>,
}

impl Default for LogTokens {
    fn default() -> Self {
        Self::with_ttl(TOKEN_TTL)
    }
}

impl LogTokens {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a token granting one retrieval of `chat_id`'s build log.
    pub fn issue(&self, chat_id: i64) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let mut entries = self.entries.lock().expect("log token lock");
        entries.retain(|_, t| t.issued_at.elapsed() <= self.ttl);
        entries.insert(
            token.clone(),
            IssuedToken {
                chat_id,
                issued_at: Instant::now(),
            },
        );
        token
    }

    /// Redeems a token, returning the chat whose log it grants.
    ///
    /// Consumes the token: a second redemption returns `None`, as does an
    /// expired or unknown token.
    pub fn redeem(&self, token: &str) -> Option<i64> {
        let mut entries = self.entries.lock().expect("log token lock");
        let issued = entries.remove(token)?;
        if issued.issued_at.elapsed() > self.ttl {
            return None;
        }
        Some(issued.chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeems_once() {
        let tokens = LogTokens::default();
        let token = tokens.issue(-100123);

        assert_eq!(tokens.redeem(&token), Some(-100123));
        assert_eq!(tokens.redeem(&token), None, "tokens are single-use");
    }

    #[test]
    fn unknown_token_fails() {
        let tokens = LogTokens::default();
        assert_eq!(tokens.redeem("nope"), None);
    }

    #[test]
    fn expired_token_fails() {
        let tokens = LogTokens::with_ttl(Duration::from_millis(0));
        let token = tokens.issue(-100123);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(tokens.redeem(&token), None);
    }

    #[test]
    fn tokens_are_unique_per_issue() {
        let tokens = LogTokens::default();
        assert_ne!(tokens.issue(1), tokens.issue(1));
    }
}
