// User Quota Domain Model

use crate::domain::job::UserId;
use serde::{Deserialize, Serialize};

/// Token balance and article allowance of one user
///
/// Read fresh before every item; never cached across items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuota {
    pub user_id: UserId,
    pub tokens_remaining: i64,
    pub article_allowance: i64,
}

impl UserQuota {
    pub fn new(user_id: impl Into<String>, tokens_remaining: i64, article_allowance: i64) -> Self {
        Self {
            user_id: user_id.into(),
            tokens_remaining,
            article_allowance,
        }
    }

    /// Reason the next item may not run, if any
    pub fn exhaustion_reason(&self) -> Option<String> {
        if self.tokens_remaining <= 0 {
            Some(format!(
                "Token balance exhausted ({} remaining); job paused until quota is replenished",
                self.tokens_remaining
            ))
        } else if self.article_allowance <= 0 {
            Some(
                "Article allowance exhausted; job paused until quota is replenished".to_string(),
            )
        } else {
            None
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhaustion_reason().is_some()
    }
}
