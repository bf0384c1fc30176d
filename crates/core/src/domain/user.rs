use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for get-or-create. Users are keyed by email, so a guest without one gets a
/// placeholder that is unique per submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl NewUser {
    pub fn resolved_email(&self) -> String {
        match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_ascii_lowercase(),
            _ => Self::guest_email(),
        }
    }

    pub fn guest_email() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(|byte| char::from(byte).to_ascii_lowercase())
            .collect();
        format!("guest_{}_{suffix}", Utc::now().timestamp_millis())
    }

    pub fn display_name(&self) -> String {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            "Guest".to_string()
        } else {
            trimmed.to_string()
        }
    }
}
