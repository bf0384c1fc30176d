use serde::{Deserialize, Serialize};

/// Lifecycle of an outbound quote call.
///
/// `Analyzed` is transitional: the provider has produced call analysis but the
/// authoritative end-of-call event may still be in flight. `Completed` and `Failed` are
/// terminal and share the top rank, so neither can replace the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "analyzed")]
    Analyzed,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Analyzed => "analyzed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in-progress" | "in_progress" => Some(Self::InProgress),
            "analyzed" => Some(Self::Analyzed),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Analyzed => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

pub const SYNTHETIC_CALL_PREFIXES: &[&str] = &["mock-", "mock_", "failed-", "error-"];

/// Call ids minted locally (mock mode, dispatch fallbacks) never exist at the provider.
pub fn is_synthetic_call_id(call_id: &str) -> bool {
    SYNTHETIC_CALL_PREFIXES.iter().any(|prefix| call_id.starts_with(prefix))
}
