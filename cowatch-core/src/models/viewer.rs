use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::{SessionId, ViewerId};

/// Admission status of a viewer in a session.
///
/// Gates chat and playback-control privileges but not observation: a pending
/// viewer still receives state broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum AdmissionStatus {
    /// Waiting for the host's decision
    #[default]
    Pending,
    /// Admitted by the host (hosts are admitted automatically)
    Admitted,
    /// Rejected by the host
    Rejected,
}

impl AdmissionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Admitted => "admitted",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }

    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

impl FromStr for AdmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "admitted" => Ok(Self::Admitted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown admission status: {s}")),
        }
    }
}

impl std::fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Self-reported connection quality, surfaced in the viewer list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ConnectionQuality {
    #[default]
    Good,
    Fair,
    Poor,
    Offline,
}

impl ConnectionQuality {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewer {
    pub session_id: SessionId,
    pub viewer_id: ViewerId,
    pub name: String,
    pub status: AdmissionStatus,
    pub connection_quality: ConnectionQuality,
    pub joined_at: DateTime<Utc>,
}

impl Viewer {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        viewer_id: ViewerId,
        name: String,
        status: AdmissionStatus,
    ) -> Self {
        Self {
            session_id,
            viewer_id,
            name,
            status,
            connection_quality: ConnectionQuality::Good,
            joined_at: Utc::now(),
        }
    }
}
