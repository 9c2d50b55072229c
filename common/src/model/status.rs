use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a site is currently producing data.
///
/// Stored as a single character in the database (`y`, `n`, `r`) and exposed
/// as a lowercase word through the JSON API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalStatus {
    Yes,
    No,
    Retired,
}

impl OperationalStatus {
    pub fn code(self) -> &'static str {
        match self {
            OperationalStatus::Yes => "y",
            OperationalStatus::No => "n",
            OperationalStatus::Retired => "r",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "y" => Some(OperationalStatus::Yes),
            "n" => Some(OperationalStatus::No),
            "r" => Some(OperationalStatus::Retired),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OperationalStatus::Yes => "Yes",
            OperationalStatus::No => "No",
            OperationalStatus::Retired => "Retired",
        }
    }

    pub fn api_word(self) -> &'static str {
        match self {
            OperationalStatus::Yes => "yes",
            OperationalStatus::No => "no",
            OperationalStatus::Retired => "retired",
        }
    }

    pub const ALL: [OperationalStatus; 3] = [
        OperationalStatus::Yes,
        OperationalStatus::No,
        OperationalStatus::Retired,
    ];
}

/// Current operational status of one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteStatus {
    pub site_id: String,
    pub site_name: String,
    pub username: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub status: OperationalStatus,
    pub description: Option<String>,
}

/// One past status update, appended every time a site status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteStatusHistory {
    pub id: i64,
    pub site_id: String,
    pub username: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub status: OperationalStatus,
    pub description: Option<String>,
}

/// Shape of one entry in the read-only status API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusApiEntry {
    pub id: String,
    pub name: String,
    pub status: String,
    pub descr: Option<String>,
    pub user: Option<String>,
    pub date: Option<String>,
    pub display_descr: String,
}

pub const NO_DESCRIPTION: &str = "No description given";

impl From<&SiteStatus> for StatusApiEntry {
    fn from(status: &SiteStatus) -> Self {
        let display_descr = match status.description.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => NO_DESCRIPTION.to_string(),
        };
        StatusApiEntry {
            id: status.site_id.clone(),
            name: status.site_name.clone(),
            status: status.status.api_word().to_string(),
            descr: status.description.clone(),
            user: status.username.clone(),
            date: status.date.map(|d| d.to_rfc3339()),
            display_descr,
        }
    }
}

/// Error body returned by the status API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusApiError {
    pub error: String,
}
