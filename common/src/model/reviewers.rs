use serde::{Deserialize, Serialize};

/// A portal account as far as the portal itself needs to know it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
}

impl User {
    /// "First Last" when both names are known, otherwise the username.
    pub fn display_name(&self) -> String {
        if !self.first_name.is_empty() && !self.last_name.is_empty() {
            format!("{} {}", self.first_name, self.last_name)
        } else {
            self.username.clone()
        }
    }
}

/// Editor and reviewer assignment for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteReviewers {
    pub site: String,
    pub editor: User,
    pub reviewer1: User,
    pub reviewer2: User,
}

/// The name-only form of an assignment printed by the reviewer lookup tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerNames {
    pub editor: String,
    pub reviewer1: String,
    pub reviewer2: String,
}

impl From<&SiteReviewers> for ReviewerNames {
    fn from(r: &SiteReviewers) -> Self {
        ReviewerNames {
            editor: r.editor.display_name(),
            reviewer1: r.reviewer1.display_name(),
            reviewer2: r.reviewer2.display_name(),
        }
    }
}
