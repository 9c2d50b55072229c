use serde::Deserialize;

#[derive(Deserialize)]
/// Form body posted to `/opstat/update/{site_id}`.
/// `status` is left out entirely when no radio button was chosen.
pub struct StatusUpdateForm {
    pub status: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize, Default)]
/// Query string of the status index page, e.g. `?status=goodupdate&site=Lamont`.
pub struct StatusIndexQuery {
    pub status: Option<String>,
    pub site: Option<String>,
}

#[derive(Deserialize, Default)]
/// Query string used by pages that show a one-line message after a redirect.
pub struct MessageQuery {
    pub msg: Option<String>,
    pub flag: Option<String>,
}

#[derive(Deserialize, Default)]
/// Query string of the missing-permission page.
pub struct MissingPermissionQuery {
    pub msg: Option<String>,
    pub site: Option<String>,
    pub what: Option<String>,
}

#[derive(Deserialize, Default)]
/// Query string of the BibTeX endpoints. `sites` is a comma separated list or `all`.
pub struct CitationQuery {
    pub sites: Option<String>,
    pub cmd: Option<String>,
}

#[derive(Deserialize)]
/// Form body posted when assigning an editor and reviewers to a site.
pub struct ReviewerAssignmentForm {
    #[serde(default)]
    pub editor: String,
    #[serde(default)]
    pub reviewer1: String,
    #[serde(default)]
    pub reviewer2: String,
}
