//! Prints the editor and reviewer assignments stored in the portal database.

use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tccon_common::model::reviewers::{ReviewerNames, SiteReviewers};
use tccon_portal::config::PortalConfig;
use tccon_portal::db::Database;
use tccon_portal::services::qcform::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Csv,
}

/// Retrieve editor/reviewer assignments from the CAR backend database.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Optional two-letter site ID of the site to retrieve information for
    site: Option<String>,

    /// Which format to print the results as
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Path to the portal's TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn reviewers_as_json(rows: &[SiteReviewers], site: Option<&str>) -> Result<String, Box<dyn Error>> {
    match site {
        Some(site) => {
            let row = rows
                .iter()
                .find(|r| r.site == site)
                .ok_or_else(|| format!("No reviewers assigned for site {}", site))?;
            Ok(serde_json::to_string(&ReviewerNames::from(row))?)
        }
        None => {
            let all: BTreeMap<&str, ReviewerNames> = rows
                .iter()
                .map(|r| (r.site.as_str(), ReviewerNames::from(r)))
                .collect();
            Ok(serde_json::to_string(&all)?)
        }
    }
}

fn reviewers_as_csv(rows: &[SiteReviewers], site: Option<&str>) -> Result<String, Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["site", "editor", "reviewer1", "reviewer2"])?;
    for row in rows.iter().filter(|r| site.map_or(true, |s| r.site == s)) {
        let names = ReviewerNames::from(row);
        writer.write_record([
            row.site.as_str(),
            names.editor.as_str(),
            names.reviewer1.as_str(),
            names.reviewer2.as_str(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    Ok(String::from_utf8(bytes)?)
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = PortalConfig::resolve(args.config.as_deref())?;
    let db = Database::open(
        &config.database.path,
        Duration::from_millis(config.locks.busy_timeout_ms),
    )?;
    let conn = db.connect()?;
    let rows = store::list_reviewers(&conn)?;

    let output = match args.format {
        Format::Json => reviewers_as_json(&rows, args.site.as_deref())?,
        Format::Csv => reviewers_as_csv(&rows, args.site.as_deref())?,
    };
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tccon_common::model::reviewers::User;

    fn user(username: &str, first: &str, last: &str) -> User {
        User {
            username: username.into(),
            first_name: first.into(),
            last_name: last.into(),
            email: String::new(),
            is_staff: false,
        }
    }

    fn rows() -> Vec<SiteReviewers> {
        vec![
            SiteReviewers {
                site: "oc".into(),
                editor: user("dwunch", "Debra", "Wunch"),
                reviewer1: user("jlaugh", "Josh", ""),
                reviewer2: user("cr", "Coleen", "Roehl"),
            },
            SiteReviewers {
                site: "pa".into(),
                editor: user("pw", "Paul", "Wennberg"),
                reviewer1: user("jlaugh", "Josh", "Laughner"),
                reviewer2: user("dwunch", "Debra", "Wunch"),
            },
        ]
    }

    #[test]
    fn parses_site_format_and_config() {
        let args = Args::try_parse_from([
            "get_site_reviewers",
            "pa",
            "-f",
            "csv",
            "--config",
            "x.toml",
        ])
        .unwrap();
        assert_eq!(args.site.as_deref(), Some("pa"));
        assert_eq!(args.format, Format::Csv);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));

        let defaults = Args::try_parse_from(["get_site_reviewers"]).unwrap();
        assert_eq!(defaults.format, Format::Json);
        assert!(defaults.site.is_none());

        assert!(Args::try_parse_from(["get_site_reviewers", "-f", "xml"]).is_err());
        assert!(Args::try_parse_from(["get_site_reviewers", "pa", "oc"]).is_err());
    }

    #[test]
    fn json_for_one_site_or_all() {
        let one = reviewers_as_json(&rows(), Some("oc")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&one).unwrap();
        assert_eq!(value["editor"], "Debra Wunch");
        assert_eq!(value["reviewer1"], "jlaugh");

        let all = reviewers_as_json(&rows(), None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&all).unwrap();
        assert_eq!(value["pa"]["reviewer1"], "Josh Laughner");
        assert_eq!(value.as_object().unwrap().len(), 2);

        assert!(reviewers_as_json(&rows(), Some("xx")).is_err());
    }

    #[test]
    fn csv_has_header_and_optional_filter() {
        let all = reviewers_as_csv(&rows(), None).unwrap();
        assert_eq!(
            all,
            "site,editor,reviewer1,reviewer2\n\
             oc,Debra Wunch,jlaugh,Coleen Roehl\n\
             pa,Paul Wennberg,Josh Laughner,Debra Wunch\n"
        );

        let one = reviewers_as_csv(&rows(), Some("pa")).unwrap();
        assert_eq!(one.lines().count(), 2);
        assert!(one.lines().nth(1).unwrap().starts_with("pa,"));
    }
}
