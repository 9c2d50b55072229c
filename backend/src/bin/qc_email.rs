//! Sends the QC report for one netCDF file to the site's contacts.
//!
//! Without `-s`/`--not-dry-run` the message is only printed.
//!
//! The TOML configuration looks like:
//!
//! ```toml
//! site_info_file = "/var/www/tccon-metadata/site_info.json"
//!
//! [email]
//! from = "TCCON QC <qc@tccon.example.org>"
//! cc = ["Data Editor <editor@tccon.example.org>"]
//! subject = "TCCON QC report for {site_name} ({site_id})"
//!
//! [smtp]
//! host = "smtp.example.org"
//! security = "starttls"
//! username = "qc"
//! password = "secret"
//! ```

use clap::Parser;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Deserialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tccon_common::model::site_info::SiteInfoFile;
use tccon_common::sites::site_name;
use tccon_portal::services::siteinfo::netcdf_form::split_contacts;

const DEFAULT_SUBJECT: &str = "TCCON QC report for {site_name} ({site_id})";
const DEFAULT_BODY: &str = "Dear {site_name} team,\n\n\
The quality control review of {nc_file} is complete. The report is attached.\n\
{plot_line}\n\
Please reply to this email with any questions.\n";

#[derive(Debug, Deserialize)]
struct EmailConfig {
    site_info_file: PathBuf,
    email: EmailSection,
    #[serde(default)]
    smtp: Option<SmtpSection>,
}

#[derive(Debug, Deserialize)]
struct EmailSection {
    from: String,
    #[serde(default)]
    cc: Vec<String>,
    #[serde(default = "default_subject")]
    subject: String,
    #[serde(default = "default_body")]
    body: String,
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_body() -> String {
    DEFAULT_BODY.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Security {
    #[default]
    Starttls,
    Tls,
    None,
}

#[derive(Debug, Deserialize)]
struct SmtpSection {
    host: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    security: Security,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Send a QC email manually, or do a test.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long)]
    cfg_file: PathBuf,

    /// The netCDF file
    #[arg(long)]
    nc_file: PathBuf,

    /// A PDF to attach
    #[arg(short, long)]
    attachment: PathBuf,

    /// The URL where these plots can be viewed
    #[arg(long)]
    plot_url: Option<String>,

    /// The two letter site ID (overrides the one from the netCDF file name)
    #[arg(long)]
    site_id: Option<String>,

    /// Actually send the email, do not do a dry run
    #[arg(short = 's', long)]
    not_dry_run: bool,
}

impl Args {
    fn resolved_site_id(&self) -> Option<String> {
        self.site_id
            .clone()
            .or_else(|| site_id_from_file(&self.nc_file))
    }
}

/// The first two characters of the file name, which TCCON names start with.
fn site_id_from_file(nc_file: &Path) -> Option<String> {
    let name = nc_file.file_name()?.to_str()?;
    let id: String = name.chars().take(2).collect();
    (id.chars().count() == 2).then_some(id)
}

fn load_config(path: &Path) -> Result<EmailConfig, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(toml::from_str(&raw)?)
}

fn site_contacts(site_info: &SiteInfoFile, site_id: &str) -> Result<Vec<String>, String> {
    let info = site_info
        .get(site_id)
        .ok_or_else(|| format!("site {} is not in the site info file", site_id))?;
    split_contacts(&info.contact)
        .ok_or_else(|| format!("site {} has no valid contact: {:?}", site_id, info.contact))
}

fn fill_template(template: &str, args: &Args) -> String {
    let site_id = args.resolved_site_id().unwrap_or_default();
    let nc_name = args
        .nc_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let plot_line = match &args.plot_url {
        Some(url) => format!("The plots for this file can be viewed at {}\n", url),
        None => String::new(),
    };
    template
        .replace("{site_id}", &site_id)
        .replace("{site_name}", site_name(&site_id).unwrap_or(&site_id))
        .replace("{nc_file}", &nc_name)
        .replace("{plot_url}", args.plot_url.as_deref().unwrap_or(""))
        .replace("{plot_line}", &plot_line)
}

fn build_message(
    config: &EmailConfig,
    args: &Args,
    contacts: &[String],
    pdf: Vec<u8>,
) -> Result<Message, Box<dyn Error>> {
    let mut builder = Message::builder()
        .from(config.email.from.parse::<Mailbox>()?)
        .subject(fill_template(&config.email.subject, args));
    for contact in contacts {
        builder = builder.to(contact.parse::<Mailbox>()?);
    }
    for cc in &config.email.cc {
        builder = builder.cc(cc.parse::<Mailbox>()?);
    }

    let attachment_name = args
        .attachment
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "qc_report.pdf".to_string());
    let message = builder.multipart(
        MultiPart::mixed()
            .singlepart(SinglePart::plain(fill_template(&config.email.body, args)))
            .singlepart(
                Attachment::new(attachment_name).body(pdf, ContentType::parse("application/pdf")?),
            ),
    )?;
    Ok(message)
}

fn mailer(smtp: &SmtpSection) -> Result<SmtpTransport, Box<dyn Error>> {
    let mut builder = match smtp.security {
        Security::Starttls => SmtpTransport::starttls_relay(&smtp.host)?,
        Security::Tls => SmtpTransport::relay(&smtp.host)?,
        Security::None => SmtpTransport::builder_dangerous(&smtp.host),
    };
    if let Some(port) = smtp.port {
        builder = builder.port(port);
    }
    if let (Some(user), Some(password)) = (&smtp.username, &smtp.password) {
        builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
    }
    Ok(builder.build())
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.cfg_file)?;
    let raw = std::fs::read_to_string(&config.site_info_file)
        .map_err(|e| format!("cannot read {}: {}", config.site_info_file.display(), e))?;
    let site_info: SiteInfoFile = serde_json::from_str(&raw)?;
    let site_id = args
        .resolved_site_id()
        .ok_or("cannot take a site ID from the netCDF file name, use --site-id")?;
    let contacts = site_contacts(&site_info, &site_id)?;
    let pdf = std::fs::read(&args.attachment)
        .map_err(|e| format!("cannot read {}: {}", args.attachment.display(), e))?;
    let message = build_message(&config, &args, &contacts, pdf)?;

    if !args.not_dry_run {
        log::info!("Dry run, not sending the email");
        println!("{}", String::from_utf8_lossy(&message.formatted()));
        return Ok(());
    }

    let smtp = config
        .smtp
        .as_ref()
        .ok_or("the configuration has no [smtp] section")?;
    mailer(smtp)?.send(&message)?;
    log::info!(
        "Sent QC email for {} to {}",
        args.nc_file.display(),
        contacts.join(", ")
    );
    Ok(())
}

fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
