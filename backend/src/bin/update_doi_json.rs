//! Updates the field names of a GGG2014 TCCON DOI metadata JSON file to the
//! GGG2020 layout.

use clap::Parser;
use regex::Regex;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::LazyLock;
use tccon_common::model::doi::NON_PERSON_CONTRIBUTOR_TYPES;

static GGG_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"GGG2014.R\d+").expect("valid regex"));

/// Update field names for TCCON DOI metadata JSON files.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Original JSON file
    input: PathBuf,

    /// Name to give the new JSON file
    output: PathBuf,

    /// Spaces to indent the output JSON with
    #[arg(long)]
    indent: Option<usize>,
}

/// Supplies given and family names for a name not written `Family, Given`.
trait NamePrompt {
    fn ask(&mut self, name: &str) -> Result<(String, String), Box<dyn Error>>;
}

struct StdinPrompt;

impl NamePrompt for StdinPrompt {
    fn ask(&mut self, name: &str) -> Result<(String, String), Box<dyn Error>> {
        println!("Name {} is not in expected format", name);
        let given = read_line("Type the given name: ")?;
        let family = read_line("Type the family name: ")?;
        Ok((given, family))
    }
}

fn read_line(prompt: &str) -> Result<String, Box<dyn Error>> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn convert_name(
    entry: &mut Map<String, Value>,
    is_person: bool,
    category: &str,
    prompt: &mut dyn NamePrompt,
) -> Result<(), Box<dyn Error>> {
    let name = match entry.remove("name") {
        Some(Value::String(name)) => name,
        Some(other) => other.to_string(),
        None => return Err(format!("{} entry has no \"name\"", category).into()),
    };
    let key = format!("{}Name", category);
    if !is_person {
        entry.insert(key, Value::String(name));
        return Ok(());
    }

    let (given, family) = match name.split_once(',') {
        Some((family, given)) if !given.contains(',') => {
            (given.trim().to_string(), family.trim().to_string())
        }
        _ => prompt.ask(&name)?,
    };
    entry.insert(key, Value::String(format!("{}, {}", family, given)));
    entry.insert("givenName".to_string(), Value::String(given));
    entry.insert("familyName".to_string(), Value::String(family));
    Ok(())
}

fn convert_ggg2014_to_ggg2020(
    metadata: &mut Value,
    prompt: &mut dyn NamePrompt,
) -> Result<(), Box<dyn Error>> {
    let root = metadata
        .as_object_mut()
        .ok_or("metadata must be a JSON object")?;

    if let Some(geo) = root.remove("geoLocations") {
        root.insert("GeoLocation".to_string(), geo);
    }

    if let Some(Value::String(title)) = root
        .get_mut("titles")
        .and_then(|t| t.get_mut(0))
        .and_then(|t| t.get_mut("title"))
    {
        *title = GGG_VERSION_RE.replace_all(title, "GGG2020.R0").into_owned();
    }

    if let Some(Value::Array(creators)) = root.get_mut("creators") {
        for creator in creators.iter_mut().filter_map(Value::as_object_mut) {
            convert_name(creator, true, "creator", prompt)?;
        }
    }
    if let Some(Value::Array(contributors)) = root.get_mut("contributors") {
        for contributor in contributors.iter_mut().filter_map(Value::as_object_mut) {
            let kind = contributor
                .get("contributorType")
                .and_then(Value::as_str)
                .unwrap_or("");
            let is_person = !NON_PERSON_CONTRIBUTOR_TYPES.contains(&kind);
            convert_name(contributor, is_person, "contributor", prompt)?;
        }
    }
    Ok(())
}

fn to_json(metadata: &Value, indent: Option<usize>) -> Result<Vec<u8>, Box<dyn Error>> {
    match indent {
        None => Ok(serde_json::to_vec(metadata)?),
        Some(n) => {
            let spaces = vec![b' '; n];
            let mut out = Vec::new();
            let mut ser =
                serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&spaces));
            metadata.serialize(&mut ser)?;
            Ok(out)
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let raw = std::fs::read_to_string(&args.input)
        .map_err(|e| format!("cannot read {}: {}", args.input.display(), e))?;
    let mut metadata: Value = serde_json::from_str(&raw)?;
    convert_ggg2014_to_ggg2020(&mut metadata, &mut StdinPrompt)?;
    std::fs::write(&args.output, to_json(&metadata, args.indent)?)
        .map_err(|e| format!("cannot write {}: {}", args.output.display(), e))?;
    log::info!("Wrote {}", args.output.display());
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
