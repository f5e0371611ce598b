use std::{error::Error, fs, path::PathBuf};

use clap::Parser;
use exif_codec::{decode, encode, Edits, ExifDirectory, POINTS_OF_INTEREST};
use tracing_subscriber::EnvFilter;

/// Show and edit the Exif fields of a JPEG image.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    file: PathBuf,

    /// Set a field, e.g. `--set FNumber=2.8` or `--set GPSLatitude=-13.1631`
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    set: Vec<(String, String)>,

    /// Remove a field
    #[arg(long = "remove", value_name = "NAME")]
    remove: Vec<String>,

    /// Place the photo at a point of interest (see `--pois`)
    #[arg(long)]
    poi: Option<String>,

    /// Where to write the edited image, defaults to overwriting FILE
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List the points of interest as map markers
    #[arg(long)]
    pois: bool,

    /// Print fields as JSON (needs the `json_dump` feature)
    #[arg(short, long)]
    json: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let input = fs::read(&cli.file)?;

    let mut edits = match &cli.poi {
        Some(name) => POINTS_OF_INTEREST
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("unknown point of interest: {name}"))?
            .gps_edits(),
        None => Edits::new(),
    };
    for (name, value) in &cli.set {
        edits.set(name.as_str(), value.as_str());
    }
    for name in &cli.remove {
        edits.remove(name.as_str());
    }

    let dir = if edits.is_empty() {
        decode(&input)?
    } else {
        let output = encode(&input, &edits)?;
        let path = cli.output.as_ref().unwrap_or(&cli.file);
        fs::write(path, &output)?;
        println!("Wrote {} ({} bytes)", path.display(), output.len());
        decode(&output)?
    };

    print_fields(&dir, cli.json)?;
    print_markers(&dir, cli.pois)?;
    Ok(())
}

fn print_fields(dir: &ExifDirectory, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        #[cfg(feature = "json_dump")]
        {
            println!("{}", serde_json::to_string_pretty(dir)?);
            return Ok(());
        }
        #[cfg(not(feature = "json_dump"))]
        return Err("`--json` needs the json_dump feature".into());
    }

    if dir.is_empty() {
        println!("No Exif data");
    }
    for (name, value) in dir.form_fields() {
        println!("{name:<32}=> {value}");
    }
    for w in dir.warnings() {
        eprintln!("warning: {w}");
    }
    Ok(())
}

fn print_markers(dir: &ExifDirectory, pois: bool) -> Result<(), Box<dyn Error>> {
    if let Some(gps) = dir.gps_info()? {
        println!(
            "marker {:>10.6} {:>11.6}  Current Location",
            gps.latitude_degrees(),
            gps.longitude_degrees()
        );
    }
    if pois {
        for p in POINTS_OF_INTEREST.iter() {
            println!("marker {:>10.6} {:>11.6}  {}", p.latitude, p.longitude, p.name);
        }
    }
    Ok(())
}
