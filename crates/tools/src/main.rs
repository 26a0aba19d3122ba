use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use catalog::{Category, ClimateImpact, FilterState};
use clap::{Parser, Subcommand, ValueEnum};
use foundation::math::LatLng;
use tools::{
    InspectOptions, inspect, parse_center, render_inspect_text, render_validation_text, validate,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewer::ViewerConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and validate restoration-case datasets")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a dataset, filter it and report what the flat map would draw
    Inspect {
        /// CSV or JSON dataset
        dataset: PathBuf,

        /// Category to keep (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Climate impact to keep (repeatable)
        #[arg(long = "impact")]
        impacts: Vec<String>,

        /// Flat-map zoom level
        #[arg(long)]
        zoom: Option<f64>,

        /// Map centre as LAT,LNG
        #[arg(long, value_parser = parse_center, allow_hyphen_values = true)]
        center: Option<LatLng>,

        /// Viewer config (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List every rejected row; exits non-zero if there are any
    Validate {
        /// CSV or JSON dataset
        dataset: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    match args.command {
        Command::Inspect {
            dataset,
            categories,
            impacts,
            zoom,
            center,
            config,
            format,
        } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => ViewerConfig::default(),
            };
            let options = InspectOptions {
                filter: parse_filter(&categories, &impacts)?,
                zoom,
                center,
            };
            let text = read_dataset(&dataset)?;
            let report = inspect(text, config, &options)
                .with_context(|| format!("loading {}", dataset.display()))?;
            info!(visible = report.visible.len(), clusters = report.clusters.len(), "inspected");
            match format {
                Format::Text => print!("{}", render_inspect_text(&report)),
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { dataset, format } => {
            let text = read_dataset(&dataset)?;
            let report =
                validate(&text).with_context(|| format!("loading {}", dataset.display()))?;
            match format {
                Format::Text => print!("{}", render_validation_text(&report)),
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn read_dataset(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn load_config(path: &Path) -> Result<ViewerConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    ViewerConfig::from_json_str(&text).with_context(|| format!("config {}", path.display()))
}

fn parse_filter(categories: &[String], impacts: &[String]) -> Result<FilterState> {
    let categories = categories
        .iter()
        .map(|c| Category::parse(c).ok_or_else(|| anyhow!("unknown category {c:?}")))
        .collect::<Result<BTreeSet<_>>>()?;
    let climate_impacts = impacts
        .iter()
        .map(|i| ClimateImpact::parse(i).ok_or_else(|| anyhow!("unknown climate impact {i:?}")))
        .collect::<Result<BTreeSet<_>>>()?;
    Ok(FilterState {
        categories,
        climate_impacts,
    })
}
