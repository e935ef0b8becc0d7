//! Area-weighted curve numbers for sub-watersheds from exported overlay records.
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

use curve_number::{
    CurveNumberTool, DepthUnits, Error, ToolConfig, WatershedId, WatershedRecord,
    WatershedSummary, join_summaries, number_watersheds, polygons_from_json, watershed_ids,
};

#[derive(Parser, Debug)]
#[command(
    name = "cn-aggregate",
    about = "Compute area-weighted curve number and percent impervious per watershed"
)]
struct Args {
    /// JSON array of overlay polygons: {watershed, zone, soil_group, area}.
    #[arg(long)]
    overlay: PathBuf,

    /// JSON array of watershed attribute rows to join the totals onto.
    #[arg(long)]
    watersheds: Option<PathBuf>,

    /// Assign ids to the watershed rows from their order before joining.
    #[arg(long, requires = "watersheds")]
    number_watersheds: bool,

    /// TOML tool configuration (zone table, field names, policies).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storm depth in inches; adds a runoff depth to each summary.
    #[arg(long)]
    storm_depth: Option<f64>,

    /// Output file, stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct SummaryOut {
    #[serde(flatten)]
    summary: WatershedSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    runoff_depth: Option<f64>,
}

#[derive(Serialize)]
struct FailureOut {
    watershed: WatershedId,
    kind: &'static str,
    message: String,
}

// Overlay record that could not be tied to any watershed
#[derive(Serialize)]
struct RejectedOut {
    row: usize,
    message: String,
}

#[derive(Serialize)]
struct Output {
    summaries: Vec<SummaryOut>,
    failures: Vec<FailureOut>,
    skipped_polygons: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rejected_records: Vec<RejectedOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    watersheds: Option<Vec<WatershedRecord>>,
}

fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::Configuration { .. } => "configuration",
        Error::Domain { .. } => "domain",
        Error::Input { .. } => "input",
        Error::Io { .. } => "io",
        Error::Toml(_) => "toml",
        Error::Json(_) => "json",
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

// Everything after the files are parsed; a bad overlay record only fails its watershed
fn build_output(
    tool: &CurveNumberTool,
    overlay: &[Value],
    mut watersheds: Option<Vec<WatershedRecord>>,
    number: bool,
    storm_depth: Option<f64>,
) -> Result<Output> {
    let fields = &tool.config().fields;

    let mut read = polygons_from_json(overlay);
    tracing::info!(
        polygons = read.polygons.len(),
        rejected = read.rejected.len(),
        "loaded overlay records"
    );

    let expected = match watersheds.as_mut() {
        Some(rows) => {
            if number {
                number_watersheds(rows, fields);
            }
            watershed_ids(rows, fields).context("reading watershed ids")?
        }
        None => Vec::new(),
    };

    let outcome = tool.summarize_overlay(&expected, &mut read);
    let report = outcome.report;

    if let Some(rows) = watersheds.as_mut() {
        let unmatched = join_summaries(rows, &report.summaries, fields)?;
        tracing::info!(
            joined = rows.len() - unmatched.len(),
            unmatched = unmatched.len(),
            "joined totals"
        );
    }

    let mut summaries = Vec::with_capacity(report.summaries.len());
    for summary in report.summaries {
        let runoff_depth = match storm_depth {
            Some(depth) => match summary.runoff_depth(depth, DepthUnits::Inches) {
                Ok(q) => Some(q),
                Err(error) => {
                    tracing::warn!(%error, "no runoff depth");
                    None
                }
            },
            None => None,
        };
        summaries.push(SummaryOut {
            summary,
            runoff_depth,
        });
    }
    let failures = report
        .failures
        .into_iter()
        .map(|failure| FailureOut {
            watershed: failure.watershed,
            kind: error_kind(&failure.error),
            message: failure.error.to_string(),
        })
        .collect();
    let rejected_records = outcome
        .rejected
        .into_iter()
        .map(|rejected| RejectedOut {
            row: rejected.row,
            message: rejected.error.to_string(),
        })
        .collect();

    Ok(Output {
        summaries,
        failures,
        skipped_polygons: outcome.skipped_polygons,
        rejected_records,
        watersheds,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ToolConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => ToolConfig::default(),
    };
    let tool = CurveNumberTool::new(config).context("building zone table")?;

    let overlay: Vec<Value> = read_json(&args.overlay)?;
    let watersheds: Option<Vec<WatershedRecord>> = match &args.watersheds {
        Some(path) => Some(read_json(path)?),
        None => None,
    };

    let output = build_output(
        &tool,
        &overlay,
        watersheds,
        args.number_watersheds,
        args.storm_depth,
    )?;
    let json = serde_json::to_string_pretty(&output)?;
    match &args.output {
        Some(path) => fs::write(path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
