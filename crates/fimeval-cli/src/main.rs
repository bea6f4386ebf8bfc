//! fimeval - flood-extent verification CLI
//!
//! ## Commands
//!
//! - `compare`: agreement raster and statistics for one raster pair
//! - `stats`: statistics for a contingency table given on the command line
//! - `profile`: list archived artifacts per version for a return interval
//! - `regress`: side-by-side regression report across stats records
//! - `alpha-test`: evaluate test cases over a test-cases directory
//! - `stream-zones`: unique stream-pixel zone grid

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};

use fimeval_core::persist::{
    read_stats_json, regression_report_to_csv, write_regression_report, write_stats_csv,
    write_stats_json,
};
use fimeval_core::telemetry::init_tracing;
use fimeval_core::{
    compute_stats, evaluate_pair, stream_pixel_zones, ArchiveEntry, ArchiveLayout, ArchiveProfiler,
    ContingencyTable, FsArtifactStore, Grid, GridSink, GridSource, JsonGridCodec, MaskSet,
    RegressionReport, StatisticsRecord,
};
use fimeval_run::{load_masks, run_batch, BatchReport, EvalConfig, JobRunner, JobStatus, TestCase};

#[derive(Parser)]
#[command(name = "fimeval")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Flood-extent verification against benchmark rasters", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a predicted raster against a benchmark and score it
    Compare {
        /// Benchmark raster (grid document)
        #[arg(short, long)]
        benchmark: PathBuf,

        /// Predicted raster (grid document)
        #[arg(short, long)]
        predicted: PathBuf,

        /// Write the agreement raster here
        #[arg(long)]
        agreement: Option<PathBuf>,

        /// Write the stats table (CSV) here
        #[arg(long)]
        stats_csv: Option<PathBuf>,

        /// Write the stats record (JSON) here
        #[arg(long)]
        stats_json: Option<PathBuf>,

        /// Predicted-raster value to mask out (repeatable)
        #[arg(long = "mask-id")]
        mask_ids: Vec<i64>,

        /// Secondary layer as NAME=PATH (repeatable)
        #[arg(long = "layer", value_parser = parse_named_path)]
        layers: Vec<(String, PathBuf)>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Statistics for a contingency table
    Stats {
        #[arg(long)]
        tn: u64,
        #[arg(long = "fn")]
        fn_: u64,
        #[arg(long)]
        fp: u64,
        #[arg(long)]
        tp: u64,

        /// Area of one cell; enables the areal statistics
        #[arg(long)]
        cell_area: Option<f64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List archived artifacts per version
    Profile {
        /// Archive root holding one directory per version
        #[arg(short, long)]
        archive: PathBuf,

        #[arg(short = 'y', long)]
        return_interval: String,

        /// Extension of archived agreement rasters
        #[arg(long, default_value = fimeval_core::archive::DEFAULT_RASTER_EXT)]
        raster_ext: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Regression report of a stats record against earlier versions
    Regress {
        /// Current stats record (JSON)
        #[arg(short, long)]
        current: PathBuf,

        /// Column label of the current record
        #[arg(long, default_value = "current")]
        current_version: String,

        /// Earlier stats record as VERSION=PATH (repeatable, in column order)
        #[arg(long = "previous", value_parser = parse_named_path)]
        previous: Vec<(String, PathBuf)>,

        /// Leave out the diff columns
        #[arg(long)]
        no_diffs: bool,

        /// Write the CSV report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate test cases of a development branch
    AlphaTest {
        /// Root of the test-cases tree
        #[arg(long, env = "FIMEVAL_TEST_CASES_DIR")]
        test_cases_dir: PathBuf,

        /// Development branch whose outputs are evaluated
        #[arg(short, long)]
        branch: String,

        /// Test case as <huc>_<category> (repeatable)
        #[arg(short, long = "test-id", required = true)]
        test_ids: Vec<String>,

        /// Return interval (repeatable; default 10yr, 100yr, 500yr)
        #[arg(short = 'y', long = "return-interval")]
        return_intervals: Vec<String>,

        /// Concurrent jobs
        #[arg(short, long, env = "FIMEVAL_WORKERS", default_value_t = fimeval_run::config::DEFAULT_WORKERS)]
        workers: usize,

        /// Write a regression report against previous versions
        #[arg(short, long)]
        compare_to_previous: bool,

        /// Lake feature list (column ID)
        #[arg(long, env = "FIMEVAL_LAKE_FEATURE_CSV")]
        lake_feature_csv: Option<PathBuf>,

        /// Hydro table (columns feature_id, HydroID)
        #[arg(long, env = "FIMEVAL_HYDRO_TABLE")]
        hydro_table: Option<PathBuf>,

        /// Secondary layer as NAME=PATH (repeatable)
        #[arg(long = "layer", value_parser = parse_named_path)]
        layers: Vec<(String, PathBuf)>,

        /// Write the batch report (JSON) here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Give every stream cell a unique zone id
    StreamZones {
        /// Stream raster, cells equal to 1 are streams
        #[arg(short, long)]
        streams: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Compare {
            benchmark,
            predicted,
            agreement,
            stats_csv,
            stats_json,
            mask_ids,
            layers,
            format,
        } => cmd_compare(
            &benchmark,
            &predicted,
            CompareOutputs {
                agreement,
                stats_csv,
                stats_json,
            },
            mask_ids,
            layers,
            format,
        ),
        Commands::Stats {
            tn,
            fn_,
            fp,
            tp,
            cell_area,
            format,
        } => cmd_stats(
            ContingencyTable::new(tn, fn_, fp, tp)
                .with_cell_area(cell_area)
                .context("Invalid --cell-area")?,
            format,
        ),
        Commands::Profile {
            archive,
            return_interval,
            raster_ext,
            format,
        } => cmd_profile(&archive, &return_interval, raster_ext, format),
        Commands::Regress {
            current,
            current_version,
            previous,
            no_diffs,
            output,
        } => cmd_regress(&current, &current_version, &previous, !no_diffs, output.as_deref()),
        Commands::AlphaTest {
            test_cases_dir,
            branch,
            test_ids,
            return_intervals,
            workers,
            compare_to_previous,
            lake_feature_csv,
            hydro_table,
            layers,
            report,
        } => {
            let mut config = EvalConfig::new(test_cases_dir, branch);
            if !return_intervals.is_empty() {
                config.return_intervals = return_intervals;
            }
            config.workers = workers;
            config.compare_to_previous = compare_to_previous;
            config.lake_feature_csv = lake_feature_csv;
            config.hydro_table = hydro_table;
            config.layers = layers.into_iter().collect();
            cmd_alpha_test(config, &test_ids, report.as_deref()).await
        }
        Commands::StreamZones { streams, output } => cmd_stream_zones(&streams, &output),
    }
}

/// Parse `NAME=PATH`.
fn parse_named_path(s: &str) -> std::result::Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{s}'")),
    }
}

fn read_grid(path: &Path) -> Result<Grid> {
    JsonGridCodec
        .read_grid(path)
        .with_context(|| format!("Failed to read raster {:?}", path))
}

struct CompareOutputs {
    agreement: Option<PathBuf>,
    stats_csv: Option<PathBuf>,
    stats_json: Option<PathBuf>,
}

fn cmd_compare(
    benchmark: &Path,
    predicted: &Path,
    outputs: CompareOutputs,
    mask_ids: Vec<i64>,
    layers: Vec<(String, PathBuf)>,
    format: OutputFormat,
) -> Result<()> {
    let benchmark = read_grid(benchmark)?;
    let predicted = read_grid(predicted)?;
    let masks: MaskSet = mask_ids.into_iter().collect();

    let mut layer_grids = BTreeMap::new();
    for (name, path) in &layers {
        layer_grids.insert(name.clone(), read_grid(path)?);
    }

    let evaluation = evaluate_pair(
        &benchmark,
        &predicted,
        &masks,
        (!layer_grids.is_empty()).then_some(&layer_grids),
    )
    .context("Failed to evaluate raster pair")?;
    let total = evaluation
        .total_stats()
        .context("Evaluation produced no total_area statistics")?;

    if let Some(path) = &outputs.agreement {
        JsonGridCodec
            .write_grid(path, &evaluation.agreement.to_grid())
            .with_context(|| format!("Failed to write agreement raster {:?}", path))?;
    }
    if let Some(path) = &outputs.stats_csv {
        write_stats_csv(path, total).with_context(|| format!("Failed to write {:?}", path))?;
    }
    if let Some(path) = &outputs.stats_json {
        write_stats_json(path, total).with_context(|| format!("Failed to write {:?}", path))?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&evaluation.stats)?),
        OutputFormat::Text => {
            for (layer, stats) in &evaluation.stats {
                println!("{}", render_stats_text(layer, stats));
            }
        }
    }
    Ok(())
}

fn cmd_stats(table: ContingencyTable, format: OutputFormat) -> Result<()> {
    let stats = compute_stats(&table);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => println!("{}", render_stats_text("contingency table", &stats)),
    }
    Ok(())
}

fn cmd_profile(archive: &Path, return_interval: &str, raster_ext: String, format: OutputFormat) -> Result<()> {
    let profiler = ArchiveProfiler::new(
        FsArtifactStore::new(archive),
        ArchiveLayout::with_raster_ext(raster_ext),
    );
    let entries = profiler
        .profile(return_interval)
        .with_context(|| format!("Failed to profile archive {:?}", archive))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => println!("{}", render_profile_text(return_interval, &entries)),
    }
    Ok(())
}

fn cmd_regress(
    current: &Path,
    current_version: &str,
    previous: &[(String, PathBuf)],
    with_diffs: bool,
    output: Option<&Path>,
) -> Result<()> {
    let current = read_stats_json(current).with_context(|| format!("Failed to read {:?}", current))?;
    let mut records = Vec::with_capacity(previous.len());
    for (version, path) in previous {
        let record = read_stats_json(path).with_context(|| format!("Failed to read {:?}", path))?;
        records.push((version.clone(), record));
    }

    let report = RegressionReport::build(current_version, &current, &records, with_diffs);
    for failure in &report.failures {
        eprintln!("warning: no diff for {}: {}", failure.version, failure.reason);
    }

    match output {
        Some(path) => {
            write_regression_report(path, &report)
                .with_context(|| format!("Failed to write {:?}", path))?;
            info!(path = %path.display(), "wrote regression report");
        }
        None => print!(
            "{}",
            regression_report_to_csv(&report).context("Failed to render regression report")?
        ),
    }
    Ok(())
}

async fn cmd_alpha_test(config: EvalConfig, test_ids: &[String], report_path: Option<&Path>) -> Result<()> {
    config.validate().context("Invalid evaluation configuration")?;

    let test_cases = test_ids
        .iter()
        .map(|id| id.parse::<TestCase>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Invalid test id")?;

    let masks = match (&config.lake_feature_csv, &config.hydro_table) {
        (Some(lakes), Some(table)) => {
            let (masks, summary) =
                load_masks(lakes, table).context("Failed to build lake mask")?;
            info!(
                lake_features = summary.lake_features,
                unmatched = summary.unmatched,
                hydro_ids = summary.hydro_ids,
                "built lake mask"
            );
            masks
        }
        _ => MaskSet::new(),
    };

    let codec = Arc::new(JsonGridCodec);
    let runner = JobRunner::new(config.layout(), codec.clone(), codec)
        .with_masks(masks)
        .with_layers(config.layers.clone())
        .compare_to_previous(config.compare_to_previous);

    let jobs = config.jobs(&test_cases);
    let report = run_batch(Arc::new(runner), jobs, config.workers)
        .await
        .context("Batch evaluation failed")?;

    if let Some(path) = report_path {
        let content = serde_json::to_string_pretty(&report).context("serialize batch report")?;
        std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    }
    println!("{}", render_batch_text(&report));

    if !report.success() {
        anyhow::bail!("{} of {} jobs failed", report.failed_count(), report.jobs.len());
    }
    Ok(())
}

fn cmd_stream_zones(streams: &Path, output: &Path) -> Result<()> {
    let grid = read_grid(streams)?;
    let zones = stream_pixel_zones(&grid);
    let zone_grid = zones.to_grid(&grid).context("Failed to build zone grid")?;
    JsonGridCodec
        .write_grid(output, &zone_grid)
        .with_context(|| format!("Failed to write zone grid {:?}", output))?;
    println!("{} stream cells -> {}", zones.zone_count(), output.display());
    Ok(())
}

fn render_stats_text(title: &str, stats: &StatisticsRecord) -> String {
    let width = stats.names().map(str::len).max().unwrap_or(0);
    let mut out = String::new();
    out.push_str(&format!("{title}\n"));
    out.push_str(&format!("{}\n", "=".repeat(title.len())));
    for (name, value) in stats.iter() {
        out.push_str(&format!("{name:<width$}  {value}\n"));
    }
    out.trim_end().to_string()
}

fn render_profile_text(return_interval: &str, entries: &BTreeMap<String, ArchiveEntry>) -> String {
    if entries.is_empty() {
        return format!("No archived versions for {return_interval}");
    }
    let mark = |p: &Option<PathBuf>| if p.is_some() { "yes" } else { "-" };
    let mut out = format!("{:<24} {:<10} {:<10} {:<10}\n", "version", "agreement", "stats.csv", "stats.json");
    for (version, entry) in entries {
        out.push_str(&format!(
            "{:<24} {:<10} {:<10} {:<10}\n",
            version,
            mark(&entry.agreement_raster),
            mark(&entry.stats_csv),
            mark(&entry.stats_json)
        ));
    }
    out.trim_end().to_string()
}

fn render_batch_text(report: &BatchReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Batch {}\ncompleted: {}  skipped: {}  failed: {}\n",
        report.batch_id,
        report.completed_count(),
        report.skipped_count(),
        report.failed_count()
    ));
    for job in &report.jobs {
        let line = match &job.status {
            JobStatus::Completed(outcome) => {
                format!("  ok    {}/{} csi={}", job.test_id, job.return_interval, outcome.csi)
            }
            JobStatus::Skipped { reason } => {
                format!("  skip  {}/{} {}", job.test_id, job.return_interval, reason)
            }
            JobStatus::Failed { error } => {
                format!("  FAIL  {}/{} {}", job.test_id, job.return_interval, error)
            }
        };
        out.push_str(&line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_named_path_accepts_and_rejects() {
        assert_eq!(
            parse_named_path("levee=/data/levee.grid.json").unwrap(),
            ("levee".to_string(), PathBuf::from("/data/levee.grid.json"))
        );
        assert!(parse_named_path("levee").is_err());
        assert!(parse_named_path("=x").is_err());
    }

    #[test]
    fn stats_command_parses_fn_flag() {
        let cli = Cli::try_parse_from(["fimeval", "stats", "--tn", "0", "--fn", "1", "--fp", "1", "--tp", "1"]).unwrap();
        match cli.command {
            Commands::Stats { fn_, cell_area, .. } => {
                assert_eq!(fn_, 1);
                assert_eq!(cell_area, None);
            }
            _ => panic!("expected stats"),
        }
    }

    #[test]
    fn render_stats_shows_undefined() {
        let stats = compute_stats(&ContingencyTable::new(5, 0, 0, 0));
        let text = render_stats_text("total_area", &stats);
        assert!(text.starts_with("total_area\n=========="));
        assert!(text.lines().any(|l| l.starts_with("pod") && l.ends_with("undefined")));
    }

    #[test]
    fn compare_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let benchmark = dir.path().join("b.grid.json");
        let predicted = dir.path().join("p.grid.json");
        JsonGridCodec
            .write_grid(&benchmark, &Grid::from_rows(vec![vec![0.0, 1.0, 0.0, 1.0]]).unwrap())
            .unwrap();
        JsonGridCodec
            .write_grid(&predicted, &Grid::from_rows(vec![vec![0.0, 0.0, 1.0, 1.0]]).unwrap())
            .unwrap();

        let outputs = CompareOutputs {
            agreement: Some(dir.path().join("out/agreement.grid.json")),
            stats_csv: Some(dir.path().join("out/stats.csv")),
            stats_json: Some(dir.path().join("out/stats.json")),
        };
        cmd_compare(&benchmark, &predicted, outputs, vec![], vec![], OutputFormat::Json).unwrap();

        let stats = read_stats_json(&dir.path().join("out/stats.json")).unwrap();
        assert_eq!(stats.get("csi"), Some(fimeval_core::StatValue::Real(0.333)));
        assert!(dir.path().join("out/stats.csv").is_file());
        assert!(dir.path().join("out/agreement.grid.json").is_file());
    }

    #[test]
    fn profile_text_for_empty_archive() {
        assert_eq!(
            render_profile_text("100yr", &BTreeMap::new()),
            "No archived versions for 100yr"
        );
    }

    #[tokio::test]
    async fn alpha_test_rejects_bad_test_id() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvalConfig::new(dir.path(), "dev");
        let err = cmd_alpha_test(config, &["not-a-test".to_string()], None)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid test id"));
    }
}
