use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use claim_extract::config::init_default_config;
use claim_extract::pipeline::{dump_grid_json, PipelineConfig, ReportPipeline};
use claim_extract::progress::ConsoleProgress;

const DEFAULT_LOG_FILTER: &str = "claim_extract=info";

#[derive(Parser, Debug)]
#[command(name = "claim-extract")]
#[command(about = "Medical claim report (.docx) to per-visit CSV/JSON rows", long_about = None)]
struct Args {
    /// Generate the default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input report(s); rows of all documents go to one output
    #[arg(value_name = "DOCX")]
    inputs: Vec<PathBuf>,

    /// Output CSV (default: <first_input_stem>_extraido.csv)
    #[arg(short, long, value_name = "CSV")]
    output: Option<PathBuf>,

    /// Also write the rows and warnings as JSON
    #[arg(long, value_name = "JSON")]
    json: Option<PathBuf>,

    /// One line per column, one cell per visit (overrides config)
    #[arg(long, overrides_with = "no_transpose")]
    transpose: bool,

    /// One line per visit (overrides config)
    #[arg(long, overrides_with = "transpose")]
    no_transpose: bool,

    /// Dump the table grid and paragraph stream of the first input as JSON, then exit
    #[arg(long, value_name = "JSON")]
    dump_grid: Option<PathBuf>,

    /// Config file path (default: search for claim-extract.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// No progress lines on stderr
    #[arg(short, long)]
    quiet: bool,
}

/// `RUST_LOG` when set and valid, `claim_extract=info` otherwise.
fn log_filter(rust_log: Option<String>) -> EnvFilter {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(log_filter(std::env::var("RUST_LOG").ok()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let Some(first) = args.inputs.first().cloned() else {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        eprintln!(
            "\n\nUSAGE:\n  claim-extract <informe.docx> [more.docx ...]\n\nTIPS:\n  - Default config search: claim-extract.toml (upwards), or set CLAIM_EXTRACT_CONFIG.\n  - RUST_LOG=claim_extract=debug shows per-visit merge details.\n"
        );
        return Ok(());
    };

    if let Some(grid_json) = args.dump_grid.as_ref() {
        let json = dump_grid_json(&first)?;
        std::fs::write(grid_json, json)
            .with_context(|| format!("write grid json: {}", grid_json.display()))?;
        eprintln!("Wrote grid: {}", grid_json.display());
        return Ok(());
    }

    let output = match args.output {
        Some(p) => p,
        None => {
            let stem = first
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output")
                .to_string();
            first.with_file_name(format!("{stem}_extraido.csv"))
        }
    };

    let transpose = match (args.transpose, args.no_transpose) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let cfg = PipelineConfig::from_paths_and_args(&first, args.config, transpose)
        .context("build config")?;

    let pipeline = ReportPipeline::new(cfg, progress);
    let report = pipeline.process_all(&args.inputs)?;

    let file = File::create(&output).with_context(|| format!("create csv: {}", output.display()))?;
    report.write_csv(BufWriter::new(file), pipeline.config().transpose)?;
    eprintln!(
        "Wrote {} rows ({} warnings): {}",
        report.rows.len(),
        report.warnings.len(),
        output.display()
    );

    if let Some(json_path) = args.json.as_ref() {
        std::fs::write(json_path, report.to_json_pretty()?)
            .with_context(|| format!("write json: {}", json_path.display()))?;
        eprintln!("Wrote json: {}", json_path.display());
    }
    Ok(())
}
