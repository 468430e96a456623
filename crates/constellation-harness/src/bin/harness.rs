//! CLI entrypoint for constellation detector campaigns.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use constellation_core::{CatalogSpec, Checkpoint};
use constellation_harness::report::{DerivationReport, VerificationReport};
use constellation_harness::structured_log::{ArtifactIndex, LogEmitter, now_utc};
use constellation_harness::{Campaign, HarnessConfig};

/// Derivation and verification tooling for prime-constellation detectors.
#[derive(Debug, Parser)]
#[command(name = "constellation-harness")]
#[command(about = "Derive and verify prime-constellation detectors")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Plain,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Derive detectors for a catalog and print them.
    Derive {
        /// Catalog JSON path (defaults to the built-in families).
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Only derive this family.
        #[arg(long)]
        family: Option<String>,
        /// S-pair budget per family, 0 for unbounded (overrides CONSTELLATION_PAIR_BUDGET).
        #[arg(long)]
        pair_budget: Option<usize>,
        /// Output format.
        #[arg(long, value_enum, default_value = "plain")]
        format: Format,
    },
    /// Derive, then scan `2..=limit` for disagreements with direct search.
    Verify {
        /// Catalog JSON path (defaults to the built-in families).
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Upper scan bound (overrides CONSTELLATION_SCAN_LIMIT).
        #[arg(long)]
        limit: Option<u64>,
        /// Also report genuine members the detector misses.
        #[arg(long)]
        false_negatives: bool,
        /// Checkpoint file; resumed from when present, rewritten while scanning.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Output report path (markdown); a JSON twin and artifact index are written beside it.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Structured JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Optional fixed timestamp string for deterministic report generation.
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Write the built-in catalog as JSON.
    Catalog {
        /// Output path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load_catalog(path: Option<&Path>, family: Option<&str>) -> Result<CatalogSpec, Box<dyn std::error::Error>> {
    let spec = match path {
        Some(path) => CatalogSpec::from_file(path)?,
        None => CatalogSpec::builtin(),
    };
    match family {
        Some(name) => spec
            .select(name)
            .ok_or_else(|| format!("family '{name}' not found in catalog").into()),
        None => Ok(spec),
    }
}

fn run_id() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{}-{nanos}", std::process::id())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Derive {
            catalog,
            family,
            pair_budget,
            format,
        } => {
            let spec = load_catalog(catalog.as_deref(), family.as_deref())?;
            let config = HarnessConfig::from_env().with_overrides(None, pair_budget, false);
            let mut campaign = Campaign::new("derive", config);
            let derived = campaign.derive(&spec)?;
            let report = DerivationReport::from_catalog(&derived);
            match format {
                Format::Plain => print!("{}", report.to_plain()),
                Format::Json => println!("{}", report.to_json()),
            }
            let failed = derived.failures().count();
            if failed > 0 {
                eprintln!("{failed} of {} families produced no detector", derived.len());
            }
        }
        Command::Verify {
            catalog,
            limit,
            false_negatives,
            checkpoint,
            report,
            log,
            timestamp,
        } => {
            let spec = load_catalog(catalog.as_deref(), None)?;
            let config =
                HarnessConfig::from_env().with_overrides(limit, None, false_negatives);
            let run = run_id();
            let mut campaign = Campaign::new("verify", config);
            if let Some(log_path) = &log {
                campaign = campaign.with_log(LogEmitter::to_file(log_path, "verify", &run)?);
            }

            let derived = campaign.derive(&spec)?;
            for (name, failure) in derived.failures() {
                eprintln!("Skipping {name}: {failure}");
            }

            let resume = match &checkpoint {
                Some(path) if path.exists() => {
                    let state = Checkpoint::load(path)?;
                    eprintln!("Resuming from n={} ({})", state.next_n, path.display());
                    Some(state)
                }
                _ => None,
            };
            let scan_options = resume.as_ref().map_or(config.scan_options(), |c| c.options);
            eprintln!(
                "Scanning {} families to n={}",
                derived.detectors().count(),
                resume.as_ref().map_or(config.scan_limit, |c| c.limit)
            );
            let result = campaign.verify(&derived, resume, |state| {
                if let Some(path) = &checkpoint {
                    state.save(path)?;
                }
                Ok(())
            })?;

            let report_doc = VerificationReport {
                title: String::from("Constellation Detector Verification"),
                timestamp: timestamp.unwrap_or_else(now_utc),
                false_negatives_checked: scan_options.check_false_negatives,
                result,
                skipped: derived.failures().map(|(name, _)| name.to_string()).collect(),
            };

            for (name, family) in &report_doc.result.families {
                if family.is_clean() {
                    eprintln!("  {name}: 100% clean");
                } else {
                    eprintln!(
                        "  {name}: {} false positives {:?}, {} false negatives {:?}",
                        family.false_positives.len(),
                        family.false_positives,
                        family.false_negatives.len(),
                        family.false_negatives
                    );
                }
            }

            if let Some(report_path) = report {
                eprintln!("Writing report to {}", report_path.display());
                let markdown = report_doc.to_markdown();
                let json = report_doc.to_json();
                std::fs::write(&report_path, &markdown)?;
                let json_path = report_path.with_extension("json");
                std::fs::write(&json_path, &json)?;

                let mut index = ArtifactIndex::new(&run, "verify");
                index.add_bytes(report_path.display().to_string(), "report_markdown", markdown.as_bytes());
                index.add_bytes(json_path.display().to_string(), "report_json", json.as_bytes());
                if let Some(log_path) = &log {
                    index.add_file(log_path, "structured_log")?;
                }
                std::fs::write(report_path.with_extension("index.json"), index.to_json()?)?;
            }

            if let Some(summary) = report_doc.failure_summary() {
                return Err(summary.into());
            }
        }
        Command::Catalog { output } => {
            let json = CatalogSpec::builtin().to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("Catalog written to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}
