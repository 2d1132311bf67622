//! CLI entry point for the logistics data-quality audit.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use clap::Parser;
use logistics_audit::{
    AuditConfig, AuditOrchestrator, AuditReport, AuditResult, DatasetKind, IntegrityReport,
    ReportGenerator, ReportInputs, load_csv,
};
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Data-quality audit for logistics inventory, transactions and feedback",
    long_about = "Scores, cleans and validates three related CSV tables, recording a \
                  justification for every repair.\n\n\
                  EXAMPLES:\n  \
                  # Audit with defaults, writing results to ./outputs\n  \
                  logistics-audit --inventory inventario.csv --transactions transacciones.csv \
                  --feedback feedback.csv\n\n  \
                  # Pin the reference date and fail on integrity findings\n  \
                  logistics-audit ... --reference-date 2026-01-31 --strict\n\n  \
                  # Machine-readable report on stdout\n  \
                  logistics-audit ... --json | jq .summaries"
)]
struct Args {
    /// Path to the inventory CSV
    #[arg(long)]
    inventory: String,

    /// Path to the transactions CSV
    #[arg(long)]
    transactions: String,

    /// Path to the customer feedback CSV
    #[arg(long)]
    feedback: String,

    /// Output directory for cleaned tables and reports
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// JSON file with audit configuration overrides
    ///
    /// Fields not present keep their defaults.
    #[arg(short, long)]
    config: Option<String>,

    /// Date treated as "today" by future-date rules (YYYY-MM-DD)
    #[arg(long)]
    reference_date: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the summary)
    #[arg(short, long)]
    quiet: bool,

    /// Print the JSON report to stdout instead of the human-readable summary
    ///
    /// Disables all logging so stdout only contains JSON.
    #[arg(long)]
    json: bool,

    /// Exit with an error when any integrity check needs review or failed
    #[arg(long)]
    strict: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only holds
/// the report.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    for path in [&args.inventory, &args.transactions, &args.feedback] {
        if !Path::new(path).exists() {
            return Err(anyhow!("Input file not found: {}", path));
        }
    }

    let config = load_config(&args)?;
    let reference_date = config.reference_date;

    let inventory = load_csv(&args.inventory, DatasetKind::Inventory)?;
    let transactions = load_csv(&args.transactions, DatasetKind::Transactions)?;
    let feedback = load_csv(&args.feedback, DatasetKind::Feedback)?;

    let mut builder = AuditOrchestrator::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let orchestrator = builder.build()?;

    let result = orchestrator
        .run(&inventory, &transactions, &feedback)
        .map_err(|e| {
            error!("Audit failed: {}", e);
            anyhow!("Audit failed: {}", e)
        })?;
    let integrity = orchestrator.validate_integrity(&transactions, &result)?;

    let report = ReportGenerator::build_report(
        ReportInputs {
            inventory: args.inventory.clone(),
            transactions: args.transactions.clone(),
            feedback: args.feedback.clone(),
        },
        reference_date,
        &result,
        Some(&integrity),
    );

    write_outputs(&args.output, &result, &integrity, &report)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human_readable_summary(&report, &integrity, &args.output);
    }

    if integrity.has_failures() {
        for check in integrity.failures() {
            warn!("Integrity check '{}': {}", check.name, check.status);
        }
        if args.strict {
            return Err(anyhow!(
                "{} integrity check(s) need attention",
                integrity.failures().count()
            ));
        }
    }

    Ok(())
}

/// Defaults, then the `--config` file, then `--reference-date`.
fn load_config(args: &Args) -> Result<AuditConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path))?;
            serde_json::from_str::<AuditConfig>(&content)
                .with_context(|| format!("Invalid config file: {}", path))?
        }
        None => AuditConfig::default(),
    };

    if let Some(ref date) = args.reference_date {
        config.reference_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("Invalid --reference-date '{}', expected YYYY-MM-DD", date))?;
    }

    config.validate()?;
    Ok(config)
}

/// Write cleaned tables, report tables and the JSON report.
fn write_outputs(
    output_dir: &str,
    result: &AuditResult,
    integrity: &IntegrityReport,
    report: &AuditReport,
) -> Result<()> {
    let generator = ReportGenerator::new(output_dir);

    generator.write_cleaned(result)?;
    generator.write_table(&ReportGenerator::summary_table(result)?, "summary")?;
    generator.write_table(
        &ReportGenerator::justification_table(result)?,
        "justifications",
    )?;
    generator.write_table(&ReportGenerator::integrity_table(integrity)?, "integrity")?;
    generator.write_report(report)?;

    info!("Outputs written to {}", generator.output_dir().display());
    Ok(())
}

/// Print a human-readable summary of the audit.
///
/// Uses `println!` on purpose: this is the primary output and must show
/// regardless of log level.
fn print_human_readable_summary(report: &AuditReport, integrity: &IntegrityReport, output: &str) {
    println!();
    println!("{}", "=".repeat(80));
    println!("AUDIT COMPLETE (reference date {})", report.reference_date);
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "{:<14} {:>8} {:>8} {:>8} {:>10} {:>10} {:>8}",
        "Dataset", "Rows in", "Rows out", "Changes", "Score in", "Score out", "Delta"
    );
    println!("{}", "-".repeat(72));
    for summary in &report.summaries {
        println!(
            "{:<14} {:>8} {:>8} {:>8} {:>10.2} {:>10.2} {:>+8.2}",
            summary.dataset.display_name(),
            summary.original_rows,
            summary.final_rows,
            summary.changes,
            summary.score_before,
            summary.score_after,
            summary.improvement
        );
    }
    println!();

    if let Some(ref decision) = report.orphan_decision {
        println!("Orphaned SKUs: {}", decision.orphaned_skus.join(", "));
        println!("  {}", decision.decision);
        println!();
    }

    println!("Integrity Checks:");
    for check in &integrity.checks {
        println!("  [{:<10}] {}: {}", check.status.label(), check.name, check.observed);
    }
    println!();

    println!("Outputs: {}", output);
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
