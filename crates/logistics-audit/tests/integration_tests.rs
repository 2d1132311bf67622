//! Integration tests for the logistics audit.
//!
//! These tests load the source-format CSV fixtures and check end-to-end
//! behavior of the orchestrator, validator and report generator.

use logistics_audit::schema::{feedback, inventory, transactions};
use logistics_audit::utils::{column_bool, column_f64, column_str, column_sum};
use logistics_audit::validation::{
    CATALOG_MATCH_CHECK, FUTURE_DATE_CHECK, NEGATIVE_QUANTITY_CHECK, ORPHAN_CHECK,
    PLACEHOLDER_DELIVERY_CHECK, REVENUE_CHECK,
};
use logistics_audit::{
    AuditCache, AuditConfig, AuditOrchestrator, AuditResult, AuditStage, CheckStatus,
    DatasetKind, JustificationKind, ReportGenerator, ReportInputs, load_csv,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

struct Inputs {
    inventory: DataFrame,
    transactions: DataFrame,
    feedback: DataFrame,
}

fn load_fixtures() -> Inputs {
    let dir = fixtures_path();
    Inputs {
        inventory: load_csv(dir.join("inventario.csv"), DatasetKind::Inventory)
            .expect("Failed to load inventory fixture"),
        transactions: load_csv(dir.join("transacciones.csv"), DatasetKind::Transactions)
            .expect("Failed to load transactions fixture"),
        feedback: load_csv(dir.join("feedback.csv"), DatasetKind::Feedback)
            .expect("Failed to load feedback fixture"),
    }
}

fn uncached() -> AuditOrchestrator {
    let config = AuditConfig::builder().enable_cache(false).build().unwrap();
    AuditOrchestrator::new(config).unwrap()
}

fn run(inputs: &Inputs) -> AuditResult {
    uncached()
        .run(&inputs.inventory, &inputs.transactions, &inputs.feedback)
        .expect("Audit should complete")
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_full_audit_on_fixtures() {
    let inputs = load_fixtures();
    let result = run(&inputs);

    assert_eq!(result.inventory.cleaned.height(), 8);
    assert_eq!(result.transactions.cleaned.height(), 10);
    assert_eq!(result.feedback.cleaned.height(), 7);

    for audit in result.datasets() {
        assert!((0.0..=100.0).contains(&audit.score_before()));
        assert!((0.0..=100.0).contains(&audit.score_after()));
    }
    // Imputation removes every null the inventory had
    assert_eq!(result.inventory.metrics_after.total_nulls, 0);
    assert!(result.inventory.metrics_before.total_nulls > 0);
    assert!(result.total_changes() > 0);
}

#[test]
fn test_rows_conserved_except_feedback_duplicates() {
    let inputs = load_fixtures();
    let result = run(&inputs);

    assert_eq!(result.inventory.rows_removed(), 0);
    assert_eq!(result.transactions.rows_removed(), 0);
    assert_eq!(result.feedback.rows_removed(), 1);
    assert_eq!(result.feedback.log.rows_removed(), 1);
    assert_eq!(result.inventory.log.rows_removed(), 0);
}

#[test]
fn test_revenue_conserved() {
    let inputs = load_fixtures();
    let result = run(&inputs);

    let before = column_sum(&inputs.transactions, transactions::FINAL_SALE_PRICE).unwrap();
    let after = column_sum(&result.transactions.cleaned, transactions::FINAL_SALE_PRICE).unwrap();
    assert!((before - after).abs() < 0.01);
    assert!((before - 5754.0).abs() < 1e-9);
}

#[test]
fn test_no_negative_quantities_or_placeholders() {
    let inputs = load_fixtures();
    let result = run(&inputs);
    let cleaned = &result.transactions.cleaned;

    let quantities = column_f64(cleaned, transactions::QUANTITY_SOLD).unwrap();
    assert!(quantities.iter().flatten().all(|q| *q >= 0.0));
    assert_eq!(quantities[1], Some(1.0));
    assert_eq!(quantities[6], Some(2.0));

    let delivery = column_f64(cleaned, transactions::ACTUAL_DELIVERY_DAYS).unwrap();
    assert!(delivery.iter().flatten().all(|d| *d < 999.0));

    let discounts = column_f64(cleaned, transactions::DISCOUNT_USD).unwrap();
    assert!(discounts.iter().flatten().all(|d| *d >= 0.0));
}

#[test]
fn test_placeholder_delivery_uses_city_median() {
    let inputs = load_fixtures();
    let result = run(&inputs);
    let delivery = column_f64(&result.transactions.cleaned, transactions::ACTUAL_DELIVERY_DAYS)
        .unwrap();

    // Bogotá valid days: 5, 6, 3, 7 -> 5.5; Medellín valid days: 3, 4, 4 -> 4
    assert_eq!(delivery[2], Some(5.5));
    assert_eq!(delivery[6], Some(4.0));
}

#[test]
fn test_orphan_flags_and_decision() {
    let inputs = load_fixtures();
    let result = run(&inputs);

    let flags: Vec<bool> = column_bool(&result.transactions.cleaned, transactions::NO_CATALOG_FLAG)
        .unwrap()
        .into_iter()
        .map(|f| f.unwrap_or(false))
        .collect();
    assert_eq!(
        flags,
        vec![false, false, true, false, false, true, false, true, false, false]
    );

    let decision = result.orphan_decision.expect("orphans should be documented");
    assert_eq!(decision.orphaned_skus, vec!["SKU-8888", "SKU-9999"]);
    assert_eq!(decision.affected_rows, 3);
    assert_eq!(decision.orphan_revenue, 650.0);
    assert_eq!(decision.total_revenue, 5754.0);
    assert!((decision.revenue_share - 11.3).abs() < 0.01);
}

#[test]
fn test_inventory_repairs() {
    let inputs = load_fixtures();
    let result = run(&inputs);
    let cleaned = &result.inventory.cleaned;

    let categories = column_str(cleaned, inventory::CATEGORY).unwrap();
    assert_eq!(categories[1].as_deref(), Some("Smartphones"));
    assert_eq!(categories[3].as_deref(), Some("Laptops"));
    assert_eq!(categories[4].as_deref(), Some("Sin_Categoria"));

    let stock = column_f64(cleaned, inventory::CURRENT_STOCK).unwrap();
    assert_eq!(stock[1], Some(15.0));
    assert!(stock.iter().all(|s| s.is_some()));

    // Valid costs: 180, 210, 350.5, 420, 890, 950, 15000 -> median 420
    let costs = column_f64(cleaned, inventory::UNIT_COST_USD).unwrap();
    assert_eq!(costs[3], Some(420.0));

    let outliers = column_bool(cleaned, inventory::COST_OUTLIER_FLAG).unwrap();
    assert_eq!(outliers[4], Some(true));
    assert_eq!(outliers.iter().filter(|f| **f == Some(true)).count(), 1);

    let lead_times = column_f64(cleaned, inventory::LEAD_TIME_DAYS).unwrap();
    assert_eq!(lead_times[0], Some(6.0));
    assert_eq!(lead_times[1], Some(1.0));
    assert!(lead_times.iter().all(|l| l.is_some()));
}

#[test]
fn test_feedback_repairs() {
    let inputs = load_fixtures();
    let result = run(&inputs);
    let cleaned = &result.feedback.cleaned;

    let ratings = column_f64(cleaned, feedback::PRODUCT_RATING).unwrap();
    assert!(ratings.iter().flatten().all(|r| (1.0..=5.0).contains(r)));
    assert_eq!(ratings[1], Some(4.0));

    let ages = column_f64(cleaned, feedback::CUSTOMER_AGE).unwrap();
    assert!(ages.iter().flatten().all(|a| (18.0..=100.0).contains(a)));

    let answers = column_str(cleaned, feedback::RECOMMENDS_BRAND).unwrap();
    for answer in answers.iter().flatten() {
        assert!(
            ["Yes", "No", "Maybe", "NoAnswer"].contains(&answer.as_str()),
            "unexpected answer {answer}"
        );
    }

    let tickets = column_bool(cleaned, feedback::SUPPORT_TICKET_OPEN).unwrap();
    // The dedup removed the second TX-0004 row, so "quizás" sits at index 4
    assert_eq!(tickets[4], None);
    assert_eq!(tickets[1], Some(true));

    let nps = column_f64(cleaned, feedback::NPS).unwrap();
    let raw_nps = column_f64(&inputs.feedback, feedback::NPS).unwrap();
    assert_eq!(nps[0], raw_nps[0]);
}

#[test]
fn test_every_change_is_justified() {
    let inputs = load_fixtures();
    let result = run(&inputs);

    for audit in result.datasets() {
        for entry in audit.log.entries() {
            assert!(!entry.method.is_empty(), "{}: empty method", entry.field);
            assert!(!entry.rationale.is_empty(), "{}: empty rationale", entry.field);
        }
    }

    let fields: Vec<&str> = result
        .transactions
        .log
        .changes()
        .map(|e| e.field.as_str())
        .collect();
    for field in [
        transactions::SALE_DATE,
        transactions::QUANTITY_SOLD,
        transactions::ACTUAL_DELIVERY_DAYS,
        transactions::SHIPPING_COST,
        transactions::SHIPPING_STATUS,
        transactions::NO_CATALOG_FLAG,
        transactions::DISCOUNT_USD,
    ] {
        assert!(fields.contains(&field), "missing change entry for {field}");
    }

    let nps = result.feedback.log.for_field(feedback::NPS).next().unwrap();
    assert_eq!(nps.kind, JustificationKind::Validation);
    assert_eq!(nps.affected_rows, 0);
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_second_run_changes_nothing() {
    let inputs = load_fixtures();
    let first = run(&inputs);

    let second = uncached()
        .run(
            &first.inventory.cleaned,
            &first.transactions.cleaned,
            &first.feedback.cleaned,
        )
        .unwrap();

    for (a, b) in first.datasets().into_iter().zip(second.datasets()) {
        for entry in b.log.entries() {
            assert_eq!(
                entry.affected_rows, 0,
                "{} / {} changed rows on the second run",
                b.dataset, entry.field
            );
        }
        assert_eq!(a.score_after(), b.score_before());
        assert_eq!(b.score_before(), b.score_after());
        assert!(a.cleaned.equals_missing(&b.cleaned), "{} differs", b.dataset);
    }
}

// ============================================================================
// Integrity
// ============================================================================

#[test]
fn test_integrity_report_on_fixtures() {
    let inputs = load_fixtures();
    let orchestrator = uncached();
    let result = orchestrator
        .run(&inputs.inventory, &inputs.transactions, &inputs.feedback)
        .unwrap();
    let report = orchestrator
        .validate_integrity(&inputs.transactions, &result)
        .unwrap();

    assert_eq!(report.checks.len(), 6);
    for name in [
        REVENUE_CHECK,
        CATALOG_MATCH_CHECK,
        FUTURE_DATE_CHECK,
        NEGATIVE_QUANTITY_CHECK,
        PLACEHOLDER_DELIVERY_CHECK,
    ] {
        assert_eq!(report.check(name).unwrap().status, CheckStatus::Pass, "{name}");
    }
    assert_eq!(report.check(ORPHAN_CHECK).unwrap().status, CheckStatus::Documented);
    assert!(!report.has_failures());
}

#[test]
fn test_raw_transactions_fail_integrity() {
    let inputs = load_fixtures();
    let result = run(&inputs);
    let report = logistics_audit::IntegrityValidator::validate(
        &inputs.transactions,
        &inputs.transactions,
        &result.inventory.cleaned,
        &AuditConfig::default(),
    )
    .unwrap();

    assert!(report.has_failures());
    assert_eq!(report.check(NEGATIVE_QUANTITY_CHECK).unwrap().status, CheckStatus::Fail);
    assert_eq!(report.check(PLACEHOLDER_DELIVERY_CHECK).unwrap().status, CheckStatus::Fail);
    assert_eq!(report.check(FUTURE_DATE_CHECK).unwrap().status, CheckStatus::Fail);
}

#[test]
fn test_later_reference_date_keeps_sale_dates() {
    let inputs = load_fixtures();
    let config = AuditConfig::builder()
        .reference_date(chrono::NaiveDate::from_ymd_opt(2026, 12, 31).unwrap())
        .enable_cache(false)
        .build()
        .unwrap();
    let result = AuditOrchestrator::new(config)
        .unwrap()
        .run(&inputs.inventory, &inputs.transactions, &inputs.feedback)
        .unwrap();

    let clipped = result
        .transactions
        .log
        .for_field(transactions::SALE_DATE)
        .filter(|e| e.kind == JustificationKind::Imputation)
        .count();
    assert_eq!(clipped, 0);
}

// ============================================================================
// Cache and progress
// ============================================================================

#[test]
fn test_cache_keyed_by_content() {
    let inputs = load_fixtures();
    let orchestrator = AuditOrchestrator::new(AuditConfig::default()).unwrap();

    let first = orchestrator
        .run(&inputs.inventory, &inputs.transactions, &inputs.feedback)
        .unwrap();
    let again = orchestrator
        .run(&inputs.inventory, &inputs.transactions, &inputs.feedback)
        .unwrap();
    assert_eq!(first.cache_key, again.cache_key);

    let cache = orchestrator.cache().unwrap();
    assert_eq!(cache.len(), 1);

    let other = orchestrator
        .run(
            &first.inventory.cleaned,
            &first.transactions.cleaned,
            &first.feedback.cleaned,
        )
        .unwrap();
    assert_ne!(other.cache_key, first.cache_key);
    assert_eq!(cache.len(), 2);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_shared_cache_between_orchestrators() {
    let inputs = load_fixtures();
    let cache = Arc::new(AuditCache::new());

    let a = AuditOrchestrator::builder().cache(cache.clone()).build().unwrap();
    let b = AuditOrchestrator::builder().cache(cache.clone()).build().unwrap();

    let result = a
        .run(&inputs.inventory, &inputs.transactions, &inputs.feedback)
        .unwrap();
    assert!(b.cache().unwrap().get(&result.cache_key).is_some());
}

#[test]
fn test_progress_reported_per_stage() {
    let inputs = load_fixtures();
    let cleaning_updates = Arc::new(AtomicUsize::new(0));
    let counter = cleaning_updates.clone();

    let orchestrator = AuditOrchestrator::builder()
        .config(AuditConfig::builder().enable_cache(false).build().unwrap())
        .on_progress(move |update| {
            if update.dataset.is_some() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            assert!((0.0..=1.0).contains(&update.progress));
            assert_ne!(update.stage, AuditStage::Failed);
        })
        .build()
        .unwrap();

    orchestrator
        .run(&inputs.inventory, &inputs.transactions, &inputs.feedback)
        .unwrap();

    // Start and end of each of the three cleaning stages
    assert_eq!(cleaning_updates.load(Ordering::SeqCst), 6);
}

// ============================================================================
// Reporting
// ============================================================================

#[test]
fn test_report_tables() {
    let inputs = load_fixtures();
    let result = run(&inputs);

    let summary = ReportGenerator::summary_table(&result).unwrap();
    assert_eq!(summary.height(), 3);

    let justifications = ReportGenerator::justification_table(&result).unwrap();
    let entries: usize = result.datasets().iter().map(|d| d.log.len()).sum();
    assert_eq!(justifications.height(), entries);
}

#[test]
fn test_write_outputs() {
    let inputs = load_fixtures();
    let orchestrator = uncached();
    let result = orchestrator
        .run(&inputs.inventory, &inputs.transactions, &inputs.feedback)
        .unwrap();
    let integrity = orchestrator
        .validate_integrity(&inputs.transactions, &result)
        .unwrap();

    let dir = std::env::temp_dir().join(format!("logistics_audit_{}", std::process::id()));
    let generator = ReportGenerator::new(&dir);

    let cleaned = generator.write_cleaned(&result).unwrap();
    assert_eq!(cleaned.len(), 3);
    generator
        .write_table(&ReportGenerator::integrity_table(&integrity).unwrap(), "integrity")
        .unwrap();

    let report = ReportGenerator::build_report(
        ReportInputs::default(),
        orchestrator.config().reference_date,
        &result,
        Some(&integrity),
    );
    let path = generator.write_report(&report).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["summaries"].as_array().unwrap().len(), 3);
    assert_eq!(json["orphan_decision"]["affected_rows"], 3);
    assert_eq!(json["integrity"]["checks"].as_array().unwrap().len(), 6);

    // Cleaned output reloads as the same dataset
    let reloaded = load_csv(dir.join("transactions_clean.csv"), DatasetKind::Transactions).unwrap();
    assert_eq!(reloaded.height(), 10);

    std::fs::remove_dir_all(&dir).ok();
}
