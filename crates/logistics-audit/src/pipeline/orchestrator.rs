//! Runs the full audit over the three datasets.

use crate::cleaner::{
    CleanedTable, DatasetCleaner, FeedbackCleaner, InventoryCleaner, RepairContext,
    TransactionsCleaner,
};
use crate::config::AuditConfig;
use crate::error::{AuditError, Result, ResultExt};
use crate::pipeline::cache::AuditCache;
use crate::pipeline::progress::{
    AuditStage, CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::quality::QualityScorer;
use crate::types::{AuditResult, DatasetAudit, DatasetKind, QualityMetrics};
use crate::validation::{IntegrityReport, IntegrityValidator};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Scores, cleans and rescores the inventory, transactions and feedback
/// tables.
///
/// Inventory is always cleaned first because the transactions cleaner
/// resolves SKUs against the cleaned catalog. Inputs are borrowed and never
/// modified; every cleaned table in the result is a new value.
///
/// # Example
///
/// ```rust,ignore
/// use logistics_audit::{AuditConfig, AuditOrchestrator};
///
/// let orchestrator = AuditOrchestrator::builder()
///     .config(AuditConfig::default())
///     .on_progress(|update| println!("{}", update.message))
///     .build()?;
///
/// let result = orchestrator.run(&inventory, &transactions, &feedback)?;
/// println!("{}", result.transactions.improvement());
/// ```
pub struct AuditOrchestrator {
    config: AuditConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    cache: Option<Arc<AuditCache>>,
}

static_assertions::assert_impl_all!(AuditOrchestrator: Send, Sync);

impl AuditOrchestrator {
    /// Create a new orchestrator builder.
    pub fn builder() -> AuditOrchestratorBuilder {
        AuditOrchestratorBuilder::default()
    }

    /// Orchestrator with the given configuration and no reporter.
    pub fn new(config: AuditConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// The result cache, when caching is enabled.
    pub fn cache(&self) -> Option<&AuditCache> {
        self.cache.as_deref()
    }

    /// Audit the three tables.
    ///
    /// A repeated call with identical inputs returns the cached result
    /// while caching is enabled.
    pub fn run(
        &self,
        inventory: &DataFrame,
        transactions: &DataFrame,
        feedback: &DataFrame,
    ) -> Result<AuditResult> {
        match self.run_internal(inventory, transactions, feedback) {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Audit completed"));
                Ok(result)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Audit error: {}", e);
                Err(e)
            }
        }
    }

    /// Check the integrity of a finished run against the original
    /// transactions it was computed from.
    pub fn validate_integrity(
        &self,
        original_transactions: &DataFrame,
        result: &AuditResult,
    ) -> Result<IntegrityReport> {
        IntegrityValidator::validate(
            original_transactions,
            &result.transactions.cleaned,
            &result.inventory.cleaned,
            &self.config,
        )
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(
        &self,
        inventory: &DataFrame,
        transactions: &DataFrame,
        feedback: &DataFrame,
    ) -> Result<AuditResult> {
        let start_time = Instant::now();
        info!("Starting logistics audit...");
        self.report_progress(ProgressUpdate::new(
            AuditStage::Initializing,
            0.0,
            "Starting audit...",
        ));

        let cache_key = AuditCache::key(&self.config, inventory, transactions, feedback)?;
        if let Some(cache) = &self.cache
            && let Some(cached) = cache.get(&cache_key)
        {
            info!("Returning cached audit result");
            return Ok(cached);
        }

        self.check_cancelled()?;

        // Step 1: score the untouched inputs
        self.report_progress(ProgressUpdate::new(
            AuditStage::ScoringBefore,
            0.0,
            "Scoring input tables...",
        ));
        let inventory_before = Self::metrics(inventory, DatasetKind::Inventory)?;
        let transactions_before = Self::metrics(transactions, DatasetKind::Transactions)?;
        let feedback_before = Self::metrics(feedback, DatasetKind::Feedback)?;
        info!(
            "Scores before cleaning: inventory {:.2}, transactions {:.2}, feedback {:.2}",
            inventory_before.health_score,
            transactions_before.health_score,
            feedback_before.health_score
        );

        let ctx = RepairContext::new(&self.config);

        // Step 2: inventory, which transactions depend on
        self.check_cancelled()?;
        let inventory_clean = self.clean_stage(DatasetKind::Inventory, || {
            InventoryCleaner.clean(inventory, &ctx)
        })?;

        // Step 3: transactions against the cleaned catalog
        self.check_cancelled()?;
        let mut orphan_decision = None;
        let transactions_clean = self.clean_stage(DatasetKind::Transactions, || {
            let (cleaned, decision) =
                TransactionsCleaner.clean_against(transactions, &inventory_clean.table, &ctx)?;
            orphan_decision = decision;
            Ok(cleaned)
        })?;

        // Step 4: feedback
        self.check_cancelled()?;
        let feedback_clean = self.clean_stage(DatasetKind::Feedback, || {
            FeedbackCleaner.clean(feedback, &ctx)
        })?;

        // Step 5: score the cleaned tables
        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            AuditStage::ScoringAfter,
            0.0,
            "Scoring cleaned tables...",
        ));

        let result = AuditResult {
            inventory: Self::audit(DatasetKind::Inventory, inventory_clean, inventory_before)?,
            transactions: Self::audit(
                DatasetKind::Transactions,
                transactions_clean,
                transactions_before,
            )?,
            feedback: Self::audit(DatasetKind::Feedback, feedback_clean, feedback_before)?,
            orphan_decision,
            cache_key,
        };

        for audit in result.datasets() {
            info!(
                "{}: score {:.2} -> {:.2} ({:+.2}), {} changes",
                audit.dataset.display_name(),
                audit.score_before(),
                audit.score_after(),
                audit.improvement(),
                audit.log.changes().count()
            );
        }
        info!(
            "Audit finished in {} ms",
            start_time.elapsed().as_millis()
        );

        if let Some(cache) = &self.cache {
            cache.insert(result.clone());
        }

        Ok(result)
    }

    /// Run one cleaner, bracketed by progress updates and with error context.
    fn clean_stage<F>(&self, dataset: DatasetKind, clean: F) -> Result<CleanedTable>
    where
        F: FnOnce() -> Result<CleanedTable>,
    {
        self.report_progress(ProgressUpdate::cleaning(
            dataset,
            0.0,
            format!("Cleaning {}...", dataset),
        ));
        let cleaned = clean().context(format!("Cleaning {}", dataset))?;
        self.report_progress(ProgressUpdate::cleaning(
            dataset,
            1.0,
            format!(
                "{} cleaned: {} entries",
                dataset.display_name(),
                cleaned.log.len()
            ),
        ));
        Ok(cleaned)
    }

    fn metrics(table: &DataFrame, dataset: DatasetKind) -> Result<QualityMetrics> {
        QualityScorer::metrics(table, dataset.as_str())
            .context(format!("Scoring {}", dataset))
    }

    fn audit(
        dataset: DatasetKind,
        cleaned: CleanedTable,
        metrics_before: QualityMetrics,
    ) -> Result<DatasetAudit> {
        let metrics_after = Self::metrics(&cleaned.table, dataset)?;
        Ok(DatasetAudit {
            dataset,
            cleaned: cleaned.table,
            log: cleaned.log,
            metrics_before,
            metrics_after,
        })
    }
}

/// Builder for [`AuditOrchestrator`].
#[derive(Default)]
pub struct AuditOrchestratorBuilder {
    config: Option<AuditConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
    cache: Option<Arc<AuditCache>>,
}

static_assertions::assert_impl_all!(AuditOrchestratorBuilder: Send);

impl AuditOrchestratorBuilder {
    /// Set the audit configuration.
    pub fn config(mut self, config: AuditConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token, checked between stages.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Share an existing cache between orchestrators. Keys include the
    /// configuration, so orchestrators with different settings never read
    /// each other's results. Ignored when the configuration disables caching.
    pub fn cache(mut self, cache: Arc<AuditCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the orchestrator, validating the configuration.
    pub fn build(self) -> Result<AuditOrchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let cache = config
            .enable_cache
            .then(|| self.cache.unwrap_or_default());

        Ok(AuditOrchestrator {
            config,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{feedback, inventory, transactions};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn inventory_table() -> DataFrame {
        df!(
            inventory::SKU_ID => &["A", "B", "X1"],
            inventory::CATEGORY => &["laptops", "Monitores", "Laptops"],
            inventory::CURRENT_STOCK => &[Some(10.0), None, Some(-5.0)],
            inventory::UNIT_COST_USD => &[400.0, 200.0, 0.5],
            inventory::WAREHOUSE => &["norte", "Sur", "Norte"],
            inventory::LEAD_TIME_DAYS => &["5-7 días", "Inmediato", "10"],
            inventory::LAST_REVIEW_DATE => &["2025-11-01", "2025-12-15", "2027-01-01"]
        )
        .unwrap()
    }

    fn transactions_table() -> DataFrame {
        df!(
            transactions::TRANSACTION_ID => &["T1", "T2", "T3", "T4"],
            transactions::SKU_ID => &["A", "C", "B", "C"],
            transactions::SALE_DATE => &["01/12/2025", "05/12/2025", "01/03/2026", "10/12/2025"],
            transactions::QUANTITY_SOLD => &[2.0, -1.0, 1.0, 3.0],
            transactions::FINAL_SALE_PRICE => &[100.0, 50.0, 200.0, 150.0],
            transactions::DESTINATION_CITY => &["MED", "Medellín", "BOG", "Bogotá"],
            transactions::SHIPPING_COST => &[Some(10.0), None, Some(12.0), Some(14.0)],
            transactions::ACTUAL_DELIVERY_DAYS => &[3.0, 999.0, 4.0, 6.0],
            transactions::SHIPPING_STATUS => &[Some("Entregado"), None, Some("Entregado"), Some("En tránsito")],
            transactions::DISCOUNT_USD => &[0.0, -5.0, 0.0, 10.0]
        )
        .unwrap()
    }

    fn feedback_table() -> DataFrame {
        df!(
            feedback::TRANSACTION_ID => &["T1", "T2", "T2"],
            feedback::PRODUCT_RATING => &[99.0, 4.0, 4.0],
            feedback::LOGISTICS_RATING => &[5.0, 3.0, 3.0],
            feedback::CUSTOMER_AGE => &[35.0, 28.0, 28.0],
            feedback::RECOMMENDS_BRAND => &["SI", "No", "No"],
            feedback::SUPPORT_TICKET_OPEN => &["No", "Sí", "Sí"],
            feedback::NPS => &[80.0, -10.0, -10.0]
        )
        .unwrap()
    }

    fn orchestrator() -> AuditOrchestrator {
        let config = AuditConfig::builder().enable_cache(false).build().unwrap();
        AuditOrchestrator::new(config).unwrap()
    }

    #[test]
    fn test_run_cleans_all_datasets() {
        let (inv, tx, fb) = (inventory_table(), transactions_table(), feedback_table());
        let result = orchestrator().run(&inv, &tx, &fb).unwrap();

        assert_eq!(result.inventory.cleaned.height(), 3);
        assert_eq!(result.transactions.cleaned.height(), 4);
        assert_eq!(result.feedback.cleaned.height(), 2);
        assert_eq!(result.feedback.rows_removed(), 1);

        let decision = result.orphan_decision.as_ref().unwrap();
        assert_eq!(decision.orphaned_skus, vec!["C".to_string()]);
        assert_eq!(decision.affected_rows, 2);
    }

    #[test]
    fn test_inputs_are_not_modified() {
        let (inv, tx, fb) = (inventory_table(), transactions_table(), feedback_table());
        orchestrator().run(&inv, &tx, &fb).unwrap();
        assert!(inv.equals_missing(&inventory_table()));
        assert!(tx.equals_missing(&transactions_table()));
        assert!(fb.equals_missing(&feedback_table()));
    }

    #[test]
    fn test_scores_in_bounds() {
        let (inv, tx, fb) = (inventory_table(), transactions_table(), feedback_table());
        let result = orchestrator().run(&inv, &tx, &fb).unwrap();
        for audit in result.datasets() {
            assert!((0.0..=100.0).contains(&audit.score_before()));
            assert!((0.0..=100.0).contains(&audit.score_after()));
        }
    }

    #[test]
    fn test_progress_stages_in_order() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let seen = stages.clone();
        let orchestrator = AuditOrchestrator::builder()
            .config(AuditConfig::builder().enable_cache(false).build().unwrap())
            .on_progress(move |update| seen.lock().push(update.stage))
            .build()
            .unwrap();

        orchestrator
            .run(&inventory_table(), &transactions_table(), &feedback_table())
            .unwrap();

        let mut stages = stages.lock().clone();
        stages.dedup();
        assert_eq!(
            stages,
            vec![
                AuditStage::Initializing,
                AuditStage::ScoringBefore,
                AuditStage::CleaningInventory,
                AuditStage::CleaningTransactions,
                AuditStage::CleaningFeedback,
                AuditStage::ScoringAfter,
                AuditStage::Complete,
            ]
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let orchestrator = AuditOrchestrator::builder()
            .cancellation_token(token)
            .build()
            .unwrap();

        let err = orchestrator
            .run(&inventory_table(), &transactions_table(), &feedback_table())
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_cache_hit_and_invalidate() {
        let orchestrator = AuditOrchestrator::new(AuditConfig::default()).unwrap();
        let (inv, tx, fb) = (inventory_table(), transactions_table(), feedback_table());

        let first = orchestrator.run(&inv, &tx, &fb).unwrap();
        let cache = orchestrator.cache().unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&first.cache_key).is_some());

        let second = orchestrator.run(&inv, &tx, &fb).unwrap();
        assert_eq!(first.cache_key, second.cache_key);
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(&first.cache_key));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_cache_separates_configs() {
        use crate::utils::column_dates;
        use chrono::NaiveDate;

        let cache = Arc::new(AuditCache::new());
        let shared = |reference: NaiveDate| {
            AuditOrchestrator::builder()
                .config(AuditConfig::builder().reference_date(reference).build().unwrap())
                .cache(cache.clone())
                .build()
                .unwrap()
        };
        let late = shared(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
        let early = shared(NaiveDate::from_ymd_opt(2025, 12, 15).unwrap());
        let (inv, tx, fb) = (inventory_table(), transactions_table(), feedback_table());

        let late_result = late.run(&inv, &tx, &fb).unwrap();
        let early_result = early.run(&inv, &tx, &fb).unwrap();
        assert_ne!(late_result.cache_key, early_result.cache_key);
        assert_eq!(cache.len(), 2);

        // T3 is sold on 2026-03-01: kept under the late date, clipped under the early one
        let sale_date = |result: &AuditResult| {
            column_dates(&result.transactions.cleaned, transactions::SALE_DATE)
                .unwrap()
                .unwrap()[2]
        };
        assert_eq!(sale_date(&late_result), NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(sale_date(&early_result), NaiveDate::from_ymd_opt(2025, 12, 15));
    }

    #[test]
    fn test_cache_disabled() {
        assert!(orchestrator().cache().is_none());
    }

    #[test]
    fn test_missing_columns_is_error() {
        let broken = inventory_table().drop(inventory::CATEGORY).unwrap();
        let err = orchestrator()
            .run(&broken, &transactions_table(), &feedback_table())
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_COLUMNS");
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AuditConfig::default();
        config.rating_range = (5.0, 1.0);
        let err = AuditOrchestrator::builder()
            .config(config)
            .build()
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_validate_integrity_after_run() {
        use crate::validation::{
            CheckStatus, FUTURE_DATE_CHECK, NEGATIVE_QUANTITY_CHECK, PLACEHOLDER_DELIVERY_CHECK,
            REVENUE_CHECK,
        };

        let (inv, tx, fb) = (inventory_table(), transactions_table(), feedback_table());
        let orchestrator = orchestrator();
        let result = orchestrator.run(&inv, &tx, &fb).unwrap();
        let report = orchestrator.validate_integrity(&tx, &result).unwrap();

        for name in [
            REVENUE_CHECK,
            FUTURE_DATE_CHECK,
            NEGATIVE_QUANTITY_CHECK,
            PLACEHOLDER_DELIVERY_CHECK,
        ] {
            assert_eq!(report.check(name).unwrap().status, CheckStatus::Pass, "{name}");
        }
    }
}
