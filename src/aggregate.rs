use polars::prelude::*;
use rayon::prelude::*;
use tracing::info;

use crate::combine::{CombineStrategy, combine_report};
use crate::correction::{CorrectedBatch, DatasetRecord, ResultBatch, correct};
use crate::error::{EnrichError, Result};
use crate::parallel::{resolve_threads, run_in_pool};
use crate::report::{RegressionReport, parse};
use crate::types::DatasetLabels;

pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct Classifier {
    pub cell_types: Vec<(String, String)>,
    pub processing_marker: String,
    pub marked_processing: String,
    pub unmarked_processing: String,
}

impl Default for Classifier {
    fn default() -> Self {
        let cell_types = [
            ("Olig", "Oligodendrocyte"),
            ("Nurr", "Nurr1+"),
            ("Pdgfra", "Pdgfra+"),
            ("Aldh1l1", "Aldh1l1+"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            cell_types,
            processing_marker: "cleaned".to_string(),
            marked_processing: "Cleaned".to_string(),
            unmarked_processing: "Unique".to_string(),
        }
    }
}

impl Classifier {
    pub fn classify(&self, dataset_id: &str) -> DatasetLabels {
        let cell_type = self
            .cell_types
            .iter()
            .find(|(marker, _)| dataset_id.contains(marker.as_str()))
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        let processing = if dataset_id.contains(self.processing_marker.as_str()) {
            self.marked_processing.clone()
        } else {
            self.unmarked_processing.clone()
        };
        DatasetLabels {
            cell_type,
            processing,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub alpha: f64,
    pub expected_datasets: Option<usize>,
    pub strategy: CombineStrategy,
    pub classifier: Classifier,
    pub cores: Option<usize>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            expected_datasets: None,
            strategy: CombineStrategy::default(),
            classifier: Classifier::default(),
            cores: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultAggregator {
    config: AggregatorConfig,
    batch: ResultBatch,
}

impl ResultAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        let batch = match config.expected_datasets {
            Some(n) => ResultBatch::with_expected(n),
            None => ResultBatch::new(),
        };
        Self { config, batch }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn pending(&self) -> &ResultBatch {
        &self.batch
    }

    pub fn analyze(&self, dataset_id: &str, report: &RegressionReport) -> Result<DatasetRecord> {
        if !report.is_complete() {
            return Err(EnrichError::ParseIncomplete(format!(
                "report for {dataset_id} has no total heritability line"
            )));
        }
        let result = combine_report(report, &self.config.strategy)?;
        Ok(DatasetRecord {
            dataset_id: dataset_id.to_string(),
            labels: self.config.classifier.classify(dataset_id),
            result,
        })
    }

    pub fn record(&mut self, dataset_id: &str, outcome: Result<DatasetRecord>) -> Result<()> {
        match outcome {
            Ok(record) => self.batch.push(record),
            Err(err) => {
                self.batch.exclude(dataset_id, err.to_string());
                Ok(())
            }
        }
    }

    pub fn record_failure(&mut self, dataset_id: &str, reason: impl Into<String>) {
        self.batch.exclude(dataset_id, reason);
    }

    pub fn add_report(&mut self, dataset_id: &str, report_text: &str) -> Result<()> {
        let outcome = self.analyze(dataset_id, &parse(report_text));
        self.record(dataset_id, outcome)
    }

    pub fn add_reports(&mut self, reports: &[(String, String)]) -> Result<()> {
        let cores = resolve_threads(self.config.cores, reports.len());
        let this = &*self;
        let outcomes: Vec<Result<DatasetRecord>> = run_in_pool(cores, || {
            reports
                .par_iter()
                .map(|(id, text)| this.analyze(id, &parse(text)))
                .collect()
        })?;
        for ((id, _), outcome) in reports.iter().zip(outcomes) {
            self.record(id, outcome)?;
        }
        Ok(())
    }

    pub fn finalize(self) -> Result<CorrectedBatch> {
        let batch = self.batch;
        info!(
            "Aggregating {} datasets ({} excluded)",
            batch.len(),
            batch.exclusions().len()
        );
        correct(batch, self.config.alpha)
    }
}

pub fn batch_table(batch: &CorrectedBatch) -> PolarsResult<DataFrame> {
    let rows = batch.records();
    let n = rows.len();
    let mut dataset_id = Vec::with_capacity(n);
    let mut cell_type = Vec::with_capacity(n);
    let mut processing = Vec::with_capacity(n);
    let mut enrichment = Vec::with_capacity(n);
    let mut enrichment_se = Vec::with_capacity(n);
    let mut enrichment_p = Vec::with_capacity(n);
    let mut total_h2 = Vec::with_capacity(n);
    let mut total_h2_se = Vec::with_capacity(n);
    let mut coefficient = Vec::with_capacity(n);
    let mut coefficient_se = Vec::with_capacity(n);
    let mut categories_used = Vec::with_capacity(n);
    let mut bonferroni = Vec::with_capacity(n);
    let mut fdr_p = Vec::with_capacity(n);
    let mut fdr = Vec::with_capacity(n);

    for row in rows {
        let record = &row.record;
        dataset_id.push(record.dataset_id.clone());
        cell_type.push(record.labels.cell_type.clone());
        processing.push(record.labels.processing.clone());
        enrichment.push(record.result.enrichment);
        enrichment_se.push(record.result.enrichment_se);
        enrichment_p.push(record.result.p_value);
        total_h2.push(record.result.total_h2);
        total_h2_se.push(record.result.total_h2_se);
        coefficient.push(record.result.coefficient);
        coefficient_se.push(record.result.coefficient_se);
        categories_used.push(record.result.categories_used as u64);
        bonferroni.push(row.correction.bonferroni_significant);
        fdr_p.push(row.correction.bh_adjusted_p);
        fdr.push(row.correction.fdr_significant);
    }

    df!(
        "dataset_id" => dataset_id,
        "cell_type" => cell_type,
        "processing_type" => processing,
        "enrichment" => enrichment,
        "enrichment_se" => enrichment_se,
        "enrichment_p" => enrichment_p,
        "total_h2" => total_h2,
        "total_h2_se" => total_h2_se,
        "coefficient" => coefficient,
        "coefficient_se" => coefficient_se,
        "categories_used" => categories_used,
        "bonferroni_threshold" => vec![batch.bonferroni_threshold(); n],
        "bonferroni_significant" => bonferroni,
        "fdr_corrected_p" => fdr_p,
        "fdr_significant" => fdr
    )
}
