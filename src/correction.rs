use std::collections::{BTreeMap, HashSet};

use tracing::{info, warn};

use crate::error::{EnrichError, Result};
use crate::qc::check_range_f64;
use crate::types::{DatasetLabels, DatasetResult};

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    pub dataset_id: String,
    pub labels: DatasetLabels,
    pub result: DatasetResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub dataset_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResultBatch {
    expected: Option<usize>,
    records: Vec<DatasetRecord>,
    exclusions: Vec<Exclusion>,
    ids: HashSet<String>,
}

impl ResultBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expected(expected: usize) -> Self {
        Self {
            expected: Some(expected),
            ..Self::default()
        }
    }

    pub fn push(&mut self, record: DatasetRecord) -> Result<()> {
        if !self.ids.insert(record.dataset_id.clone()) {
            return Err(EnrichError::InvalidArgument(format!(
                "dataset {} was added to the batch twice",
                record.dataset_id
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn exclude(&mut self, dataset_id: impl Into<String>, reason: impl Into<String>) {
        let exclusion = Exclusion {
            dataset_id: dataset_id.into(),
            reason: reason.into(),
        };
        warn!(
            "Dataset {} excluded from the batch: {}",
            exclusion.dataset_id, exclusion.reason
        );
        self.exclusions.push(exclusion);
    }

    pub fn expected(&self) -> Option<usize> {
        self.expected
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub bonferroni_significant: bool,
    pub bh_adjusted_p: f64,
    pub fdr_significant: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedRecord {
    pub record: DatasetRecord,
    pub correction: Correction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelSummary {
    pub cell_type: String,
    pub count: usize,
    pub mean_enrichment: f64,
    pub min_p: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CorrectedBatch {
    alpha: f64,
    bonferroni_threshold: f64,
    expected: Option<usize>,
    records: Vec<CorrectedRecord>,
    exclusions: Vec<Exclusion>,
}

impl CorrectedBatch {
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn bonferroni_threshold(&self) -> f64 {
        self.bonferroni_threshold
    }

    pub fn expected(&self) -> Option<usize> {
        self.expected
    }

    pub fn records(&self) -> &[CorrectedRecord] {
        &self.records
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_short(&self) -> bool {
        self.expected.is_some_and(|e| e != self.records.len())
    }

    pub fn bonferroni_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.correction.bonferroni_significant)
            .count()
    }

    pub fn fdr_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.correction.fdr_significant)
            .count()
    }

    pub fn label_summary(&self) -> Vec<LabelSummary> {
        let mut groups: BTreeMap<&str, Vec<&DatasetRecord>> = BTreeMap::new();
        for r in &self.records {
            groups
                .entry(r.record.labels.cell_type.as_str())
                .or_default()
                .push(&r.record);
        }
        groups
            .into_iter()
            .map(|(cell_type, records)| {
                let count = records.len();
                let mean_enrichment =
                    records.iter().map(|r| r.result.enrichment).sum::<f64>() / count as f64;
                let min_p = records
                    .iter()
                    .filter_map(|r| r.result.p_value)
                    .min_by(f64::total_cmp);
                LabelSummary {
                    cell_type: cell_type.to_string(),
                    count,
                    mean_enrichment,
                    min_p,
                }
            })
            .collect()
    }
}

pub fn bonferroni_threshold(alpha: f64, n: usize) -> f64 {
    alpha / n as f64
}

pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let mut adjusted = vec![1.0; n];
    // walk from the largest rank down so adjusted values stay monotone
    let mut running = 1.0_f64;
    for (pos, &idx) in order.iter().enumerate().rev() {
        let rank = (pos + 1) as f64;
        running = running.min(p_values[idx] * n as f64 / rank);
        adjusted[idx] = running.min(1.0);
    }
    adjusted
}

pub fn correct(batch: ResultBatch, alpha: f64) -> Result<CorrectedBatch> {
    check_range_f64(alpha, 0.0, 1.0, true, "alpha")?;
    let ResultBatch {
        expected,
        records,
        exclusions,
        ..
    } = batch;

    if records.is_empty() {
        return Err(EnrichError::EmptyBatch(format!(
            "no dataset completed ({} excluded)",
            exclusions.len()
        )));
    }
    if let Some(bad) = records.iter().find(|r| {
        r.result
            .p_value
            .is_some_and(|p| !p.is_finite() || !(0.0..=1.0).contains(&p))
    }) {
        return Err(EnrichError::InvalidArgument(format!(
            "dataset {} carries an invalid p-value {:?}",
            bad.dataset_id, bad.result.p_value
        )));
    }

    let n = records.len();
    if let Some(expected) = expected
        && expected != n
    {
        warn!(
            "Expected {expected} datasets but only {n} completed; correcting over {n} tests"
        );
    }
    for exclusion in &exclusions {
        warn!(
            "Not counted in correction: {} ({})",
            exclusion.dataset_id, exclusion.reason
        );
    }

    let threshold = bonferroni_threshold(alpha, n);
    let p_values: Vec<f64> = records
        .iter()
        .map(|r| r.result.p_value.unwrap_or(1.0))
        .collect();
    let adjusted = benjamini_hochberg(&p_values);

    let records: Vec<CorrectedRecord> = records
        .into_iter()
        .zip(p_values.iter().zip(&adjusted))
        .map(|(record, (&p, &adj))| CorrectedRecord {
            record,
            correction: Correction {
                bonferroni_significant: p < threshold,
                bh_adjusted_p: adj,
                fdr_significant: adj < alpha,
            },
        })
        .collect();

    let corrected = CorrectedBatch {
        alpha,
        bonferroni_threshold: threshold,
        expected,
        records,
        exclusions,
    };
    info!("Bonferroni threshold: {threshold:.2e}");
    info!(
        "Bonferroni significant: {}/{n}",
        corrected.bonferroni_count()
    );
    info!("FDR significant: {}/{n}", corrected.fdr_count());
    Ok(corrected)
}
