use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::{debug, info};

use crate::error::{EnrichError, Result};
use crate::report::RegressionReport;
use crate::types::{CategoryResult, DatasetResult};

pub const DEFAULT_SUBCATEGORY_KEYWORDS: [&str; 4] = ["enhancer", "h3k4me1", "h3k27ac", "dnase"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySelector {
    Last,
    Named(String),
    Names(Vec<String>),
    Keywords(Vec<String>),
}

impl CategorySelector {
    pub fn select<'a>(&self, report: &'a RegressionReport) -> Vec<&'a CategoryResult> {
        match self {
            CategorySelector::Last => report.last_category().into_iter().collect(),
            CategorySelector::Named(name) => report.category(name).into_iter().collect(),
            CategorySelector::Names(names) => names
                .iter()
                .filter_map(|name| report.category(name))
                .collect(),
            CategorySelector::Keywords(keywords) => {
                let keywords: Vec<String> =
                    keywords.iter().map(|k| k.to_ascii_lowercase()).collect();
                report
                    .categories()
                    .iter()
                    .filter(|c| {
                        let lower = c.name.to_ascii_lowercase();
                        keywords.iter().any(|k| !k.is_empty() && lower.contains(k.as_str()))
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombineStrategy {
    Direct(CategorySelector),
    WeightedAverage(CategorySelector),
}

impl Default for CombineStrategy {
    fn default() -> Self {
        CombineStrategy::Direct(CategorySelector::Last)
    }
}

impl CombineStrategy {
    pub fn weighted_subcategories() -> Self {
        CombineStrategy::WeightedAverage(CategorySelector::Keywords(
            DEFAULT_SUBCATEGORY_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ))
    }
}

pub fn combine(categories: &[CategoryResult]) -> Result<DatasetResult> {
    let mut usable: Vec<&CategoryResult> = categories
        .iter()
        .filter(|c| {
            matches!((c.enrichment, c.enrichment_se),
                (Some(e), Some(se)) if e.is_finite() && se.is_finite() && se > 0.0)
        })
        .collect();
    if usable.is_empty() {
        return Err(EnrichError::InsufficientCategories(format!(
            "none of {} categories has an enrichment with a positive standard error",
            categories.len()
        )));
    }
    let skipped = categories.len() - usable.len();
    if skipped > 0 {
        debug!("Excluded {skipped} categories without a usable standard error");
    }
    usable.sort_by(|a, b| {
        a.enrichment
            .unwrap_or_default()
            .total_cmp(&b.enrichment.unwrap_or_default())
            .then(
                a.enrichment_se
                    .unwrap_or_default()
                    .total_cmp(&b.enrichment_se.unwrap_or_default()),
            )
            .then_with(|| a.name.cmp(&b.name))
    });

    let estimates: Vec<(f64, f64)> = usable
        .iter()
        .map(|c| (c.enrichment.unwrap_or_default(), c.enrichment_se.unwrap_or_default()))
        .collect();
    let (enrichment, enrichment_se) = inverse_variance(&estimates);

    // Fisher draws on every category with an estimate, including those left out of the weights
    let p_values: Vec<f64> = categories
        .iter()
        .filter(|c| c.enrichment.is_some() && c.enrichment_se.is_some())
        .filter_map(CategoryResult::p_value)
        .collect();
    let p_value = fisher_combined_p(&p_values);

    let (coefficient, coefficient_se) = match usable.as_slice() {
        [single] => (single.coefficient, single.coefficient_se),
        _ => (None, None),
    };

    Ok(DatasetResult {
        enrichment,
        enrichment_se,
        p_value,
        total_h2: None,
        total_h2_se: None,
        coefficient,
        coefficient_se,
        categories_used: usable.len(),
    })
}

pub fn inverse_variance(estimates: &[(f64, f64)]) -> (f64, f64) {
    let mut total_weight = 0.0;
    let mut weighted = 0.0;
    for &(value, se) in estimates {
        let weight = 1.0 / (se * se);
        weighted += weight * value;
        total_weight += weight;
    }
    (weighted / total_weight, (1.0 / total_weight).sqrt())
}

pub fn fisher_combined_p(p_values: &[f64]) -> Option<f64> {
    let mut valid: Vec<f64> = p_values
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .map(|p| p.min(1.0))
        .collect();
    match valid.as_slice() {
        [] => return None,
        [single] => return Some(*single),
        _ => {}
    }
    valid.sort_by(f64::total_cmp);
    let statistic = -2.0 * valid.iter().map(|p| p.ln()).sum::<f64>();
    let dist = ChiSquared::new(2.0 * valid.len() as f64).ok()?;
    Some(dist.sf(statistic))
}

pub fn combine_report(
    report: &RegressionReport,
    strategy: &CombineStrategy,
) -> Result<DatasetResult> {
    let (selector, weighted) = match strategy {
        CombineStrategy::Direct(selector) => (selector, false),
        CombineStrategy::WeightedAverage(selector) => (selector, true),
    };
    let selected: Vec<CategoryResult> = selector.select(report).into_iter().cloned().collect();
    if selected.is_empty() {
        return Err(EnrichError::InsufficientCategories(format!(
            "no category matched {selector:?}"
        )));
    }
    if !weighted && selected.len() > 1 {
        return Err(EnrichError::InvalidArgument(format!(
            "direct strategy needs exactly one category, {selector:?} matched {}",
            selected.len()
        )));
    }

    let mut result = combine(&selected)?;
    result.total_h2 = report.total_h2;
    result.total_h2_se = report.total_h2_se;
    if weighted {
        info!(
            "Combined {} of {} selected categories: enrichment {:.3} ± {:.3}",
            result.categories_used,
            selected.len(),
            result.enrichment,
            result.enrichment_se
        );
    }
    Ok(result)
}
