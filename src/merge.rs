use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::annotation::AnnotationTable;
use crate::error::{EnrichError, Result};
use crate::parallel::{resolve_threads, run_in_pool};

pub const DEFAULT_CONFLICT_KEYWORDS: [&str; 5] = ["brain", "neuro", "h3k27ac", "h3k4me1", "dnase"];

// Header positions (coordinate columns included) of the brain-related baselineLD v2.2 columns.
pub const DEFAULT_FALLBACK_INDICES: [usize; 14] =
    [15, 16, 17, 18, 19, 20, 25, 26, 27, 28, 45, 46, 47, 48];

#[derive(Debug, Clone)]
pub struct MergeSpec {
    pub new_category: Option<String>,
    pub conflict_keywords: Vec<String>,
    pub fallback_indices: Vec<usize>,
    pub min_categories: usize,
}

impl Default for MergeSpec {
    fn default() -> Self {
        Self {
            new_category: None,
            conflict_keywords: DEFAULT_CONFLICT_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback_indices: DEFAULT_FALLBACK_INDICES.to_vec(),
            min_categories: 2,
        }
    }
}

impl MergeSpec {
    pub fn for_category(name: impl Into<String>) -> Self {
        Self {
            new_category: Some(name.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    Keyword,
    Positional,
    None,
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub table: AnnotationTable,
    pub resolution: ConflictResolution,
    pub removed: Vec<String>,
    pub added: Vec<String>,
    pub matched_rows: usize,
    pub unmatched_addition_rows: usize,
}

pub fn merge(
    background: AnnotationTable,
    addition: AnnotationTable,
    spec: &MergeSpec,
) -> Result<AnnotationTable> {
    merge_with_report(background, addition, spec).map(|report| report.table)
}

pub fn conflict_columns(
    table: &AnnotationTable,
    spec: &MergeSpec,
) -> (ConflictResolution, Vec<String>) {
    let keywords: Vec<String> = spec
        .conflict_keywords
        .iter()
        .map(|k| k.trim().to_ascii_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    let by_name: Vec<String> = table
        .categories()
        .iter()
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .cloned()
        .collect();
    if !by_name.is_empty() {
        return (ConflictResolution::Keyword, by_name);
    }

    let width = table.coordinate_width();
    let mut by_position = Vec::new();
    for &idx in &spec.fallback_indices {
        if idx < width {
            continue;
        }
        if let Some(name) = table.categories().get(idx - width)
            && !by_position.contains(name)
        {
            by_position.push(name.clone());
        }
    }
    if by_position.is_empty() {
        (ConflictResolution::None, by_position)
    } else {
        (ConflictResolution::Positional, by_position)
    }
}

pub fn merge_with_report(
    background: AnnotationTable,
    addition: AnnotationTable,
    spec: &MergeSpec,
) -> Result<MergeReport> {
    let chr = background.chromosome();
    if chr != addition.chromosome() {
        return Err(EnrichError::AnnotationMismatch(format!(
            "background is chromosome {chr} but addition is chromosome {}",
            addition.chromosome()
        )));
    }
    if addition.n_categories() == 0 {
        return Err(EnrichError::InvalidArgument(format!(
            "Chr{chr}: addition table carries no categories"
        )));
    }

    let added: Vec<String> = match &spec.new_category {
        Some(name) if addition.n_categories() == 1 => vec![name.clone()],
        Some(name) => {
            return Err(EnrichError::InvalidArgument(format!(
                "cannot name {} added categories {name}",
                addition.n_categories()
            )));
        }
        None => addition.categories().to_vec(),
    };

    let (resolution, mut removed) = conflict_columns(&background, spec);
    match resolution {
        ConflictResolution::Keyword => info!(
            "Chr{chr}: removing {} conflicting categories matched by name: {}",
            removed.len(),
            preview(&removed)
        ),
        ConflictResolution::Positional => info!(
            "Chr{chr}: no category matched a conflict keyword; removing {} categories by position: {}",
            removed.len(),
            preview(&removed)
        ),
        ConflictResolution::None => {
            warn!("Chr{chr}: no conflicting categories found by name or position")
        }
    }
    for name in &added {
        if background.category_index(name).is_some() && !removed.contains(name) {
            warn!("Chr{chr}: background category {name} is replaced by the added category");
            removed.push(name.clone());
        }
    }

    let mut table = background;
    table.drop_categories(&removed.iter().cloned().collect::<HashSet<_>>());

    let index = addition.row_index();
    let lookup: Vec<Option<usize>> = table.keys().iter().map(|k| index.get(k).copied()).collect();
    let matched_rows = lookup.iter().filter(|v| v.is_some()).count();
    let unmatched_addition_rows = addition.len() - matched_rows;
    if unmatched_addition_rows > 0 {
        debug!(
            "Chr{chr}: {unmatched_addition_rows} addition variants are absent from the background and were dropped"
        );
    }

    for (col_idx, name) in added.iter().enumerate() {
        let source = addition.column_at(col_idx).ok_or_else(|| {
            EnrichError::MissingColumn(format!("addition category {col_idx}"))
        })?;
        let column = lookup
            .iter()
            .map(|row| match row {
                Some(i) if source[*i].is_finite() => source[*i],
                _ => 0.0,
            })
            .collect();
        table.push_category(name.clone(), column)?;
    }

    if table.n_categories() < spec.min_categories {
        return Err(EnrichError::MergeIncomplete {
            what: "categories",
            found: table.n_categories(),
            minimum: spec.min_categories,
        });
    }

    info!(
        "Chr{chr}: {} variants with {} categories ({matched_rows} matched the addition)",
        table.len(),
        table.n_categories()
    );

    Ok(MergeReport {
        table,
        resolution,
        removed,
        added,
        matched_rows,
        unmatched_addition_rows,
    })
}

fn preview(names: &[String]) -> String {
    if names.len() > 5 {
        format!("{}, ...", names[..5].join(", "))
    } else {
        names.join(", ")
    }
}

#[derive(Debug, Clone)]
pub struct GenomeMergeConfig {
    pub spec: MergeSpec,
    pub min_chromosomes: usize,
    pub cores: Option<usize>,
}

impl Default for GenomeMergeConfig {
    fn default() -> Self {
        Self {
            spec: MergeSpec::default(),
            min_chromosomes: 15,
            cores: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeFailure {
    pub chromosome: u8,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct GenomeMerge {
    pub reports: Vec<MergeReport>,
    pub failures: Vec<ChromosomeFailure>,
}

pub fn merge_genome(
    pairs: Vec<(AnnotationTable, AnnotationTable)>,
    config: &GenomeMergeConfig,
) -> Result<GenomeMerge> {
    let cores = resolve_threads(config.cores, pairs.len());
    let spec = &config.spec;
    let outcomes: Vec<(u8, Result<MergeReport>)> = run_in_pool(cores, || {
        pairs
            .into_par_iter()
            .map(|(background, addition)| {
                let chr = background.chromosome();
                (chr, merge_with_report(background, addition, spec))
            })
            .collect()
    })?;

    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for (chromosome, outcome) in outcomes {
        match outcome {
            Ok(report) => reports.push(report),
            Err(err) => {
                warn!("Chr{chromosome}: merge failed: {err}");
                failures.push(ChromosomeFailure {
                    chromosome,
                    reason: err.to_string(),
                });
            }
        }
    }
    reports.sort_by_key(|r| r.table.chromosome());
    failures.sort_by_key(|f| f.chromosome);

    info!(
        "Merged annotations for {}/{} chromosomes",
        reports.len(),
        reports.len() + failures.len()
    );
    if reports.len() < config.min_chromosomes {
        return Err(EnrichError::MergeIncomplete {
            what: "chromosomes",
            found: reports.len(),
            minimum: config.min_chromosomes,
        });
    }
    Ok(GenomeMerge { reports, failures })
}
