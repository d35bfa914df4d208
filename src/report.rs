use std::collections::HashMap;

use tracing::{debug, warn};

use crate::types::CategoryResult;

const CATEGORIES_LABEL: &str = "Categories:";
const TOTAL_H2_LABELS: [&str; 2] = ["Total Observed scale h2:", "Total Liability scale h2:"];
const INTERCEPT_LABEL: &str = "Intercept:";
const LAMBDA_GC_LABEL: &str = "Lambda GC:";
const MEAN_CHI2_LABEL: &str = "Mean Chi^2:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    PropSnps,
    PropH2,
    PropH2Se,
    Enrichment,
    EnrichmentSe,
    EnrichmentP,
    Coefficient,
    CoefficientSe,
}

const FIELDS: [Field; 8] = [
    Field::PropSnps,
    Field::PropH2,
    Field::PropH2Se,
    Field::Enrichment,
    Field::EnrichmentSe,
    Field::EnrichmentP,
    Field::Coefficient,
    Field::CoefficientSe,
];

impl Field {
    fn labels(self) -> &'static [&'static str] {
        match self {
            Field::PropSnps => &["Proportion of SNPs:", "Prop._SNPs:"],
            Field::PropH2 => &["Proportion of h2g:", "Proportion of h2:", "Prop._h2:"],
            Field::PropH2Se => &["Proportion of h2g SE:", "Prop._h2_std_error:"],
            Field::Enrichment => &["Enrichment:"],
            Field::EnrichmentSe => &["Enrichment SE:", "Enrichment_std_error:"],
            Field::EnrichmentP => &["Enrichment p:", "Enrichment_p:"],
            Field::Coefficient => &["Coefficients:", "Coefficient:"],
            Field::CoefficientSe => &["Coefficient SE:", "Coefficient_std_error:"],
        }
    }

    fn column(self) -> &'static str {
        match self {
            Field::PropSnps => "Prop._SNPs",
            Field::PropH2 => "Prop._h2",
            Field::PropH2Se => "Prop._h2_std_error",
            Field::Enrichment => "Enrichment",
            Field::EnrichmentSe => "Enrichment_std_error",
            Field::EnrichmentP => "Enrichment_p",
            Field::Coefficient => "Coefficient",
            Field::CoefficientSe => "Coefficient_std_error",
        }
    }

    fn slot(self, category: &mut CategoryResult) -> &mut Option<f64> {
        match self {
            Field::PropSnps => &mut category.prop_snps,
            Field::PropH2 => &mut category.prop_h2,
            Field::PropH2Se => &mut category.prop_h2_se,
            Field::Enrichment => &mut category.enrichment,
            Field::EnrichmentSe => &mut category.enrichment_se,
            Field::EnrichmentP => &mut category.enrichment_p,
            Field::Coefficient => &mut category.coefficient,
            Field::CoefficientSe => &mut category.coefficient_se,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegressionReport {
    pub total_h2: Option<f64>,
    pub total_h2_se: Option<f64>,
    pub intercept: Option<f64>,
    pub intercept_se: Option<f64>,
    pub lambda_gc: Option<f64>,
    pub mean_chi2: Option<f64>,
    categories: Vec<CategoryResult>,
    index: HashMap<String, usize>,
}

impl RegressionReport {
    pub fn is_complete(&self) -> bool {
        self.total_h2.is_some()
    }

    pub fn categories(&self) -> &[CategoryResult] {
        &self.categories
    }

    pub fn category_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn category(&self, name: &str) -> Option<&CategoryResult> {
        self.category_index(name).map(|idx| &self.categories[idx])
    }

    pub fn last_category(&self) -> Option<&CategoryResult> {
        self.categories.last()
    }
}

#[derive(Debug, Default)]
struct ResultsTable {
    columns: HashMap<String, usize>,
    width: usize,
    rows: Vec<Vec<String>>,
}

impl ResultsTable {
    fn value(&self, row: &[String], field: Field) -> Option<f64> {
        let idx = *self.columns.get(field.column())?;
        row.get(idx).and_then(|tok| parse_number(tok))
    }
}

pub fn parse(report_text: &str) -> RegressionReport {
    let mut report = RegressionReport::default();
    let mut names: Option<Vec<String>> = None;
    let mut vectors: HashMap<Field, Vec<Option<f64>>> = HashMap::new();
    let mut table: Option<ResultsTable> = None;
    let mut in_table = false;

    for line in report_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            in_table = false;
            continue;
        }

        if is_table_header(trimmed) {
            let columns: HashMap<String, usize> = trimmed
                .split_whitespace()
                .enumerate()
                .map(|(i, name)| (name.to_string(), i))
                .collect();
            table = Some(ResultsTable {
                width: trimmed.split_whitespace().count(),
                columns,
                rows: Vec::new(),
            });
            in_table = true;
            continue;
        }
        if in_table && let Some(tbl) = table.as_mut() {
            let row: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
            if is_labeled(trimmed) || row.len() != tbl.width {
                in_table = false;
            } else {
                if row[0] != "Total" {
                    tbl.rows.push(row);
                }
                continue;
            }
        }

        if let Some(rest) = label_value(trimmed, CATEGORIES_LABEL) {
            names = Some(rest.split_whitespace().map(str::to_string).collect());
            continue;
        }
        if let Some(rest) = TOTAL_H2_LABELS
            .iter()
            .find_map(|label| label_value(trimmed, label))
        {
            let (value, se) = value_with_se(rest);
            report.total_h2 = value;
            report.total_h2_se = se;
            continue;
        }
        if let Some(rest) = label_value(trimmed, INTERCEPT_LABEL) {
            let (value, se) = value_with_se(rest);
            report.intercept = value;
            report.intercept_se = se;
            continue;
        }
        if let Some(rest) = label_value(trimmed, LAMBDA_GC_LABEL) {
            report.lambda_gc = rest.split_whitespace().next().and_then(parse_number);
            continue;
        }
        if let Some(rest) = label_value(trimmed, MEAN_CHI2_LABEL) {
            report.mean_chi2 = rest.split_whitespace().next().and_then(parse_number);
            continue;
        }
        for field in FIELDS {
            if let Some(rest) = field
                .labels()
                .iter()
                .find_map(|label| label_value(trimmed, label))
            {
                vectors.insert(field, numeric_tokens(rest));
                break;
            }
        }
    }

    report.categories = assemble_categories(names, &vectors, table.as_ref());
    for (idx, category) in report.categories.iter().enumerate() {
        report.index.entry(category.name.clone()).or_insert(idx);
    }

    if !report.is_complete() {
        warn!("No total heritability line found in report - analysis may be incomplete");
        for category in &mut report.categories {
            category.clear_estimates();
        }
        report.intercept = None;
        report.intercept_se = None;
        report.lambda_gc = None;
        report.mean_chi2 = None;
    }
    report
}

fn assemble_categories(
    names: Option<Vec<String>>,
    vectors: &HashMap<Field, Vec<Option<f64>>>,
    table: Option<&ResultsTable>,
) -> Vec<CategoryResult> {
    let names = match (names, table) {
        (Some(names), _) => names,
        (None, Some(tbl)) if !tbl.rows.is_empty() => tbl
            .rows
            .iter()
            .filter_map(|row| row.first().cloned())
            .collect(),
        _ => {
            let n = vectors.values().map(Vec::len).max().unwrap_or(0);
            (1..=n).map(|i| format!("category_{i}")).collect()
        }
    };

    for (field, values) in vectors {
        if values.len() != names.len() {
            warn!(
                "{} carries {} values for {} categories",
                field.labels()[0],
                values.len(),
                names.len()
            );
        }
    }

    let table_rows: HashMap<&str, &Vec<String>> = table
        .map(|tbl| {
            tbl.rows
                .iter()
                .filter_map(|row| row.first().map(|name| (name.as_str(), row)))
                .collect()
        })
        .unwrap_or_default();

    names
        .into_iter()
        .enumerate()
        .map(|(pos, name)| {
            let mut category = CategoryResult::named(name);
            let row = table_rows.get(category.name.as_str()).copied();
            for field in FIELDS {
                let labeled = vectors
                    .get(&field)
                    .and_then(|values| values.get(pos).copied().flatten());
                let tabulated = match (table, row) {
                    (Some(tbl), Some(row)) => tbl.value(row, field),
                    _ => None,
                };
                *field.slot(&mut category) = labeled.or(tabulated);
            }
            category
        })
        .collect()
}

fn is_labeled(line: &str) -> bool {
    [CATEGORIES_LABEL, INTERCEPT_LABEL, LAMBDA_GC_LABEL, MEAN_CHI2_LABEL]
        .iter()
        .chain(TOTAL_H2_LABELS.iter())
        .chain(FIELDS.iter().flat_map(|field| field.labels().iter()))
        .any(|label| label_value(line, label).is_some())
}

fn is_table_header(line: &str) -> bool {
    let mut has_category = false;
    let mut has_prop = false;
    let mut has_enrichment = false;
    for token in line.split_whitespace() {
        match token {
            "Category" => has_category = true,
            "Prop._SNPs" => has_prop = true,
            "Enrichment" => has_enrichment = true,
            _ => {}
        }
    }
    has_category && has_prop && has_enrichment
}

fn label_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let pos = line.find(label)?;
    let prefix = line[..pos].trim_end();
    if prefix.is_empty() || prefix.ends_with('-') {
        Some(line[pos + label.len()..].trim())
    } else {
        None
    }
}

// Unparseable tokens keep their position as `None`.
fn numeric_tokens(rest: &str) -> Vec<Option<f64>> {
    rest.split_whitespace()
        .filter_map(|raw| {
            let token = strip_punctuation(raw);
            if token.is_empty() {
                return None;
            }
            let value = parse_number(token);
            if value.is_none() {
                debug!("Skipping malformed numeric token {raw:?}");
            }
            Some(value)
        })
        .collect()
}

fn value_with_se(rest: &str) -> (Option<f64>, Option<f64>) {
    let (head, tail) = match rest.split_once('(') {
        Some((head, tail)) => (head, Some(tail)),
        None => (rest, None),
    };
    let value = head.split_whitespace().next().and_then(parse_number);
    let se = tail
        .and_then(|t| t.split(')').next())
        .and_then(|t| parse_number(t.trim()));
    (value, se)
}

fn strip_punctuation(token: &str) -> &str {
    token.trim_matches(|c| matches!(c, '[' | ']' | '(' | ')' | ','))
}

fn parse_number(token: &str) -> Option<f64> {
    strip_punctuation(token)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
