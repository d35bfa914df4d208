use std::collections::{HashMap, HashSet};

use crate::error::{EnrichError, Result};

pub const CHR_COLUMN: &str = "CHR";
pub const BP_COLUMN: &str = "BP";
pub const SNP_COLUMN: &str = "SNP";
pub const CM_COLUMN: &str = "CM";

pub const COORDINATE_COLUMNS: [&str; 4] = [CHR_COLUMN, BP_COLUMN, SNP_COLUMN, CM_COLUMN];

pub const AUTOSOMES: std::ops::RangeInclusive<u8> = 1..=22;

pub fn is_coordinate_column(name: &str) -> bool {
    COORDINATE_COLUMNS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(name.trim()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    pub chr: u8,
    pub bp: u64,
    pub snp: String,
}

impl VariantKey {
    pub fn new(chr: u8, bp: u64, snp: impl Into<String>) -> Self {
        Self {
            chr,
            bp,
            snp: snp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationTable {
    chromosome: u8,
    keys: Vec<VariantKey>,
    cm: Option<Vec<f64>>,
    categories: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl AnnotationTable {
    pub fn new(
        chromosome: u8,
        keys: Vec<VariantKey>,
        cm: Option<Vec<f64>>,
        categories: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if !AUTOSOMES.contains(&chromosome) {
            return Err(EnrichError::InvalidArgument(format!(
                "chromosome {chromosome} is not an autosome (1-22)"
            )));
        }
        if let Some(key) = keys.iter().find(|k| k.chr != chromosome) {
            return Err(EnrichError::AnnotationMismatch(format!(
                "variant {} at {}:{} does not belong to chromosome {chromosome}",
                key.snp, key.chr, key.bp
            )));
        }
        let mut seen = HashSet::with_capacity(keys.len());
        if let Some(key) = keys.iter().find(|k| !seen.insert(*k)) {
            return Err(EnrichError::InvalidArgument(format!(
                "duplicate variant {} at {}:{}",
                key.snp, key.chr, key.bp
            )));
        }
        if let Some(cm) = &cm
            && cm.len() != keys.len()
        {
            return Err(EnrichError::InvalidArgument(format!(
                "CM column has {} values for {} variants",
                cm.len(),
                keys.len()
            )));
        }
        if categories.len() != columns.len() {
            return Err(EnrichError::InvalidArgument(format!(
                "{} category names for {} value columns",
                categories.len(),
                columns.len()
            )));
        }
        let mut names = HashSet::with_capacity(categories.len());
        for (name, column) in categories.iter().zip(&columns) {
            if is_coordinate_column(name) {
                return Err(EnrichError::InvalidArgument(format!(
                    "{name} is a coordinate column, not a category"
                )));
            }
            if !names.insert(name.as_str()) {
                return Err(EnrichError::InvalidArgument(format!(
                    "duplicate category {name}"
                )));
            }
            if column.len() != keys.len() {
                return Err(EnrichError::InvalidArgument(format!(
                    "category {name} has {} values for {} variants",
                    column.len(),
                    keys.len()
                )));
            }
        }
        Ok(Self {
            chromosome,
            keys,
            cm,
            categories,
            columns,
        })
    }

    pub fn chromosome(&self) -> u8 {
        self.chromosome
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[VariantKey] {
        &self.keys
    }

    pub fn cm(&self) -> Option<&[f64]> {
        self.cm.as_deref()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn n_categories(&self) -> usize {
        self.categories.len()
    }

    pub fn category_index(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.category_index(name).map(|idx| self.columns[idx].as_slice())
    }

    pub fn column_at(&self, idx: usize) -> Option<&[f64]> {
        self.columns.get(idx).map(Vec::as_slice)
    }

    pub fn coordinate_width(&self) -> usize {
        if self.cm.is_some() { 4 } else { 3 }
    }

    pub fn header(&self) -> Vec<String> {
        let mut out: Vec<String> = COORDINATE_COLUMNS[..self.coordinate_width()]
            .iter()
            .map(|s| s.to_string())
            .collect();
        out.extend(self.categories.iter().cloned());
        out
    }

    pub fn row(&self, idx: usize) -> Option<Vec<f64>> {
        if idx >= self.keys.len() {
            return None;
        }
        Some(self.columns.iter().map(|col| col[idx]).collect())
    }

    pub fn row_index(&self) -> HashMap<&VariantKey, usize> {
        self.keys.iter().enumerate().map(|(i, k)| (k, i)).collect()
    }

    pub(crate) fn drop_categories(&mut self, names: &HashSet<String>) {
        let mut kept_names = Vec::with_capacity(self.categories.len());
        let mut kept_columns = Vec::with_capacity(self.columns.len());
        for (name, column) in self.categories.drain(..).zip(self.columns.drain(..)) {
            if !names.contains(&name) {
                kept_names.push(name);
                kept_columns.push(column);
            }
        }
        self.categories = kept_names;
        self.columns = kept_columns;
    }

    pub(crate) fn push_category(&mut self, name: String, column: Vec<f64>) -> Result<()> {
        if column.len() != self.keys.len() {
            return Err(EnrichError::InvalidArgument(format!(
                "category {name} has {} values for {} variants",
                column.len(),
                self.keys.len()
            )));
        }
        if self.category_index(&name).is_some() {
            return Err(EnrichError::InvalidArgument(format!(
                "duplicate category {name}"
            )));
        }
        self.categories.push(name);
        self.columns.push(column);
        Ok(())
    }
}
