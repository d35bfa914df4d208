use statrs::distribution::{ContinuousCDF, Normal};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryResult {
    pub name: String,
    pub prop_snps: Option<f64>,
    pub prop_h2: Option<f64>,
    pub prop_h2_se: Option<f64>,
    pub enrichment: Option<f64>,
    pub enrichment_se: Option<f64>,
    pub enrichment_p: Option<f64>,
    pub coefficient: Option<f64>,
    pub coefficient_se: Option<f64>,
}

impl CategoryResult {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        if let Some(p) = self.enrichment_p.filter(|p| p.is_finite()) {
            return Some(p);
        }
        let (e, se) = (self.enrichment?, self.enrichment_se?);
        if se.is_nan() || se <= 0.0 {
            return None;
        }
        let z = (e - 1.0) / se;
        let normal = Normal::new(0.0, 1.0).ok()?;
        Some(2.0 * normal.sf(z.abs()))
    }

    pub(crate) fn clear_estimates(&mut self) {
        *self = Self::named(std::mem::take(&mut self.name));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetResult {
    pub enrichment: f64,
    pub enrichment_se: f64,
    pub p_value: Option<f64>,
    pub total_h2: Option<f64>,
    pub total_h2_se: Option<f64>,
    pub coefficient: Option<f64>,
    pub coefficient_se: Option<f64>,
    pub categories_used: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetLabels {
    pub cell_type: String,
    pub processing: String,
}
