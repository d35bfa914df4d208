use std::io::Write;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::correction::CorrectedBatch;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn log_line<W: Write>(log: &mut W, message: &str, print: bool) -> Result<()> {
    if print {
        info!("{message}");
    }
    writeln!(log, "{message}")?;
    Ok(())
}

pub fn warn_line<W: Write>(log: &mut W, message: &str) -> Result<()> {
    warn!("{message}");
    writeln!(log, "{message}")?;
    Ok(())
}

pub fn log_batch<W: Write>(log: &mut W, batch: &CorrectedBatch) -> Result<()> {
    let n = batch.len();
    log_line(
        log,
        &format!(
            "{n}/{} datasets analysed; Bonferroni threshold {:.2e}",
            batch.expected().unwrap_or(n),
            batch.bonferroni_threshold()
        ),
        true,
    )?;
    for exclusion in batch.exclusions() {
        warn_line(
            log,
            &format!("Excluded {}: {}", exclusion.dataset_id, exclusion.reason),
        )?;
    }
    if batch.is_short() {
        warn_line(
            log,
            &format!(
                "WARNING: expected {} datasets, corrected over {n}",
                batch.expected().unwrap_or_default()
            ),
        )?;
    }
    log_line(
        log,
        &format!(
            "Bonferroni significant: {}/{n}; FDR significant: {}/{n}",
            batch.bonferroni_count(),
            batch.fdr_count()
        ),
        true,
    )?;
    for summary in batch.label_summary() {
        let min_p = summary
            .min_p
            .map(|p| format!("{p:.2e}"))
            .unwrap_or_else(|| "NA".to_string());
        log_line(
            log,
            &format!(
                "{}: n={} mean enrichment {:.3} min p {min_p}",
                summary.cell_type, summary.count, summary.mean_enrichment
            ),
            true,
        )?;
    }
    Ok(())
}
