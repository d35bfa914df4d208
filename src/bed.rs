use std::io::BufRead;

use tracing::debug;

use crate::annotation::{AUTOSOMES, AnnotationTable};
use crate::error::{EnrichError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub chr: u8,
    pub start: u64,
    pub end: u64,
}

pub fn parse_bed<R: BufRead>(reader: R) -> Result<Vec<Interval>> {
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let (Some(chrom), Some(start), Some(end)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(EnrichError::Parse(format!(
                "BED line {} has fewer than 3 fields",
                line_no + 1
            )));
        };
        let Some(chr) = parse_autosome(chrom) else {
            skipped += 1;
            continue;
        };
        let start = parse_position(start, line_no)?;
        let end = parse_position(end, line_no)?;
        if end < start {
            return Err(EnrichError::Parse(format!(
                "BED line {}: end {end} precedes start {start}",
                line_no + 1
            )));
        }
        out.push(Interval { chr, start, end });
    }
    if skipped > 0 {
        debug!("Skipped {skipped} intervals on non-autosomal contigs");
    }
    Ok(out)
}

fn parse_autosome(chrom: &str) -> Option<u8> {
    let stripped = chrom
        .strip_prefix("chr")
        .or_else(|| chrom.strip_prefix("Chr"))
        .unwrap_or(chrom);
    stripped
        .parse::<u8>()
        .ok()
        .filter(|chr| AUTOSOMES.contains(chr))
}

fn parse_position(token: &str, line_no: usize) -> Result<u64> {
    token.parse::<u64>().map_err(|_| {
        EnrichError::Parse(format!(
            "BED line {}: invalid coordinate {token}",
            line_no + 1
        ))
    })
}

pub fn annotate_intervals(
    reference: &AnnotationTable,
    intervals: &[Interval],
    name: &str,
) -> Result<AnnotationTable> {
    let chr = reference.chromosome();
    let merged = merge_intervals(intervals.iter().filter(|iv| iv.chr == chr).copied());
    let column: Vec<f64> = reference
        .keys()
        .iter()
        .map(|key| {
            let idx = merged.partition_point(|iv| iv.start <= key.bp);
            if idx > 0 && merged[idx - 1].end >= key.bp {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    let hits = column.iter().filter(|v| **v > 0.0).count();
    debug!("Chr{chr}: {hits} variants fall inside {} intervals", merged.len());
    AnnotationTable::new(
        chr,
        reference.keys().to_vec(),
        reference.cm().map(<[f64]>::to_vec),
        vec![name.to_string()],
        vec![column],
    )
}

fn merge_intervals(intervals: impl Iterator<Item = Interval>) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = intervals.collect();
    sorted.sort();
    let mut out: Vec<Interval> = Vec::with_capacity(sorted.len());
    for iv in sorted {
        match out.last_mut() {
            Some(last) if iv.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(iv.end);
            }
            _ => out.push(iv),
        }
    }
    out
}
