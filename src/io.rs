use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use polars::prelude::*;
use tempfile::NamedTempFile;

use crate::annotation::{
    AnnotationTable, BP_COLUMN, CHR_COLUMN, CM_COLUMN, SNP_COLUMN, VariantKey,
    is_coordinate_column,
};
use crate::bed::{Interval, parse_bed};
use crate::error::EnrichError;
use crate::merge::ChromosomeFailure;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader: Box<dyn BufRead> = match extension(path).as_str() {
        "gz" => Box::new(BufReader::new(GzDecoder::new(file))),
        "bz2" => Box::new(BufReader::new(BzDecoder::new(file))),
        _ => Box::new(BufReader::new(file)),
    };
    Ok(reader)
}

pub fn read_table(path: &Path) -> Result<DataFrame> {
    let ext = extension(path);
    if ext == "gz" || ext == "bz2" {
        let tmp = decompress_to_temp(path, &ext)?;
        return read_table_plain(tmp.path(), &format!("{}", path.display()));
    }
    read_table_plain(path, &format!("{}", path.display()))
}

fn read_table_plain(path: &Path, label: &str) -> Result<DataFrame> {
    let delimiter = detect_delimiter(path)?;
    // continuous columns often open with long runs of integer zeros
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_ignore_errors(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter)
                .with_null_values(Some(NullValues::AllColumns(vec![
                    "".into(),
                    "NA".into(),
                    "NaN".into(),
                    ".".into(),
                ])))
                .with_missing_is_null(true),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("read {label}"))
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut first = String::new();
    reader.read_line(&mut first)?;
    if first.contains('\t') {
        return Ok(b'\t');
    }
    if first.contains(',') {
        return Ok(b',');
    }
    Ok(b' ')
}

fn decompress_to_temp(path: &Path, ext: &str) -> Result<NamedTempFile> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut decoder: Box<dyn Read> = match ext {
        "gz" => Box::new(GzDecoder::new(file)),
        "bz2" => Box::new(BzDecoder::new(file)),
        _ => Box::new(file),
    };
    let mut tmp = NamedTempFile::new()?;
    std::io::copy(&mut decoder, &mut tmp)?;
    Ok(tmp)
}

fn column_series(df: &DataFrame, name: &str) -> Result<Series> {
    let column = df
        .column(name)
        .map_err(|_| EnrichError::MissingColumn(name.to_string()))?;
    Ok(column.as_materialized_series().clone())
}

fn required_i64(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let series = column_series(df, name)?.cast(&DataType::Int64)?;
    series
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| anyhow::anyhow!("{name} is missing on data row {}", i + 1)))
        .collect()
}

fn required_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = column_series(df, name)?.cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| anyhow::anyhow!("{name} is missing on data row {}", i + 1)))
        .collect()
}

fn required_str(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = column_series(df, name)?.cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(|s| s.trim().to_string())
                .ok_or_else(|| anyhow::anyhow!("{name} is missing on data row {}", i + 1))
        })
        .collect()
}

pub fn read_annotation(path: &Path, chromosome: Option<u8>) -> Result<AnnotationTable> {
    let df = read_table(path)?;
    let chr = required_i64(&df, CHR_COLUMN)?;
    let bp = required_i64(&df, BP_COLUMN)?;
    let snp = required_str(&df, SNP_COLUMN)?;
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let cm = if names.iter().any(|n| n == CM_COLUMN) {
        Some(required_f64(&df, CM_COLUMN)?)
    } else {
        None
    };

    let mut keys = Vec::with_capacity(df.height());
    for ((c, b), s) in chr.into_iter().zip(bp).zip(snp) {
        let c = u8::try_from(c).with_context(|| format!("invalid chromosome {c} for {s}"))?;
        let b = u64::try_from(b).with_context(|| format!("invalid position {b} for {s}"))?;
        keys.push(VariantKey::new(c, b, s));
    }
    let chromosome = match chromosome.or_else(|| keys.first().map(|k| k.chr)) {
        Some(c) => c,
        None => {
            return Err(anyhow::anyhow!(
                "cannot infer the chromosome of empty annotation {}",
                path.display()
            ));
        }
    };

    let categories: Vec<String> = names
        .into_iter()
        .filter(|n| !is_coordinate_column(n))
        .collect();
    let mut columns = Vec::with_capacity(categories.len());
    for name in &categories {
        columns.push(required_f64(&df, name)?);
    }

    let table = AnnotationTable::new(chromosome, keys, cm, categories, columns)
        .with_context(|| format!("annotation {}", path.display()))?;
    Ok(table)
}

pub fn annotation_path(prefix: &str, chr: u8) -> PathBuf {
    PathBuf::from(format!("{prefix}{chr}.annot.gz"))
}

// Chromosomes whose files are missing or unreadable become failures instead of aborting.
pub fn read_annotation_pairs(
    background_prefix: &str,
    addition_prefix: &str,
    chromosomes: impl IntoIterator<Item = u8>,
) -> (Vec<(AnnotationTable, AnnotationTable)>, Vec<ChromosomeFailure>) {
    let mut pairs = Vec::new();
    let mut failures = Vec::new();
    for chr in chromosomes {
        let background = annotation_path(background_prefix, chr);
        let addition = annotation_path(addition_prefix, chr);
        let loaded = read_annotation(&background, Some(chr))
            .and_then(|bg| Ok((bg, read_annotation(&addition, Some(chr))?)));
        match loaded {
            Ok(pair) => pairs.push(pair),
            Err(err) => {
                tracing::warn!("Chr{chr}: could not load annotations: {err:#}");
                failures.push(ChromosomeFailure {
                    chromosome: chr,
                    reason: format!("{err:#}"),
                });
            }
        }
    }
    (pairs, failures)
}

pub fn write_annotation(table: &AnnotationTable, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    if extension(path) == "gz" {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_annotation_rows(table, &mut encoder)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        write_annotation_rows(table, &mut writer)?;
        writer.flush()?;
    }
    Ok(())
}

pub fn write_annotation_rows<W: Write>(table: &AnnotationTable, out: &mut W) -> Result<()> {
    writeln!(out, "{}", table.header().join("\t"))?;
    let columns: Vec<&[f64]> = (0..table.n_categories())
        .filter_map(|i| table.column_at(i))
        .collect();
    let cm = table.cm();
    for (row, key) in table.keys().iter().enumerate() {
        write!(out, "{}\t{}\t{}", key.chr, key.bp, key.snp)?;
        if let Some(cm) = cm {
            write!(out, "\t{}", format_value(cm[row]))?;
        }
        for column in &columns {
            write!(out, "\t{}", format_value(column[row]))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub fn read_report(path: &Path) -> Result<String> {
    let mut text = String::new();
    open_reader(path)?
        .read_to_string(&mut text)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(text)
}

pub fn read_bed(path: &Path) -> Result<Vec<Interval>> {
    let intervals =
        parse_bed(open_reader(path)?).with_context(|| format!("parse {}", path.display()))?;
    Ok(intervals)
}

pub fn write_dataframe(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    let mut csv = CsvWriter::new(&mut file).with_separator(b'\t');
    let mut df = df.clone();
    csv.finish(&mut df)?;
    Ok(())
}
