use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use ldsc_enrich::aggregate::{AggregatorConfig, ResultAggregator, batch_table};
use ldsc_enrich::annotation::AUTOSOMES;
use ldsc_enrich::bed::annotate_intervals;
use ldsc_enrich::combine::{CategorySelector, CombineStrategy, DEFAULT_SUBCATEGORY_KEYWORDS};
use ldsc_enrich::io::{
    annotation_path, read_annotation, read_annotation_pairs, read_bed, read_report,
    write_annotation, write_dataframe,
};
use ldsc_enrich::logging::{init_tracing, log_batch};
use ldsc_enrich::merge::{GenomeMergeConfig, MergeSpec, merge_genome, merge_with_report};
use ldsc_enrich::qc::check_file_exists;

#[derive(Parser)]
#[command(name = "ldsc-enrich")]
#[command(about = "Annotation merging and enrichment aggregation for partitioned LDSC", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Annotate {
        #[arg(long, required = true)]
        bed: PathBuf,
        #[arg(long, required = true)]
        reference_prefix: String,
        #[arg(long, required = true)]
        output_prefix: String,
        #[arg(long, required = true)]
        name: String,
        #[arg(long)]
        chromosomes: Option<String>,
    },
    Merge {
        #[arg(long, required = true)]
        background: PathBuf,
        #[arg(long, required = true)]
        addition: PathBuf,
        #[arg(long, required = true)]
        output: PathBuf,
        #[arg(long)]
        new_category: Option<String>,
        #[arg(long)]
        conflict_keywords: Option<String>,
        #[arg(long)]
        fallback_indices: Option<String>,
        #[arg(long, default_value_t = 2)]
        min_categories: usize,
    },
    MergeGenome {
        #[arg(long, required = true)]
        background_prefix: String,
        #[arg(long, required = true)]
        addition_prefix: String,
        #[arg(long, required = true)]
        output_prefix: String,
        #[arg(long)]
        new_category: Option<String>,
        #[arg(long)]
        conflict_keywords: Option<String>,
        #[arg(long)]
        fallback_indices: Option<String>,
        #[arg(long, default_value_t = 2)]
        min_categories: usize,
        #[arg(long, default_value_t = 15)]
        min_chromosomes: usize,
        #[arg(long)]
        cores: Option<usize>,
    },
    Aggregate {
        #[arg(long, required = true)]
        reports: Vec<PathBuf>,
        #[arg(long)]
        expected: Option<usize>,
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,
        #[arg(long, default_value = "direct")]
        strategy: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        subcategory_keywords: Option<String>,
        #[arg(long)]
        cores: Option<usize>,
        #[arg(long, required = true)]
        output: PathBuf,
        #[arg(long)]
        log_name: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Annotate {
            bed,
            reference_prefix,
            output_prefix,
            name,
            chromosomes,
        } => {
            check_file_exists(&bed, "bed")?;
            let intervals = read_bed(&bed)?;
            let chromosomes = parse_chromosomes(chromosomes)?;
            for chr in chromosomes {
                let reference = annotation_path(&reference_prefix, chr);
                if !reference.exists() {
                    tracing::warn!("Chr{chr}: reference annotation {} not found", reference.display());
                    continue;
                }
                let table = read_annotation(&reference, Some(chr))?;
                let annotated = annotate_intervals(&table, &intervals, &name)?;
                write_annotation(&annotated, &annotation_path(&output_prefix, chr))?;
            }
        }
        Command::Merge {
            background,
            addition,
            output,
            new_category,
            conflict_keywords,
            fallback_indices,
            min_categories,
        } => {
            check_file_exists(&background, "background")?;
            check_file_exists(&addition, "addition")?;
            let spec =
                merge_spec(new_category, conflict_keywords, fallback_indices, min_categories)?;
            let background = read_annotation(&background, None)?;
            let addition = read_annotation(&addition, None)?;
            let report = merge_with_report(background, addition, &spec)?;
            write_annotation(&report.table, &output)?;
        }
        Command::MergeGenome {
            background_prefix,
            addition_prefix,
            output_prefix,
            new_category,
            conflict_keywords,
            fallback_indices,
            min_categories,
            min_chromosomes,
            cores,
        } => {
            let spec =
                merge_spec(new_category, conflict_keywords, fallback_indices, min_categories)?;
            let (pairs, load_failures) =
                read_annotation_pairs(&background_prefix, &addition_prefix, AUTOSOMES);
            let config = GenomeMergeConfig {
                spec,
                min_chromosomes,
                cores,
            };
            let mut merged = merge_genome(pairs, &config)?;
            for report in &merged.reports {
                let chr = report.table.chromosome();
                write_annotation(&report.table, &annotation_path(&output_prefix, chr))?;
            }
            merged.failures.extend(load_failures);
            merged.failures.sort_by_key(|f| f.chromosome);
            for failure in &merged.failures {
                tracing::warn!("Chr{} not merged: {}", failure.chromosome, failure.reason);
            }
            tracing::info!(
                "Wrote {} merged chromosomes; {} failed",
                merged.reports.len(),
                merged.failures.len()
            );
        }
        Command::Aggregate {
            reports,
            expected,
            alpha,
            strategy,
            category,
            subcategory_keywords,
            cores,
            output,
            log_name,
        } => {
            let log_path = format!("{}_aggregate.log", log_name.as_deref().unwrap_or("ldsc_enrich"));
            let mut log = File::create(&log_path).with_context(|| format!("create {log_path}"))?;
            let strategy = parse_strategy(&strategy, category, subcategory_keywords)?;
            let config = AggregatorConfig {
                alpha,
                expected_datasets: Some(expected.unwrap_or(reports.len())),
                strategy,
                cores,
                ..AggregatorConfig::default()
            };
            let mut aggregator = ResultAggregator::new(config);

            let mut texts = Vec::with_capacity(reports.len());
            for path in &reports {
                let id = dataset_id(path);
                match read_report(path) {
                    Ok(text) => texts.push((id, text)),
                    Err(err) => aggregator.record_failure(&id, format!("{err:#}")),
                }
            }
            aggregator.add_reports(&texts)?;
            let batch = aggregator.finalize()?;

            log_batch(&mut log, &batch)?;

            let df = batch_table(&batch)?;
            write_dataframe(&df, &output)?;
        }
    }

    Ok(())
}

fn dataset_id(path: &Path) -> String {
    let mut name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string();
    for suffix in [".gz", ".log", ".results", "_h2"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.to_string();
        }
    }
    name
}

fn split_string_list(input: String) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_usize_list(input: String) -> anyhow::Result<Vec<usize>> {
    split_string_list(input)
        .into_iter()
        .map(|s| s.parse::<usize>().with_context(|| format!("invalid index {s}")))
        .collect()
}

fn parse_chromosomes(input: Option<String>) -> anyhow::Result<Vec<u8>> {
    let Some(input) = input else {
        return Ok(AUTOSOMES.collect());
    };
    split_string_list(input)
        .into_iter()
        .map(|s| {
            s.parse::<u8>()
                .ok()
                .filter(|c| AUTOSOMES.contains(c))
                .ok_or_else(|| anyhow::anyhow!("Unknown chromosome: {s}"))
        })
        .collect()
}

fn merge_spec(
    new_category: Option<String>,
    conflict_keywords: Option<String>,
    fallback_indices: Option<String>,
    min_categories: usize,
) -> anyhow::Result<MergeSpec> {
    let mut spec = MergeSpec {
        new_category,
        min_categories,
        ..MergeSpec::default()
    };
    if let Some(keywords) = conflict_keywords {
        spec.conflict_keywords = split_string_list(keywords);
    }
    if let Some(indices) = fallback_indices {
        spec.fallback_indices = split_usize_list(indices)?;
    }
    Ok(spec)
}

fn parse_strategy(
    input: &str,
    category: Option<String>,
    subcategory_keywords: Option<String>,
) -> anyhow::Result<CombineStrategy> {
    match input.to_ascii_lowercase().as_str() {
        "direct" => Ok(CombineStrategy::Direct(match category {
            Some(name) => CategorySelector::Named(name),
            None => CategorySelector::Last,
        })),
        "weighted" => {
            let keywords = subcategory_keywords.map(split_string_list).unwrap_or_else(|| {
                DEFAULT_SUBCATEGORY_KEYWORDS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });
            Ok(CombineStrategy::WeightedAverage(CategorySelector::Keywords(keywords)))
        }
        _ => Err(anyhow::anyhow!("Unknown combination strategy: {input}")),
    }
}
