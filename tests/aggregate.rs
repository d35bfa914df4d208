use ldsc_enrich::aggregate::{AggregatorConfig, Classifier, ResultAggregator, batch_table};
use ldsc_enrich::combine::CombineStrategy;
use ldsc_enrich::error::EnrichError;
use ldsc_enrich::report::parse;

fn report(enrichment: f64, se: f64, p: f64) -> String {
    format!(
        "Total Observed scale h2: 0.25 (0.02)\n\
         Categories: base Coding_UCSC new_annot\n\
         Enrichment: 1.0 5.2 {enrichment}\n\
         Enrichment SE: 0.0 1.1 {se}\n\
         Enrichment p: NA 0.001 {p}\n"
    )
}

#[test]
fn classifier_labels_dataset_names() {
    let classifier = Classifier::default();

    let olig = classifier.classify("cleaned_data_Olig2_enhancers");
    assert_eq!(olig.cell_type, "Oligodendrocyte");
    assert_eq!(olig.processing, "Cleaned");

    let nurr = classifier.classify("unique_data_Nurr_peaks");
    assert_eq!(nurr.cell_type, "Nurr1+");
    assert_eq!(nurr.processing, "Unique");

    let lowercase = classifier.classify("Cleaned_olig_peaks");
    assert_eq!(lowercase.cell_type, "Unknown");
    assert_eq!(lowercase.processing, "Unique");

    let other = classifier.classify("Microglia_atac");
    assert_eq!(other.cell_type, "Unknown");
}

#[test]
fn failed_analyses_are_excluded_and_reported() {
    let config = AggregatorConfig {
        expected_datasets: Some(4),
        cores: Some(2),
        ..AggregatorConfig::default()
    };
    let mut aggregator = ResultAggregator::new(config);
    let reports = vec![
        ("Olig_cleaned".to_string(), report(3.2, 0.6, 0.0004)),
        ("Pdgfra_unique".to_string(), report(1.4, 0.5, 0.41)),
        ("Nurr_cleaned".to_string(), "Categories: a\nEnrichment: 2.0\n".to_string()),
    ];
    aggregator.add_reports(&reports).expect("add reports");
    aggregator.record_failure("Aldh1l1_unique", "report file missing");
    let batch = aggregator.finalize().expect("finalize");

    assert_eq!(batch.len(), 2);
    let excluded: Vec<&str> = batch.exclusions().iter().map(|e| e.dataset_id.as_str()).collect();
    assert_eq!(excluded, vec!["Nurr_cleaned", "Aldh1l1_unique"]);
    assert!(
        batch.exclusions()[0].reason.starts_with("parse incomplete"),
        "{}",
        batch.exclusions()[0].reason
    );
    assert!(batch.is_short());
    assert!((batch.bonferroni_threshold() - 0.025).abs() < 1e-15);

    let ids: Vec<&str> = batch
        .records()
        .iter()
        .map(|r| r.record.dataset_id.as_str())
        .collect();
    assert_eq!(ids, vec!["Olig_cleaned", "Pdgfra_unique"]);
    let olig = &batch.records()[0];
    assert_eq!(olig.record.result.enrichment, 3.2);
    assert_eq!(olig.record.labels.cell_type, "Oligodendrocyte");
    assert!(olig.correction.bonferroni_significant);
}

#[test]
fn all_failures_leave_an_empty_batch() {
    let mut aggregator = ResultAggregator::new(AggregatorConfig::default());
    aggregator
        .add_report("Olig_cleaned", "Enrichment: 1.0\n")
        .expect("recorded as exclusion");
    assert!(matches!(
        aggregator.analyze("Olig_cleaned", &parse("Enrichment: 1.0\n")),
        Err(EnrichError::ParseIncomplete(_))
    ));
    let err = aggregator.finalize().expect_err("nothing completed");
    assert!(matches!(err, EnrichError::EmptyBatch(_)));
}

#[test]
fn weighted_strategy_flows_through_the_aggregator() {
    let config = AggregatorConfig {
        strategy: CombineStrategy::weighted_subcategories(),
        ..AggregatorConfig::default()
    };
    let mut aggregator = ResultAggregator::new(config);
    let text = "Total Observed scale h2: 0.25 (0.02)\n\
                Categories: base Olig_enhancer Olig_DNase\n\
                Enrichment: 1.0 2.0 4.0\n\
                Enrichment SE: 0.0 1.0 1.0\n";
    aggregator.add_report("Olig_cleaned", text).expect("add");
    let batch = aggregator.finalize().expect("finalize");
    let result = &batch.records()[0].record.result;
    assert_eq!(result.categories_used, 2);
    assert!((result.enrichment - 3.0).abs() < 1e-12);
}

#[test]
fn batch_table_has_one_row_per_dataset() {
    let mut aggregator = ResultAggregator::new(AggregatorConfig::default());
    aggregator
        .add_report("Olig_cleaned", &report(3.2, 0.6, 0.0004))
        .expect("add");
    aggregator
        .add_report("Nurr_unique", &report(0.9, 0.4, 0.8))
        .expect("add");
    let batch = aggregator.finalize().expect("finalize");
    let df = batch_table(&batch).expect("table");

    assert_eq!(df.height(), 2);
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for expected in [
        "dataset_id",
        "cell_type",
        "processing_type",
        "enrichment",
        "enrichment_p",
        "total_h2",
        "bonferroni_threshold",
        "bonferroni_significant",
        "fdr_corrected_p",
        "fdr_significant",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
}
