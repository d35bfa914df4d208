use ldsc_enrich::report::parse;

fn labeled_report(n: usize, last_enrichment: &str) -> String {
    let names: Vec<String> = (0..n).map(|i| format!("cat{i}")).collect();
    let mut enrichment: Vec<String> = (0..n).map(|i| format!("{:.2}", 1.0 + i as f64 * 0.1)).collect();
    if let Some(last) = enrichment.last_mut() {
        *last = last_enrichment.to_string();
    }
    let se: Vec<String> = (0..n).map(|_| "0.5".to_string()).collect();
    format!(
        "Using two-step estimator with cutoff at 30.\n\
         Total Observed scale h2: 0.2154 (0.0123)\n\
         Categories: {}\n\
         Lambda GC: 1.1023\n\
         Mean Chi^2: 1.1388\n\
         Intercept: 1.0121 (0.0081)\n\
         Enrichment: {}\n\
         Enrichment SE: {}\n",
        names.join(" "),
        enrichment.join(" "),
        se.join(" ")
    )
}

#[test]
fn last_category_enrichment_is_read_positionally() {
    for n in [1, 5, 53, 97] {
        let report = parse(&labeled_report(n, "7.25"));
        assert_eq!(report.categories().len(), n);
        let last = report.last_category().expect("last category");
        assert_eq!(last.name, format!("cat{}", n - 1));
        assert_eq!(last.enrichment, Some(7.25));
        assert_eq!(last.enrichment_se, Some(0.5));
        assert_eq!(report.category_index(&last.name), Some(n - 1));
    }
}

#[test]
fn scalar_summary_lines_are_parsed() {
    let report = parse(&labeled_report(3, "2.0"));
    assert!(report.is_complete());
    assert_eq!(report.total_h2, Some(0.2154));
    assert_eq!(report.total_h2_se, Some(0.0123));
    assert_eq!(report.intercept, Some(1.0121));
    assert_eq!(report.intercept_se, Some(0.0081));
    assert_eq!(report.lambda_gc, Some(1.1023));
    assert_eq!(report.mean_chi2, Some(1.1388));
}

#[test]
fn missing_total_h2_leaves_every_estimate_unset() {
    let text = "Categories: a b c\nEnrichment: 1.0 2.0 3.0\nEnrichment SE: 0.1 0.2 0.3\n";
    let report = parse(text);
    assert!(!report.is_complete());
    assert_eq!(report.total_h2, None);
    assert_eq!(report.categories().len(), 3);
    for category in report.categories() {
        assert_eq!(category.enrichment, None);
        assert_eq!(category.enrichment_se, None);
    }
}

#[test]
fn repeated_label_uses_the_last_occurrence() {
    let text = "Total Observed scale h2: 0.1 (0.01)\n\
                Categories: a b\n\
                Enrichment: 1.0 1.5\n\
                Enrichment: 3.0 4.5\n";
    let report = parse(text);
    assert_eq!(report.category("a").and_then(|c| c.enrichment), Some(3.0));
    assert_eq!(report.category("b").and_then(|c| c.enrichment), Some(4.5));
}

#[test]
fn malformed_token_leaves_its_slot_unset() {
    let text = "Total Observed scale h2: 0.1 (0.01)\n\
                Categories: a b c\n\
                Enrichment: [1.2, NA, 3.4]\n";
    let report = parse(text);
    let values: Vec<Option<f64>> = report.categories().iter().map(|c| c.enrichment).collect();
    assert_eq!(values, vec![Some(1.2), None, Some(3.4)]);
}

#[test]
fn absent_section_is_unset_not_an_error() {
    let text = "Total Observed scale h2: 0.1 (0.01)\nCategories: a b\nEnrichment: 1.0 2.0\n";
    let report = parse(text);
    let b = report.category("b").expect("category b");
    assert_eq!(b.enrichment, Some(2.0));
    assert_eq!(b.enrichment_se, None);
    assert_eq!(b.coefficient, None);
    assert_eq!(b.p_value(), None);
}

#[test]
fn unnamed_categories_get_positional_names() {
    let text = "Total Observed scale h2: 0.1 (0.01)\nEnrichment: 1.0 2.0\n";
    let report = parse(text);
    let names: Vec<&str> = report.categories().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["category_1", "category_2"]);
}

#[test]
fn results_table_and_log_prefix_are_understood() {
    let text = "\
2024-03-01 12:00:01 - Total Liability scale h2: 0.0842 (0.0091)
Category Prop._SNPs Prop._h2 Prop._h2_std_error Enrichment Enrichment_std_error Enrichment_p Coefficient Coefficient_std_error
baseL2_0 1.0 1.0 0.0 1.0 0.0 NA 1.2e-08 3.1e-09
Coding_UCSCL2_0 0.0146 0.0912 0.0301 6.2466 2.0616 0.0113 4.1e-08 1.5e-08
Olig_enhancerL2_1 0.0215 0.0801 0.0188 3.7256 0.8744 0.0021 2.2e-08 6.0e-09

Analysis finished.
";
    let report = parse(text);
    assert_eq!(report.total_h2, Some(0.0842));
    assert_eq!(report.total_h2_se, Some(0.0091));
    assert_eq!(report.categories().len(), 3);

    let base = report.category("baseL2_0").expect("base row");
    assert_eq!(base.enrichment_p, None);

    let last = report.last_category().expect("last row");
    assert_eq!(last.name, "Olig_enhancerL2_1");
    assert_eq!(last.prop_snps, Some(0.0215));
    assert_eq!(last.prop_h2, Some(0.0801));
    assert_eq!(last.enrichment, Some(3.7256));
    assert_eq!(last.enrichment_se, Some(0.8744));
    assert_eq!(last.enrichment_p, Some(0.0021));
    assert_eq!(last.coefficient, Some(2.2e-08));
}

#[test]
fn labeled_vectors_take_precedence_over_table() {
    let text = "\
Total Observed scale h2: 0.1 (0.01)
Category Prop._SNPs Enrichment Enrichment_std_error
a 0.5 2.0 0.4
b 0.5 3.0 0.6

Enrichment: 2.5 3.5
";
    let report = parse(text);
    let a = report.category("a").expect("a");
    assert_eq!(a.enrichment, Some(2.5));
    assert_eq!(a.enrichment_se, Some(0.4));
}

#[test]
fn label_inside_prose_is_ignored() {
    let text = "Total Observed scale h2: 0.1 (0.01)\n\
                Categories: a\n\
                Enrichment: 1.5\n\
                Reading Enrichment: 9.9 from cache\n";
    let report = parse(text);
    assert_eq!(report.category("a").and_then(|c| c.enrichment), Some(1.5));
}

#[test]
fn labeled_line_directly_after_table_ends_the_table() {
    let text = "\
Category Prop._SNPs Prop._h2 Enrichment Enrichment_std_error Enrichment_p
baseL2_0 1.0 1.0 1.0 0.0 NA
Olig_enhancerL2_1 0.0215 0.0801 3.7256 0.8744 0.0021
Total Observed scale h2: 0.0842 (0.0091)
Lambda GC: 1.08
";
    let report = parse(text);
    assert!(report.is_complete());
    assert_eq!(report.total_h2, Some(0.0842));
    assert_eq!(report.lambda_gc, Some(1.08));
    assert_eq!(report.categories().len(), 2);
    let last = report.last_category().expect("last row");
    assert_eq!(last.name, "Olig_enhancerL2_1");
    assert_eq!(last.enrichment, Some(3.7256));
}

#[test]
fn total_row_inside_table_is_not_a_category() {
    let text = "\
Total Observed scale h2: 0.1 (0.01)
Category Prop._SNPs Enrichment Enrichment_std_error
a 0.5 2.0 0.4
Total 1.0 1.0 0.0
b 0.5 3.0 0.6
";
    let report = parse(text);
    let names: Vec<&str> = report.categories().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(report.last_category().and_then(|c| c.enrichment), Some(3.0));
}

#[test]
fn row_with_a_different_width_ends_the_table() {
    let text = "\
Total Observed scale h2: 0.1 (0.01)
Category Prop._SNPs Enrichment
a 0.5 2.0
Analysis finished at 12:00
";
    let report = parse(text);
    assert_eq!(report.categories().len(), 1);
    assert_eq!(report.category("a").and_then(|c| c.enrichment), Some(2.0));
}
