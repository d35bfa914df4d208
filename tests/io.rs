use std::fs;
use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::tempdir;

use ldsc_enrich::bed::{annotate_intervals, parse_bed};
use ldsc_enrich::io::{
    annotation_path, read_annotation, read_annotation_pairs, read_bed, read_report,
    write_annotation,
};
use ldsc_enrich::merge::{MergeSpec, merge};

const BACKGROUND: &str = "\
CHR\tBP\tSNP\tCM\tbase\tCoding_UCSC\tBrain_H3K27ac
21\t9411239\trs559462325\t0.0\t1\t0\t1
21\t9411245\trs181691356\t0.0\t1\t1\t0
21\t9411264\trs548263598\t0.0\t1\t0\t0
21\t9411267\trs561987868\t0.001\t1\t0\t1
";

#[test]
fn merged_annotation_survives_gzip_round_trip() {
    let dir = tempdir().expect("tempdir");
    let bg_path = dir.path().join("baseline.21.annot");
    fs::write(&bg_path, BACKGROUND).expect("write background");
    let add_path = dir.path().join("olig.21.annot");
    fs::write(
        &add_path,
        "CHR\tBP\tSNP\tpeaks\n21\t9411245\trs181691356\t1\n21\t9999999\trs000\t1\n",
    )
    .expect("write addition");

    let background = read_annotation(&bg_path, Some(21)).expect("read background");
    assert_eq!(background.cm(), Some(&[0.0, 0.0, 0.0, 0.001][..]));
    let addition = read_annotation(&add_path, None).expect("read addition");
    assert_eq!(addition.chromosome(), 21);

    let merged = merge(background, addition, &MergeSpec::for_category("Olig_cleaned"))
        .expect("merge");
    let out_path = dir.path().join("merged.21.annot.gz");
    write_annotation(&merged, &out_path).expect("write merged");

    let reread = read_annotation(&out_path, Some(21)).expect("read merged");
    assert_eq!(
        reread.header(),
        vec!["CHR", "BP", "SNP", "CM", "base", "Coding_UCSC", "Olig_cleaned"]
    );
    assert_eq!(reread.column("Olig_cleaned"), Some(&[0.0, 1.0, 0.0, 0.0][..]));
    assert_eq!(reread, merged);
}

#[test]
fn compressed_report_is_read_transparently() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("Olig_cleaned_h2.log.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&path).expect("create"), Compression::fast());
    encoder
        .write_all(b"Total Observed scale h2: 0.1 (0.01)\n")
        .expect("write");
    encoder.finish().expect("finish");

    let text = read_report(&path).expect("read report");
    assert!(text.starts_with("Total Observed scale h2"));
}

#[test]
fn bed_intervals_mark_variants_inclusively() {
    let bed = "track name=peaks\n\
               chr21\t9411239\t9411245\tpeak1\n\
               chrX\t100\t200\n\
               21\t9411267\t9411300\n";
    let intervals = parse_bed(bed.as_bytes()).expect("parse bed");
    assert_eq!(intervals.len(), 2);

    let dir = tempdir().expect("tempdir");
    let bg_path = dir.path().join("baseline.21.annot");
    fs::write(&bg_path, BACKGROUND).expect("write background");
    let bed_path = dir.path().join("peaks.bed");
    fs::write(&bed_path, bed).expect("write bed");

    let reference = read_annotation(&bg_path, Some(21)).expect("read reference");
    let annotated =
        annotate_intervals(&reference, &read_bed(&bed_path).expect("read bed"), "peaks")
            .expect("annotate");
    assert_eq!(annotated.categories(), &["peaks"]);
    assert_eq!(annotated.column("peaks"), Some(&[1.0, 1.0, 0.0, 1.0][..]));
}

#[test]
fn malformed_bed_line_is_an_error() {
    assert!(parse_bed("chr1\t100\n".as_bytes()).is_err());
    assert!(parse_bed("chr1\t200\t100\n".as_bytes()).is_err());
}

#[test]
fn continuous_column_after_a_run_of_zeros_is_read() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("continuous.22.annot");
    let mut text = String::from("CHR\tBP\tSNP\tCM\tbase\tGERP_NS\n");
    for i in 0..300u64 {
        let cm = if i < 200 { "0".to_string() } else { format!("{}.5", i) };
        let score = if i < 250 { "0" } else { "0.37" };
        text.push_str(&format!("22\t{}\trs{i}\t{cm}\t1\t{score}\n", 16050000 + i));
    }
    fs::write(&path, text).expect("write annotation");

    let table = read_annotation(&path, Some(22)).expect("read continuous annotation");
    assert_eq!(table.len(), 300);
    let cm = table.cm().expect("cm column");
    assert_eq!(cm[199], 0.0);
    assert_eq!(cm[200], 200.5);
    let score = table.column("GERP_NS").expect("score column");
    assert_eq!(score[249], 0.0);
    assert_eq!(score[299], 0.37);
}

#[test]
fn unreadable_chromosomes_are_recorded_not_fatal() {
    let dir = tempdir().expect("tempdir");
    let bg_prefix = format!("{}/baseline.", dir.path().display());
    let add_prefix = format!("{}/olig.", dir.path().display());
    let addition = "CHR\tBP\tSNP\tpeaks\n21\t9411245\trs181691356\t1\n";

    let gz = |path: std::path::PathBuf, body: &str| {
        let mut encoder =
            GzEncoder::new(fs::File::create(path).expect("create"), Compression::fast());
        encoder.write_all(body.as_bytes()).expect("write");
        encoder.finish().expect("finish");
    };
    gz(annotation_path(&bg_prefix, 21), BACKGROUND);
    gz(annotation_path(&add_prefix, 21), addition);
    // chromosome 20 background is corrupt, chromosome 19 is absent
    fs::write(annotation_path(&bg_prefix, 20), "not gzip").expect("corrupt");
    gz(annotation_path(&add_prefix, 20), addition);

    let (pairs, failures) = read_annotation_pairs(&bg_prefix, &add_prefix, [19, 20, 21]);
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].0.chromosome(), 21);
    let failed: Vec<u8> = failures.iter().map(|f| f.chromosome).collect();
    assert_eq!(failed, vec![19, 20]);
    assert!(failures.iter().all(|f| !f.reason.is_empty()));
}
