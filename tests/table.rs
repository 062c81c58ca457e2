use std::path::PathBuf;

use sheet_recon::batch::BatchFailure;
use sheet_recon::issues::ComparisonResult;
use sheet_recon::table::{render_summary, render_table, summary_rows};
use sheet_recon::{IssueRecord, ReconError};

fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn results() -> Vec<ComparisonResult> {
    vec![
        ComparisonResult::from_row_scan(
            "zeta",
            strings(&["id"]),
            strings(&["id"]),
            vec![IssueRecord::missing_row(strings(&["9"]), 0)],
        ),
        ComparisonResult::from_row_scan("alpha", strings(&["id"]), strings(&["id"]), Vec::new()),
        ComparisonResult::schema_mismatch(
            "mid",
            strings(&["id", "x"]),
            strings(&["id"]),
            vec![1],
        ),
    ]
}

#[test]
fn summary_rows_sort_results_and_append_failures() {
    let failures = vec![BatchFailure {
        file: PathBuf::from("up/Q-2.csv"),
        error: ReconError::PairingFailure {
            file: "Q-2.csv".into(),
            prefix: "Q".into(),
        },
    }];
    let rows = summary_rows(&results(), &failures);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], strings(&["alpha", "clean", "0", "0", "0"]));
    assert_eq!(rows[1], strings(&["mid", "schema mismatch", "1", "0", "0"]));
    assert_eq!(rows[2], strings(&["zeta", "discrepancies", "1", "1", "0"]));
    assert_eq!(rows[3][0], "Q-2.csv");
    assert!(rows[3][1].starts_with("failed: No original file matches 'Q-2.csv'"));
    assert_eq!(&rows[3][2..], &strings(&["-", "-", "-"])[..]);
}

#[test]
fn table_columns_are_padded_to_the_widest_cell() {
    let headers = strings(&["name", "n"]);
    let rows = vec![strings(&["a", "10"]), strings(&["longer", "2"])];
    assert_eq!(
        render_table(&headers, &rows),
        "name    n\n\
         ------  ---\n\
         a       10\n\
         longer  2\n"
    );
}

#[test]
fn control_characters_do_not_break_rows() {
    let headers = strings(&["v"]);
    let rows = vec![strings(&["a\tb\nc"])];
    let rendered = render_table(&headers, &rows);
    assert_eq!(rendered.lines().count(), 3);
    assert!(rendered.contains("a b c"));
}

#[test]
fn summary_starts_with_the_header_line() {
    let rendered = render_summary(&results(), &[]);
    let first = rendered.lines().next().unwrap();
    assert!(first.starts_with("name"));
    assert!(first.ends_with("cell mismatches"));
}
