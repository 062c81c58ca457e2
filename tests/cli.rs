mod common;

use std::fs;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::str::contains;

fn recon() -> Command {
    let mut cmd = Command::cargo_bin("sheet-recon").expect("binary exists");
    cmd.env("RUST_LOG", "off");
    cmd
}

fn write_pair(ws: &TestWorkspace) -> (String, String) {
    let original = ws.write("people-2024.csv", "id,name\n1,Alice\n2,Bob\n3,Cy\n");
    let uploaded = ws.write("people-upload.csv", "id,name\n2,Bobby\n1,Alice\n");
    (
        original.to_string_lossy().into_owned(),
        uploaded.to_string_lossy().into_owned(),
    )
}

fn files_in(dir: &std::path::Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn compare_prints_summary_and_writes_text_log() {
    let ws = TestWorkspace::new();
    let (original, uploaded) = write_pair(&ws);
    let out = ws.dir("out");
    recon()
        .args(["compare", "--original", &original, "--uploaded", &uploaded])
        .args(["-f", "text", "-o", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("people"))
        .stdout(contains("discrepancies"));

    let logs = files_in(&out);
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("issues_people-2024_") && logs[0].ends_with(".txt"));
    let contents = fs::read_to_string(out.join(&logs[0])).unwrap();
    assert_eq!(
        contents,
        "ORI | 2 <|Bob|>\nUPL | 2 <|Bobby|>\n\nORI | <|3|> Cy\nUPL | <|3|> MISSING\n\n"
    );
}

#[test]
fn compare_json_reports_issues_without_writing() {
    let ws = TestWorkspace::new();
    let (original, uploaded) = write_pair(&ws);
    let out = ws.dir("out");
    let output = recon()
        .args(["compare", "--original", &original, "--uploaded", &uploaded])
        .args(["--json", "--no-write", "-o", out.to_str().unwrap()])
        .output()
        .expect("run compare");
    assert!(output.status.success());

    let document: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let result = &document["results"][0];
    assert_eq!(result["name"], "people-2024");
    assert_eq!(result["classification"], "has_discrepancies");
    assert_eq!(result["issues"][0]["kind"], "cell_mismatch");
    assert_eq!(result["issues"][1]["kind"], "missing_row");
    assert_eq!(document["failures"].as_array().map(Vec::len), Some(0));
    assert!(files_in(&out).is_empty());
}

#[test]
fn compare_clean_pair_writes_nothing() {
    let ws = TestWorkspace::new();
    let original = ws.write("a.csv", "id,v\n1,x \n");
    let uploaded = ws.write("b.csv", "id,v\n1, x\n");
    let out = ws.dir("out");
    recon()
        .args([
            "compare",
            "--original",
            original.to_str().unwrap(),
            "--uploaded",
            uploaded.to_str().unwrap(),
            "--ignore-whitespace",
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("clean"));
    assert!(files_in(&out).is_empty());
}

#[test]
fn compare_missing_file_fails() {
    let ws = TestWorkspace::new();
    let (original, _) = write_pair(&ws);
    let absent = ws.path().join("absent.csv");
    recon()
        .args([
            "compare",
            "--original",
            &original,
            "--uploaded",
            absent.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("does not exist"));
}

#[test]
fn compare_honours_settings_file_and_flag_overrides() {
    let ws = TestWorkspace::new();
    let original = ws.write("keys.csv", "name,id\nA,1\nB,2\n");
    let uploaded = ws.write("keys-up.csv", "id,name\n2,B\n1,A\n");
    let out = ws.dir("out");
    let config = ws.write(
        "recon.yaml",
        &format!(
            "original_key: 1\nuploaded_key: 1\noutput_format: text\noutput_dir: {}\n",
            out.display()
        ),
    );
    // uploaded_key from the file points at names; the flag puts it back on ids
    recon()
        .args([
            "compare",
            "--original",
            original.to_str().unwrap(),
            "--uploaded",
            uploaded.to_str().unwrap(),
            "-c",
            config.to_str().unwrap(),
            "--uploaded-key",
            "0",
        ])
        .assert()
        .success()
        .stdout(contains("clean"));
    assert!(files_in(&out).is_empty());
}

#[test]
fn batch_writes_issue_folder_and_fails_on_unpaired_upload() {
    let ws = TestWorkspace::new();
    ws.write("orig/A-1.csv", "id,v\n1,a\n");
    ws.write("orig/B-1.csv", "id,v\n1,a\n");
    ws.write("up/A-2.csv", "id,v\n1,changed\n");
    ws.write("up/B-2.csv", "id,v\n1,a\n");
    ws.write("up/Q-2.csv", "id,v\n1,a\n");
    let out = ws.dir("out");
    recon()
        .args([
            "batch",
            "--original",
            ws.path().join("orig").to_str().unwrap(),
            "--uploaded",
            ws.path().join("up").to_str().unwrap(),
            "-f",
            "text",
            "-o",
            out.to_str().unwrap(),
            "--jobs",
            "2",
        ])
        .assert()
        .failure()
        .stdout(contains("A-1"))
        .stdout(contains("failed"))
        .stderr(contains("1 file(s) could not be compared"));

    let folders = files_in(&out);
    assert_eq!(folders.len(), 1);
    assert!(folders[0].starts_with("issues_"));
    let logs = files_in(&out.join(&folders[0]));
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("issues_A-1_"));
}

#[test]
fn sequential_batch_succeeds_when_every_upload_pairs() {
    let ws = TestWorkspace::new();
    ws.write("orig/A-1.csv", "id,v\n1,a\n");
    ws.write("up/A-2.csv", "id,v\n1,a\n");
    let out = ws.dir("out");
    recon()
        .args([
            "batch",
            "--original",
            ws.path().join("orig").to_str().unwrap(),
            "--uploaded",
            ws.path().join("up").to_str().unwrap(),
            "--sequential",
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("clean"));
    assert!(files_in(&out).is_empty());
}

#[test]
fn settings_init_refuses_to_overwrite_without_force() {
    let ws = TestWorkspace::new();
    let path = ws.path().join("conf/recon.yaml");
    recon()
        .args(["settings", "init", "--path", path.to_str().unwrap()])
        .assert()
        .success();
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("output_format: xlsx"));
    assert!(written.contains("original_key: 0"));

    recon()
        .args(["settings", "init", "--path", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("already exists"));
    recon()
        .args(["settings", "init", "--path", path.to_str().unwrap(), "--force"])
        .assert()
        .success();
}

#[test]
fn settings_show_prints_loaded_values() {
    let ws = TestWorkspace::new();
    let config = ws.write("recon.yaml", "uploaded_key: 4\nignore_whitespace: true\n");
    recon()
        .args(["settings", "show", "--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("uploaded_key: 4"))
        .stdout(contains("ignore_whitespace: true"));
}

#[test]
fn settings_with_unknown_keys_are_rejected() {
    let ws = TestWorkspace::new();
    let config = ws.write("recon.yaml", "colour: blue\n");
    recon()
        .args(["settings", "show", "--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Parsing settings YAML"));
}

#[test]
fn whitespace_flag_overrides_settings_file_in_both_directions() {
    let ws = TestWorkspace::new();
    let original = ws.write("a.csv", "id,v\n1,x \n");
    let uploaded = ws.write("b.csv", "id,v\n1,x\n");
    let config = ws.write("recon.yaml", "ignore_whitespace: true\n");
    let base = [
        "compare",
        "--original",
        original.to_str().unwrap(),
        "--uploaded",
        uploaded.to_str().unwrap(),
        "-c",
        config.to_str().unwrap(),
        "--no-write",
    ];
    recon()
        .args(base)
        .assert()
        .success()
        .stdout(contains("clean"));
    recon()
        .args(base)
        .arg("--no-ignore-whitespace")
        .assert()
        .success()
        .stdout(contains("discrepancies"));
}
