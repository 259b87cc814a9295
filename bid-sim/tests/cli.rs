//! The `bid-sim` binary: exit codes, default output naming, prompting.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use bid_sim::io::{read_table, write_table};

const BIDS_CSV: &str = "\
nameid,price,bidprice9,bidprice10,number11
0701012400,100,90,120,5
0702013500,80,85,70,2
";

fn bid_sim(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bid-sim"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn missing_input_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = bid_sim(dir.path(), &["absent.csv"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("error:"), "{err}");
    assert!(err.contains("absent.csv"), "{err}");
    assert!(err.contains("not found"), "{err}");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn corrupt_input_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bids.parquet"), "not a parquet file").unwrap();

    let output = bid_sim(dir.path(), &["bids.parquet"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to read table"), "{}", stderr(&output));
    assert!(!dir.path().join("simulatorbids.parquet").exists());
}

#[test]
fn good_input_writes_default_output_in_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bids.csv"), BIDS_CSV).unwrap();

    let output = bid_sim(dir.path(), &["bids.csv"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let written = dir.path().join("simulatorbids.csv");
    assert!(written.is_file());
    let table = read_table(&written).unwrap();
    assert!(table.has_column("a5"));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sum1"), "{stdout}");
}

#[test]
fn workbook_input_gives_workbook_output() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("bids.csv");
    fs::write(&csv, BIDS_CSV).unwrap();
    write_table(&read_table(&csv).unwrap(), &dir.path().join("bids.xlsx")).unwrap();

    let output = bid_sim(dir.path(), &["bids.xlsx"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(dir.path().join("simulatorbids.xlsx").is_file());
}

#[test]
fn explicit_output_and_policy_flags() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bids.csv"), BIDS_CSV).unwrap();

    let output = bid_sim(
        dir.path(),
        &[
            "bids.csv",
            "-o",
            "out.parquet",
            "--policy",
            "v1",
            "--correction-scope",
            "per-row",
            "--summary-json",
            "summary.json",
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(dir.path().join("out.parquet").is_file());
    assert!(!dir.path().join("simulatorbids.csv").exists());

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["policy"], "v1");
}

#[test]
fn missing_argument_prompts_for_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bids.csv"), BIDS_CSV).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_bid-sim"))
        .current_dir(dir.path())
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"bids.csv\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Input table path: "));
    assert!(dir.path().join("simulatorbids.csv").is_file());
}

#[test]
fn empty_prompt_answer_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let output = bid_sim(dir.path(), &[]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no input file given"));
}
