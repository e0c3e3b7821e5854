//! Integration tests for streamchain
//!
//! These tests run whole pipelines against real files and drive the `sc`
//! binary end to end.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use streamchain::pipeline::{CsvFormatParams, CsvParseParams, LineSplitMode, LineSplitParams};
use streamchain::stage::{FileReader, GzipStream, MemorySink};
use streamchain::{PipelineConfig, PipelineError, PipelineStep, StageError, StageHandle, StreamChainer};

const CSV_INPUT: &str = "name,age,city\nrob,30,Paris\nmike,20,New York\n";

fn copy_config(name: &str, input: &Path, output: &Path) -> PipelineConfig {
    PipelineConfig::new(
        name,
        vec![PipelineStep::source_file(input), PipelineStep::sink_file(output)],
    )
}

// =============================================================================
// Pipeline Scenarios
// =============================================================================

#[tokio::test]
async fn test_csv_redelimiting() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("x.csv");
    let output = temp_dir.path().join("y.csv");
    fs::write(&input, CSV_INPUT).unwrap();

    let config = PipelineConfig::new(
        "REFORMAT",
        vec![
            PipelineStep::source_file(&input),
            PipelineStep::CsvParse(CsvParseParams {
                delimiter: ',',
                headers: true,
                max_rows: None,
            }),
            PipelineStep::CsvFormat(CsvFormatParams {
                delimiter: ';',
                headers: true,
                trailing_delimiter: false,
            }),
            PipelineStep::sink_file(&output),
        ],
    );

    StreamChainer::new().run(Some(&config)).await.unwrap();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "name;age;city\nrob;30;Paris\nmike;20;New York"
    );
}

#[tokio::test]
async fn test_copy_is_byte_identical() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("x.txt");
    let output = temp_dir.path().join("y.txt");
    fs::write(&input, "L1\nL2\nL3\n").unwrap();

    StreamChainer::new()
        .run(Some(&copy_config("COPY", &input, &output)))
        .await
        .unwrap();

    assert_eq!(fs::read(&output).unwrap(), b"L1\nL2\nL3\n");
}

#[tokio::test]
async fn test_gzip_round_trip_to_memory() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("data.bin");
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(&input, &data).unwrap();

    let sink = MemorySink::new();
    let buffer = sink.buffer();
    let stages = vec![
        StageHandle::source(FileReader::with_chunk_size(&input, 4096)),
        StageHandle::transform(GzipStream::compress()),
        StageHandle::transform(GzipStream::decompress()),
        StageHandle::sink(sink),
    ];

    StreamChainer::new()
        .with_channel_capacity(2)
        .run_stages("GZIP_ROUND_TRIP", stages)
        .await
        .unwrap();

    assert_eq!(*buffer.lock().await, data);
}

#[tokio::test]
async fn test_gzip_file_then_decompress_to_memory() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("lines.txt");
    let archive = temp_dir.path().join("lines.txt.gz");
    let data = "This is Line 1\nThis is Line 2\nThis is Line 3\n".repeat(2000);
    fs::write(&input, &data).unwrap();

    let chainer = StreamChainer::new();
    let compress = PipelineConfig::new(
        "ZIP",
        vec![
            PipelineStep::source_file(&input),
            PipelineStep::Compress,
            PipelineStep::sink_file(&archive),
        ],
    );
    chainer.run(Some(&compress)).await.unwrap();

    let compressed = fs::read(&archive).unwrap();
    assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
    assert!(compressed.len() < data.len());

    let sink = MemorySink::new();
    let buffer = sink.buffer();
    let stages = vec![
        StageHandle::source(FileReader::new(&archive)),
        StageHandle::transform(GzipStream::decompress()),
        StageHandle::sink(sink),
    ];
    chainer.run_stages("UNZIP", stages).await.unwrap();

    assert_eq!(*buffer.lock().await, data.as_bytes());
}

#[tokio::test]
async fn test_same_input_twice_gives_identical_outputs() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("x.txt");
    let first = temp_dir.path().join("first.txt");
    let second = temp_dir.path().join("second.txt");
    fs::write(&input, "a\nb\nc\n".repeat(1000)).unwrap();

    let chainer = StreamChainer::new();
    chainer.run(Some(&copy_config("ONCE", &input, &first))).await.unwrap();
    chainer.run(Some(&copy_config("TWICE", &input, &second))).await.unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input_a = temp_dir.path().join("a.txt");
    let input_b = temp_dir.path().join("b.txt");
    let output_a = temp_dir.path().join("a.out");
    let output_b = temp_dir.path().join("b.out");
    fs::write(&input_a, "alpha\n".repeat(5000)).unwrap();
    fs::write(&input_b, "beta\n".repeat(7000)).unwrap();

    let chainer = StreamChainer::new();
    let config_a = copy_config("A", &input_a, &output_a);
    let config_b = copy_config("B", &input_b, &output_b);

    let (result_a, result_b) = tokio::join!(chainer.run(Some(&config_a)), chainer.run(Some(&config_b)));
    result_a.unwrap();
    result_b.unwrap();

    assert_eq!(fs::read(&output_a).unwrap(), fs::read(&input_a).unwrap());
    assert_eq!(fs::read(&output_b).unwrap(), fs::read(&input_b).unwrap());
}

#[tokio::test]
async fn test_ndjson_to_csv() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("events.ndjson");
    let output = temp_dir.path().join("events.csv");
    fs::write(
        &input,
        "{\"name\":\"rob\",\"age\":30}\n\n{\"name\":\"mike\",\"age\":20}\n",
    )
    .unwrap();

    let config = PipelineConfig::new(
        "NDJSON",
        vec![
            PipelineStep::source_file(&input),
            PipelineStep::LineSplit(LineSplitParams {
                mode: LineSplitMode::Ndjson,
                ..Default::default()
            }),
            PipelineStep::CsvFormat(CsvFormatParams {
                headers: true,
                trailing_delimiter: true,
                ..Default::default()
            }),
            PipelineStep::sink_file(&output),
        ],
    );

    StreamChainer::new().run(Some(&config)).await.unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "name,age\nrob,30\nmike,20\n");
}

#[tokio::test]
async fn test_failing_stage_error_is_returned() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("plain.txt");
    let output = temp_dir.path().join("out.txt");
    fs::write(&input, "definitely not gzip\n".repeat(100)).unwrap();

    let config = PipelineConfig::new(
        "BAD_GZIP",
        vec![
            PipelineStep::source_file(&input),
            PipelineStep::Decompress,
            PipelineStep::sink_file(&output),
        ],
    );

    let err = StreamChainer::new().run(Some(&config)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Stage(StageError::Io(_))));
    assert!(!err.is_configuration_error());
}

#[tokio::test]
async fn test_definition_file_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("x.csv");
    let output = temp_dir.path().join("y.csv");
    let definition = temp_dir.path().join("pipeline.yml");
    fs::write(&input, CSV_INPUT).unwrap();
    fs::write(
        &definition,
        format!(
            r#"
name: reformat
steps:
  - kind: source-file
    params: {{ path: "{}" }}
  - kind: csv-parse
    params: {{ delimiter: ",", headers: true }}
  - kind: csv-format
    params: {{ delimiter: ";", headers: true }}
  - kind: sink-file
    params: {{ path: "{}" }}
"#,
            input.display(),
            output.display()
        ),
    )
    .unwrap();

    let config = PipelineConfig::load(&definition).unwrap();
    assert_eq!(config.name, "reformat");
    assert_eq!(config.steps.len(), 4);

    StreamChainer::new().run(Some(&config)).await.unwrap();
    assert!(fs::read_to_string(&output).unwrap().starts_with("name;age;city\n"));
}

#[test]
fn test_unknown_step_kind_in_definition() {
    let yaml = r#"
name: broken
steps:
  - kind: teleport
"#;

    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, PipelineError::UnknownStepKind { index: 0, .. }));
}

// =============================================================================
// CLI Tests
// =============================================================================

fn sc(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sc").expect("sc binary should build");
    cmd.current_dir(temp_dir.path())
        .env("XDG_DATA_HOME", temp_dir.path().join("data"))
        .env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_run_copies_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("x.txt");
    let output = temp_dir.path().join("y.txt");
    let definition = temp_dir.path().join("copy.yml");
    fs::write(&input, "L1\nL2\n").unwrap();
    fs::write(
        &definition,
        format!(
            "name: copy\nsteps:\n  - kind: source-file\n    params: {{ path: \"{}\" }}\n  - kind: sink-file\n    params: {{ path: \"{}\" }}\n",
            input.display(),
            output.display()
        ),
    )
    .unwrap();

    sc(&temp_dir)
        .arg("run")
        .arg(&definition)
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline copy finished"));

    assert_eq!(fs::read(&output).unwrap(), b"L1\nL2\n");
}

#[test]
fn test_cli_validate_rejects_single_step() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let definition = temp_dir.path().join("single.yml");
    fs::write(
        &definition,
        "name: single\nsteps:\n  - kind: source-file\n    params: { path: /tmp/in.txt }\n",
    )
    .unwrap();

    sc(&temp_dir)
        .arg("validate")
        .arg(&definition)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot chain only 1 item"));
}

#[test]
fn test_cli_validate_lists_steps() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let definition = temp_dir.path().join("gzip.yml");
    fs::write(
        &definition,
        "name: pack\nsteps:\n  - kind: source-file\n    params: { path: /tmp/in.txt }\n  - kind: gzip\n    params: { direction: zip }\n  - kind: sink-file\n    params: { path: /tmp/out.gz }\n",
    )
    .unwrap();

    sc(&temp_dir)
        .arg("validate")
        .arg(&definition)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("compress"));
}

#[test]
fn test_cli_hash() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    sc(&temp_dir)
        .args(["hash", "abc"])
        .assert()
        .success()
        .stdout("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad\n");
}

#[test]
fn test_cli_uuid() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    sc(&temp_dir)
        .args(["uuid", "email1_clientid1_eventid1_date1", "1654690725264"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^[0-9a-f]{8}-[0-9a-f]{4}-1[0-9a-f]{3}-[0-9a-f]{4}-[0-9a-f]{12}\n$").unwrap());

    sc(&temp_dir)
        .args(["uuid", "id", "12345"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("neither in seconds nor milliseconds"));
}
