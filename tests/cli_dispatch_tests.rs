use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_makerspaces")
}

/// Run the binary against data files inside `dir`; the Overpass URL points nowhere so a
/// missing catalog cache fails fast instead of reaching the network.
fn run_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(bin())
        .args(args)
        .env("MAKERSPACE_DATA_DIR", dir)
        .env_remove("MAKERSPACE_SCHOOL_CACHE")
        .env_remove("MAKERSPACE_SPACE_FILE")
        .env("OVERPASS_URL", "http://127.0.0.1:9/api/interpreter")
        .env("RUST_LOG", "off")
        .output()
        .expect("binary should run")
}

fn seed_catalog(dir: &Path) {
    fs::write(
        dir.join("schools_bavaria.csv"),
        "name,lat,lon,type\nGymnasium Nord,48.2,11.6,Gymnasium\nGrundschule Süd,48.0,11.5,Grundschule\nGymnasium West,48.1,11.4,Gymnasium\n",
    )
    .expect("write catalog");
    fs::write(
        dir.join("makerspaces.json"),
        r#"{"Gymnasium Nord":{"space_name":"MakerLab"}}"#,
    )
    .expect("write store");
}

#[test]
fn missing_command_prints_usage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_in(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: makerspaces"));
}

#[test]
fn classify_command_prints_category() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_in(dir.path(), &["classify", "Staatliche", "Fachoberschule", "Landshut"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "FOS/BOS");
}

#[test]
fn render_command_writes_filtered_map() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_catalog(dir.path());
    let out = dir.path().join("map.html");
    let out_str = out.to_string_lossy().to_string();

    let output = run_in(dir.path(), &["render", &out_str, "Gymnasium"]);
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("markers=2"));

    let html = fs::read_to_string(&out).expect("map file");
    assert!(html.contains("Gymnasium Nord"));
    assert!(!html.contains("Grundschule Süd"));

    // backfill wrote every catalog school into the store
    let store: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("makerspaces.json")).expect("store"),
    )
    .expect("json");
    assert_eq!(store.as_object().map(|o| o.len()), Some(3));
}

#[test]
fn render_rejects_unknown_category() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_in(dir.path(), &["render", "out.html", "Universität"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn summary_counts_makerspaces_per_category() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_catalog(dir.path());
    let output = run_in(dir.path(), &["summary"]);
    assert_eq!(output.status.code(), Some(0));

    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("summary should emit json");
    assert_eq!(payload["schools"], 3);
    assert_eq!(payload["makerspaces"], 1);
    assert_eq!(payload["categories"]["Gymnasium"]["schools"], 2);
    assert_eq!(payload["categories"]["Gymnasium"]["makerspaces"], 1);
    assert_eq!(payload["recorded"], serde_json::json!(["Gymnasium Nord"]));
}

#[test]
fn summary_counts_shared_school_names_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("schools_bavaria.csv"),
        "name,lat,lon,type\nGrundschule,48.2,11.6,Grundschule\nGrundschule,49.4,10.9,Grundschule\nRealschule Ost,48.1,11.4,Realschule\n",
    )
    .expect("write catalog");
    fs::write(
        dir.path().join("makerspaces.json"),
        r#"{"Grundschule":{"space_name":"Bastelecke"}}"#,
    )
    .expect("write store");

    let output = run_in(dir.path(), &["summary"]);
    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("summary should emit json");
    assert_eq!(payload["schools"], 3);
    assert_eq!(payload["makerspaces"], 1);
    assert_eq!(payload["recorded"], serde_json::json!(["Grundschule"]));
    assert_eq!(payload["categories"]["Grundschule"]["makerspaces"], 2);
}

#[test]
fn summary_fails_without_catalog_or_network() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_in(dir.path(), &["summary"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("school data unavailable"));
    assert!(!dir.path().join("schools_bavaria.csv").exists());
}
