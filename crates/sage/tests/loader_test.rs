//! Dataset loading through the public API

use pinsage::{load_interactions, Dataset, GraphBuilder, SageError};
use std::fs;

#[test]
fn test_missing_path_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let result = Dataset::load(dir.path().join("missing.csv"), 100);
    assert!(matches!(result, Err(SageError::NotFound { .. })));
}

#[test]
fn test_directory_without_csv_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "nothing here").unwrap();
    let result = Dataset::load(dir.path(), 100);
    assert!(matches!(result, Err(SageError::NotFound { .. })));
}

#[test]
fn test_unknown_extension_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.parquet");
    fs::write(&path, "binary").unwrap();
    let result = Dataset::load(&path, 100);
    assert!(matches!(result, Err(SageError::UnsupportedFormat { .. })));
}

#[test]
fn test_header_only_csv_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.csv");
    fs::write(&path, "product_id,Price\n").unwrap();
    let result = Dataset::load(&path, 100);
    assert!(matches!(result, Err(SageError::EmptyDataset)));
}

#[test]
fn test_directory_uses_first_csv() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.csv"), "product_id,Price\n1,2.0\n2,3.0\n").unwrap();
    fs::write(dir.path().join("a.csv"), "product_id,Price\n9,1.0\n").unwrap();

    let dataset = Dataset::load(dir.path(), 100).unwrap();
    assert_eq!(dataset.n_rows(), 1);
    assert_eq!(dataset.cell(0, 0), Some("9"));
}

#[test]
fn test_json_lines_catalog_builds_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.jsonl");
    let lines: Vec<String> = (0..25)
        .map(|i| {
            format!(
                r#"{{"product_id": {}, "Price": {}, "Category": "{}", "Title": "handmade lamp {}"}}"#,
                i,
                10 + i * 3,
                if i % 2 == 0 { "Home" } else { "Outdoor" },
                i % 5
            )
        })
        .collect();
    fs::write(&path, lines.join("\n")).unwrap();

    let dataset = Dataset::load(&path, 20).unwrap();
    assert_eq!(dataset.n_rows(), 20);

    let graph = GraphBuilder::new(5, 42).build(&dataset).unwrap();
    assert_eq!(graph.pin_count(), 20);
    assert!(graph.node("pin_0").is_some());
    assert!(graph.board_count() >= 3);
}

#[test]
fn test_load_interactions_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interactions.csv");
    fs::write(&path, "user_id,pin_id,rating\nu1,17,4.5\nu2,pin_3,3\n").unwrap();

    let interactions = load_interactions(&path).unwrap();
    assert_eq!(interactions.len(), 2);
    assert_eq!(interactions[0].pin_id, "17");
    assert_eq!(interactions[1].rating, 3.0);
}
