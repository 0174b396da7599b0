//! Integration tests for resolving dump inputs from paths and glob patterns.

use dumpbeam::io::glob::{expand_glob, is_pattern};
use dumpbeam::io::resolve_inputs;
use std::fs::{create_dir_all, write};
use tempfile::TempDir;

#[test]
fn test_pattern_detection() {
    assert!(is_pattern("dumps/ol_dump_*.txt"));
    assert!(is_pattern("dump_?.txt"));
    assert!(is_pattern("dump_[12].txt"));
    assert!(!is_pattern("dumps/ol_dump_editions.txt"));
}

#[test]
fn test_glob_matches_are_sorted() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    for name in ["part_c.txt", "part_a.txt", "part_b.txt", "other.jsonl"] {
        write(dir.path().join(name), "x\n")?;
    }

    let pattern = format!("{}/part_*.txt", dir.path().display());
    let names: Vec<String> = expand_glob(&pattern)?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(names, vec!["part_a.txt", "part_b.txt", "part_c.txt"]);
    Ok(())
}

#[test]
fn test_glob_skips_directories() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    create_dir_all(dir.path().join("dump_dir.txt"))?;
    write(dir.path().join("dump_1.txt"), "x\n")?;

    let files = expand_glob(&format!("{}/dump_*.txt", dir.path().display()))?;
    assert_eq!(files, vec![dir.path().join("dump_1.txt")]);
    Ok(())
}

#[test]
fn test_glob_recursive_pattern() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    create_dir_all(dir.path().join("2024/01"))?;
    create_dir_all(dir.path().join("2024/02"))?;
    write(dir.path().join("2024/01/dump.txt"), "x\n")?;
    write(dir.path().join("2024/02/dump.txt"), "x\n")?;

    let files = expand_glob(&format!("{}/**/dump.txt", dir.path().display()))?;
    assert_eq!(files.len(), 2);
    Ok(())
}

#[test]
fn test_resolve_literal_path() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let file = dir.path().join("dump.txt");
    write(&file, "x\n")?;

    let input = file.to_string_lossy().into_owned();
    assert_eq!(resolve_inputs(&input)?, vec![file]);
    assert!(resolve_inputs(&format!("{input}.missing")).is_err());
    Ok(())
}

#[test]
fn test_resolve_pattern_without_matches_fails() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let err = resolve_inputs(&format!("{}/*.txt", dir.path().display())).unwrap_err();
    assert!(err.to_string().contains("no files found"));
    assert!(expand_glob(&format!("{}/*.txt", dir.path().display()))?.is_empty());
    Ok(())
}

#[test]
fn test_invalid_pattern_is_an_error() {
    assert!(expand_glob("dumps/[unclosed").is_err());
}
