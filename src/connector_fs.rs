//! Filesystem document scanner.
//!
//! Walks `ingest.data_dir` and returns every file whose extension is listed
//! in `ingest.extensions`. The walk is flat unless `ingest.recursive` is set.
//! A document's `doc_id` is its path relative to the data directory, which
//! is simply the filename for a flat directory.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::models::SourceDocument;

/// List ingestible documents in deterministic (sorted by `doc_id`) order.
pub fn scan_documents(config: &IngestConfig) -> Result<Vec<SourceDocument>> {
    let root = &config.data_dir;
    if !root.is_dir() {
        bail!("Data directory does not exist: {}", root.display());
    }

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        // Word lock files (`~$report.docx`)
        "**/~$*".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let extensions: Vec<String> = config
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let max_depth = if config.recursive { usize::MAX } else { 1 };

    let mut docs = Vec::new();
    for entry in WalkDir::new(root).max_depth(max_depth) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false);
        if !matches_ext {
            continue;
        }

        docs.push(SourceDocument {
            doc_id: rel_str,
            path: path.to_path_buf(),
        });
    }

    docs.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> IngestConfig {
        IngestConfig {
            data_dir: dir.path().to_path_buf(),
            extensions: vec!["docx".to_string(), "txt".to_string()],
            recursive: false,
            exclude_globs: Vec::new(),
        }
    }

    #[test]
    fn test_scan_filters_by_extension_and_sorts() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("a.DOCX"), "a").unwrap();
        fs::write(tmp.path().join("c.pdf"), "c").unwrap();
        fs::write(tmp.path().join("~$a.docx"), "lock").unwrap();

        let docs = scan_documents(&config_for(&tmp)).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["a.DOCX", "b.txt"]);
    }

    #[test]
    fn test_flat_scan_ignores_subdirectories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("nested/deep.txt"), "deep").unwrap();
        fs::write(tmp.path().join("top.txt"), "top").unwrap();

        let mut cfg = config_for(&tmp);
        let flat = scan_documents(&cfg).unwrap();
        assert_eq!(flat.len(), 1);

        cfg.recursive = true;
        let deep = scan_documents(&cfg).unwrap();
        let ids: Vec<&str> = deep.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["nested/deep.txt", "top.txt"]);
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.txt"), "k").unwrap();
        fs::write(tmp.path().join("draft-notes.txt"), "d").unwrap();

        let mut cfg = config_for(&tmp);
        cfg.exclude_globs = vec!["draft-*".to_string()];
        let docs = scan_documents(&cfg).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_id, "keep.txt");
    }

    #[test]
    fn test_missing_directory_is_error() {
        let cfg = IngestConfig {
            data_dir: "/definitely/not/here".into(),
            ..IngestConfig::default()
        };
        assert!(scan_documents(&cfg).is_err());
    }
}
