//! Case-law corpus scanner.
//!
//! Walks `corpus.root`, filters paths through include/exclude globs and
//! turns each file into a [`CorpusItem`]. The first directory under the
//! root names the item's category; files at the root are `general`.

use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::extract::{self, MIME_PDF};
use crate::models::CorpusItem;

pub const DEFAULT_CATEGORY: &str = "general";

pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<CorpusItem>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut items = Vec::new();

    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > config.max_file_bytes {
            warn!(path = %rel_str, size, "skipping oversized corpus file");
            continue;
        }

        match file_to_item(path, &rel_str) {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => warn!(path = %rel_str, error = %e, "skipping unreadable corpus file"),
        }
    }

    items.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    Ok(items)
}

/// Category for a root-relative path: its first directory component.
pub fn category_for(relative: &str) -> String {
    let path = Path::new(relative);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(dir)), Some(_)) => dir.to_string_lossy().to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

fn file_to_item(path: &Path, relative_path: &str) -> Result<Option<CorpusItem>> {
    let Some(content_type) = extract::content_type_for(path) else {
        return Ok(None);
    };

    let metadata = std::fs::metadata(path)?;
    let modified_secs = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let bytes = std::fs::read(path)?;
    let body = extract::extract_text(&bytes, content_type)?;

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| relative_path.to_string());
    let title = path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| source.clone());

    Ok(Some(CorpusItem {
        source_id: relative_path.to_string(),
        source,
        category: category_for(relative_path),
        title,
        content_type: content_type.to_string(),
        body,
        pdf_path: (content_type == MIME_PDF).then(|| relative_path.to_string()),
        updated_at: Utc
            .timestamp_opt(modified_secs, 0)
            .single()
            .unwrap_or_default(),
    }))
}

/// Resolve a client-supplied relative path inside `root`. Returns `None`
/// for absolute paths, `..` traversal, or files that do not exist.
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    let candidate = root.join(rel);
    let canonical = candidate.canonicalize().ok()?;
    let canonical_root = root.canonicalize().ok()?;
    (canonical.starts_with(&canonical_root) && canonical.is_file()).then_some(canonical)
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

    fn corpus_config(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            ..CorpusConfig::default()
        }
    }

    #[test]
    fn test_category_from_first_directory() {
        assert_eq!(category_for("labour/2019/case.pdf"), "labour");
        assert_eq!(category_for("tenancy/a.txt"), "tenancy");
        assert_eq!(category_for("loose.txt"), "general");
    }

    #[test]
    fn test_scan_reads_text_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("property")).unwrap();
        std::fs::write(
            dir.path().join("property/eviction.txt"),
            "Landlord evicted tenant without notice.",
        )
        .unwrap();
        std::fs::write(dir.path().join("overview.md"), "# Overview").unwrap();
        std::fs::write(dir.path().join("photo.png"), [0u8, 1, 2]).unwrap();

        let items = scan_corpus(&corpus_config(dir.path())).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source_id, "overview.md");
        assert_eq!(items[0].category, "general");
        assert_eq!(items[1].source, "eviction.txt");
        assert_eq!(items[1].category, "property");
        assert_eq!(items[1].title, "eviction");
        assert!(items[1].pdf_path.is_none());
    }

    #[test]
    fn test_scan_skips_broken_pdf() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.pdf"), b"not a pdf").unwrap();
        std::fs::write(dir.path().join("ok.txt"), "fine").unwrap();
        let items = scan_corpus(&corpus_config(dir.path())).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_id, "ok.txt");
    }

    #[test]
    fn test_exclude_globs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("drafts")).unwrap();
        std::fs::write(dir.path().join("drafts/x.txt"), "draft").unwrap();
        std::fs::write(dir.path().join("final.txt"), "final").unwrap();
        let config = CorpusConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..corpus_config(dir.path())
        };
        let items = scan_corpus(&config).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_id, "final.txt");
    }

    #[test]
    fn test_missing_root() {
        let config = corpus_config(Path::new("/nonexistent/corpus/root"));
        assert!(scan_corpus(&config).is_err());
    }

    #[test]
    fn test_resolve_within_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("civil")).unwrap();
        std::fs::write(dir.path().join("civil/a.pdf"), b"%PDF").unwrap();

        assert!(resolve_within(dir.path(), "civil/a.pdf").is_some());
        assert!(resolve_within(dir.path(), "civil/missing.pdf").is_none());
        assert!(resolve_within(dir.path(), "../etc/passwd").is_none());
        assert!(resolve_within(dir.path(), "/etc/passwd").is_none());
    }
}
