//! Persistence layer for index records.
//!
//! Each paper's record lives in `{papers_dir}/{paperId}_index.json`.
//! Files are written to a temporary sibling and renamed into place, so a
//! reader sees either the previous record or the new one, never a mix.

use crate::error::{PaperIndexError, Result};
use crate::tree::TreeNode;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Suffix appended to the paper id to form the index filename.
pub const INDEX_FILE_SUFFIX: &str = "_index.json";

/// The persisted result of indexing one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub paper_id: String,
    pub title: String,
    /// UTC, second precision.
    #[serde(with = "built_at_format")]
    pub built_at: DateTime<Utc>,
    pub tree: TreeNode,
}

impl IndexRecord {
    /// Create a record stamped with the current time.
    pub fn new(paper_id: impl Into<String>, title: impl Into<String>, tree: TreeNode) -> Self {
        Self {
            paper_id: paper_id.into(),
            title: title.into(),
            built_at: Utc::now().trunc_subsecs(0),
            tree,
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PaperIndexError::Serialization(e.to_string()))
    }

    /// Format the record for display.
    pub fn format(&self) -> String {
        let mut result = format!(
            "Paper: {} ({})\nBuilt: {}\nNodes: {}, depth {}\n",
            self.title,
            self.paper_id,
            self.built_at.format(built_at_format::FORMAT),
            self.tree.node_count(),
            self.tree.max_depth()
        );
        result.push_str(&"─".repeat(50));
        result.push('\n');
        result.push_str(&self.tree.format_tree(0));
        result
    }
}

mod built_at_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Path of the index file for `paper_id`.
pub fn record_path(papers_dir: &Path, paper_id: &str) -> PathBuf {
    papers_dir.join(format!("{}{}", paper_id, INDEX_FILE_SUFFIX))
}

/// Write `data` to `path` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent).map_err(|e| PaperIndexError::io(parent, e))?;
    }

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| PaperIndexError::io(parent, e))?;
    tmp.write_all(data).map_err(|e| PaperIndexError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PaperIndexError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| PaperIndexError::io(path, e.error))?;
    Ok(())
}

/// Save a record, replacing any previous record for the same paper.
pub fn save_record(record: &IndexRecord, papers_dir: &Path) -> Result<PathBuf> {
    let path = record_path(papers_dir, &record.paper_id);
    let json = record.to_json()?;
    write_atomic(&path, json.as_bytes())?;
    Ok(path)
}

/// Load the record for `paper_id`.
pub fn load_record(papers_dir: &Path, paper_id: &str) -> Result<IndexRecord> {
    let path = record_path(papers_dir, paper_id);
    if !path.exists() {
        return Err(PaperIndexError::PaperNotFound(paper_id.to_string()));
    }
    load_record_from(&path)
}

/// Load a record from an explicit file path.
pub fn load_record_from(path: &Path) -> Result<IndexRecord> {
    let data = fs::read_to_string(path).map_err(|e| PaperIndexError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| PaperIndexError::Serialization(e.to_string()))
}

/// Check if an index file exists for the paper.
pub fn record_exists(papers_dir: &Path, paper_id: &str) -> bool {
    record_path(papers_dir, paper_id).is_file()
}

/// Get the size of an index file in bytes.
pub fn record_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| PaperIndexError::io(path, e))?;
    Ok(metadata.len())
}

/// Paper ids that have an index file in `papers_dir`, sorted.
pub fn list_records(papers_dir: &Path) -> Result<Vec<String>> {
    if !papers_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut ids = Vec::new();
    for entry in WalkDir::new(papers_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            PaperIndexError::io(
                papers_dir,
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(id) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_suffix(INDEX_FILE_SUFFIX))
        {
            if !id.is_empty() {
                ids.push(id.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}
