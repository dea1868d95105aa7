//! Paper registry (`metadata.json`) and identifier management.
//!
//! The registry is a JSON document `{ "papers": [ ... ] }` shared with the
//! web front-end. Only `id`, `title` and `file_path` matter for indexing;
//! every other field is carried through untouched.
//!
//! All read-modify-write cycles in this process go through one async
//! mutex, so concurrent submissions cannot interleave their updates.

use crate::config::IndexConfig;
use crate::error::{PaperIndexError, Result};
use crate::persistence::write_atomic;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

/// One paper in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperEntry {
    /// Stable identifier; also the PDF and index file stem.
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// PDF location relative to the project root (e.g. `papers/foo.pdf`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Authors, venue, claims and anything else the front-end stores.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaperEntry {
    /// Create an entry with only the fields indexing needs.
    pub fn new(id: impl Into<String>, title: impl Into<String>, file_path: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            file_path,
            extra: Map::new(),
        }
    }

    /// Entry for a freshly uploaded PDF, with the front-end's default metadata.
    pub fn uploaded(id: impl Into<String>, title: impl Into<String>, file_path: String) -> Self {
        let mut entry = Self::new(id, title, Some(file_path));
        for (key, value) in [
            ("authors", json!([])),
            ("year", json!(Utc::now().year())),
            ("venue", json!("Uploaded")),
            ("category", json!("general")),
            ("keywords", json!([])),
            ("abstract", json!("")),
            ("claims", json!([])),
            ("citation_count", json!(0)),
        ] {
            entry.extra.insert(key.to_string(), value);
        }
        entry
    }

    /// Title used for duplicate detection.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Case-insensitive, whitespace-trimmed form of a title.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// The whole registry file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub papers: Vec<PaperEntry>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistryDocument {
    pub fn find(&self, id: &str) -> Option<&PaperEntry> {
        self.papers.iter().find(|p| p.id == id)
    }

    /// First entry whose normalized title equals `title`'s.
    pub fn find_by_title(&self, title: &str) -> Option<&PaperEntry> {
        let wanted = normalize_title(title);
        if wanted.is_empty() {
            return None;
        }
        self.papers.iter().find(|p| p.normalized_title() == wanted)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.find(id).is_some()
    }
}

/// Result of registering an uploaded PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub entry: PaperEntry,
    /// True when an entry with the same title already existed.
    pub reused: bool,
    /// Where the PDF was written.
    pub pdf_path: PathBuf,
}

/// Derive a readable identifier from an upload filename.
///
/// Lower-cases the stem and collapses each run of non-alphanumeric
/// characters into a single `_`. Runs at either end are dropped rather
/// than collapsed, so an id never starts or ends with `_` and
/// `_draft_.pdf` becomes `draft`. A stem with no alphanumerics yields
/// `paper`.
pub fn slugify(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    let mut out = String::with_capacity(stem.len());
    let mut pending_sep = false;
    for c in stem.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }

    if out.is_empty() {
        "paper".to_string()
    } else {
        out
    }
}

fn random_suffix() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..8].to_string()
}

/// Access to `metadata.json` and the PDFs beside it.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    papers_dir: PathBuf,
    project_root: PathBuf,
    lock: Mutex<()>,
}

impl Registry {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            path: config.registry_path(),
            papers_dir: config.papers_dir.clone(),
            project_root: config.project_root(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn papers_dir(&self) -> &Path {
        &self.papers_dir
    }

    /// Read the registry. A missing file is an error.
    pub fn load(&self) -> Result<RegistryDocument> {
        if !self.path.is_file() {
            return Err(PaperIndexError::Registry(format!(
                "registry not found at '{}'",
                self.path.display()
            )));
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            PaperIndexError::Registry(format!("cannot read '{}': {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PaperIndexError::Registry(format!("cannot parse '{}': {}", self.path.display(), e))
        })
    }

    /// Read the registry, treating a missing file as empty.
    pub fn load_or_default(&self) -> Result<RegistryDocument> {
        if self.path.exists() {
            self.load()
        } else {
            Ok(RegistryDocument::default())
        }
    }

    fn save(&self, doc: &RegistryDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| PaperIndexError::Registry(e.to_string()))?;
        write_atomic(&self.path, json.as_bytes())
            .map_err(|e| PaperIndexError::Registry(e.to_string()))
    }

    /// Look up one entry by id.
    pub fn find(&self, id: &str) -> Result<PaperEntry> {
        self.load()?
            .find(id)
            .cloned()
            .ok_or_else(|| PaperIndexError::PaperNotFound(id.to_string()))
    }

    /// Absolute-or-cwd-relative location of an entry's `file_path`.
    pub fn resolve_file_path(&self, file_path: &str) -> PathBuf {
        let path = Path::new(file_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// `file_path` value stored for a PDF named `{id}.pdf` in the papers dir.
    fn relative_pdf_path(&self, id: &str) -> String {
        let dir = self
            .papers_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("papers");
        format!("{}/{}.pdf", dir, id)
    }

    /// Identifier for a new upload, unique against disk and registry.
    pub fn derive_paper_id(&self, filename: &str, doc: &RegistryDocument) -> String {
        let base = slugify(filename);
        let taken = |id: &str| self.papers_dir.join(format!("{}.pdf", id)).exists() || doc.contains_id(id);
        if !taken(&base) {
            return base;
        }
        loop {
            let candidate = format!("{}_{}", base, random_suffix());
            if !taken(&candidate) {
                return candidate;
            }
        }
    }

    /// Register an uploaded PDF.
    ///
    /// A title that matches an existing entry reuses that entry's id and
    /// overwrites its PDF in place; otherwise a new entry is appended.
    pub async fn submit(&self, filename: &str, pdf: &[u8]) -> Result<Submission> {
        let _guard = self.lock.lock().await;

        let title = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename)
            .to_string();

        let mut doc = self.load_or_default()?;

        if let Some(pos) = doc.papers.iter().position(|p| p.normalized_title() == normalize_title(&title)) {
            let mut entry = doc.papers[pos].clone();
            let file_path = match entry.file_path.as_deref().filter(|p| !p.is_empty()) {
                Some(existing) => existing.to_string(),
                None => self.relative_pdf_path(&entry.id),
            };
            let pdf_path = self.resolve_file_path(&file_path);
            write_atomic(&pdf_path, pdf)?;

            if entry.file_path.as_deref() != Some(file_path.as_str()) {
                entry.file_path = Some(file_path);
                doc.papers[pos] = entry.clone();
                self.save(&doc)?;
            }

            info!(paper_id = %entry.id, "existing paper updated in place");
            return Ok(Submission {
                entry,
                reused: true,
                pdf_path,
            });
        }

        let id = self.derive_paper_id(filename, &doc);
        let file_path = self.relative_pdf_path(&id);
        let pdf_path = self.papers_dir.join(format!("{}.pdf", id));
        write_atomic(&pdf_path, pdf)?;

        let entry = PaperEntry::uploaded(&id, title, file_path);
        doc.papers.push(entry.clone());
        self.save(&doc)?;

        info!(paper_id = %id, "new paper registered");
        Ok(Submission {
            entry,
            reused: false,
            pdf_path,
        })
    }
}
