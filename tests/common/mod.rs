//! Shared helpers: generated PDFs and a scripted completion backend.

#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use paper_tree_indexer::config::IndexConfig;
use paper_tree_indexer::error::{PaperIndexError, Result};
use paper_tree_indexer::generator::TreeGenerator;
use paper_tree_indexer::indexer::IndexStore;
use paper_tree_indexer::llm::{CompletionBackend, Message};
use paper_tree_indexer::registry::Registry;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Build a PDF with one text line per page. Empty strings give blank pages.
pub fn make_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// One scripted reply.
pub enum Reply {
    Text(String),
    Fail(String),
}

/// Returns queued replies in order and records every request.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    pub requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Reply::Text(t.to_string())).collect())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(cause)) => Err(PaperIndexError::Generation(cause)),
            None => Err(PaperIndexError::Generation("no scripted reply left".into())),
        }
    }
}

/// A store rooted in a temp dir, with `papers/` as its papers dir.
pub fn store_with(dir: &TempDir, backend: Arc<ScriptedBackend>) -> IndexStore {
    store_in(dir, Some(TreeGenerator::new(backend)))
}

/// Same layout as [`store_with`], but with no completion credential.
pub fn store_without_generator(dir: &TempDir) -> IndexStore {
    store_in(dir, None)
}

fn store_in(dir: &TempDir, generator: Option<TreeGenerator>) -> IndexStore {
    let config = IndexConfig {
        papers_dir: dir.path().join("papers"),
        ..Default::default()
    };
    let registry = Arc::new(Registry::new(&config));
    IndexStore::new(config, registry, generator)
}

/// Write `metadata.json` with the given JSON document.
pub fn write_registry(dir: &TempDir, json: &str) {
    let papers = dir.path().join("papers");
    std::fs::create_dir_all(&papers).unwrap();
    std::fs::write(papers.join("metadata.json"), json).unwrap();
}

/// Write a PDF into `papers/`.
pub fn write_pdf(dir: &TempDir, name: &str, pages: &[&str]) {
    let papers = dir.path().join("papers");
    std::fs::create_dir_all(&papers).unwrap();
    std::fs::write(papers.join(name), make_pdf(pages)).unwrap();
}

pub fn papers_dir(dir: &TempDir) -> PathBuf {
    dir.path().join("papers")
}
