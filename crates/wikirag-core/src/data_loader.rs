use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::traits::TextSource;
use crate::types::{SourceRecord, SourceText};

/// Offline [`TextSource`] backed by a `.txt` file or a directory of them.
///
/// The topic is ignored: whatever lives under `root` is the reference text.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    pub fn load(&self) -> Result<SourceText> {
        let files = if self.root.is_file() { vec![self.root.clone()] } else { list_txt_files(&self.root) };
        if files.is_empty() {
            info!(root = %self.root.display(), "no .txt files found");
            return Ok(SourceText::Records(vec![]));
        }
        let mut records = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            debug!("Reading file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let text = read_file_content(file_path)?;
            records.push(SourceRecord { title: Some(extract_doc_id(file_path)), text });
        }
        info!("Loaded {} files from {}", records.len(), self.root.display());
        Ok(SourceText::Records(records))
    }
}

#[async_trait]
impl TextSource for FileSource {
    async fn fetch(&self, _topic: &str) -> Result<SourceText> { self.load() }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn extract_doc_id(file_path: &Path) -> String {
    file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
    }
    txt_files.sort();
    txt_files
}
