//! File read + parse fan-out with Rayon-based parallelism.
//!
//! Workers only produce `SourceFile`s; inserting them into the graph is left
//! to the single caller thread.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::warn;

use crate::indexer::filesystem::read_source;
use crate::indexer::parser::parse_path;
use crate::models::SourceFile;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorStage {
    Read,
    Parse,
}

#[derive(Debug)]
pub struct ExtractionResult {
    pub path: PathBuf,
    pub file: Option<SourceFile>,
    pub error_stage: Option<ErrorStage>,
    pub error_message: Option<String>,
}

impl ExtractionResult {
    fn failed(path: &Path, stage: ErrorStage, message: String) -> Self {
        warn!(path = %path.display(), ?stage, error = %message, "file skipped");
        Self {
            path: path.to_path_buf(),
            file: None,
            error_stage: Some(stage),
            error_message: Some(message),
        }
    }
}

pub fn extract_file_worker(path: &Path) -> ExtractionResult {
    let text = match read_source(path) {
        Ok(text) => text,
        Err(err) => return ExtractionResult::failed(path, ErrorStage::Read, err.to_string()),
    };
    match parse_path(path, text) {
        Ok(file) => ExtractionResult {
            path: path.to_path_buf(),
            file,
            error_stage: None,
            error_message: None,
        },
        Err(err) => ExtractionResult::failed(path, ErrorStage::Parse, err.to_string()),
    }
}

/// Read and parse `paths` on a pool of `workers` threads, preserving input
/// order in the output.
pub fn parallel_extract(paths: &[PathBuf], workers: usize) -> Vec<ExtractionResult> {
    if paths.is_empty() {
        return vec![];
    }
    if paths.len() == 1 || workers <= 1 {
        return paths.iter().map(|path| extract_file_worker(path)).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    match pool {
        Ok(pool) => pool.install(|| {
            paths
                .par_iter()
                .map(|path| extract_file_worker(path))
                .collect()
        }),
        Err(err) => {
            warn!(error = %err, "thread pool unavailable, parsing sequentially");
            paths.iter().map(|path| extract_file_worker(path)).collect()
        }
    }
}
