//! Loading the pre-embedded evidence corpus

use desk_flow::store::Document;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read one [`Document`] per JSONL line.
///
/// Lines that don't parse or carry no usable vector are skipped with a warning.
pub fn load_corpus(path: &Path) -> std::io::Result<Vec<Document>> {
    let reader = BufReader::new(File::open(path)?);
    let mut documents = Vec::new();
    let mut skipped = 0usize;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some(document) => documents.push(document),
            None => {
                skipped += 1;
                tracing::warn!("{}:{}: skipping unusable corpus line", path.display(), number + 1);
            }
        }
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} corpus lines in {}", skipped, path.display());
    }
    tracing::debug!("Loaded {} passages from {}", documents.len(), path.display());
    Ok(documents)
}

fn parse_line(line: &str) -> Option<Document> {
    let document: Document = serde_json::from_str(line).ok()?;
    let usable = !document.text.trim().is_empty()
        && !document.embedding.is_empty()
        && document.embedding.iter().all(|v| v.is_finite());
    usable.then_some(document)
}
