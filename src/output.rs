use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::qa::QaPair;

/// Write one JSON object per line, replacing any previous file.
///
/// `on_progress` receives the percentage of pairs written. Returns the number of lines.
pub fn write_jsonl(path: &Path, pairs: &[QaPair], mut on_progress: impl FnMut(f64)) -> Result<usize> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let total = pairs.len();

    for (i, pair) in pairs.iter().enumerate() {
        serde_json::to_writer(&mut writer, pair)
            .with_context(|| format!("Failed to write pair {} to {}", i, path.display()))?;
        writer.write_all(b"\n")?;
        on_progress((i + 1) as f64 / total as f64 * 100.0);
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    if total == 0 {
        on_progress(100.0);
    }
    Ok(total)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qa::QaSource;

    fn pair(n: usize) -> QaPair {
        QaPair {
            question: format!("What does Section {} provide?", n),
            answer: format!("Answer {} with \"quotes\"\nand a newline", n),
            source: QaSource {
                document_id: "node-1".into(),
                section_title: format!("Section {}", n),
                document_title: "Test Act".into(),
            },
        }
    }

    #[test]
    fn one_line_per_pair_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa_pairs.jsonl");
        let pairs: Vec<_> = (1..=3).map(pair).collect();
        let mut seen = Vec::new();

        let n = write_jsonl(&path, &pairs, |p| seen.push(p)).unwrap();
        assert_eq!(n, 3);
        assert_eq!(seen.last().copied(), Some(100.0));

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 3);
        let back: Vec<QaPair> = lines.iter().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(back, pairs);
    }

    #[test]
    fn existing_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa_pairs.jsonl");
        std::fs::write(&path, "stale\nstale\nstale\nstale\n").unwrap();

        write_jsonl(&path, &[pair(9)], |_| {}).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 1);
        assert!(raw.contains("Section 9"));
    }

    #[test]
    fn empty_input_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa_pairs.jsonl");
        let mut last = 0.0;
        assert_eq!(write_jsonl(&path, &[], |p| last = p).unwrap(), 0);
        assert_eq!(last, 100.0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
