mod config_cmd;
mod local;
mod status;
mod sync_cmd;
mod word;

pub use config_cmd::ConfigCommand;
pub use local::LocalCommand;
pub use status::StatusCommand;
pub use sync_cmd::SyncCommand;
pub use word::WordCommand;

use clap::ValueEnum;
use std::io::Read;
use std::path::Path;

use etymos::conflict::DiffEntry;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reads a YAML document from a file, or from stdin when the path is `-`.
pub fn read_document(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e).into())
}

pub fn print_diff(diff: &[DiffEntry]) {
    print!("{}", format_diff(diff));
}

/// Renders a diff grouped under its top-level section headings.
fn format_diff(diff: &[DiffEntry]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;
    for entry in diff {
        let section = entry.section();
        if section != current || out.is_empty() {
            out.push_str(&format!("  [{}]\n", section.unwrap_or("root")));
            current = section;
        }
        out.push_str(&format!("    {:?}  {}\n", entry.kind(), entry.path_string()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_document_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("word.yaml");
        std::fs::write(&path, "yield:\n  lemma: \"apple\"\n").unwrap();

        let raw = read_document(&path).unwrap();
        assert!(raw.contains("apple"));
    }

    #[test]
    fn test_format_diff_groups_by_section() {
        let old = serde_json::json!({
            "yield": { "lemma": "walk", "part_of_speech": "Verb" },
            "etymology": { "origin": "Old English" }
        });
        let new = serde_json::json!({
            "yield": { "lemma": "walk", "part_of_speech": "Noun", "syllabification": "walk" },
            "etymology": { "origin": "Middle English" }
        });
        let report = etymos::conflict::analyze(&old, &new);

        let text = format_diff(&report.diff);
        assert_eq!(text.matches("[yield]").count(), 1);
        assert_eq!(text.matches("[etymology]").count(), 1);
        assert!(text.contains("yield.part_of_speech"));
        assert!(text.contains("etymology.origin"));
        assert!(format_diff(&[]).is_empty());
    }

    #[test]
    fn test_read_document_missing_file() {
        let err = read_document(Path::new("/nonexistent/word.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/word.yaml"));
    }
}
