//! Flat-file cache: one file per reputation source, newline-delimited
//! normalized entries. Used only as refresh-failure fallback and restart
//! warm-start.

use std::collections::HashSet;
use std::io;
use std::path::Path;

/// Persist normalized entries as a sorted, deduplicated, newline-delimited
/// list. Creates parent directories as needed.
pub async fn write_entries(path: &Path, entries: &HashSet<String>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut sorted: Vec<&str> = entries.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    tokio::fs::write(path, sorted.join("\n")).await?;
    log::debug!("Cached {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Reload a cache file written by [`write_entries`]. Blank lines are
/// skipped; entries are assumed already normalized.
pub async fn read_entries(path: &Path) -> io::Result<HashSet<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blacklists").join("source.txt");

        let entries: HashSet<String> = ["10.0.0.1", "1.2.3.4", "192.168.0.1"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        write_entries(&path, &entries).await.unwrap();
        let reloaded = read_entries(&path).await.unwrap();
        assert_eq!(reloaded, entries);
    }

    #[tokio::test]
    async fn test_written_file_is_sorted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("domains.txt");

        let entries: HashSet<String> = ["zmail.example", "amail.example", "mmail.example"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        write_entries(&path, &entries).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "amail.example\nmmail.example\nzmail.example");
    }

    #[tokio::test]
    async fn test_read_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sparse.txt");
        tokio::fs::write(&path, "a.example\n\n  \nb.example\n")
            .await
            .unwrap();

        let entries = read_entries(&path).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains("a.example"));
        assert!(entries.contains("b.example"));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_entries(&dir.path().join("nope.txt")).await;
        assert!(result.is_err());
    }
}
