//! Small async file helpers shared by the JSON and JSONL stores.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

pub(crate) async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// `Ok(None)` when the file does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(content) => {
            let value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

pub(crate) async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    replace_file(path, content).await
}

/// Rows that fail to parse are skipped with a warning naming `what`.
pub(crate) async fn read_jsonl<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let file = match fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
    };

    let mut lines = BufReader::new(file).lines();
    let mut items = Vec::new();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("Failed to read line")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(item) => items.push(item),
            Err(err) => warn!(
                path = %path.display(),
                line = line_no,
                error = %err,
                "skipping malformed {what} row"
            ),
        }
    }
    Ok(items)
}

pub(crate) async fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut content = String::new();
    for item in items {
        content.push_str(&serde_json::to_string(item).context("Failed to serialize row")?);
        content.push('\n');
    }
    replace_file(path, content).await
}

/// Write to a sibling temp file, then rename over the target.
async fn replace_file(path: &Path, content: String) -> Result<()> {
    ensure_parent(path).await?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        n: u32,
    }

    #[tokio::test]
    async fn malformed_jsonl_rows_are_skipped() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("rows.jsonl");
        write_jsonl(&path, &[Row { n: 1 }, Row { n: 2 }]).await?;

        let mut content = fs::read_to_string(&path).await?;
        content.push_str("{not json\n");
        fs::write(&path, content).await?;

        let rows: Vec<Row> = read_jsonl(&path, "test").await?;
        assert_eq!(rows, vec![Row { n: 1 }, Row { n: 2 }]);
        Ok(())
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let rows: Vec<Row> = read_jsonl(&dir.path().join("none.jsonl"), "test").await?;
        assert!(rows.is_empty());
        let value: Option<Row> = read_json(&dir.path().join("none.json")).await?;
        assert!(value.is_none());
        Ok(())
    }
}
