use anyhow::{Context, Result};
use std::path::Path;

use crate::models::{Document, DocumentMetadata, Origin};

/// Read a local UTF-8 file into a [`Document`].
pub fn read_file(path: &Path, tag: Option<String>) -> Result<Document> {
    tracing::info!(path = %path.display(), "reading file");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    Ok(Document {
        content,
        metadata: DocumentMetadata::new(file_origin(path), tag),
    })
}

fn file_origin(path: &Path) -> Origin {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    Origin::File {
        file_path: path.display().to_string(),
        file_name,
        file_ext,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_content_and_path_metadata() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("guide.md");
        std::fs::write(&path, "# Guide\n\nMeasure twice.").unwrap();

        let doc = read_file(&path, None).unwrap();
        assert_eq!(doc.content, "# Guide\n\nMeasure twice.");
        assert_eq!(doc.metadata.tag, "local_file");
        match &doc.metadata.origin {
            Origin::File {
                file_path,
                file_name,
                file_ext,
            } => {
                assert_eq!(file_path, &path.display().to_string());
                assert_eq!(file_name, "guide.md");
                assert_eq!(file_ext, ".md");
            }
            other => panic!("unexpected origin {:?}", other),
        }
    }

    #[test]
    fn extension_is_empty_when_missing() {
        match file_origin(Path::new("/tmp/README")) {
            Origin::File { file_ext, .. } => assert_eq!(file_ext, ""),
            other => panic!("unexpected origin {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = read_file(&tmp.path().join("absent.txt"), None).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }
}
