use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::connector_brave;
use crate::connector_fs;
use crate::connector_url;
use crate::models::{Document, SourceKind};

/// What to ingest, as chosen on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    Brave { query: String },
    Url { url: String },
    File { path: PathBuf },
}

impl SourceRequest {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRequest::Brave { .. } => SourceKind::Brave,
            SourceRequest::Url { .. } => SourceKind::Url,
            SourceRequest::File { .. } => SourceKind::File,
        }
    }
}

/// Retrieve the requested content as a [`Document`].
///
/// Fails when the source yields no text, since there is nothing to chunk.
pub async fn retrieve(
    config: &Config,
    request: &SourceRequest,
    tag: Option<String>,
) -> Result<Document> {
    let timeout = Duration::from_secs(config.fetch.timeout_secs);
    let doc = match request {
        SourceRequest::Brave { query } => {
            let api_key = std::env::var("BRAVE_API_KEY")
                .map_err(|_| anyhow!("BRAVE_API_KEY environment variable not set"))?;
            connector_brave::search_brave(&config.brave, timeout, &api_key, query, tag).await?
        }
        SourceRequest::Url { url } => connector_url::fetch_url(url, timeout, tag).await?,
        SourceRequest::File { path } => connector_fs::read_file(path, tag)?,
    };

    if doc.content.trim().is_empty() {
        bail!("No content retrieved from {}", request.kind().label());
    }

    tracing::info!(
        source = request.kind().label(),
        chars = doc.content.chars().count(),
        "content retrieved"
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_request_reads_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "Some notes.").unwrap();

        let request = SourceRequest::File { path };
        let doc = retrieve(&Config::default(), &request, Some("notes".to_string()))
            .await
            .unwrap();
        assert_eq!(doc.content, "Some notes.");
        assert_eq!(doc.metadata.tag, "notes");
    }

    #[tokio::test]
    async fn blank_content_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blank.txt");
        std::fs::write(&path, " \n\n ").unwrap();

        let err = retrieve(&Config::default(), &SourceRequest::File { path }, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No content retrieved"));
    }
}
