//! Text extraction from analysis artifacts.

use std::path::Path;
use std::time::Duration;

use yomi_core::naming::{translatable_kind, SourceKind};

use crate::analysis::display_name;
use crate::error::PipelineError;

/// Upper bound for one PDF extraction; some fonts make the parser spin.
const PDF_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Read the translatable text of an artifact.
///
/// Text-like files are decoded as UTF-8 with invalid bytes replaced. PDFs go
/// through `pdf-extract` on the blocking pool; a malformed document (parse
/// error, parser panic, timeout) is an [`PipelineError::Extraction`].
pub async fn extract_text(path: &Path) -> Result<String, PipelineError> {
    let file = display_name(path);
    let kind = translatable_kind(path).ok_or_else(|| PipelineError::Extraction {
        file: file.clone(),
        message: "unsupported artifact type".to_string(),
    })?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::Extraction {
            file: file.clone(),
            message: e.to_string(),
        })?;

    match kind {
        SourceKind::Text => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        SourceKind::Pdf => extract_pdf(file, bytes).await,
    }
}

async fn extract_pdf(file: String, bytes: Vec<u8>) -> Result<String, PipelineError> {
    let task = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes));

    let extraction_error = |message: String| PipelineError::Extraction {
        file: file.clone(),
        message,
    };

    match tokio::time::timeout(PDF_EXTRACT_TIMEOUT, task).await {
        Ok(Ok(Ok(text))) => Ok(text),
        Ok(Ok(Err(e))) => Err(extraction_error(e.to_string())),
        Ok(Err(join)) => Err(extraction_error(format!("parser aborted: {join}"))),
        Err(_) => Err(extraction_error(format!(
            "timed out after {}s",
            PDF_EXTRACT_TIMEOUT.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn text_artifact_is_read_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.md");
        let mut bytes = "日本語のテキスト".as_bytes().to_vec();
        bytes.push(0xff);
        std::fs::write(&path, bytes).unwrap();

        let text = extract_text(&path).await.unwrap();
        assert!(text.starts_with("日本語のテキスト"));
        assert!(text.ends_with('\u{FFFD}'));
    }

    #[tokio::test]
    async fn malformed_pdf_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        assert_matches!(
            extract_text(&path).await,
            Err(PipelineError::Extraction { file, .. }) if file == "broken.pdf"
        );
    }

    #[tokio::test]
    async fn image_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_vis.png");
        std::fs::write(&path, b"png").unwrap();
        assert_matches!(extract_text(&path).await, Err(PipelineError::Extraction { .. }));
    }
}
