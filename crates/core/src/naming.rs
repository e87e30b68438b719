//! Artifact naming and classification conventions.
//!
//! Job layout on disk: `<output_root>/<job_id>/results/<artifact>`, with the
//! translation manifest stored next to (not inside) the results directory.

use std::path::Path;

use crate::job::TextContainer;

/// Name of the per-job directory that receives analysis artifacts.
pub const RESULTS_DIR: &str = "results";

/// Name of the per-job translation manifest file.
pub const TRANSLATION_MANIFEST: &str = "translations.json";

/// Artifact extensions whose content can be translated as-is.
pub const TEXT_LIKE_EXTENSIONS: &[&str] = &["md", "html", "txt", "json", "csv"];

/// Image extensions recognised as visualisation output.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// How an artifact must be read before translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Plain UTF-8 text, translated and written with the same extension.
    Text,
    /// PDF requiring text extraction, written into a text container.
    Pdf,
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Classify a produced artifact for translation, or `None` if it is not
/// translatable (images, unknown formats).
pub fn translatable_kind(path: &Path) -> Option<SourceKind> {
    let ext = extension_lowercase(path)?;
    if TEXT_LIKE_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Text)
    } else if ext == "pdf" {
        Some(SourceKind::Pdf)
    } else {
        None
    }
}

/// Whether an artifact looks like a visualisation image.
pub fn is_visualization(path: &Path) -> bool {
    let is_image = extension_lowercase(path)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    is_image && name.contains("vis")
}

/// File name of the translation written for `source_name`.
///
/// Convention: `translated_{lang}_{name}`. PDF sources keep their full name
/// and gain the extension of the container they are wrapped in, so `x.pdf`
/// and `x.html` never map to the same output.
///
/// ```
/// use yomi_core::job::TextContainer;
/// use yomi_core::naming::{translated_filename, SourceKind};
///
/// assert_eq!(
///     translated_filename("page_1.md", "fr", SourceKind::Text, TextContainer::Html),
///     "translated_fr_page_1.md",
/// );
/// assert_eq!(
///     translated_filename("scan.pdf", "en", SourceKind::Pdf, TextContainer::Html),
///     "translated_en_scan.pdf.html",
/// );
/// ```
pub fn translated_filename(
    source_name: &str,
    target_lang: &str,
    kind: SourceKind,
    container: TextContainer,
) -> String {
    match kind {
        SourceKind::Text => format!("translated_{target_lang}_{source_name}"),
        SourceKind::Pdf => {
            format!("translated_{target_lang}_{source_name}.{}", container.extension())
        }
    }
}
