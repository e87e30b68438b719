//! Translation stage: turn analysis artifacts into translated siblings.
//!
//! The set of artifacts is captured once, before anything is written, and
//! every output is recorded in the job's translation manifest. Failures are
//! file-scoped: a file that cannot be extracted or translated is logged and
//! the next one is attempted.

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use yomi_core::job::{LogLevel, TextContainer, TranslationConfig};
use yomi_core::naming::{translatable_kind, translated_filename, SourceKind};
use yomi_core::progress::stage_progress;
use yomi_core::script::{annotate_untranslated, count_source_script_chars, language_name};
use yomi_ollama::types::{ChatOptions, ChatRequest};
use yomi_ollama::{OllamaApi, OllamaApiError};

use crate::analysis::display_name;
use crate::artifacts::{translation_candidates, JobPaths, ManifestEntry, TranslationManifest};
use crate::error::PipelineError;
use crate::extract::extract_text;
use crate::joblog::JobLog;

/// System prompt used when a job does not bring its own template.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a professional translator. \
Translate the following Japanese text to {target_lang}. \
Return ONLY the translation, nothing else.";

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// One bounded translation call.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub model: String,
    pub system_prompt: String,
    pub text: String,
    pub num_ctx: u32,
}

/// The LLM side of the translation stage.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Fail unless `model` can serve requests.
    async fn ensure_model(&self, model: &str) -> Result<(), PipelineError>;

    /// Translate `request.text`, returning only the translated text.
    async fn translate(&self, request: &TranslationRequest) -> Result<String, PipelineError>;
}

#[async_trait]
impl TranslationBackend for OllamaApi {
    async fn ensure_model(&self, model: &str) -> Result<(), PipelineError> {
        OllamaApi::ensure_model(self, model)
            .await
            .map_err(|e| service_error(self, e))
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<String, PipelineError> {
        let chat = ChatRequest::new(
            &request.model,
            &request.system_prompt,
            &request.text,
            ChatOptions {
                num_ctx: request.num_ctx,
                ..ChatOptions::default()
            },
        );
        let response = self.chat(&chat).await.map_err(|e| service_error(self, e))?;
        if let Some(ns) = response.total_duration {
            tracing::debug!(model = %response.model, secs = ns / 1_000_000_000, "Translation generated");
        }
        Ok(strip_reasoning(&response.message.content))
    }
}

fn service_error(api: &OllamaApi, e: OllamaApiError) -> PipelineError {
    if e.is_unreachable() {
        PipelineError::TranslationService(format!(
            "LLM service not reachable at {}: {e}",
            api.config().base_url
        ))
    } else {
        PipelineError::TranslationService(e.to_string())
    }
}

/// Limits applied to every translation request.
#[derive(Debug, Clone, Copy)]
pub struct TranslationLimits {
    pub max_input_chars: usize,
    pub min_source_chars: usize,
}

/// Per-stage counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationSummary {
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// System prompt for `target_lang`, substituting `{target_lang}` in the
/// template with the language's English name.
pub fn system_prompt(template: Option<&str>, target_lang: &str) -> String {
    template
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_PROMPT_TEMPLATE)
        .replace("{target_lang}", language_name(target_lang))
}

/// Remove `<think>...</think>` reasoning blocks some models emit.
pub fn strip_reasoning(text: &str) -> String {
    THINK_BLOCK_RE.replace_all(text, "").trim().to_string()
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Wrap a translation of a binary document in the configured text container.
pub fn wrap_in_container(
    container: TextContainer,
    translation: &str,
    source_name: &str,
    target_lang: &str,
) -> String {
    match container {
        TextContainer::Html => format!(
            "<!DOCTYPE html>\n<html lang=\"{lang}\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n</head>\n<body>\n<pre>{body}</pre>\n</body>\n</html>\n",
            lang = escape_html(target_lang),
            title = escape_html(source_name),
            body = escape_html(translation),
        ),
        TextContainer::Json => serde_json::json!({
            "source": source_name,
            "language": target_lang,
            "translation": translation,
        })
        .to_string(),
        TextContainer::Md | TextContainer::Txt => translation.to_string(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Translation stage of one job.
pub struct TranslationStage<'a> {
    pub log: &'a JobLog,
    pub backend: &'a dyn TranslationBackend,
    pub paths: &'a JobPaths,
    pub config: &'a TranslationConfig,
    pub limits: TranslationLimits,
    /// Progress band `[start, end]` the stage reports into.
    pub progress: (f32, f32),
}

impl TranslationStage<'_> {
    pub async fn run(&self) -> Result<TranslationSummary, PipelineError> {
        let (start, end) = self.progress;
        let lang = language_name(&self.config.target_lang);
        let model = self.config.model.as_str();
        let mut summary = TranslationSummary::default();

        let candidates = translation_candidates(self.paths).await?;
        if candidates.is_empty() {
            self.log
                .warning("No text artifacts found to translate; try a text output format such as md");
            self.log.progress(end);
            return Ok(summary);
        }

        self.log.log(
            LogLevel::Info,
            format!(
                "Translating {} artifact(s) to {lang} with {model}",
                candidates.len()
            ),
            Some(start),
        );

        if let Err(e) = self.backend.ensure_model(model).await {
            self.log.error(e.to_string());
            self.log.warning(format!(
                "Skipping translation of {} artifact(s)",
                candidates.len()
            ));
            summary.skipped = candidates.len();
            self.log.progress(end);
            return Ok(summary);
        }

        let mut manifest = TranslationManifest::load(&self.paths.manifest).await?;
        let total = candidates.len();

        for (i, path) in candidates.iter().enumerate() {
            let name = display_name(path);
            self.log
                .info(format!("Translating file {}/{total}: {name}", i + 1));

            match self.translate_file(path, &name).await {
                Ok(Some(output)) => {
                    manifest.record(ManifestEntry {
                        source: name.clone(),
                        output: output.clone(),
                        language: self.config.target_lang.clone(),
                        model: model.to_string(),
                    });
                    manifest.save(&self.paths.manifest).await?;
                    self.log.success(format!("Saved {output}"));
                    summary.translated += 1;
                }
                Ok(None) => summary.skipped += 1,
                Err(e) if e.is_file_scoped() => {
                    self.log.error(format!("{name}: {e}"));
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }

            self.log.progress(stage_progress(start, end, i + 1, total));
        }

        self.log.info(format!(
            "Translation finished: {} translated, {} skipped, {} failed",
            summary.translated, summary.skipped, summary.failed
        ));
        Ok(summary)
    }

    /// Translate one artifact; `Ok(None)` when it carries no text.
    async fn translate_file(&self, path: &Path, name: &str) -> Result<Option<String>, PipelineError> {
        let kind = translatable_kind(path).unwrap_or(SourceKind::Text);
        let text = extract_text(path).await?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.log.info(format!("Skipping {name}: no text content"));
            return Ok(None);
        }

        let found = count_source_script_chars(trimmed);
        let translation = if found < self.limits.min_source_chars {
            self.log.warning(format!(
                "{name}: only {found} Japanese characters detected, keeping original text"
            ));
            annotate_untranslated(trimmed, found, self.limits.min_source_chars)
        } else {
            let bounded = truncate_chars(trimmed, self.limits.max_input_chars);
            if bounded.len() < trimmed.len() {
                self.log.info(format!(
                    "{name}: text limited to {} characters",
                    self.limits.max_input_chars
                ));
            }
            let request = TranslationRequest {
                model: self.config.model.clone(),
                system_prompt: system_prompt(
                    self.config.prompt_template.as_deref(),
                    &self.config.target_lang,
                ),
                text: bounded.to_string(),
                num_ctx: self.config.num_ctx,
            };
            let translated = self.backend.translate(&request).await?;
            if translated.trim().is_empty() {
                return Err(PipelineError::TranslationService(
                    "model returned an empty translation".to_string(),
                ));
            }
            translated
        };

        let output = translated_filename(
            name,
            &self.config.target_lang,
            kind,
            self.config.pdf_container,
        );
        let content = match kind {
            SourceKind::Text => translation,
            SourceKind::Pdf => wrap_in_container(
                self.config.pdf_container,
                &translation,
                name,
                &self.config.target_lang,
            ),
        };
        tokio::fs::write(self.paths.results.join(&output), content).await?;
        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- prompt -----------------------------------------------------------

    #[test]
    fn default_prompt_names_language() {
        let prompt = system_prompt(None, "fr");
        assert!(prompt.contains("to French."));
        assert!(!prompt.contains("{target_lang}"));
    }

    #[test]
    fn custom_template_is_substituted() {
        assert_eq!(
            system_prompt(Some("Translate into {target_lang}, keep tables."), "de"),
            "Translate into German, keep tables."
        );
    }

    #[test]
    fn blank_template_falls_back_to_default() {
        assert_eq!(system_prompt(Some("  "), "en"), system_prompt(None, "en"));
    }

    // -- response cleanup -------------------------------------------------

    #[test]
    fn reasoning_blocks_are_removed() {
        assert_eq!(
            strip_reasoning("<think>\nlet me think\n</think>\n\nBonjour"),
            "Bonjour"
        );
        assert_eq!(strip_reasoning("  plain  "), "plain");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    // -- containers -------------------------------------------------------

    #[test]
    fn html_container_escapes_content() {
        let html = wrap_in_container(TextContainer::Html, "a < b & c", "scan.pdf", "fr");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<pre>a &lt; b &amp; c</pre>"));
        assert!(html.contains("<title>scan.pdf</title>"));
    }

    #[test]
    fn json_container_carries_metadata() {
        let json = wrap_in_container(TextContainer::Json, "Bonjour", "scan.pdf", "fr");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["source"], "scan.pdf");
        assert_eq!(value["language"], "fr");
        assert_eq!(value["translation"], "Bonjour");
    }

    #[test]
    fn plain_containers_are_verbatim() {
        assert_eq!(wrap_in_container(TextContainer::Txt, "x", "s.pdf", "fr"), "x");
        assert_eq!(wrap_in_container(TextContainer::Md, "x", "s.pdf", "fr"), "x");
    }
}
