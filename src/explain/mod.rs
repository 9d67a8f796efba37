//! Natural-language explanations of ranked results via a chat model.
//!
//! The primary model is tried first and the fallback model second. Replies
//! are parsed leniently: reasoning models wrap their JSON in prose or code
//! fences, so the parser tries the whole reply, then the first fenced block,
//! then the outermost brace span, and finally keeps the raw text.

mod prompt;
mod provider;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ranker::RankedCandidate;

pub use prompt::build_prompt;
pub use provider::{ChatProvider, LlmProvider, ProviderRequest};

/// Primary explanation model.
pub const DEFAULT_PRIMARY_MODEL: &str = "deepseek-ai/DeepSeek-R1-Distill-Llama-70B-free";
/// Model used when the primary one fails.
pub const DEFAULT_FALLBACK_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free";
/// Text returned when neither model answers.
pub const UNAVAILABLE_TEXT: &str = "Unable to generate explanations at this time.";

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("valid fence regex"));
static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think regex"));

/// Overall and per-job explanation text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// One paragraph about the result set as a whole.
    #[serde(default)]
    pub overall_explanation: String,
    /// Explanation per job id; ids the model skipped are absent.
    #[serde(default, deserialize_with = "text_map")]
    pub job_explanations: BTreeMap<String, String>,
}

impl Explanation {
    /// Explanation carrying only free text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            overall_explanation: text.into(),
            job_explanations: BTreeMap::new(),
        }
    }

    /// The fixed answer used when no model responded.
    pub fn unavailable() -> Self {
        Self::plain(UNAVAILABLE_TEXT)
    }

    /// Explanation for one job, if the model wrote one.
    pub fn for_job(&self, job_id: &str) -> Option<&str> {
        self.job_explanations.get(job_id).map(String::as_str)
    }
}

/// Models sometimes answer with numbers or nested objects as values; those
/// are kept as their JSON text.
fn text_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct TextMapVisitor;

    impl<'de> Visitor<'de> for TextMapVisitor {
        type Value = BTreeMap<String, String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of job id to explanation")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(BTreeMap::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = BTreeMap::new();
            while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
                let text = match value {
                    serde_json::Value::String(text) => text,
                    serde_json::Value::Null => continue,
                    other => other.to_string(),
                };
                out.insert(key, text);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(TextMapVisitor)
}

/// Parses a model reply into an [`Explanation`], never failing.
pub fn parse_explanation(reply: &str) -> Explanation {
    let text = THINK_BLOCK.replace_all(reply, "");
    let text = text.trim();

    if let Some(parsed) = parse_object(text) {
        return parsed;
    }
    if let Some(block) = FENCED_BLOCK.captures(text).and_then(|caps| caps.get(1)) {
        if let Some(parsed) = parse_object(block.as_str()) {
            return parsed;
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(parsed) = parse_object(&text[start..=end]) {
                return parsed;
            }
        }
    }
    tracing::debug!("explanation reply was not JSON; keeping raw text");
    Explanation::plain(text)
}

fn parse_object(text: &str) -> Option<Explanation> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Explanation generator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainerConfig {
    /// Model tried first.
    pub primary_model: String,
    /// Model tried when the primary one fails.
    pub fallback_model: String,
    /// Upper bound on candidates included in the prompt.
    pub max_jobs: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            max_jobs: 10,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// Explains ranked results with a chat model, falling back on failure.
#[derive(Clone)]
pub struct Explainer {
    provider: Arc<dyn LlmProvider>,
    config: ExplainerConfig,
}

impl Explainer {
    /// Wraps a provider with the given settings.
    pub fn new(provider: Arc<dyn LlmProvider>, config: ExplainerConfig) -> Self {
        Self { provider, config }
    }

    /// Active settings.
    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Explains `candidates` for `query`. Blocking; never fails.
    pub fn explain(&self, query: &str, candidates: &[RankedCandidate]) -> Explanation {
        let shown = &candidates[..candidates.len().min(self.config.max_jobs)];
        let prompt = build_prompt(query, shown);
        let mut request = ProviderRequest {
            model: &self.config.primary_model,
            prompt: &prompt,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let reply = match self.provider.answer(&request) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(
                    model = %self.config.primary_model,
                    "explanation model failed, trying fallback: {err}"
                );
                request.model = &self.config.fallback_model;
                match self.provider.answer(&request) {
                    Ok(reply) => reply,
                    Err(err) => {
                        tracing::error!(
                            model = %self.config.fallback_model,
                            "fallback explanation model failed: {err}"
                        );
                        return Explanation::unavailable();
                    }
                }
            }
        };
        parse_explanation(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{JobId, JobRecord};
    use crate::error::UpstreamError;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_raw_json() {
        let parsed = parse_explanation(
            r#"{"overall_explanation": "Good matches.", "job_explanations": {"1": "Rust heavy.", "2": 3}}"#,
        );
        assert_eq!(parsed.overall_explanation, "Good matches.");
        assert_eq!(parsed.for_job("1"), Some("Rust heavy."));
        assert_eq!(parsed.for_job("2"), Some("3"));
    }

    #[test]
    fn parses_fenced_json_after_reasoning() {
        let reply = "<think>the user wants {rust}</think>\nHere you go:\n```json\n{\"overall_explanation\": \"Fenced.\", \"job_explanations\": {}}\n```\nThanks!";
        assert_eq!(parse_explanation(reply), Explanation::plain("Fenced."));
    }

    #[test]
    fn parses_embedded_brace_span() {
        let reply = "Sure! {\"overall_explanation\": \"Embedded.\", \"job_explanations\": {\"9\": \"Remote.\"}} Hope it helps.";
        let parsed = parse_explanation(reply);
        assert_eq!(parsed.overall_explanation, "Embedded.");
        assert_eq!(parsed.for_job("9"), Some("Remote."));
    }

    #[test]
    fn plain_text_becomes_overall_explanation() {
        let parsed = parse_explanation("These jobs all mention Python.");
        assert_eq!(parsed, Explanation::plain("These jobs all mention Python."));
    }

    struct ScriptedProvider {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl LlmProvider for ScriptedProvider {
        fn answer(&self, request: &ProviderRequest<'_>) -> Result<String, UpstreamError> {
            let jobs = request.prompt.matches("\"similarity_score\"").count();
            self.calls.lock().push((request.model.to_string(), jobs));
            if self.failing.iter().any(|model| *model == request.model) {
                return Err(UpstreamError::Status {
                    status: 503,
                    body: "busy".into(),
                });
            }
            Ok(format!(
                r#"{{"overall_explanation": "from {}", "job_explanations": {{}}}}"#,
                request.model
            ))
        }
    }

    fn candidates(count: usize) -> Vec<RankedCandidate> {
        (0..count)
            .map(|idx| RankedCandidate {
                job_id: JobId::new(idx.to_string()),
                similarity: 0.9,
                job: JobRecord::default(),
            })
            .collect()
    }

    #[test]
    fn falls_back_and_caps_prompt_jobs() {
        let provider = Arc::new(ScriptedProvider {
            failing: vec![DEFAULT_PRIMARY_MODEL],
            calls: Mutex::new(Vec::new()),
        });
        let explainer = Explainer::new(provider.clone(), ExplainerConfig::default());
        let explanation = explainer.explain("rust", &candidates(14));
        assert_eq!(
            explanation.overall_explanation,
            format!("from {DEFAULT_FALLBACK_MODEL}")
        );
        let calls = provider.calls.lock().clone();
        assert_eq!(
            calls,
            vec![
                (DEFAULT_PRIMARY_MODEL.to_string(), 10),
                (DEFAULT_FALLBACK_MODEL.to_string(), 10)
            ]
        );
    }

    #[test]
    fn both_models_failing_yields_fixed_text() {
        let provider = Arc::new(ScriptedProvider {
            failing: vec![DEFAULT_PRIMARY_MODEL, DEFAULT_FALLBACK_MODEL],
            calls: Mutex::new(Vec::new()),
        });
        let explainer = Explainer::new(provider, ExplainerConfig::default());
        assert_eq!(
            explainer.explain("rust", &candidates(2)),
            Explanation::unavailable()
        );
    }
}
