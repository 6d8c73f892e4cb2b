use crate::error::FacetLensError;
use crate::lens::client::{ModelRequest, ModelTransport};
use crate::lens::config::ModelSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::env;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProvider {
    OpenAi,
    Anthropic,
    Gemini,
    OpenAiCompatible,
}

impl RemoteProvider {
    pub fn label(self) -> &'static str {
        match self {
            RemoteProvider::OpenAi => "openai",
            RemoteProvider::Anthropic => "anthropic",
            RemoteProvider::Gemini => "gemini",
            RemoteProvider::OpenAiCompatible => "openai-compatible",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteModelConfig {
    pub provider: RemoteProvider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

pub fn parse_provider_alias(raw: &str) -> Option<RemoteProvider> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "openai" => Some(RemoteProvider::OpenAi),
        "anthropic" | "claude" => Some(RemoteProvider::Anthropic),
        "gemini" | "google" => Some(RemoteProvider::Gemini),
        "openai-compatible" | "compatible" | "deepseek" => Some(RemoteProvider::OpenAiCompatible),
        _ => None,
    }
}

fn parse_prefixed_model(raw: &str) -> (Option<RemoteProvider>, String) {
    let trimmed = raw.trim();
    if let Some((prefix, model)) = trimmed.split_once(':')
        && let Some(provider) = parse_provider_alias(prefix)
    {
        return (Some(provider), model.trim().to_string());
    }
    (None, trimmed.to_string())
}

fn infer_provider_from_model(model: &str) -> Option<RemoteProvider> {
    let lower = model.trim().to_ascii_lowercase();
    if lower.starts_with("deepseek-") {
        return Some(RemoteProvider::OpenAiCompatible);
    }
    if lower.starts_with("claude-") {
        return Some(RemoteProvider::Anthropic);
    }
    if lower.starts_with("gemini-") {
        return Some(RemoteProvider::Gemini);
    }
    if lower.starts_with("gpt-")
        || lower.starts_with("o1")
        || lower.starts_with("o3")
        || lower.starts_with("o4")
    {
        return Some(RemoteProvider::OpenAi);
    }
    None
}

fn first_available_provider() -> Option<RemoteProvider> {
    if env_non_empty("ANTHROPIC_API_KEY").is_some() {
        return Some(RemoteProvider::Anthropic);
    }
    if env_non_empty("AI_BASE_URL").is_some() && env_non_empty("AI_API_KEY").is_some() {
        return Some(RemoteProvider::OpenAiCompatible);
    }
    if env_non_empty("OPENAI_API_KEY").is_some() {
        return Some(RemoteProvider::OpenAi);
    }
    if env_non_empty("GEMINI_API_KEY").is_some() {
        return Some(RemoteProvider::Gemini);
    }
    if env_non_empty("AI_API_KEY").is_some() {
        return Some(RemoteProvider::OpenAiCompatible);
    }
    None
}

fn default_model_for_provider(provider: RemoteProvider) -> &'static str {
    match provider {
        RemoteProvider::OpenAi => "gpt-4.1-mini",
        RemoteProvider::Anthropic => "claude-sonnet-4-5",
        RemoteProvider::Gemini => "gemini-2.5-flash",
        RemoteProvider::OpenAiCompatible => "deepseek-chat",
    }
}

fn resolve_api_key(provider: RemoteProvider) -> Option<String> {
    match provider {
        RemoteProvider::OpenAi => {
            env_non_empty("OPENAI_API_KEY").or_else(|| env_non_empty("AI_API_KEY"))
        }
        RemoteProvider::Anthropic => {
            env_non_empty("ANTHROPIC_API_KEY").or_else(|| env_non_empty("AI_API_KEY"))
        }
        RemoteProvider::Gemini => {
            env_non_empty("GEMINI_API_KEY").or_else(|| env_non_empty("AI_API_KEY"))
        }
        RemoteProvider::OpenAiCompatible => env_non_empty("AI_API_KEY")
            .or_else(|| env_non_empty("DEEPSEEK_API_KEY"))
            .or_else(|| env_non_empty("OPENAI_API_KEY")),
    }
}

fn resolve_compatible_base_url(settings: &ModelSettings, model: &str) -> Option<String> {
    if let Some(base) = non_empty(&settings.base_url).or_else(|| env_non_empty("AI_BASE_URL")) {
        return Some(base);
    }
    if model.trim().to_ascii_lowercase().starts_with("deepseek-") {
        return Some("https://api.deepseek.com".to_string());
    }
    None
}

/// Pick provider, model and credentials from settings and the environment.
/// The provider is taken from explicit settings, then a `provider:` model
/// prefix, then the model name, then whichever API key is present.
pub fn resolve_remote_config(settings: &ModelSettings) -> Result<RemoteModelConfig, FacetLensError> {
    let configured_provider = match non_empty(&settings.provider) {
        Some(raw) => Some(parse_provider_alias(&raw).ok_or_else(|| {
            FacetLensError::InvalidConfig(format!("unknown model provider `{raw}`"))
        })?),
        None => None,
    };

    let configured_model = non_empty(&settings.model).or_else(|| env_non_empty("AI_MODEL"));
    let (prefixed_provider, mut model) = configured_model
        .as_deref()
        .map(parse_prefixed_model)
        .unwrap_or((None, String::new()));

    let provider = configured_provider
        .or(prefixed_provider)
        .or_else(|| infer_provider_from_model(&model))
        .or_else(first_available_provider)
        .ok_or_else(|| {
            FacetLensError::InvalidConfig(
                "no model provider configured; set ANTHROPIC_API_KEY, OPENAI_API_KEY, GEMINI_API_KEY or AI_API_KEY"
                    .to_string(),
            )
        })?;

    if model.trim().is_empty() {
        model = default_model_for_provider(provider).to_string();
    }
    let base_url = match provider {
        RemoteProvider::OpenAiCompatible => Some(
            resolve_compatible_base_url(settings, &model)
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
        ),
        _ => non_empty(&settings.base_url),
    };
    let api_key = resolve_api_key(provider).ok_or_else(|| {
        FacetLensError::InvalidConfig(format!(
            "missing API key for provider {}",
            provider.label()
        ))
    })?;

    Ok(RemoteModelConfig {
        provider,
        model,
        api_key,
        base_url,
    })
}

pub fn build_transport(
    remote: &RemoteModelConfig,
    timeout: Duration,
) -> Result<Box<dyn ModelTransport>, FacetLensError> {
    let http = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| FacetLensError::InvalidConfig(format!("http client: {err}")))?;
    let base_url = remote.base_url.clone();
    let api_key = remote.api_key.clone();

    let transport: Box<dyn ModelTransport> = match remote.provider {
        RemoteProvider::Anthropic => Box::new(AnthropicTransport {
            http,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }),
        RemoteProvider::OpenAi => Box::new(OpenAiTransport {
            http,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
        }),
        RemoteProvider::Gemini => Box::new(GeminiTransport {
            http,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
        }),
        RemoteProvider::OpenAiCompatible => Box::new(OpenAiCompatTransport {
            http,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
        }),
    };
    Ok(transport)
}

async fn read_json(response: reqwest::Response) -> Result<Value, FacetLensError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        return Err(FacetLensError::provider(Some(status.as_u16()), snippet));
    }
    Ok(response.json::<Value>().await?)
}

fn first_text_block(blocks: Option<&Vec<Value>>) -> String {
    let Some(first) = blocks.and_then(|b| b.first()) else {
        return String::new();
    };
    let is_text = first
        .get("type")
        .and_then(Value::as_str)
        .is_none_or(|t| t == "text" || t == "output_text");
    if !is_text {
        return String::new();
    }
    first
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn extract_anthropic_text(json: &Value) -> String {
    first_text_block(json.get("content").and_then(Value::as_array))
}

pub(crate) fn extract_openai_text(json: &Value) -> String {
    if let Some(text) = json.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }
    let message = json
        .get("output")
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .find(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        });
    first_text_block(message.and_then(|m| m.get("content")).and_then(Value::as_array))
}

pub(crate) fn extract_openai_compatible_text(json: &Value) -> String {
    let content = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"));
    match content {
        Some(Value::String(s)) => s.to_string(),
        Some(Value::Array(parts)) => first_text_block(Some(parts)),
        _ => String::new(),
    }
}

pub(crate) fn extract_gemini_text(json: &Value) -> String {
    json.get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get("parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.first())
        .and_then(|v| v.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub struct AnthropicTransport {
    http: Client,
    api_key: String,
    base_url: String,
}

#[async_trait]
impl ModelTransport for AnthropicTransport {
    fn label(&self) -> &'static str {
        RemoteProvider::Anthropic.label()
    }

    async fn send(&self, request: &ModelRequest) -> Result<String, FacetLensError> {
        let payload = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": [
                {"role": "user", "content": request.content}
            ]
        });
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await?;
        Ok(extract_anthropic_text(&read_json(response).await?))
    }
}

pub struct OpenAiTransport {
    http: Client,
    api_key: String,
    base_url: String,
}

#[async_trait]
impl ModelTransport for OpenAiTransport {
    fn label(&self) -> &'static str {
        RemoteProvider::OpenAi.label()
    }

    async fn send(&self, request: &ModelRequest) -> Result<String, FacetLensError> {
        let payload = serde_json::json!({
            "model": request.model,
            "instructions": request.system,
            "input": request.content,
            "max_output_tokens": request.max_tokens
        });
        let url = format!("{}/v1/responses", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        Ok(extract_openai_text(&read_json(response).await?))
    }
}

pub struct OpenAiCompatTransport {
    http: Client,
    api_key: String,
    base_url: String,
}

#[async_trait]
impl ModelTransport for OpenAiCompatTransport {
    fn label(&self) -> &'static str {
        RemoteProvider::OpenAiCompatible.label()
    }

    async fn send(&self, request: &ModelRequest) -> Result<String, FacetLensError> {
        let payload = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.content}
            ]
        });
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        Ok(extract_openai_compatible_text(&read_json(response).await?))
    }
}

pub struct GeminiTransport {
    http: Client,
    api_key: String,
    base_url: String,
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    fn label(&self) -> &'static str {
        RemoteProvider::Gemini.label()
    }

    async fn send(&self, request: &ModelRequest) -> Result<String, FacetLensError> {
        let payload = serde_json::json!({
            "systemInstruction": {"parts": [{"text": request.system}]},
            "contents": [
                {"role": "user", "parts": [{"text": request.content}]}
            ],
            "generationConfig": {"maxOutputTokens": request.max_tokens}
        });
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            request.model
        );
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;
        Ok(extract_gemini_text(&read_json(response).await?))
    }
}
