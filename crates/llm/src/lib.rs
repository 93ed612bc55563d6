use anyhow::{anyhow, Context, Result};
use reqwest::{header::HeaderValue, Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use tokio::runtime::Runtime;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
const LOCAL_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Anthropic,
    Gemini,
    Deepseek,
    Local,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Groq => "groq",
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Deepseek => "deepseek",
            LlmProvider::Local => "local",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "groq" => Some(LlmProvider::Groq),
            "openai" => Some(LlmProvider::OpenAi),
            "anthropic" => Some(LlmProvider::Anthropic),
            "gemini" => Some(LlmProvider::Gemini),
            "deepseek" => Some(LlmProvider::Deepseek),
            "local" | "ollama" => Some(LlmProvider::Local),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Groq => "llama-3.3-70b-versatile",
            LlmProvider::OpenAi => "gpt-4.1-mini",
            LlmProvider::Anthropic => "claude-3-5-sonnet-latest",
            LlmProvider::Gemini => "gemini-1.5-flash",
            LlmProvider::Deepseek => "deepseek-chat",
            LlmProvider::Local => "llama3.1",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    pub fn instruction(&self) -> String {
        let rendered =
            serde_json::to_string_pretty(&self.schema).unwrap_or_else(|_| self.schema.to_string());
        format!(
            "Respond with a single JSON value named `{}` that conforms to this JSON Schema. Output JSON only, without commentary or markdown.\n{}",
            self.name, rendered
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub user: String,
    pub schema: Option<OutputSchema>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmResponse {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    pub fn json(&self) -> Result<Value> {
        parse_json_content(&self.content)
    }
}

pub struct LlmClient {
    http: Client,
    provider: LlmProvider,
    model: String,
    config: ProviderConfig,
    max_retries: usize,
}

enum ProviderConfig {
    Compatible(CompatibleConfig),
    Anthropic(AnthropicConfig),
    Gemini(GeminiConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonMode {
    Schema,
    Object,
}

struct CompatibleConfig {
    api_key: Option<SecretString>,
    base_url: String,
    json_mode: JsonMode,
    responses_api: bool,
}

struct AnthropicConfig {
    api_key: SecretString,
    max_tokens: u32,
}

struct GeminiConfig {
    api_key: SecretString,
}

impl LlmClient {
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let http = Client::new();
        let config = match provider {
            LlmProvider::Groq => ProviderConfig::Compatible(CompatibleConfig {
                api_key: Some(read_api_key("GROQ_API_KEY")?),
                base_url: env::var("GROQ_BASE_URL").unwrap_or_else(|_| GROQ_BASE_URL.to_string()),
                json_mode: JsonMode::Object,
                responses_api: false,
            }),
            LlmProvider::OpenAi => ProviderConfig::Compatible(CompatibleConfig {
                api_key: Some(read_api_key("OPENAI_API_KEY")?),
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| OPENAI_BASE_URL.to_string()),
                json_mode: JsonMode::Schema,
                responses_api: openai_uses_responses(&model),
            }),
            LlmProvider::Anthropic => ProviderConfig::Anthropic(AnthropicConfig {
                api_key: read_api_key("ANTHROPIC_API_KEY")?,
                max_tokens: env::var("ANTHROPIC_MAX_TOKENS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2048),
            }),
            LlmProvider::Gemini => ProviderConfig::Gemini(GeminiConfig {
                api_key: read_api_key("GEMINI_API_KEY")?,
            }),
            LlmProvider::Deepseek => ProviderConfig::Compatible(CompatibleConfig {
                api_key: Some(read_api_key("DEEPSEEK_API_KEY")?),
                base_url: DEEPSEEK_BASE_URL.to_string(),
                json_mode: JsonMode::Object,
                responses_api: false,
            }),
            LlmProvider::Local => ProviderConfig::Compatible(CompatibleConfig {
                api_key: env::var("LOCAL_LLM_API_KEY").ok().map(SecretString::new),
                base_url: env::var("LOCAL_LLM_BASE_URL")
                    .unwrap_or_else(|_| LOCAL_BASE_URL.to_string()),
                json_mode: JsonMode::Object,
                responses_api: false,
            }),
        };
        Ok(Self {
            http,
            provider,
            model,
            config,
            max_retries: 0,
        })
    }

    /// Number of rate-limit or transport retries before an error is returned.
    /// Zero leaves retry policy entirely to the caller.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, req: &LlmRequest) -> Result<LlmResponse> {
        debug!(
            provider = self.provider.as_str(),
            model = %self.model,
            structured = req.schema.is_some(),
            "sending chat request"
        );
        match &self.config {
            ProviderConfig::Compatible(cfg) if cfg.responses_api => {
                self.chat_responses(cfg, req).await
            }
            ProviderConfig::Compatible(cfg) => self.chat_compatible(cfg, req).await,
            ProviderConfig::Anthropic(cfg) => self.chat_anthropic(cfg, req).await,
            ProviderConfig::Gemini(cfg) => self.chat_gemini(cfg, req).await,
        }
    }

    pub fn chat_blocking(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let rt = Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(self.chat(req))
    }

    async fn chat_compatible(
        &self,
        cfg: &CompatibleConfig,
        req: &LlmRequest,
    ) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'));
        let payload = compatible_payload(&self.model, req, cfg.json_mode);
        let label = self.provider.as_str();
        let value = self
            .send_json(label, || {
                let builder = self.http.post(&url).json(&payload);
                match &cfg.api_key {
                    Some(key) => builder.bearer_auth(key.expose_secret()),
                    None => builder,
                }
            })
            .await?;
        let content = extract_openai_text(&value)
            .ok_or_else(|| anyhow!("missing text in {label} response"))?;
        let usage: OpenAiUsage = value
            .get("usage")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        Ok(LlmResponse {
            content,
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
        })
    }

    async fn chat_responses(&self, cfg: &CompatibleConfig, req: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/responses", cfg.base_url.trim_end_matches('/'));
        let mut input = Vec::new();
        if let Some(system) = &req.system {
            input.push(json!({
                "role": "system",
                "content": [{ "type": "input_text", "text": system }],
            }));
        }
        input.push(json!({
            "role": "user",
            "content": [{ "type": "input_text", "text": req.user }],
        }));
        let mut payload = json!({
            "model": self.model,
            "input": input,
        });
        if let Some(schema) = &req.schema {
            payload["text"] = json!({
                "format": {
                    "type": "json_schema",
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": false,
                }
            });
        }
        let value = self
            .send_json("openai", || {
                let builder = self.http.post(&url).json(&payload);
                match &cfg.api_key {
                    Some(key) => builder.bearer_auth(key.expose_secret()),
                    None => builder,
                }
            })
            .await?;
        let content = extract_openai_text(&value)
            .ok_or_else(|| anyhow!("missing text in OpenAI response"))?;
        let (prompt_tokens, completion_tokens) = parse_responses_usage(&value);
        Ok(LlmResponse {
            content,
            prompt_tokens,
            completion_tokens,
        })
    }

    async fn chat_anthropic(&self, cfg: &AnthropicConfig, req: &LlmRequest) -> Result<LlmResponse> {
        let payload = anthropic_payload(&self.model, cfg.max_tokens, req);
        let value = self
            .send_json("anthropic", || {
                self.http
                    .post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", cfg.api_key.expose_secret())
                    .header("anthropic-version", "2023-06-01")
                    .json(&payload)
            })
            .await?;
        let response: AnthropicResponse =
            serde_json::from_value(value).context("failed to decode anthropic response")?;
        let text = response
            .content
            .into_iter()
            .find_map(|part| part.text)
            .ok_or_else(|| anyhow!("missing text in Anthropic response"))?;
        let usage = response.usage.unwrap_or_default();
        Ok(LlmResponse {
            content: text,
            prompt_tokens: usage.input_tokens.unwrap_or(0),
            completion_tokens: usage.output_tokens.unwrap_or(0),
        })
    }

    async fn chat_gemini(&self, cfg: &GeminiConfig, req: &LlmRequest) -> Result<LlmResponse> {
        let payload = gemini_payload(req);
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let value = self
            .send_json("gemini", || {
                self.http
                    .post(&url)
                    .query(&[("key", cfg.api_key.expose_secret().as_str())])
                    .json(&payload)
            })
            .await?;
        let response: GeminiResponse =
            serde_json::from_value(value).context("failed to decode gemini response")?;
        let text = response
            .candidates
            .and_then(|mut c| c.pop())
            .and_then(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .find_map(|part| part.text)
            })
            .ok_or_else(|| anyhow!("missing text in Gemini response"))?;
        let usage = response.usage.unwrap_or_default();
        Ok(LlmResponse {
            content: text,
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
        })
    }

    async fn send_json<F>(&self, label: &str, build: F) -> Result<Value>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = match build().send().await {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > self.max_retries {
                        return Err(err).with_context(|| format!("{label} request failed"));
                    }
                    warn!(attempt, "{label} request failed, retrying: {err}");
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt > self.max_retries {
                    return Err(anyhow!(
                        "{label} rate limited after {} retries",
                        self.max_retries
                    ));
                }
                let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                warn!(attempt, wait_secs = wait.as_secs(), "{label} rate limited");
                sleep(wait).await;
                continue;
            }
            return decode_body(label, response).await;
        }
    }
}

fn anthropic_payload(model: &str, max_tokens: u32, req: &LlmRequest) -> Value {
    let mut payload = json!({
        "model": model,
        "max_tokens": max_tokens,
        "temperature": 0,
        "messages": [ { "role": "user", "content": req.user } ],
    });
    if let Some(system) = system_text(req, false) {
        payload["system"] = json!(system);
    }
    payload
}

fn gemini_payload(req: &LlmRequest) -> Value {
    let mut prompt = String::new();
    if let Some(system) = system_text(req, false) {
        prompt.push_str("[SYSTEM]\n");
        prompt.push_str(system.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str(&req.user);
    let mut payload = json!({
        "contents": [ { "parts": [ { "text": prompt } ] } ],
        "generationConfig": { "temperature": 0 },
    });
    if req.schema.is_some() {
        payload["generationConfig"]["responseMimeType"] = json!("application/json");
    }
    payload
}

fn compatible_payload(model: &str, req: &LlmRequest, json_mode: JsonMode) -> Value {
    let native_schema = json_mode == JsonMode::Schema;
    let mut messages = Vec::new();
    if let Some(system) = system_text(req, native_schema) {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": req.user }));
    let mut payload = json!({
        "model": model,
        "messages": messages,
        "temperature": 0,
    });
    if let Some(schema) = &req.schema {
        payload["response_format"] = match json_mode {
            JsonMode::Schema => json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": false,
                }
            }),
            JsonMode::Object => json!({ "type": "json_object" }),
        };
    }
    payload
}

fn system_text(req: &LlmRequest, native_schema: bool) -> Option<String> {
    match (&req.system, &req.schema) {
        (Some(system), Some(schema)) if !native_schema => {
            Some(format!("{}\n\n{}", system.trim_end(), schema.instruction()))
        }
        (None, Some(schema)) if !native_schema => Some(schema.instruction()),
        (system, _) => system.clone(),
    }
}

fn backoff_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6) as u32;
    Duration::from_secs(1u64 << capped)
}

fn openai_uses_responses(model: &str) -> bool {
    let lower = model.to_lowercase();
    lower.starts_with("gpt-4.1") || lower.starts_with("gpt-4o") || lower.starts_with("o1")
}

fn parse_responses_usage(value: &Value) -> (u32, u32) {
    if let Some(usage) = value.get("usage") {
        let prompt = usage
            .get("input_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        let completion = usage
            .get("output_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        return (prompt, completion);
    }
    (0, 0)
}

async fn decode_body(label: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(anyhow!(
            "{label} returned error (status {}): {}",
            status,
            body
        ));
    }
    serde_json::from_str(&body).with_context(|| format!("failed to decode {label} response"))
}

pub fn parse_json_content(content: &str) -> Result<Value> {
    let clean = strip_markdown_fences(content);
    if let Ok(value) = serde_json::from_str(clean) {
        return Ok(value);
    }
    if !clean.contains(['{', '[']) {
        return Err(anyhow!("model response contains no JSON: {}", preview(clean, 200)));
    }
    first_json_value(clean)
        .ok_or_else(|| anyhow!("model response is not valid JSON: {}", preview(clean, 200)))
}

fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim()
}

// First `{` or `[` that opens a complete value; prose may hold stray brackets.
fn first_json_value(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, c)| matches!(c, '{' | '['))
        .find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&text[start..])
                .into_iter::<Value>()
                .next()
                .and_then(|parsed| parsed.ok())
        })
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn read_api_key(var: &str) -> Result<SecretString> {
    let value = env::var(var).map_err(|_| anyhow!("{var} is not set"))?;
    validate_api_key(var, &value)?;
    Ok(SecretString::new(value))
}

fn validate_api_key(var: &str, value: &str) -> Result<()> {
    if var.contains("GROQ") && !value.starts_with("gsk_") {
        return Err(anyhow!("{var} must start with 'gsk_'"));
    }
    if var.contains("OPENAI") && !value.starts_with("sk-") {
        return Err(anyhow!(
            "{} must start with 'sk-' (see https://platform.openai.com/)",
            var
        ));
    }
    if var.contains("ANTHROPIC") && !value.starts_with("sk-ant-") {
        return Err(anyhow!("{var} must start with 'sk-ant-'"));
    }
    if var.contains("DEEPSEEK") && !value.starts_with("sk-") {
        return Err(anyhow!("{var} must start with 'sk-'"));
    }
    if var.contains("GEMINI") && !value.starts_with("AI") {
        return Err(anyhow!(
            "{} must be a valid Gemini API key (starts with 'AI...')",
            var
        ));
    }
    Ok(())
}

fn extract_openai_text(value: &Value) -> Option<String> {
    if let Some(outputs) = value.get("output").and_then(|v| v.as_array()) {
        for output in outputs {
            if let Some(content) = output.get("content").and_then(|v| v.as_array()) {
                for block in content {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        return Some(text.to_string());
                    }
                }
            }
        }
    }
    if let Some(text) = value.get("output_text").and_then(|t| t.as_str()) {
        return Some(text.to_string());
    }
    if let Some(choices) = value.get("choices").and_then(|v| v.as_array()) {
        if let Some(choice) = choices.first() {
            if let Some(text) = choice.get("text").and_then(|t| t.as_str()) {
                return Some(text.to_string());
            }
            if let Some(content) = choice.get("message").and_then(|m| m.get("content")) {
                if let Some(text) = content.as_str() {
                    return Some(text.to_string());
                }
                if let Some(parts) = content.as_array() {
                    for part in parts {
                        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                            return Some(text.to_string());
                        }
                    }
                }
            }
        }
    }
    None
}

#[derive(Default, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Default, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "usageMetadata")]
    usage: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Default, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount")]
    prompt_tokens: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    completion_tokens: Option<u32>,
}
