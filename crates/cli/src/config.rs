use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use crosswalk_catalog::CatalogStore;
use crosswalk_llm::{LlmClient, LlmProvider};
use crosswalk_mapper::{FilterConfig, MapperConfig, TokenizerKind};
use serde::Deserialize;

pub const DEFAULT_CATALOG: &str = "data/scf_parsed.json";
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogSection,
    pub llm: LlmSection,
    pub mapping: MappingSection,
    pub batch: BatchSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub path: PathBuf,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CATALOG),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: String,
    pub model: Option<String>,
    pub max_retries: usize,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq.as_str().to_string(),
            model: None,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MappingSection {
    pub top_k: usize,
    pub candidate_limit: usize,
    pub fallback_limit: usize,
    pub min_keyword_chars: usize,
    pub max_context_tokens: Option<usize>,
    pub persona: Option<String>,
    pub tokenizer: Option<String>,
}

impl Default for MappingSection {
    fn default() -> Self {
        let filter = FilterConfig::default();
        Self {
            top_k: DEFAULT_TOP_K,
            candidate_limit: filter.candidate_limit,
            fallback_limit: filter.fallback_limit,
            min_keyword_chars: filter.min_keyword_chars,
            max_context_tokens: None,
            persona: None,
            tokenizer: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub concurrency: usize,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).map_err(|e| anyhow!("invalid config {}: {e}", path.display()))
}

impl AppConfig {
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("CROSSWALK_CATALOG") {
            self.catalog.path = PathBuf::from(path);
        }
        if let Some(provider) = lookup("CROSSWALK_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = lookup("CROSSWALK_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(raw) = lookup("CROSSWALK_LLM_MAX_RETRIES") {
            self.llm.max_retries = raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("CROSSWALK_LLM_MAX_RETRIES must be a number, got {raw}"))?;
        }
        if let Some(raw) = lookup("CROSSWALK_CONCURRENCY") {
            self.batch.concurrency = raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("CROSSWALK_CONCURRENCY must be a number, got {raw}"))?;
        }
        Ok(())
    }

    pub fn provider(&self) -> Result<LlmProvider> {
        LlmProvider::from_str(&self.llm.provider)
            .ok_or_else(|| anyhow!("unknown provider {}", self.llm.provider))
    }

    pub fn llm_client(&self) -> Result<LlmClient> {
        let provider = self.provider()?;
        let model = self
            .llm
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        let client = LlmClient::new(provider, model)
            .with_context(|| format!("failed to configure {} client", provider.as_str()))?;
        Ok(client.with_max_retries(self.llm.max_retries))
    }

    pub fn catalog_store(&self) -> CatalogStore {
        CatalogStore::new(&self.catalog.path)
    }

    pub fn mapper_config(&self) -> Result<MapperConfig> {
        let tokenizer = match self.mapping.tokenizer.as_deref() {
            Some(name) => TokenizerKind::from_str(name)
                .ok_or_else(|| anyhow!("unknown tokenizer {name}"))?,
            None => TokenizerKind::default(),
        };
        Ok(MapperConfig {
            filter: FilterConfig {
                candidate_limit: self.mapping.candidate_limit,
                fallback_limit: self.mapping.fallback_limit,
                min_keyword_chars: self.mapping.min_keyword_chars,
            },
            persona: self.mapping.persona.clone(),
            tokenizer,
            max_context_tokens: self.mapping.max_context_tokens,
        })
    }
}
