use std::time::Instant;

use crosswalk_catalog::{Catalog, CatalogStore};
use tracing::{info, warn};

use crate::budget::{estimate_tokens, TokenizerKind};
use crate::enrich::enrich;
use crate::error::{MappingError, Result};
use crate::filter::{filter_candidates, FilterConfig};
use crate::model::StructuredModel;
use crate::prompts;
use crate::schema::{mapping_schema, parse_mapping_response};
use crate::types::MappingResult;

#[derive(Debug, Clone, Default)]
pub struct MapperConfig {
    pub filter: FilterConfig,
    pub persona: Option<String>,
    pub tokenizer: TokenizerKind,
    pub max_context_tokens: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PreparedMapping {
    pub system: String,
    pub user: String,
    pub candidate_count: usize,
    pub fallback_used: bool,
    pub context_tokens: Option<usize>,
}

pub struct Mapper<'a> {
    store: &'a CatalogStore,
    model: &'a dyn StructuredModel,
    config: MapperConfig,
}

impl<'a> Mapper<'a> {
    pub fn new(store: &'a CatalogStore, model: &'a dyn StructuredModel) -> Self {
        Self {
            store,
            model,
            config: MapperConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn store(&self) -> &CatalogStore {
        self.store
    }

    pub fn prepare(
        &self,
        input_text: &str,
        top_k: usize,
        persona: Option<&str>,
    ) -> Result<PreparedMapping> {
        validate_request(input_text, top_k)?;
        let catalog = loaded_catalog(self.store)?;
        Ok(self.prepare_with(&catalog, input_text, top_k, persona))
    }

    /// Maps `input_text` onto at most `top_k` catalog controls (the bound is
    /// stated to the model, not enforced on its answer).
    pub fn map(
        &self,
        input_text: &str,
        top_k: usize,
        persona: Option<&str>,
    ) -> Result<MappingResult> {
        validate_request(input_text, top_k)?;
        let catalog = loaded_catalog(self.store)?;
        let prepared = self.prepare_with(&catalog, input_text, top_k, persona);
        let started = Instant::now();
        let value = self
            .model
            .invoke(&prepared.system, &prepared.user, &mapping_schema())
            .map_err(|err| MappingError::model(format!("{err:#}")))?;
        let mut result = parse_mapping_response(value)?;
        let enriched = enrich(&mut result, &catalog);
        info!(
            mappings = result.len(),
            enriched,
            top_k,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "mapping complete"
        );
        Ok(result)
    }

    fn prepare_with(
        &self,
        catalog: &Catalog,
        input_text: &str,
        top_k: usize,
        persona: Option<&str>,
    ) -> PreparedMapping {
        let candidates = filter_candidates(catalog.records(), input_text, &self.config.filter);
        let persona = prompts::persona(persona.or(self.config.persona.as_deref()));
        let system = prompts::mapping_system_prompt(&persona, &candidates.context());
        let user = prompts::mapping_user_prompt(top_k, input_text);
        let context_tokens = estimate_tokens(&format!("{system}\n{user}"), self.config.tokenizer);
        info!(
            candidates = candidates.len(),
            catalog = catalog.len(),
            fallback = candidates.fallback,
            context_tokens = context_tokens.unwrap_or(0),
            "filtered catalog for mapping context"
        );
        if let (Some(tokens), Some(limit)) = (context_tokens, self.config.max_context_tokens) {
            if tokens > limit {
                warn!(tokens, limit, "mapping context exceeds configured token budget");
            }
        }
        PreparedMapping {
            system,
            user,
            candidate_count: candidates.len(),
            fallback_used: candidates.fallback,
            context_tokens,
        }
    }
}

pub(crate) fn loaded_catalog(store: &CatalogStore) -> Result<std::sync::Arc<Catalog>> {
    let catalog = store.snapshot()?;
    if catalog.is_empty() {
        return Err(MappingError::EmptyCatalog);
    }
    Ok(catalog)
}

fn validate_request(input_text: &str, top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(MappingError::InvalidRequest(
            "top_k must be at least 1".to_string(),
        ));
    }
    if input_text.trim().is_empty() {
        return Err(MappingError::InvalidRequest(
            "input text is empty".to_string(),
        ));
    }
    Ok(())
}
