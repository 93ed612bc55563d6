use crosswalk_catalog::CatalogStore;
use tracing::info;

use crate::error::{MappingError, Result};
use crate::mapping::loaded_catalog;
use crate::model::StructuredModel;
use crate::prompts::{scope_system_prompt, scope_user_prompt};
use crate::schema::{parse_scope_response, scope_schema};
use crate::types::ScopeRecommendation;

pub struct ScopeAnalyzer<'a> {
    store: &'a CatalogStore,
    model: &'a dyn StructuredModel,
}

impl<'a> ScopeAnalyzer<'a> {
    pub fn new(store: &'a CatalogStore, model: &'a dyn StructuredModel) -> Self {
        Self { store, model }
    }

    pub fn analyze(&self, scope_text: &str) -> Result<ScopeRecommendation> {
        if scope_text.trim().is_empty() {
            return Err(MappingError::InvalidRequest(
                "scope document is empty".to_string(),
            ));
        }
        let catalog = loaded_catalog(self.store)?;
        let domains = catalog.domains();
        let system = scope_system_prompt(&domains);
        let user = scope_user_prompt(scope_text);
        let value = self
            .model
            .invoke(&system, &user, &scope_schema())
            .map_err(|err| MappingError::model(format!("{err:#}")))?;
        let recommendation = parse_scope_response(value)?;
        info!(
            domains = domains.len(),
            recommended_domains = recommendation.recommended_domains.len(),
            recommended_controls = recommendation.recommended_control_ids.len(),
            "scope analysis complete"
        );
        Ok(recommendation)
    }
}
