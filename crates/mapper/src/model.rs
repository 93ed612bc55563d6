use anyhow::Result;
use crosswalk_llm::{LlmClient, LlmRequest, OutputSchema};
use serde_json::Value;
use tracing::debug;

pub trait StructuredModel: Send + Sync {
    fn invoke(&self, system: &str, user: &str, schema: &OutputSchema) -> Result<Value>;
}

impl StructuredModel for LlmClient {
    fn invoke(&self, system: &str, user: &str, schema: &OutputSchema) -> Result<Value> {
        let response = self.chat_blocking(&LlmRequest {
            system: Some(system.to_string()),
            user: user.to_string(),
            schema: Some(schema.clone()),
        })?;
        debug!(
            provider = self.provider().as_str(),
            prompt_tokens = response.prompt_tokens,
            completion_tokens = response.completion_tokens,
            "model responded"
        );
        response.json()
    }
}
