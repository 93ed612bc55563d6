mod aggregate;
mod batch;
mod budget;
mod enrich;
mod error;
mod filter;
mod mapping;
mod model;
mod prompts;
mod schema;
mod scope;
mod types;

pub use aggregate::{aggregate, AggregatedControl};
pub use batch::{map_batch, BatchFailure, BatchItemOutcome, BatchReport};
pub use budget::{estimate_tokens, TokenizerKind};
pub use enrich::{enrich, priority_regulations, PRIORITY_FRAMEWORKS};
pub use error::{MappingError, Result};
pub use filter::{
    construct_context, filter_candidates, match_keys, CandidateSet, FilterConfig,
    DEFAULT_CANDIDATE_LIMIT, DEFAULT_FALLBACK_LIMIT, DEFAULT_MIN_KEYWORD_CHARS,
};
pub use mapping::{Mapper, MapperConfig, PreparedMapping};
pub use model::StructuredModel;
pub use prompts::BASE_PERSONA;
pub use schema::{mapping_schema, scope_schema};
pub use scope::ScopeAnalyzer;
pub use types::{MappedControl, MappingCandidate, MappingResult, ScopeRecommendation};
