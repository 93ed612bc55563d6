use crosswalk_catalog::ControlRecord;
use indexmap::IndexSet;
use tracing::debug;

use crate::types::MappingCandidate;

pub const DEFAULT_CANDIDATE_LIMIT: usize = 50;
pub const DEFAULT_FALLBACK_LIMIT: usize = 100;
pub const DEFAULT_MIN_KEYWORD_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    pub candidate_limit: usize,
    pub fallback_limit: usize,
    pub min_keyword_chars: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            fallback_limit: DEFAULT_FALLBACK_LIMIT,
            min_keyword_chars: DEFAULT_MIN_KEYWORD_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateSet<'a> {
    pub candidates: Vec<MappingCandidate<'a>>,
    pub match_keys: Vec<String>,
    pub fallback: bool,
}

impl CandidateSet<'_> {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn context(&self) -> String {
        construct_context(self.candidates.iter().copied())
    }
}

pub fn construct_context<'a>(candidates: impl IntoIterator<Item = MappingCandidate<'a>>) -> String {
    candidates
        .into_iter()
        .map(|candidate| candidate.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn match_keys(text: &str, min_keyword_chars: usize) -> Vec<String> {
    let normalized = text.to_lowercase().replace([',', '.'], "");
    let keys: IndexSet<String> = normalized
        .split_whitespace()
        .filter(|word| word.chars().count() >= min_keyword_chars)
        .map(str::to_string)
        .collect();
    keys.into_iter().collect()
}

pub fn filter_candidates<'a>(
    records: &'a [ControlRecord],
    text: &str,
    config: &FilterConfig,
) -> CandidateSet<'a> {
    let keys = match_keys(text, config.min_keyword_chars);
    let mut scored: Vec<(&'a ControlRecord, usize)> = Vec::new();
    if !keys.is_empty() {
        for record in records {
            let description = record.description.to_lowercase();
            let hits = keys
                .iter()
                .filter(|key| description.contains(key.as_str()))
                .count();
            if hits > 0 {
                scored.push((record, hits));
            }
        }
    }

    if scored.is_empty() {
        let candidates: Vec<MappingCandidate<'a>> = records
            .iter()
            .take(config.fallback_limit)
            .map(MappingCandidate::from)
            .collect();
        debug!(
            keys = keys.len(),
            candidates = candidates.len(),
            "no keyword matches, falling back to catalog head"
        );
        return CandidateSet {
            candidates,
            match_keys: keys,
            fallback: true,
        };
    }

    let matched = scored.len();
    // stable: equal scores keep catalog order
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(config.candidate_limit);
    debug!(
        keys = keys.len(),
        matched,
        kept = scored.len(),
        "keyword filter selected candidates"
    );
    CandidateSet {
        candidates: scored
            .into_iter()
            .map(|(record, _)| MappingCandidate::from(record))
            .collect(),
        match_keys: keys,
        fallback: false,
    }
}
