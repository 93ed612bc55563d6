use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tiktoken_rs::CoreBPE;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenizerKind {
    #[default]
    Cl100k,
    O200k,
}

impl TokenizerKind {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Some(TokenizerKind::Cl100k),
            "o200k" | "o200k_base" => Some(TokenizerKind::O200k),
            _ => None,
        }
    }

    pub fn build(&self) -> Result<CoreBPE> {
        match self {
            TokenizerKind::Cl100k => tiktoken_rs::cl100k_base().map_err(|e| anyhow!(e.to_string())),
            TokenizerKind::O200k => tiktoken_rs::o200k_base().map_err(|e| anyhow!(e.to_string())),
        }
    }
}

static CL100K: Lazy<Option<Mutex<CoreBPE>>> = Lazy::new(|| cached(TokenizerKind::Cl100k));
static O200K: Lazy<Option<Mutex<CoreBPE>>> = Lazy::new(|| cached(TokenizerKind::O200k));

fn cached(kind: TokenizerKind) -> Option<Mutex<CoreBPE>> {
    match kind.build() {
        Ok(bpe) => Some(Mutex::new(bpe)),
        Err(err) => {
            warn!("tokenizer {kind:?} unavailable, token estimates disabled: {err}");
            None
        }
    }
}

/// Token count of `text`, or `None` when the tokenizer could not be built.
pub fn estimate_tokens(text: &str, kind: TokenizerKind) -> Option<usize> {
    let slot = match kind {
        TokenizerKind::Cl100k => &*CL100K,
        TokenizerKind::O200k => &*O200K,
    };
    slot.as_ref()
        .map(|bpe| bpe.lock().encode_with_special_tokens(text).len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_names_parse() {
        assert_eq!(TokenizerKind::from_str("cl100k_base"), Some(TokenizerKind::Cl100k));
        assert_eq!(TokenizerKind::from_str("O200K"), Some(TokenizerKind::O200k));
        assert_eq!(TokenizerKind::from_str("gpt2"), None);
    }

    #[test]
    fn longer_text_costs_more_tokens() {
        let short = estimate_tokens("[CRY-01] Cryptography: encrypt data.", TokenizerKind::Cl100k)
            .unwrap();
        let long = estimate_tokens(
            "[CRY-01] Cryptography: encrypt data.\n[GOV-01] Governance: Establish an Information Security Program.",
            TokenizerKind::Cl100k,
        )
        .unwrap();
        assert!(short > 0);
        assert!(long > short);
    }
}
