//! Process-wide match engine behind the C boundary.
//!
//! The engine is built once, on first use, from layered [`Settings`]. If the
//! settings cannot be loaded the engine is recorded as unavailable and every
//! later call reports that reason instead of retrying.

use std::path::Path;
use std::sync::OnceLock;

use tracing::{debug, info, warn};

use quote_search::{match_and_format, CorpusRegistry};
use quote_types::{ReloadPolicy, Settings};

use crate::error::BoundaryError;

/// Matches queries against corpora named per call.
#[derive(Debug)]
pub struct Engine {
    registry: CorpusRegistry,
}

impl Engine {
    pub fn new(policy: ReloadPolicy) -> Self {
        Self {
            registry: CorpusRegistry::new(policy),
        }
    }

    pub fn policy(&self) -> ReloadPolicy {
        self.registry.policy()
    }

    /// Formatted best match for `query` in the corpus at `corpus_path`.
    pub fn respond(&self, query: &[f32], corpus_path: &Path) -> Result<String, BoundaryError> {
        let snapshot = self.registry.current(corpus_path)?;
        let text = match_and_format(query, snapshot.corpus())?;
        debug!(
            path = %corpus_path.display(),
            dimension = query.len(),
            "Boundary match served"
        );
        Ok(text)
    }
}

/// Outcome of building the process-wide engine.
#[derive(Debug)]
pub enum EngineState {
    Ready(Engine),
    Unavailable(String),
}

impl EngineState {
    fn from_settings(settings: Result<Settings, quote_types::QuoteError>) -> Self {
        match settings {
            Ok(settings) => {
                info!(
                    reload_policy = settings.reload_policy.as_str(),
                    "Quote engine ready"
                );
                EngineState::Ready(Engine::new(settings.reload_policy))
            }
            Err(e) => {
                warn!(error = %e, "Quote engine unavailable");
                EngineState::Unavailable(e.to_string())
            }
        }
    }
}

static ENGINE: OnceLock<EngineState> = OnceLock::new();

/// Build the engine from `config_path` (plus the default layers) if it has
/// not been built yet. Returns the state in effect afterwards, which is the
/// existing one when the engine was already built.
pub fn initialize(config_path: Option<&str>) -> &'static EngineState {
    ENGINE.get_or_init(|| EngineState::from_settings(Settings::load(config_path)))
}

/// The process-wide engine, built from default settings on first use.
pub fn engine() -> Result<&'static Engine, BoundaryError> {
    match initialize(None) {
        EngineState::Ready(engine) => Ok(engine),
        EngineState::Unavailable(reason) => Err(BoundaryError::Unavailable(reason.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_respond_formats_best_match() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.json");
        std::fs::write(
            &path,
            r#"[{"text":"Know thyself.","author":"Socrates","embedding":[1,0]},
                {"text":"Carpe diem.","author":"Horace","source":"Odes","embedding":[0,1]}]"#,
        )
        .unwrap();

        let engine = Engine::new(ReloadPolicy::IfModified);
        assert_eq!(
            engine.respond(&[0.1, 0.9], &path).unwrap(),
            "\"Carpe diem.\"\n- Horace, Odes"
        );
    }

    #[test]
    fn test_respond_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.json");
        std::fs::write(&path, r#"[{"text":"A","embedding":[1,0,0]}]"#).unwrap();

        let engine = Engine::new(ReloadPolicy::Always);
        assert!(matches!(
            engine.respond(&[1.0, 0.0], &path),
            Err(BoundaryError::Match(_))
        ));
        assert!(matches!(
            engine.respond(&[1.0], &dir.path().join("missing.json")),
            Err(BoundaryError::Load(_))
        ));
    }

    #[test]
    fn test_unavailable_state_keeps_reason() {
        let state = EngineState::from_settings(Err(quote_types::QuoteError::Config(
            "bad layer".to_string(),
        )));
        match state {
            EngineState::Unavailable(reason) => assert!(reason.contains("bad layer")),
            EngineState::Ready(_) => panic!("expected unavailable"),
        }
    }
}
