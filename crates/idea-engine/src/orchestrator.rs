/// Generation orchestrator: resolves a [`GenerationConfig`] to an idea source and runs it.
///
/// There is no fallback between sources. A catalog miss or an AI failure is
/// returned as-is and the caller decides whether to switch modes.
use std::collections::HashMap;

use tracing::info;

use crate::adapter::{AiAdapter, AiCapability};
use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::model::{AiProvider, Difficulty, DomainFilter, GenerationConfig, Idea};

/// Where an idea comes from. A new provider kind is a new variant here.
pub enum IdeaSource<'a, C> {
    Catalog(&'a Catalog),
    Ai {
        provider: AiProvider,
        adapter: &'a AiAdapter<C>,
    },
}

impl<C: AiCapability> IdeaSource<'_, C> {
    pub fn name(&self) -> &'static str {
        match self {
            IdeaSource::Catalog(_) => "catalog",
            IdeaSource::Ai { provider, .. } => provider.as_str(),
        }
    }

    pub async fn generate(
        &self,
        level: Difficulty,
        domain: DomainFilter,
    ) -> Result<Idea, EngineError> {
        match self {
            IdeaSource::Catalog(catalog) => catalog.select(level, domain),
            IdeaSource::Ai { adapter, .. } => adapter.generate(level, domain).await,
        }
    }
}

pub struct Orchestrator<C> {
    catalog: Catalog,
    backends: HashMap<AiProvider, AiAdapter<C>>,
}

impl<C: AiCapability> Orchestrator<C> {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            backends: HashMap::new(),
        }
    }

    /// Register the adapter used when a request names `provider`.
    pub fn with_backend(mut self, provider: AiProvider, adapter: AiAdapter<C>) -> Self {
        self.backends.insert(provider, adapter);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn providers(&self) -> Vec<AiProvider> {
        AiProvider::ALL
            .into_iter()
            .filter(|p| self.backends.contains_key(p))
            .collect()
    }

    /// Resolve the source a request would use, without running it.
    pub fn source(&self, config: &GenerationConfig) -> Result<IdeaSource<'_, C>, EngineError> {
        if !config.use_ai {
            return Ok(IdeaSource::Catalog(&self.catalog));
        }
        let adapter = self.backends.get(&config.provider).ok_or_else(|| {
            EngineError::AdapterUnavailable(format!(
                "provider {} is not configured",
                config.provider
            ))
        })?;
        Ok(IdeaSource::Ai {
            provider: config.provider,
            adapter,
        })
    }

    /// Produce one validated idea for `config`. Nothing is recorded here.
    pub async fn request(&self, config: GenerationConfig) -> Result<Idea, EngineError> {
        let source = self.source(&config)?;
        let idea = source.generate(config.level, config.domain).await?;
        info!(
            source = source.name(),
            id = %idea.id,
            title = %idea.title,
            "idea generated"
        );
        Ok(idea)
    }
}

#[cfg(test)]
mod tests {
    use idea_common::http::ClientError;

    use super::*;
    use crate::adapter::fakes::{payload_json, FakeCapability};
    use crate::model::fixtures::template;
    use crate::model::Domain;

    fn config(level: Difficulty, domain: DomainFilter, use_ai: bool) -> GenerationConfig {
        GenerationConfig {
            level,
            domain,
            use_ai,
            provider: AiProvider::Gemini,
        }
    }

    fn one_template_catalog() -> Catalog {
        Catalog::new(vec![
            template(Difficulty::Beginner, Domain::Web, "Beginner web"),
            template(Difficulty::Intermediate, Domain::Web, "Canteen Pre-Order Portal"),
            template(Difficulty::Intermediate, Domain::Ai, "Resume Screener"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn catalog_request_returns_template_content_with_new_identity() {
        let catalog = one_template_catalog();
        let expected = catalog.matching(Difficulty::Intermediate, DomainFilter::Only(Domain::Web))[0].clone();
        let orchestrator: Orchestrator<FakeCapability> = Orchestrator::new(catalog);

        let before = chrono::Utc::now();
        let idea = orchestrator
            .request(config(
                Difficulty::Intermediate,
                DomainFilter::Only(Domain::Web),
                false,
            ))
            .await
            .unwrap();

        assert_eq!(idea.title, expected.title);
        assert_eq!(idea.description, expected.description);
        assert_eq!(idea.tech_stack, expected.tech_stack);
        assert_eq!(idea.level, Difficulty::Intermediate);
        assert_eq!(idea.domain, Domain::Web);
        assert!(!idea.id.is_empty());
        assert!(idea.timestamp >= before);
    }

    #[tokio::test]
    async fn catalog_miss_is_not_rescued_by_ai() {
        let orchestrator = Orchestrator::new(one_template_catalog()).with_backend(
            AiProvider::Gemini,
            AiAdapter::new(FakeCapability::answering(&payload_json().to_string(), vec![])),
        );
        let err = orchestrator
            .request(config(
                Difficulty::Professional,
                DomainFilter::All,
                false,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoMatchingTemplate { .. }));
    }

    #[tokio::test]
    async fn ai_request_uses_the_named_provider() {
        let orchestrator = Orchestrator::new(one_template_catalog())
            .with_backend(
                AiProvider::Gemini,
                AiAdapter::new(FakeCapability::failing(|| {
                    ClientError::MissingCredential("GEMINI_API_KEY")
                })),
            )
            .with_backend(
                AiProvider::Nvidia,
                AiAdapter::new(FakeCapability::answering(&payload_json().to_string(), vec![])),
            );
        assert_eq!(orchestrator.providers(), vec![AiProvider::Gemini, AiProvider::Nvidia]);

        let mut nvidia = config(Difficulty::Beginner, DomainFilter::Only(Domain::Iot), true);
        nvidia.provider = AiProvider::Nvidia;
        let idea = orchestrator.request(nvidia).await.unwrap();
        assert_eq!(idea.domain, Domain::Iot);

        let err = orchestrator
            .request(config(Difficulty::Beginner, DomainFilter::Only(Domain::Iot), true))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AdapterUnavailable(_)));
    }

    #[tokio::test]
    async fn unconfigured_provider_is_unavailable() {
        let orchestrator: Orchestrator<FakeCapability> = Orchestrator::new(one_template_catalog());
        assert!(orchestrator.providers().is_empty());
        let err = orchestrator
            .request(config(Difficulty::Beginner, DomainFilter::All, true))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AdapterUnavailable(_)));
    }

    #[test]
    fn source_resolution_follows_use_ai() {
        let orchestrator: Orchestrator<FakeCapability> = Orchestrator::new(one_template_catalog());
        let source = orchestrator
            .source(&config(Difficulty::Beginner, DomainFilter::All, false))
            .unwrap();
        assert_eq!(source.name(), "catalog");
    }
}
