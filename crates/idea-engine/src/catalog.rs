/// Catalog selector over the bundled, hand-authored idea templates.
use chrono::Utc;
use tracing::debug;

use idea_common::ids;

use crate::error::EngineError;
use crate::model::{Difficulty, DomainFilter, Idea, IdeaTemplate};

const BUNDLED_CATALOG: &str = include_str!("catalog.json");

pub struct Catalog {
    templates: Vec<IdeaTemplate>,
}

impl Catalog {
    /// Build a catalog from an explicit template list. Every template must validate.
    pub fn new(templates: Vec<IdeaTemplate>) -> Result<Self, EngineError> {
        for (i, template) in templates.iter().enumerate() {
            template
                .validate()
                .map_err(|e| EngineError::Catalog(format!("template {i} ({}): {e}", template.title)))?;
        }
        Ok(Self { templates })
    }

    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self, EngineError> {
        let templates: Vec<IdeaTemplate> = serde_json::from_str(BUNDLED_CATALOG)
            .map_err(|e| EngineError::Catalog(format!("bundled catalog does not parse: {e}")))?;
        Self::new(templates)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Templates matching `level` and `domain`, in catalog order.
    pub fn matching(&self, level: Difficulty, domain: DomainFilter) -> Vec<&IdeaTemplate> {
        self.templates
            .iter()
            .filter(|t| t.level == level)
            .filter(|t| domain.matches(t.domain))
            .collect()
    }

    /// Pick a matching template at random and mint a fresh idea from it.
    pub fn select(&self, level: Difficulty, domain: DomainFilter) -> Result<Idea, EngineError> {
        self.select_with(level, domain, ids::pseudo_index)
    }

    /// Like [`Catalog::select`], with the choice among `n` candidates made by `pick(n)`.
    /// An out-of-range pick is clamped to the last candidate.
    pub fn select_with(
        &self,
        level: Difficulty,
        domain: DomainFilter,
        pick: impl FnOnce(usize) -> usize,
    ) -> Result<Idea, EngineError> {
        let pool = self.matching(level, domain);
        if pool.is_empty() {
            return Err(EngineError::NoMatchingTemplate { level, domain });
        }
        let index = pick(pool.len()).min(pool.len() - 1);
        let template = pool[index];
        debug!(
            level = %level,
            domain = %domain,
            candidates = pool.len(),
            index,
            title = %template.title,
            "catalog template selected"
        );
        Ok(template.instantiate(ids::new_id(), Utc::now()))
    }
}
