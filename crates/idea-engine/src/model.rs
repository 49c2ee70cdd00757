use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;

/// Expected scope of a project, from simple CRUD to industry-grade systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Professional,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Professional,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Professional => "professional",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Professional => "Professional",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Difficulty::Beginner => "Foundational concepts & simple CRUD",
            Difficulty::Intermediate => "Core skills & API integrations",
            Difficulty::Professional => "Industry-ready complex systems",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| EngineError::InvalidConfig(format!("unknown level: {s:?}")))
    }
}

/// Industry domain of a concrete idea. The "any domain" wildcard lives in [`DomainFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Web,
    App,
    Ai,
    Iot,
    Blockchain,
    Cybersecurity,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Web,
        Domain::App,
        Domain::Ai,
        Domain::Iot,
        Domain::Blockchain,
        Domain::Cybersecurity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Web => "web",
            Domain::App => "app",
            Domain::Ai => "ai",
            Domain::Iot => "iot",
            Domain::Blockchain => "blockchain",
            Domain::Cybersecurity => "cybersecurity",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Domain::Web => "Web Development",
            Domain::App => "Mobile App",
            Domain::Ai => "AI & Data Science",
            Domain::Iot => "IoT & Hardware",
            Domain::Blockchain => "Blockchain",
            Domain::Cybersecurity => "Cyber Security",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| EngineError::InvalidConfig(format!("unknown domain: {s:?}")))
    }
}

/// Domain constraint on a request: `all` means no filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainFilter {
    All,
    Only(Domain),
}

impl DomainFilter {
    pub fn matches(self, domain: Domain) -> bool {
        match self {
            DomainFilter::All => true,
            DomainFilter::Only(d) => d == domain,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DomainFilter::All => "all",
            DomainFilter::Only(d) => d.as_str(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DomainFilter::All => "Surprise Me (All)",
            DomainFilter::Only(d) => d.label(),
        }
    }
}

impl From<Domain> for DomainFilter {
    fn from(domain: Domain) -> Self {
        DomainFilter::Only(domain)
    }
}

impl fmt::Display for DomainFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "all" {
            return Ok(DomainFilter::All);
        }
        s.parse::<Domain>().map(DomainFilter::Only)
    }
}

impl Serialize for DomainFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DomainFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Named AI backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Gemini,
    Nvidia,
}

impl AiProvider {
    pub const ALL: [AiProvider; 2] = [AiProvider::Gemini, AiProvider::Nvidia];

    pub fn as_str(self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::Nvidia => "nvidia",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AiProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| EngineError::InvalidConfig(format!("unknown provider: {s:?}")))
    }
}

/// One phase of an implementation roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(inline)]
pub struct RoadmapStep {
    /// Name of the development phase (e.g., Requirement Analysis)
    pub phase: String,
    /// Specific tasks for this phase
    #[schemars(length(min = 1))]
    pub tasks: Vec<String>,
}

/// A grounding citation attached by the AI provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

/// A fully specified project proposal. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub title: String,
    pub description: String,
    pub level: Difficulty,
    pub domain: Domain,
    pub tech_stack: Vec<String>,
    pub usp: String,
    pub modules: Vec<String>,
    pub roadmap: Vec<RoadmapStep>,
    /// Present only when the AI path returned usable citations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Creation time in epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schemars(with = "i64")]
    pub timestamp: DateTime<Utc>,
}

impl Idea {
    /// Check every structural invariant of a canonical idea.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must not be empty".to_string());
        }
        validate_content(
            &self.title,
            &self.description,
            &self.usp,
            &self.tech_stack,
            &self.modules,
            &self.roadmap,
        )?;
        if let Some(sources) = &self.sources {
            if sources.is_empty() {
                return Err("sources must be absent rather than empty".to_string());
            }
            if sources.iter().any(|s| s.uri.trim().is_empty()) {
                return Err("every source needs a uri".to_string());
            }
        }
        Ok(())
    }
}

/// A catalog entry: an idea without identity or creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaTemplate {
    pub title: String,
    pub description: String,
    pub level: Difficulty,
    pub domain: Domain,
    pub tech_stack: Vec<String>,
    pub usp: String,
    pub modules: Vec<String>,
    pub roadmap: Vec<RoadmapStep>,
}

impl IdeaTemplate {
    pub fn validate(&self) -> Result<(), String> {
        validate_content(
            &self.title,
            &self.description,
            &self.usp,
            &self.tech_stack,
            &self.modules,
            &self.roadmap,
        )
    }

    /// Copy the template into a new idea. The result shares no storage with `self`.
    pub fn instantiate(&self, id: String, now: DateTime<Utc>) -> Idea {
        Idea {
            id,
            title: self.title.clone(),
            description: self.description.clone(),
            level: self.level,
            domain: self.domain,
            tech_stack: self.tech_stack.clone(),
            usp: self.usp.clone(),
            modules: self.modules.clone(),
            roadmap: self.roadmap.clone(),
            sources: None,
            timestamp: now,
        }
    }
}

fn validate_content(
    title: &str,
    description: &str,
    usp: &str,
    tech_stack: &[String],
    modules: &[String],
    roadmap: &[RoadmapStep],
) -> Result<(), String> {
    for (name, value) in [("title", title), ("description", description), ("usp", usp)] {
        if value.trim().is_empty() {
            return Err(format!("{name} must not be empty"));
        }
    }
    for (name, list) in [("techStack", tech_stack), ("modules", modules)] {
        if list.is_empty() {
            return Err(format!("{name} must have at least one entry"));
        }
        if list.iter().any(|s| s.trim().is_empty()) {
            return Err(format!("{name} must not contain empty entries"));
        }
    }
    if roadmap.is_empty() {
        return Err("roadmap must have at least one step".to_string());
    }
    for (i, step) in roadmap.iter().enumerate() {
        if step.phase.trim().is_empty() {
            return Err(format!("roadmap[{i}].phase must not be empty"));
        }
        if step.tasks.is_empty() || step.tasks.iter().any(|t| t.trim().is_empty()) {
            return Err(format!("roadmap[{i}].tasks must be non-empty strings"));
        }
    }
    Ok(())
}

/// What the caller asked for. Passed by value per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationConfig {
    pub level: Difficulty,
    pub domain: DomainFilter,
    pub use_ai: bool,
    pub provider: AiProvider,
}

impl GenerationConfig {
    /// Validate raw caller input. Unknown enum values fail with `InvalidConfig`.
    pub fn parse(
        level: &str,
        domain: &str,
        use_ai: bool,
        provider: &str,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            level: level.parse()?,
            domain: domain.parse()?,
            use_ai,
            provider: provider.parse()?,
        })
    }
}
