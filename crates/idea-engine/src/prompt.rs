/// Prompt and response-schema construction for AI-generated ideas.
use chrono::{Datelike, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{Difficulty, Domain, DomainFilter, RoadmapStep};

/// The shape the AI provider must answer with.
///
/// Identity, level, timestamp and citations are filled in by the engine; a `domain`
/// field is only requested (and only honored) when the caller asked for any domain.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdeaPayload {
    /// A catchy, academic-friendly project title
    pub title: String,
    /// Clear summary of the project goals
    pub description: String,
    /// Appropriate technologies for the given difficulty level
    #[schemars(length(min = 1))]
    pub tech_stack: Vec<String>,
    /// The unique selling point or 'twist' that makes it better than generic projects
    pub usp: String,
    /// 3-5 core functional modules to implement
    #[schemars(length(min = 1))]
    pub modules: Vec<String>,
    /// A 4-5 step implementation roadmap
    #[schemars(length(min = 1))]
    pub roadmap: Vec<RoadmapStep>,
    #[serde(default)]
    #[schemars(skip)]
    pub domain: Option<String>,
}

fn stack_hint(level: Difficulty) -> &'static str {
    match level {
        Difficulty::Beginner => "Basic HTML/CSS/JS or Python Flask",
        Difficulty::Intermediate => "MERN Stack, Django, or Flutter",
        Difficulty::Professional => "Deep Learning, Blockchain, or Microservices",
    }
}

fn specialization(domain: DomainFilter) -> &'static str {
    match domain {
        DomainFilter::All => "Computer Science",
        DomainFilter::Only(d) => d.label(),
    }
}

pub fn build_prompt(level: Difficulty, domain: DomainFilter) -> String {
    let year = Utc::now().year();
    let mut prompt = format!(
        "Generate a unique, innovative, and practical final year BCA project idea for a {level} \
level student specializing in {spec}.\n\
The project should be based on current {year}-{next} industry trends.\n\
Include a full implementation roadmap.\n\
Make the tech stack appropriate for the {level} level.\n\
For {level} level, use technologies like {hint}.",
        spec = specialization(domain),
        next = year + 1,
        hint = stack_hint(level),
    );
    if domain == DomainFilter::All {
        let choices: Vec<&str> = Domain::ALL.iter().map(|d| d.as_str()).collect();
        prompt.push_str(&format!(
            "\nPick the single best-fitting domain for the idea and report it in the `domain` \
field as one of: {}.",
            choices.join(", ")
        ));
    }
    prompt
}

/// JSON Schema for [`IdeaPayload`], extended with a required `domain` enum for `all` requests.
pub fn response_schema(domain: DomainFilter) -> Value {
    let mut schema = Value::from(schemars::schema_for!(IdeaPayload));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    if domain == DomainFilter::All {
        let choices: Vec<&str> = Domain::ALL.iter().map(|d| d.as_str()).collect();
        schema["properties"]["domain"] = json!({
            "type": "string",
            "enum": choices,
            "description": "The domain this project belongs to",
        });
        if let Some(required) = schema.get_mut("required").and_then(Value::as_array_mut) {
            required.push(json!("domain"));
        }
    }
    schema
}
