//! Prompt templates for the memory collaborators.
//!
//! Every prompt is a versioned, testable artifact. The built-in templates
//! below are used unless a directory of TOML overrides is loaded with
//! [`PromptEngine::from_directory`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use recall_core::Keywords;
use recall_core::services::{CHARACTERS, ITEMS, LOCATIONS, MISC};
use serde::Deserialize;

use crate::error::LlmError;
use crate::types::KeywordResponse;

/// Importance rating prompt.
pub const IMPORTANCE_SYSTEM: &str = r"You rate how memorable an event is for a character in a text adventure.
Use a scale from {min} to {max}.
{min} is purely mundane (brushing teeth, making the bed).
{max} is extremely poignant (a break-up, finding a lost treasure).
Answer with a single integer and nothing else.";

/// User half of the importance prompt.
pub const IMPORTANCE_USER: &str = r"Event: {description}
Rating:";

/// Keyword extraction prompt.
pub const KEYWORDS_SYSTEM: &str = r"You extract keywords from a line of a text adventure.
Known characters: {characters}
Known items: {items}
Known locations: {locations}
Only list a character, item or location if it appears in the text.
Put any other important nouns or verbs under misc.
Your response must be valid JSON.";

/// User half of the keyword prompt.
pub const KEYWORDS_USER: &str = r#"Text: {text}

Return JSON:
{{"characters": [...], "items": [...], "locations": [...], "misc": [...]}}"#;

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value, then collapses doubled
/// braces (used by the JSON examples) to single ones.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result.replace("{{", "{").replace("}}", "}")
}

/// Pull the rating out of an importance completion: the first integer in
/// the text, sign included.
#[must_use]
pub fn parse_importance(text: &str) -> Option<i64> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let end = bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |n| start + n);
    let negative = start > 0 && bytes[start - 1] == b'-';
    let value: i64 = text[start..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Parse a keyword completion into categorized [`Keywords`].
///
/// Tolerates prose around the JSON object; models often wrap it.
///
/// # Errors
///
/// Returns [`LlmError::ParseError`] if no JSON object can be read.
pub fn parse_keywords(text: &str) -> Result<Keywords, LlmError> {
    let json = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(LlmError::ParseError(format!("no JSON object in keyword response: {text:?}"))),
    };
    let parsed: KeywordResponse =
        serde_json::from_str(json).map_err(|e| LlmError::ParseError(e.to_string()))?;
    Ok(Keywords::from(parsed))
}

impl From<KeywordResponse> for Keywords {
    fn from(r: KeywordResponse) -> Self {
        Keywords::new()
            .with(CHARACTERS, r.characters.iter().map(String::as_str))
            .with(ITEMS, r.items.iter().map(String::as_str))
            .with(LOCATIONS, r.locations.iter().map(String::as_str))
            .with(MISC, r.misc.iter().map(String::as_str))
    }
}

// ---------------------------------------------------------------------------
// PromptEngine: versioned TOML template loader
// ---------------------------------------------------------------------------

/// Identifies a prompt template by purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Importance rating.
    Importance,
    /// Keyword extraction.
    Keywords,
}

impl PromptId {
    /// Returns the TOML filename (without path) for this prompt.
    #[must_use]
    pub fn filename(self) -> &'static str {
        match self {
            Self::Importance => "importance.toml",
            Self::Keywords => "keywords.toml",
        }
    }

    /// All prompt IDs.
    #[must_use]
    pub fn all() -> &'static [PromptId] {
        &[Self::Importance, Self::Keywords]
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Importance => "importance",
            Self::Keywords => "keywords",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PromptId {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "importance" => Ok(Self::Importance),
            "keywords" => Ok(Self::Keywords),
            _ => Err(LlmError::ConfigError(format!("unknown prompt id: '{s}'"))),
        }
    }
}

/// Parsed TOML prompt file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptFile {
    prompt: PromptTemplate,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    /// Prompt version string (e.g., "1.0").
    pub version: String,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
    /// Whether the backend should be asked for JSON output.
    #[serde(default)]
    pub json: bool,
    /// System prompt template (contains `{key}` placeholders).
    pub system: String,
    /// User prompt template (contains `{key}` placeholders).
    pub user: String,
}

/// Engine that holds prompt templates and renders them.
#[derive(Debug, Clone)]
pub struct PromptEngine {
    templates: HashMap<PromptId, PromptTemplate>,
}

impl PromptEngine {
    /// An engine with the compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();
        templates.insert(PromptId::Importance, PromptTemplate {
            version: "builtin".into(),
            max_tokens: 8,
            temperature: 0.0,
            json: false,
            system: IMPORTANCE_SYSTEM.into(),
            user: IMPORTANCE_USER.into(),
        });
        templates.insert(PromptId::Keywords, PromptTemplate {
            version: "builtin".into(),
            max_tokens: 128,
            temperature: 0.0,
            json: true,
            system: KEYWORDS_SYSTEM.into(),
            user: KEYWORDS_USER.into(),
        });
        Self { templates }
    }

    /// Built-in templates overridden by any TOML files found in `dir`.
    ///
    /// Each file must be named after a [`PromptId`]; unknown files are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if the directory does not exist or
    /// a prompt file cannot be read or parsed.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, LlmError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LlmError::ConfigError(format!(
                "prompt directory not found: {}",
                dir.display()
            )));
        }

        let mut engine = Self::builtin();
        for id in PromptId::all() {
            let path = dir.join(id.filename());
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .map_err(|e| LlmError::ConfigError(format!("failed to read {}: {e}", path.display())))?;
            let parsed: TomlPromptFile = toml::from_str(&content)
                .map_err(|e| LlmError::ConfigError(format!("failed to parse {}: {e}", path.display())))?;
            tracing::debug!(prompt = %id, version = %parsed.prompt.version, "loaded prompt override");
            engine.templates.insert(*id, parsed.prompt);
        }
        Ok(engine)
    }

    /// Get a loaded prompt template by ID.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&PromptTemplate> {
        self.templates.get(&id)
    }

    /// Render both system and user prompts for a given ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt ID is not loaded.
    pub fn render(&self, id: PromptId, vars: &[(&str, &str)]) -> Result<(String, String), LlmError> {
        let tpl = self
            .get(id)
            .ok_or_else(|| LlmError::ConfigError(format!("prompt template '{id}' not loaded")))?;
        Ok((render_template(&tpl.system, vars), render_template(&tpl.user, vars)))
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::builtin()
    }
}
