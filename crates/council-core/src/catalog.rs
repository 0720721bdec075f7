use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Coordination pattern among a council's agents. The tag set is open on the
/// wire; tags this client does not know about land on `Other`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Debate,
    Pipeline,
    Vote,
    #[serde(other)]
    Other,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Debate => "debate",
            Strategy::Pipeline => "pipeline",
            Strategy::Vote => "vote",
            Strategy::Other => "custom",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "debate" => Ok(Strategy::Debate),
            "pipeline" => Ok(Strategy::Pipeline),
            "vote" => Ok(Strategy::Vote),
            other => Err(format!("Unknown strategy: {other}")),
        }
    }
}

/// One seat in a council: a display role bound to a model key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSeat {
    pub role: String,
    pub model: String,
}

/// One council preset as listed by the configuration endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CouncilInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_debate_rounds")]
    pub debate_rounds: u32,
    #[serde(default)]
    pub agents: Vec<AgentSeat>,
    #[serde(default)]
    pub moderator_model: Option<String>,
}

fn default_debate_rounds() -> u32 {
    2
}

/// Server-side defaults applied when the client does not override them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDefaults {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub council: String,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            council: String::new(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

/// The council catalog fetched once from the configuration endpoint.
/// Immutable for the process lifetime; the endpoint returns more sections
/// (model inventory, backend base url) which this client does not consume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CouncilCatalog {
    #[serde(default)]
    pub councils: HashMap<String, CouncilInfo>,
    #[serde(default)]
    pub defaults: SessionDefaults,
}

impl CouncilCatalog {
    pub fn contains(&self, key: &str) -> bool {
        self.councils.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&CouncilInfo> {
        self.councils.get(key)
    }

    /// Council keys in stable display order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.councils.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// The council to start on: the configured default when it exists,
    /// otherwise the first key in display order.
    pub fn initial_council(&self) -> Option<&str> {
        if self.contains(&self.defaults.council) {
            return Some(self.defaults.council.as_str());
        }
        self.keys().first().copied()
    }
}
