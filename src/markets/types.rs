use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketType {
    #[serde(rename = "YES_NO")]
    YesNo,
    #[serde(rename = "NUMERIC")]
    Numeric,
    #[serde(rename = "MULTIPLE_CHOICE")]
    MultipleChoice,
}

impl MarketType {
    pub const ALL: [MarketType; 3] = [Self::YesNo, Self::Numeric, Self::MultipleChoice];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::YesNo => "YES_NO",
            Self::Numeric => "NUMERIC",
            Self::MultipleChoice => "MULTIPLE_CHOICE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketCategory {
    Friends,
    Attendance,
    Plans,
    Tonight,
    Chaos,
    Logistics,
    Weekend,
    Other,
}

impl MarketCategory {
    pub const ALL: [MarketCategory; 8] = [
        Self::Friends,
        Self::Attendance,
        Self::Plans,
        Self::Tonight,
        Self::Chaos,
        Self::Logistics,
        Self::Weekend,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Friends => "Friends",
            Self::Attendance => "Attendance",
            Self::Plans => "Plans",
            Self::Tonight => "Tonight",
            Self::Chaos => "Chaos",
            Self::Logistics => "Logistics",
            Self::Weekend => "Weekend",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeOption {
    pub label: String,
    #[serde(rename = "initial_probability")]
    pub probability: f64,
}

impl OutcomeOption {
    pub fn new(label: impl Into<String>, probability: f64) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketScores {
    pub creativity: f64,
    pub clarity: f64,
    pub evidence: f64,
    pub fun: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub quote: String,
    /// RFC 3339 instant of the quoted message, when known.
    #[serde(rename = "approx_time")]
    pub approx_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIdea {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    pub title: String,
    pub description: String,
    pub category: MarketCategory,
    pub market_type: MarketType,
    pub resolution_criteria: String,
    pub close_time_guess: String,
    pub outcomes: Vec<OutcomeOption>,
    pub scores: MarketScores,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

/// Wire shape the backend is asked to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIdeasResponse {
    pub market_ideas: Vec<MarketIdea>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub model_used: String,
    pub market_ideas: Vec<MarketIdea>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_trace: Option<Vec<Value>>,
}
