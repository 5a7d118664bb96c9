//! Validation of backend-authored market ideas.
//!
//! The validator walks the raw JSON and collects every violation with its
//! dotted path, so a repair prompt or a log line can name all of them at once.
//! Only a value with no issues is deserialized into typed ideas.

use crate::error::{MarketGenError, SchemaIssue};
use crate::markets::normalize::normalize_probabilities;
use crate::markets::types::{MarketCategory, MarketIdea, MarketIdeasResponse, MarketType};
use crate::markets::util::{collapse_whitespace, hash_id, slug_or_fallback, slugify, take_chars};
use chrono::DateTime;
use serde_json::{Map, Value};

pub const MIN_IDEAS: usize = 1;
pub const MAX_IDEAS: usize = 20;
pub const MAX_TITLE_CHARS: usize = 120;
pub const MIN_OUTCOMES: usize = 2;
pub const MAX_OUTCOMES: usize = 6;
pub const MAX_EVIDENCE: usize = 3;
pub const MAX_QUOTE_CHARS: usize = 180;
const SCORE_KEYS: [&str; 4] = ["creativity", "clarity", "evidence", "fun"];

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Default)]
struct Checker {
    issues: Vec<SchemaIssue>,
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

impl Checker {
    fn issue(&mut self, path: &str, message: impl Into<String>) {
        self.issues.push(SchemaIssue::new(path, message));
    }

    fn field<'v>(&mut self, obj: &'v Map<String, Value>, path: &str, key: &str) -> Option<&'v Value> {
        let value = obj.get(key);
        if value.is_none() {
            self.issue(&join(path, key), "Required");
        }
        value
    }

    fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.issue(path, format!("Expected object, received {}", kind(other)));
                None
            }
        }
    }

    fn array<'v>(
        &mut self,
        value: &'v Value,
        path: &str,
        min: usize,
        max: usize,
    ) -> Option<&'v Vec<Value>> {
        let Value::Array(items) = value else {
            self.issue(path, format!("Expected array, received {}", kind(value)));
            return None;
        };
        if items.len() < min {
            self.issue(path, format!("Array must contain at least {min} element(s)"));
        }
        if items.len() > max {
            self.issue(path, format!("Array must contain at most {max} element(s)"));
        }
        Some(items)
    }

    fn string<'v>(&mut self, value: &'v Value, path: &str, min: usize, max: usize) -> Option<&'v str> {
        let Value::String(text) = value else {
            self.issue(path, format!("Expected string, received {}", kind(value)));
            return None;
        };
        let len = text.chars().count();
        if len < min {
            self.issue(path, format!("String must contain at least {min} character(s)"));
        }
        if len > max {
            self.issue(path, format!("String must contain at most {max} character(s)"));
        }
        Some(text)
    }

    fn unit_number(&mut self, value: &Value, path: &str) {
        match value.as_f64() {
            Some(n) if (0.0..=1.0).contains(&n) => {}
            Some(_) => self.issue(path, "Number must be between 0 and 1"),
            None => self.issue(path, format!("Expected number, received {}", kind(value))),
        }
    }

    fn one_of(&mut self, value: &Value, path: &str, allowed: &[&str]) -> Option<String> {
        let text = self.string(value, path, 0, usize::MAX)?;
        if allowed.contains(&text) {
            Some(text.to_string())
        } else {
            self.issue(
                path,
                format!("Invalid enum value. Expected {}", allowed.join(" | ")),
            );
            None
        }
    }

    fn optional_string(&mut self, obj: &Map<String, Value>, path: &str, key: &str) {
        if let Some(value) = obj.get(key) {
            self.string(value, &join(path, key), 0, usize::MAX);
        }
    }

    fn idea(&mut self, value: &Value, path: &str) {
        let Some(obj) = self.object(value, path) else {
            return;
        };

        self.optional_string(obj, path, "id");
        self.optional_string(obj, path, "slug");
        if let Some(v) = self.field(obj, path, "title") {
            self.string(v, &join(path, "title"), 1, MAX_TITLE_CHARS);
        }
        for key in ["description", "resolution_criteria"] {
            if let Some(v) = self.field(obj, path, key) {
                self.string(v, &join(path, key), 1, usize::MAX);
            }
        }
        if let Some(v) = self.field(obj, path, "category") {
            let allowed: Vec<&str> = MarketCategory::ALL.iter().map(|c| c.as_str()).collect();
            self.one_of(v, &join(path, "category"), &allowed);
        }
        let market_type = self.field(obj, path, "market_type").and_then(|v| {
            let allowed: Vec<&str> = MarketType::ALL.iter().map(|t| t.as_str()).collect();
            self.one_of(v, &join(path, "market_type"), &allowed)
        });
        if let Some(v) = self.field(obj, path, "close_time_guess") {
            let at = join(path, "close_time_guess");
            if let Some(text) = self.string(v, &at, 1, usize::MAX)
                && DateTime::parse_from_rfc3339(text).is_err()
            {
                self.issue(&at, "Invalid datetime");
            }
        }
        if let Some(v) = self.field(obj, path, "outcomes") {
            self.outcomes(v, &join(path, "outcomes"), market_type.as_deref());
        }
        if let Some(v) = self.field(obj, path, "scores") {
            let at = join(path, "scores");
            if let Some(scores) = self.object(v, &at) {
                for key in SCORE_KEYS {
                    if let Some(score) = self.field(scores, &at, key) {
                        self.unit_number(score, &join(&at, key));
                    }
                }
            }
        }
        if let Some(v) = obj.get("evidence") {
            self.evidence(v, &join(path, "evidence"));
        }
    }

    fn outcomes(&mut self, value: &Value, path: &str, market_type: Option<&str>) {
        let Some(items) = self.array(value, path, MIN_OUTCOMES, MAX_OUTCOMES) else {
            return;
        };
        if market_type == Some(MarketType::YesNo.as_str()) && items.len() != 2 {
            self.issue(path, "YES_NO markets need exactly 2 outcomes");
        }
        for (idx, item) in items.iter().enumerate() {
            let at = join(path, &idx.to_string());
            let Some(outcome) = self.object(item, &at) else {
                continue;
            };
            if let Some(label) = self.field(outcome, &at, "label") {
                self.string(label, &join(&at, "label"), 1, usize::MAX);
            }
            if let Some(p) = self.field(outcome, &at, "initial_probability") {
                self.unit_number(p, &join(&at, "initial_probability"));
            }
        }
    }

    fn evidence(&mut self, value: &Value, path: &str) {
        let Some(items) = self.array(value, path, 0, MAX_EVIDENCE) else {
            return;
        };
        for (idx, item) in items.iter().enumerate() {
            let at = join(path, &idx.to_string());
            let Some(evidence) = self.object(item, &at) else {
                continue;
            };
            if let Some(quote) = self.field(evidence, &at, "quote") {
                self.string(quote, &join(&at, "quote"), 1, MAX_QUOTE_CHARS);
            }
            match evidence.get("approx_time") {
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(other) => self.issue(
                    &join(&at, "approx_time"),
                    format!("Expected string or null, received {}", kind(other)),
                ),
            }
        }
    }
}

/// Every schema violation in `value`; empty when it is valid.
pub fn schema_issues(value: &Value) -> Vec<SchemaIssue> {
    let mut checker = Checker::default();
    let Some(root) = checker.object(value, "") else {
        return checker.issues;
    };
    if let Some(ideas) = checker.field(root, "", "market_ideas")
        && let Some(items) = checker.array(ideas, "market_ideas", MIN_IDEAS, MAX_IDEAS)
    {
        for (idx, item) in items.iter().enumerate() {
            checker.idea(item, &format!("market_ideas.{idx}"));
        }
    }
    checker.issues
}

pub fn validate_markets(value: Value) -> Result<MarketIdeasResponse, MarketGenError> {
    let issues = schema_issues(&value);
    if !issues.is_empty() {
        return Err(MarketGenError::SchemaValidation { issues });
    }
    serde_json::from_value(value).map_err(|err| MarketGenError::SchemaValidation {
        issues: vec![SchemaIssue::new("", err.to_string())],
    })
}

/// Assign ids, fill in slugs and re-apply the length and probability invariants.
///
/// Ids always come from the title and position; whatever the backend sent is
/// discarded so ids stay unique within one call.
pub fn finalize_ideas(ideas: Vec<MarketIdea>) -> Vec<MarketIdea> {
    ideas
        .into_iter()
        .enumerate()
        .map(|(index, mut idea)| {
            idea.title = take_chars(idea.title.trim(), MAX_TITLE_CHARS).to_string();
            idea.id = format!(
                "market-{}-{}",
                index + 1,
                hash_id(&format!("{}-{index}", idea.title))
            );
            let slug = slugify(&idea.slug);
            idea.slug = if slug.is_empty() {
                slug_or_fallback(&idea.title, &idea.id)
            } else {
                slug
            };
            idea.outcomes = normalize_probabilities(idea.outcomes);
            idea.evidence.truncate(MAX_EVIDENCE);
            for evidence in &mut idea.evidence {
                let collapsed = collapse_whitespace(&evidence.quote);
                evidence.quote = take_chars(&collapsed, MAX_QUOTE_CHARS).to_string();
            }
            idea
        })
        .collect()
}
