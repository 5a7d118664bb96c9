//! Local, deterministic market generation from transcript statistics.
//!
//! Used when the backend path is exhausted. Always yields twelve ideas for any
//! non-empty input, including transcripts with no recognizable header lines.

use crate::markets::chat::{ChatMessage, format_timestamp, parse_transcript};
use crate::markets::normalize::{clamp, normalize_probabilities};
use crate::markets::signals::{RecencyWeights, Signal, StatsTable, Tally, clock_time_pattern};
use crate::markets::types::{
    Evidence, MarketCategory, MarketIdea, MarketScores, MarketType, OutcomeOption,
};
use crate::markets::util::{collapse_whitespace, hash_id, slug_or_fallback, take_chars};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const HEURISTIC_MARKET_COUNT: usize = 12;
const MAX_TITLE_CHARS: usize = 120;
const MAX_QUOTE_CHARS: usize = 180;
const MAX_EVIDENCE_PER_IDEA: usize = 3;
const MATCHED_EVIDENCE_PER_IDEA: usize = 2;
const MESSAGE_POOL_LIMIT: usize = 120;
const TEXT_POOL_LIMIT: usize = 36;
const TEXT_POOL_RECENT_LINES: usize = 400;
const PLACEHOLDER_EVIDENCE: &str = "Recent chat messages indicate evolving plans and uncertainty.";

const LOCATION_KEYWORDS: [(&str, &str); 7] = [
    ("גבעתיים", "Givatayim"),
    ("פשפשים", "Flea Market area"),
    ("מרלן", "Merlen"),
    ("כצנלסון", "Katzenelson"),
    ("מלי", "Meli"),
    ("חומוס", "Hummus spot"),
    ("אצלי", "Someone's home"),
];
const FALLBACK_AREAS: [&str; 3] = ["Givatayim", "Someone's home", "Other area"];

/// `clamp(base + x * slope, min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityCurve {
    pub base: f64,
    pub slope: f64,
    pub min: f64,
    pub max: f64,
}

impl ProbabilityCurve {
    pub const fn new(base: f64, slope: f64, min: f64, max: f64) -> Self {
        Self {
            base,
            slope,
            min,
            max,
        }
    }

    pub fn at(&self, x: f64) -> f64 {
        clamp(self.base + x * self.slope, self.min, self.max)
    }
}

/// Empirical constants behind the yes/no blueprints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlueprintCurves {
    /// Driven by the top organizer's proposal count.
    pub organizer_first: ProbabilityCurve,
    /// Driven by the number of confirming participants.
    pub six_confirm: ProbabilityCurve,
    /// Driven by the number of location suggesters.
    pub location_change: ProbabilityCurve,
    /// Driven by late signals per confirmation.
    pub late_start: ProbabilityCurve,
    /// Driven by the top canceler's cancels per confirmation.
    pub cancel_flip: ProbabilityCurve,
    /// Driven by en-route signals per confirmation.
    pub on_the_way: ProbabilityCurve,
}

impl Default for BlueprintCurves {
    fn default() -> Self {
        Self {
            organizer_first: ProbabilityCurve::new(0.35, 0.05, 0.35, 0.78),
            six_confirm: ProbabilityCurve::new(0.3, 0.06, 0.28, 0.82),
            location_change: ProbabilityCurve::new(0.25, 0.05, 0.25, 0.74),
            late_start: ProbabilityCurve::new(0.3, 0.6, 0.3, 0.8),
            cancel_flip: ProbabilityCurve::new(0.22, 0.45, 0.22, 0.75),
            on_the_way: ProbabilityCurve::new(0.28, 0.7, 0.28, 0.82),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicTuning {
    pub recency: RecencyWeights,
    pub curves: BlueprintCurves,
    pub default_meetup_time: String,
    pub scores: MarketScores,
}

impl Default for HeuristicTuning {
    fn default() -> Self {
        Self {
            recency: RecencyWeights::default(),
            curves: BlueprintCurves::default(),
            default_meetup_time: "22:30".to_string(),
            scores: MarketScores {
                creativity: 0.66,
                clarity: 0.76,
                evidence: 0.67,
                fun: 0.71,
            },
        }
    }
}

/// Everything the blueprints read from a transcript.
#[derive(Debug, Clone)]
pub struct ChatObservations {
    pub stats: StatsTable,
    pub primary: String,
    pub secondary: String,
    pub top_organizer: String,
    pub top_canceler: String,
    pub top_areas: [String; 3],
    pub top_time: String,
    pub total_late: f64,
    pub confirming_people: usize,
    pub location_suggesters: usize,
    pub late_rate: f64,
    pub on_way_rate: f64,
    pub latest_timestamp: Option<DateTime<Utc>>,
    /// Evidence candidates, newest first.
    pub newest_first: Vec<ChatMessage>,
    pub evidence_pool: Vec<Evidence>,
}

fn quoted_span_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""([^"]{8,180})""#).expect("quoted span pattern is valid"))
}

pub fn to_evidence(message: &ChatMessage) -> Evidence {
    let collapsed = collapse_whitespace(&message.text);
    Evidence {
        quote: take_chars(&collapsed, MAX_QUOTE_CHARS).to_string(),
        approx_time: message.timestamp.as_ref().map(format_timestamp),
    }
}

fn recent_lines(source: &str, limit: usize) -> Vec<&str> {
    let lines: Vec<&str> = source
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let skip = lines.len().saturating_sub(limit);
    lines.into_iter().skip(skip).rev().collect()
}

/// Evidence for text with no message structure: quoted spans first, then the
/// body of the most recent lines.
pub fn text_evidence_pool(source: &str, limit: usize) -> Vec<Evidence> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for caps in quoted_span_pattern().captures_iter(source) {
        let quote = caps[1].trim();
        if quote.chars().count() < 8 || !seen.insert(quote.to_string()) {
            continue;
        }
        out.push(Evidence {
            quote: take_chars(quote, MAX_QUOTE_CHARS).to_string(),
            approx_time: None,
        });
        if out.len() >= limit {
            return out;
        }
    }

    for line in recent_lines(source, TEXT_POOL_RECENT_LINES) {
        let body = match line.split_once(':') {
            Some((_, rest)) => rest.trim(),
            None => line,
        };
        if body.chars().count() < 8 {
            continue;
        }
        let quote = take_chars(body, MAX_QUOTE_CHARS).to_string();
        if !seen.insert(quote.clone()) {
            continue;
        }
        out.push(Evidence {
            quote,
            approx_time: None,
        });
        if out.len() >= limit {
            break;
        }
    }
    out
}

fn message_evidence_pool(newest_first: &[ChatMessage]) -> Vec<Evidence> {
    let mut seen = HashSet::new();
    newest_first
        .iter()
        .filter(|m| m.text.trim().chars().count() > 8)
        .map(to_evidence)
        .filter(|e| seen.insert(e.quote.clone()))
        .take(MESSAGE_POOL_LIMIT)
        .collect()
}

fn top_areas(messages: &[ChatMessage], recency: &RecencyWeights) -> [String; 3] {
    let boundary = recency.boundary(messages.len());
    let mut tally = Tally::default();
    for (key, label) in LOCATION_KEYWORDS {
        let count: f64 = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.text.contains(key))
            .map(|(idx, _)| recency.mention_weight(idx, boundary))
            .sum();
        tally.add(label, count);
    }

    let mut areas = tally.top(3);
    for fallback in FALLBACK_AREAS {
        if areas.len() >= 3 {
            break;
        }
        if !areas.iter().any(|a| a == fallback) {
            areas.push(fallback.to_string());
        }
    }
    [areas[0].clone(), areas[1].clone(), areas[2].clone()]
}

fn top_time(messages: &[ChatMessage], recency: &RecencyWeights, default: &str) -> String {
    let boundary = recency.boundary(messages.len());
    let mut tally = Tally::default();
    for (idx, message) in messages.iter().enumerate() {
        for caps in clock_time_pattern().captures_iter(&message.text) {
            let normalized = caps[1].replace('.', ":");
            tally.add(&normalized, recency.mention_weight(idx, boundary));
        }
    }
    tally
        .top(1)
        .into_iter()
        .next()
        .unwrap_or_else(|| default.to_string())
}

impl ChatObservations {
    pub fn from_source(source: &str, tuning: &HeuristicTuning) -> Self {
        let parsed = parse_transcript(source);
        let structured = !parsed.is_empty();
        let messages = if structured {
            parsed
        } else {
            vec![ChatMessage::new("Group", source)]
        };

        let recency = &tuning.recency;
        let stats = StatsTable::build(&messages, recency);
        let by_messages = stats.ranked_by(|s| s.messages);
        let primary = by_messages.first().copied().unwrap_or("Someone").to_string();
        let secondary = by_messages
            .get(1)
            .copied()
            .unwrap_or("Another member")
            .to_string();
        let top_organizer = stats
            .ranked_by(|s| s.proposals)
            .first()
            .map_or_else(|| primary.clone(), |s| s.to_string());
        let top_canceler = stats
            .ranked_by(|s| s.cancels)
            .first()
            .map_or_else(|| secondary.clone(), |s| s.to_string());

        let total_confirms = stats.total(|s| s.confirms);
        let total_late = stats.total(|s| s.late_signals);
        let total_on_way = stats.total(|s| s.on_way_signals);
        let confirm_base = total_confirms.max(1.0);

        let latest_timestamp = messages.iter().rev().find_map(|m| m.timestamp);

        let (newest_first, evidence_pool) = if structured {
            let newest_first: Vec<ChatMessage> = messages.iter().rev().cloned().collect();
            let pool = message_evidence_pool(&newest_first);
            (newest_first, pool)
        } else {
            let newest_first = recent_lines(source, TEXT_POOL_RECENT_LINES)
                .into_iter()
                .map(|line| ChatMessage::new("Group", line))
                .collect();
            (newest_first, text_evidence_pool(source, TEXT_POOL_LIMIT))
        };

        Self {
            primary,
            secondary,
            top_organizer,
            top_canceler,
            top_areas: top_areas(&messages, recency),
            top_time: top_time(&messages, recency, &tuning.default_meetup_time),
            total_late,
            confirming_people: stats.count_where(|s| s.confirms > 0.0),
            location_suggesters: stats.count_where(|s| s.location_signals > 0.0),
            late_rate: total_late / confirm_base,
            on_way_rate: total_on_way / confirm_base,
            latest_timestamp,
            newest_first,
            evidence_pool,
            stats,
        }
    }

    fn rotating_evidence(&self, index: usize) -> Vec<Evidence> {
        let pool = &self.evidence_pool;
        if pool.is_empty() {
            return vec![Evidence {
                quote: PLACEHOLDER_EVIDENCE.to_string(),
                approx_time: None,
            }];
        }
        let first = pool[index % pool.len()].clone();
        let second = &pool[(index + 3) % pool.len()];
        if second.quote == first.quote {
            vec![first]
        } else {
            vec![first, second.clone()]
        }
    }

    /// Newest messages matching any pattern, else a rotating pool slice.
    pub fn pick_evidence(&self, patterns: &[&Regex], index: usize) -> Vec<Evidence> {
        let mut matched = Vec::new();
        let mut seen = HashSet::new();
        for message in &self.newest_first {
            if !patterns.iter().any(|p| p.is_match(&message.text)) {
                continue;
            }
            let evidence = to_evidence(message);
            if evidence.quote.is_empty() || !seen.insert(evidence.quote.clone()) {
                continue;
            }
            matched.push(evidence);
            if matched.len() >= MATCHED_EVIDENCE_PER_IDEA {
                break;
            }
        }
        if matched.is_empty() {
            matched = self.rotating_evidence(index);
        }
        matched.truncate(MAX_EVIDENCE_PER_IDEA);
        matched
    }
}

struct Blueprint {
    title: String,
    description: &'static str,
    category: MarketCategory,
    market_type: MarketType,
    resolution_criteria: String,
    outcomes: Vec<OutcomeOption>,
    patterns: Vec<&'static Regex>,
}

fn yes_no(yes: f64) -> Vec<OutcomeOption> {
    vec![OutcomeOption::new("Yes", yes), OutcomeOption::new("No", 1.0)]
}

fn buckets(entries: [(&str, f64); 3]) -> Vec<OutcomeOption> {
    entries
        .into_iter()
        .map(|(label, p)| OutcomeOption::new(label, p))
        .collect()
}

fn blueprints(obs: &ChatObservations, curves: &BlueprintCurves) -> Vec<Blueprint> {
    let organizer = obs.top_organizer.as_str();
    let canceler = obs.top_canceler.as_str();
    let organizer_proposals = obs.stats.get(organizer).map_or(0.0, |s| s.proposals);
    let (canceler_cancels, canceler_confirms) = obs
        .stats
        .get(canceler)
        .map_or((0.0, 0.0), |s| (s.cancels, s.confirms));
    let confirming = obs.confirming_people;
    let suggesters = obs.location_suggesters;
    let late = obs.total_late;
    let lock_in_runner_up = if obs.primary == organizer {
        obs.secondary.as_str()
    } else {
        obs.primary.as_str()
    };

    vec![
        Blueprint {
            title: format!("Will {organizer} be the first to kick off the next meetup plan?"),
            description: "Organizer momentum based on recent planning behavior.",
            category: MarketCategory::Friends,
            market_type: MarketType::YesNo,
            resolution_criteria: format!(
                "Resolves YES if {organizer} posts the first concrete planning message (time/place) for the next meetup."
            ),
            outcomes: yes_no(curves.organizer_first.at(organizer_proposals)),
            patterns: vec![Signal::Proposal.pattern()],
        },
        Blueprint {
            title: "Will at least 6 people explicitly confirm attendance?".to_string(),
            description: "Attendance strength over the next planned meetup.",
            category: MarketCategory::Attendance,
            market_type: MarketType::YesNo,
            resolution_criteria: "Resolves YES if 6 or more unique members explicitly confirm attending the next meetup before close time.".to_string(),
            outcomes: yes_no(curves.six_confirm.at(confirming as f64)),
            patterns: vec![Signal::Confirm.pattern()],
        },
        Blueprint {
            title: "Will the meetup location change after an initial location is proposed?".to_string(),
            description: "Tracks last-minute place pivots.",
            category: MarketCategory::Plans,
            market_type: MarketType::YesNo,
            resolution_criteria: "Resolves YES if the group switches to a different final location after at least one specific location was already proposed.".to_string(),
            outcomes: yes_no(curves.location_change.at(suggesters as f64)),
            patterns: vec![Signal::Location.pattern()],
        },
        Blueprint {
            title: format!("Will the next meetup start later than {}?", obs.top_time),
            description: "Timing drift from planned start.",
            category: MarketCategory::Tonight,
            market_type: MarketType::YesNo,
            resolution_criteria: "Resolves YES if the first clear arrival/start message appears later than the most commonly discussed meetup time.".to_string(),
            outcomes: yes_no(curves.late_start.at(obs.late_rate)),
            patterns: vec![Signal::Late.pattern(), clock_time_pattern()],
        },
        Blueprint {
            title: format!("Will {canceler} cancel after initially sounding in?"),
            description: "Flip-risk for likely dropouts.",
            category: MarketCategory::Chaos,
            market_type: MarketType::YesNo,
            resolution_criteria: format!(
                "Resolves YES if {canceler} sends a positive/neutral attendance signal and later sends a cancel/out signal for the same upcoming meetup."
            ),
            outcomes: yes_no(
                curves
                    .cancel_flip
                    .at(canceler_cancels / (canceler_confirms + 1.0).max(1.0)),
            ),
            patterns: vec![Signal::Cancel.pattern(), Signal::Confirm.pattern()],
        },
        Blueprint {
            title: "Will someone send a clear \u{201c}on my way / בדרך\u{201d} message before arrival?".to_string(),
            description: "Transport/arrival signal before meetup start.",
            category: MarketCategory::Logistics,
            market_type: MarketType::YesNo,
            resolution_criteria: "Resolves YES if a participant sends an explicit pre-arrival movement message (e.g. on my way / בדרך) before the meetup starts.".to_string(),
            outcomes: yes_no(curves.on_the_way.at(obs.on_way_rate)),
            patterns: vec![Signal::OnTheWay.pattern()],
        },
        Blueprint {
            title: "How many people will explicitly confirm attendance?".to_string(),
            description: "Numeric attendance depth.",
            category: MarketCategory::Attendance,
            market_type: MarketType::Numeric,
            resolution_criteria: "Resolves to the bucket containing the number of unique explicit confirmations for the next meetup.".to_string(),
            outcomes: buckets([
                ("0-3", if confirming <= 3 { 0.5 } else { 0.2 }),
                ("4-6", if (4..=6).contains(&confirming) { 0.5 } else { 0.4 }),
                ("7+", if confirming >= 7 { 0.5 } else { 0.4 }),
            ]),
            patterns: vec![Signal::Confirm.pattern()],
        },
        Blueprint {
            title: "How many distinct location options will be proposed?".to_string(),
            description: "Numeric location-option breadth.",
            category: MarketCategory::Logistics,
            market_type: MarketType::Numeric,
            resolution_criteria: "Resolves to the number bucket of distinct location options proposed before final venue confirmation.".to_string(),
            outcomes: buckets([
                ("1-2", if suggesters <= 2 { 0.5 } else { 0.25 }),
                ("3-4", if (3..=4).contains(&suggesters) { 0.5 } else { 0.45 }),
                ("5+", if suggesters >= 5 { 0.4 } else { 0.3 }),
            ]),
            patterns: vec![Signal::Location.pattern()],
        },
        Blueprint {
            title: "How many late/delay signals will appear before meetup start?".to_string(),
            description: "Numeric lateness chatter intensity.",
            category: MarketCategory::Plans,
            market_type: MarketType::Numeric,
            resolution_criteria: "Resolves to bucket by count of delay/late signals (e.g. late, in traffic, arriving later) before meetup starts.".to_string(),
            outcomes: buckets([
                ("0-1", if late <= 1.0 { 0.55 } else { 0.25 }),
                ("2-4", if (2.0..=4.0).contains(&late) { 0.55 } else { 0.45 }),
                ("5+", if late >= 5.0 { 0.35 } else { 0.3 }),
            ]),
            patterns: vec![Signal::Late.pattern()],
        },
        Blueprint {
            title: "How many meetup-time revisions will happen before final lock?".to_string(),
            description: "Numeric schedule volatility.",
            category: MarketCategory::Weekend,
            market_type: MarketType::Numeric,
            resolution_criteria: "Resolves to bucket by count of distinct proposed meetup times before final plan lock for next meetup.".to_string(),
            outcomes: buckets([("0", 0.2), ("1-2", 0.55), ("3+", 0.25)]),
            patterns: vec![clock_time_pattern()],
        },
        Blueprint {
            title: "Which area is most likely for the next meetup?".to_string(),
            description: "Multiple-choice location forecast.",
            category: MarketCategory::Other,
            market_type: MarketType::MultipleChoice,
            resolution_criteria: "Resolves to the area that matches the final meetup location mentioned in the group chat.".to_string(),
            outcomes: vec![
                OutcomeOption::new(obs.top_areas[0].clone(), 0.45),
                OutcomeOption::new(obs.top_areas[1].clone(), 0.33),
                OutcomeOption::new(obs.top_areas[2].clone(), 0.22),
            ],
            patterns: vec![Signal::Location.pattern()],
        },
        Blueprint {
            title: "Who will post the final lock-in message for the next meetup?".to_string(),
            description: "Multiple-choice final decision ownership.",
            category: MarketCategory::Friends,
            market_type: MarketType::MultipleChoice,
            resolution_criteria: "Resolves to the person who sends the final unambiguous lock-in message (time/place confirmed) for the next meetup.".to_string(),
            outcomes: vec![
                OutcomeOption::new(organizer, 0.44),
                OutcomeOption::new(lock_in_runner_up, 0.3),
                OutcomeOption::new("Someone else", 0.26),
            ],
            patterns: vec![Signal::Proposal.pattern(), Signal::Confirm.pattern()],
        },
    ]
}

/// Close time `7 + index % 8` days after `base`, at `18 + index % 4` UTC.
pub fn close_time_guess(index: usize, base: DateTime<Utc>) -> String {
    let day = (base + Duration::days(7 + (index % 8) as i64)).date_naive();
    let hour = 18 + (index % 4) as u32;
    match day.and_hms_opt(hour, 0, 0) {
        Some(close) => format_timestamp(&close.and_utc()),
        None => format_timestamp(&base),
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicGenerator {
    tuning: HeuristicTuning,
}

impl HeuristicGenerator {
    pub fn new(tuning: HeuristicTuning) -> Self {
        Self { tuning }
    }

    /// Build the twelve fallback ideas. Close times count from the latest
    /// parseable timestamp, but never from earlier than `now`, so an old
    /// transcript still gets future close times.
    pub fn generate(&self, source_text: &str, now: DateTime<Utc>) -> Vec<MarketIdea> {
        let obs = ChatObservations::from_source(source_text, &self.tuning);
        let base = obs.latest_timestamp.map_or(now, |latest| latest.max(now));

        blueprints(&obs, &self.tuning.curves)
            .into_iter()
            .enumerate()
            .map(|(index, blueprint)| {
                let id = format!(
                    "heuristic-{}-{}",
                    index + 1,
                    hash_id(&format!("{}-{index}", blueprint.title))
                );
                let title = take_chars(&blueprint.title, MAX_TITLE_CHARS).to_string();
                let slug = slug_or_fallback(&title, &id);
                MarketIdea {
                    id,
                    slug,
                    title,
                    description: blueprint.description.to_string(),
                    category: blueprint.category,
                    market_type: blueprint.market_type,
                    resolution_criteria: blueprint.resolution_criteria,
                    close_time_guess: close_time_guess(index, base),
                    outcomes: normalize_probabilities(blueprint.outcomes),
                    scores: self.tuning.scores,
                    evidence: obs.pick_evidence(&blueprint.patterns, index),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "\
[20/2/26, 18:02] Dana: מתי יושבים השבוע? אפשר בגבעתיים
[20/2/26, 18:05] Avi: אני בעד, מגיע
[20/2/26, 18:06] Ben: לא יכול היום, אולי מחר
[20/2/26, 18:10] Dana: נקבע ל 21:30 אצלי
[21/2/26, 21:45] Ben: אאחר קצת
[21/2/26, 22:10] Avi: on my way, 10 min
[21/2/26, 22:12] Dana: \"bring the good snacks please\"";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn before_sample() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn always_produces_twelve_valid_ideas() {
        let ideas = HeuristicGenerator::default().generate(SAMPLE, fixed_now());
        assert_eq!(ideas.len(), HEURISTIC_MARKET_COUNT);

        let mut ids = HashSet::new();
        for idea in &ideas {
            assert!(ids.insert(idea.id.clone()), "duplicate id {}", idea.id);
            assert!(idea.title.chars().count() <= 120);
            assert!(!idea.slug.is_empty() && idea.slug.len() <= 64);
            assert!(idea.evidence.len() <= 3 && !idea.evidence.is_empty());
            let sum: f64 = idea.outcomes.iter().map(|o| o.probability).sum();
            assert!((sum - 1.0).abs() <= 0.01, "{}: {sum}", idea.title);
            let labels: HashSet<&str> = idea.outcomes.iter().map(|o| o.label.as_str()).collect();
            assert_eq!(labels.len(), idea.outcomes.len(), "{}", idea.title);
        }

        let types: Vec<MarketType> = ideas.iter().map(|i| i.market_type).collect();
        assert_eq!(types.iter().filter(|t| **t == MarketType::YesNo).count(), 6);
        assert_eq!(types.iter().filter(|t| **t == MarketType::Numeric).count(), 4);
        assert_eq!(
            types.iter().filter(|t| **t == MarketType::MultipleChoice).count(),
            2
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let generator = HeuristicGenerator::default();
        let first = serde_json::to_string(&generator.generate(SAMPLE, fixed_now())).expect("json");
        let again = serde_json::to_string(&generator.generate(SAMPLE, fixed_now())).expect("json");
        assert_eq!(first, again);

        // Any `now` before the last message leaves the output unchanged.
        let earlier = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = serde_json::to_string(&generator.generate(SAMPLE, earlier)).expect("json");
        let b = serde_json::to_string(&generator.generate(SAMPLE, before_sample())).expect("json");
        assert_eq!(a, b);
    }

    #[test]
    fn en_route_blueprint_quotes_the_en_route_line() {
        let ideas = HeuristicGenerator::default().generate(SAMPLE, fixed_now());
        let on_way = &ideas[5];
        assert!(on_way.title.contains("on my way"));
        assert_eq!(on_way.evidence[0].quote, "on my way, 10 min");
        assert_eq!(
            on_way.evidence[0].approx_time.as_deref(),
            Some("2026-02-21T22:10:00.000Z")
        );
    }

    #[test]
    fn protagonists_and_extracted_details_reach_titles() {
        let obs = ChatObservations::from_source(SAMPLE, &HeuristicTuning::default());
        assert_eq!(obs.primary, "Dana");
        assert_eq!(obs.top_organizer, "Dana");
        assert_eq!(obs.top_canceler, "Ben");
        assert_eq!(obs.top_time, "21:30");
        assert_eq!(obs.top_areas[0], "Givatayim");
        assert_eq!(obs.top_areas[1], "Someone's home");

        let ideas = HeuristicGenerator::default().generate(SAMPLE, fixed_now());
        assert_eq!(
            ideas[0].title,
            "Will Dana be the first to kick off the next meetup plan?"
        );
        assert_eq!(ideas[3].title, "Will the next meetup start later than 21:30?");
        assert_eq!(ideas[4].title, "Will Ben cancel after initially sounding in?");
        // Dana is both organizer and most active, so the runner-up is Avi or Ben.
        assert_eq!(ideas[11].outcomes[0].label, "Dana");
        assert_ne!(ideas[11].outcomes[1].label, "Dana");
    }

    #[test]
    fn close_time_anchors_to_latest_message() {
        let ideas = HeuristicGenerator::default().generate(SAMPLE, before_sample());
        assert_eq!(ideas[0].close_time_guess, "2026-02-28T18:00:00.000Z");
        assert_eq!(ideas[1].close_time_guess, "2026-03-01T19:00:00.000Z");
        assert_eq!(ideas[7].close_time_guess, "2026-03-07T21:00:00.000Z");
        assert_eq!(ideas[8].close_time_guess, "2026-02-28T18:00:00.000Z");
    }

    #[test]
    fn stale_transcript_closes_after_now() {
        let ideas = HeuristicGenerator::default().generate(SAMPLE, fixed_now());
        assert_eq!(ideas[0].close_time_guess, "2026-03-08T18:00:00.000Z");
        assert_eq!(ideas[1].close_time_guess, "2026-03-09T19:00:00.000Z");
        assert_eq!(ideas[7].close_time_guess, "2026-03-15T21:00:00.000Z");
        assert_eq!(ideas[8].close_time_guess, "2026-03-08T18:00:00.000Z");
        let now = format_timestamp(&fixed_now());
        assert!(ideas.iter().all(|idea| idea.close_time_guess > now));
    }

    #[test]
    fn unstructured_text_falls_back_to_whole_text_framing() {
        let raw = "notes from the group\nsomeone said \"we should meet near the park\"\nmaybe friday: everyone seems keen on it";
        let ideas = HeuristicGenerator::default().generate(raw, fixed_now());
        assert_eq!(ideas.len(), HEURISTIC_MARKET_COUNT);
        assert!(ideas[0].title.starts_with("Will Group be the first"));
        assert!(ideas[0].close_time_guess.starts_with("2026-03-08T18:00:00"));
        let quotes: Vec<&str> = ideas
            .iter()
            .flat_map(|i| i.evidence.iter().map(|e| e.quote.as_str()))
            .collect();
        assert!(quotes.contains(&"we should meet near the park"));
    }

    #[test]
    fn text_pool_prefers_quoted_spans_then_recent_lines() {
        let raw = "Avi: short\nBen: this is a longer line\n\"a quoted sentence here\"";
        let pool = text_evidence_pool(raw, 10);
        let quotes: Vec<&str> = pool.iter().map(|e| e.quote.as_str()).collect();
        assert_eq!(
            quotes,
            vec![
                "a quoted sentence here",
                "\"a quoted sentence here\"",
                "this is a longer line"
            ]
        );
    }

    #[test]
    fn curve_clamps_into_range() {
        let curve = ProbabilityCurve::new(0.3, 0.6, 0.3, 0.8);
        assert_eq!(curve.at(0.0), 0.3);
        assert_eq!(curve.at(10.0), 0.8);
        assert!((curve.at(0.5) - 0.6).abs() < 1e-9);
    }
}
