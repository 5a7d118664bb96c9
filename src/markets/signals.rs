//! Chat-behaviour classifiers and per-participant counters.

use crate::markets::chat::ChatMessage;
use crate::markets::util::collapse_whitespace;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Proposal,
    Confirm,
    Cancel,
    Late,
    OnTheWay,
    Location,
}

impl Signal {
    pub const ALL: [Signal; 6] = [
        Self::Proposal,
        Self::Confirm,
        Self::Cancel,
        Self::Late,
        Self::OnTheWay,
        Self::Location,
    ];

    fn source(self) -> &'static str {
        match self {
            Self::Proposal => {
                r"(?i)(יושבים|ישיבה|רוצים|בואו|אפשר|איפה|מתי|דיבור|קובעים|נקבע|מי בא|אצלי|לבוא|let'?s meet|who'?s in|who is coming|where should|what time)"
            }
            Self::Confirm => {
                r"(?i)(בעד|כן|אבוא|בא\b|מגיע|מגיעה|אצטרף|זורם|יכול|יכולה|\bi'?m in\b|count me in|i'?ll be there|\bcoming\b)"
            }
            Self::Cancel => {
                r"(?i)(לא יכול|לא יכולה|בחוץ|לא מגיע|לא בא|פוצץ|לא מסתדר|לא זמין|לא משנה|can'?t make it|\bi'?m out\b|not coming)"
            }
            Self::Late => {
                r"(?i)(אאחר|מאחר|באיחור|בעיכוב|בדרך|on my way|עוד .*דקות|אצטרף ב\d|running late|\bbe late\b)"
            }
            Self::OnTheWay => {
                r"(?i)(בדרך|on my way|יוצא עכשיו|עוד \d+ דקות|מגיע עוד|\bomw\b|leaving now)"
            }
            Self::Location => {
                r"(?i)(גבעתיים|פשפשים|מרלן|כצנלסון|מלי|חומוס|בר|אצלי|בבית|לובי|דירה|קומה|נחלת יצחק|חיפה|צפון|my place)"
            }
        }
    }

    pub fn pattern(self) -> &'static Regex {
        static PATTERNS: OnceLock<HashMap<Signal, Regex>> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            Signal::ALL
                .iter()
                .map(|signal| {
                    let regex = Regex::new(signal.source()).expect("signal pattern is valid");
                    (*signal, regex)
                })
                .collect()
        });
        &patterns[&self]
    }

    pub fn matches(self, text: &str) -> bool {
        self.pattern().is_match(text)
    }
}

pub fn clock_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(\d{1,2}[:.]\d{2})\b").expect("clock pattern is valid"))
}

/// Weighting of older messages relative to the recent window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyWeights {
    /// Messages within this many of the newest count at full weight.
    pub recent_window: usize,
    pub old_message_weight: f64,
    pub old_mention_weight: f64,
}

impl Default for RecencyWeights {
    fn default() -> Self {
        Self {
            recent_window: 1_800,
            old_message_weight: 0.35,
            old_mention_weight: 0.4,
        }
    }
}

impl RecencyWeights {
    pub fn boundary(&self, message_count: usize) -> usize {
        message_count.saturating_sub(self.recent_window)
    }

    pub fn message_weight(&self, index: usize, boundary: usize) -> f64 {
        if index >= boundary {
            1.0
        } else {
            self.old_message_weight
        }
    }

    pub fn mention_weight(&self, index: usize, boundary: usize) -> f64 {
        if index >= boundary {
            1.0
        } else {
            self.old_mention_weight
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParticipantStats {
    pub messages: f64,
    pub proposals: f64,
    pub confirms: f64,
    pub cancels: f64,
    pub late_signals: f64,
    pub on_way_signals: f64,
    pub location_signals: f64,
}

impl ParticipantStats {
    fn fold(&mut self, text: &str, weight: f64) {
        self.messages += weight;
        for signal in Signal::ALL {
            if !signal.matches(text) {
                continue;
            }
            let counter = match signal {
                Signal::Proposal => &mut self.proposals,
                Signal::Confirm => &mut self.confirms,
                Signal::Cancel => &mut self.cancels,
                Signal::Late => &mut self.late_signals,
                Signal::OnTheWay => &mut self.on_way_signals,
                Signal::Location => &mut self.location_signals,
            };
            *counter += weight;
        }
    }
}

/// Participant counters in first-seen order, so rankings break ties the same
/// way on every run.
#[derive(Debug, Clone, Default)]
pub struct StatsTable {
    entries: Vec<(String, ParticipantStats)>,
    index: HashMap<String, usize>,
}

impl StatsTable {
    pub fn build(messages: &[ChatMessage], weights: &RecencyWeights) -> Self {
        let mut table = Self::default();
        let boundary = weights.boundary(messages.len());
        for (idx, message) in messages.iter().enumerate() {
            let name = message.speaker.trim();
            if name.is_empty() {
                continue;
            }
            let text = collapse_whitespace(&message.text);
            let weight = weights.message_weight(idx, boundary);
            table.entry(name).fold(&text, weight);
        }
        table
    }

    fn entry(&mut self, name: &str) -> &mut ParticipantStats {
        let slot = match self.index.get(name) {
            Some(slot) => *slot,
            None => {
                self.entries
                    .push((name.to_string(), ParticipantStats::default()));
                self.index.insert(name.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[slot].1
    }

    pub fn get(&self, name: &str) -> Option<&ParticipantStats> {
        self.index.get(name).map(|slot| &self.entries[*slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ParticipantStats)> {
        self.entries.iter()
    }

    /// Names sorted by `key` descending; stable for ties.
    pub fn ranked_by<F>(&self, key: F) -> Vec<&str>
    where
        F: Fn(&ParticipantStats) -> f64,
    {
        let mut ranked: Vec<&(String, ParticipantStats)> = self.entries.iter().collect();
        ranked.sort_by(|a, b| key(&b.1).total_cmp(&key(&a.1)));
        ranked.into_iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn total<F>(&self, key: F) -> f64
    where
        F: Fn(&ParticipantStats) -> f64,
    {
        self.entries.iter().map(|(_, s)| key(s)).sum()
    }

    pub fn count_where<F>(&self, pred: F) -> usize
    where
        F: Fn(&ParticipantStats) -> bool,
    {
        self.entries.iter().filter(|(_, s)| pred(s)).count()
    }
}

/// Weighted frequency table that remembers first-seen order for ties.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    entries: Vec<(String, f64)>,
}

impl Tally {
    pub fn add(&mut self, key: &str, weight: f64) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, count)) => *count += weight,
            None => self.entries.push((key.to_string(), weight)),
        }
    }

    /// Keys with positive weight, heaviest first.
    pub fn top(&self, limit: usize) -> Vec<String> {
        let mut ranked: Vec<&(String, f64)> =
            self.entries.iter().filter(|(_, w)| *w > 0.0).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(limit)
            .map(|(k, _)| k.clone())
            .collect()
    }
}
