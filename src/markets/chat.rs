use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// One message from an exported transcript. Continuation lines without a
/// header are folded into `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            timestamp: None,
        }
    }
}

const DATE_TIME: &str = r"(\d{1,2})[./](\d{1,2})[./](\d{2,4}),\s*(\d{1,2}):(\d{2})(?::(\d{2}))?(?:[\s\x{202f}]*([AaPp][Mm]))?";

fn bracketed_header() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^\[{DATE_TIME}\]\s([^:]+):\s?(.*)$"))
            .expect("bracketed header pattern is valid")
    })
}

fn dashed_header() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^{DATE_TIME}\s-\s([^:]+):\s?(.*)$"))
            .expect("dashed header pattern is valid")
    })
}

fn strip_direction_marks(line: &str) -> String {
    line.chars()
        .filter(|c| !matches!(c, '\u{200e}' | '\u{200f}'))
        .collect()
}

fn capture_u32(caps: &Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

fn parse_timestamp(caps: &Captures<'_>) -> Option<DateTime<Utc>> {
    let day = capture_u32(caps, 1)?;
    let month = capture_u32(caps, 2)?;
    let year_raw = capture_u32(caps, 3)?;
    let year = if year_raw < 100 { 2000 + year_raw } else { year_raw };
    let mut hour = capture_u32(caps, 4)?;
    let minute = capture_u32(caps, 5)?;
    let second = capture_u32(caps, 6).unwrap_or(0);

    if let Some(meridiem) = caps.get(7) {
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    let naive = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?
        .and_hms_opt(hour, minute, second)?;
    Some(naive.and_utc())
}

/// Parse one physical line as a message header.
pub fn parse_header(line: &str) -> Option<ChatMessage> {
    let caps = bracketed_header()
        .captures(line)
        .or_else(|| dashed_header().captures(line))?;
    Some(ChatMessage {
        speaker: caps.get(8)?.as_str().trim().to_string(),
        text: caps.get(9).map_or("", |m| m.as_str()).trim().to_string(),
        timestamp: parse_timestamp(&caps),
    })
}

/// Parse a transcript in transcript order. Lines before the first header are
/// dropped; later non-header lines continue the current message.
pub fn parse_transcript(source: &str) -> Vec<ChatMessage> {
    let mut parsed = Vec::new();
    let mut current: Option<ChatMessage> = None;

    for raw_line in source.lines() {
        let cleaned = strip_direction_marks(raw_line);
        let line = cleaned.trim_end();

        if let Some(message) = parse_header(line) {
            if let Some(done) = current.replace(message) {
                parsed.push(done);
            }
            continue;
        }

        if let Some(message) = current.as_mut() {
            message.text = format!("{}\n{}", message.text, line).trim().to_string();
        }
    }

    if let Some(done) = current {
        parsed.push(done);
    }
    parsed
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bracketed_line_parses_speaker_text_and_time() {
        let messages = parse_transcript("[21/2/26, 22:10] Avi: on my way, 10 min");
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.speaker, "Avi");
        assert_eq!(msg.text, "on my way, 10 min");
        assert_eq!(
            msg.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 2, 21, 22, 10, 0).unwrap())
        );
    }

    #[test]
    fn dashed_line_with_seconds_and_four_digit_year() {
        let msg = parse_header("03.11.2025, 9:05:30 - Noa Levi: מי בא הערב?").expect("header");
        assert_eq!(msg.speaker, "Noa Levi");
        assert_eq!(msg.text, "מי בא הערב?");
        assert_eq!(
            msg.timestamp,
            Some(Utc.with_ymd_and_hms(2025, 11, 3, 9, 5, 30).unwrap())
        );
    }

    #[test]
    fn meridiem_suffix_shifts_hour() {
        let msg = parse_header("[2/1/26, 10:15:00\u{202f}PM] Dana: late again").expect("header");
        assert_eq!(
            msg.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 1, 2, 22, 15, 0).unwrap())
        );
        let msg = parse_header("[2/1/26, 12:05 am] Dana: early").expect("header");
        assert_eq!(
            msg.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 1, 2, 0, 5, 0).unwrap())
        );
    }

    #[test]
    fn continuation_lines_join_previous_message() {
        let raw = "preamble without header\n\u{200e}[1/3/26, 20:00] Avi: first line\nsecond line\n\n[1/3/26, 20:01] Ben: ok";
        let messages = parse_transcript(raw);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "first line\nsecond line");
        assert_eq!(messages[1].speaker, "Ben");
    }

    #[test]
    fn impossible_dates_keep_message_without_timestamp() {
        let msg = parse_header("[31/2/26, 22:10] Avi: hi").expect("header");
        assert_eq!(msg.timestamp, None);
        assert_eq!(msg.text, "hi");
    }

    #[test]
    fn unrecognized_transcript_yields_nothing() {
        assert!(parse_transcript("just some notes\nwithout any headers").is_empty());
    }

    #[test]
    fn timestamps_render_like_iso_strings() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 21, 22, 10, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2026-02-21T22:10:00.000Z");
    }
}
