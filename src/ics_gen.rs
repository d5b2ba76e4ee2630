//! RFC-5545 ICS assembler (`spec.md` §4.G). Content lines are written and
//! folded directly rather than through the `ics` crate's `ICalendar`
//! `Display` impl (the crate the teacher depends on for its own calendar
//! generation) — `fold_line`/`escape` are standalone, directly-unit-tested
//! functions so the octet-exact boundary behavior in Testable Property 8 is
//! verifiable independent of any crate-internal folding (`DESIGN.md`).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use chrono_tz::{OffsetComponents, Tz};

use crate::model::{Match, MatchStatus};

/// `escape_text` is the same `ics`-crate helper the teacher's `cal.rs` uses
/// to escape `\`, `;`, `,` and newlines; `fold_line` below is the part we
/// don't delegate, so its boundary behavior stays independently verifiable.
fn escape(s: &str) -> String {
    ics::escape_text(s).into_owned()
}

const PRODID_PREFIX: &str = "-//courtsync//basketball-ics//EN";
const DEFAULT_DURATION_MINUTES: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarMode {
    #[default]
    Fan,
    Player,
}

#[derive(Debug, Clone, Default)]
pub struct IcsOptions {
    pub mode: CalendarMode,
    /// Player-mode preparation offset in minutes, 0..=240 (`spec.md` §4.G).
    pub prep_minutes: u32,
    /// Named IANA zone; when set, `DTSTART`/`DTEND` use `TZID=` form and a
    /// `VTIMEZONE` block is emitted instead of UTC Zulu.
    pub tz: Option<Tz>,
    /// Rendered into `X-WR-CALNAME` as `"<title> — <competition?> — <team?>"`.
    pub competition_label: Option<String>,
    pub team_label: Option<String>,
}

/// Builds the full `VCALENDAR` document for `matches`. `host_identifier`
/// supplies both the `PRODID` and the `UID` suffix (`spec.md` §4.G).
pub fn generate(matches: &[Match], opts: &IcsOptions, host_identifier: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("BEGIN:VCALENDAR".to_owned());
    lines.push("VERSION:2.0".to_owned());
    lines.push(format!("PRODID:{PRODID_PREFIX}-{host_identifier}"));
    lines.push("CALSCALE:GREGORIAN".to_owned());
    lines.push("METHOD:PUBLISH".to_owned());
    lines.push(format!("X-WR-CALNAME:{}", escape(&calname(opts))));

    if let Some(tz) = &opts.tz {
        lines.extend(vtimezone_block(tz));
    }

    for m in matches {
        lines.extend(vevent_block(m, opts, host_identifier));
    }

    lines.push("END:VCALENDAR".to_owned());

    lines.iter().map(|l| fold_line(l)).collect::<Vec<_>>().join("\r\n") + "\r\n"
}

fn calname(opts: &IcsOptions) -> String {
    let mut parts = vec!["Israeli Basketball".to_owned()];
    if let Some(c) = &opts.competition_label {
        parts.push(c.clone());
    }
    if let Some(t) = &opts.team_label {
        parts.push(t.clone());
    }
    parts.join(" — ")
}

fn vevent_block(m: &Match, opts: &IcsOptions, host_identifier: &str) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push("BEGIN:VEVENT".to_owned());
    lines.push(format!("UID:{}@{host_identifier}", m.id));
    lines.push(format!("DTSTAMP:{}", format_utc(Utc::now())));

    let prep = if opts.mode == CalendarMode::Player { ChronoDuration::minutes(opts.prep_minutes as i64) } else { ChronoDuration::zero() };
    let dtstart = m.date - prep;
    let dtend = m.end_date.unwrap_or_else(|| m.date + ChronoDuration::minutes(DEFAULT_DURATION_MINUTES));

    match &opts.tz {
        Some(tz) => {
            lines.push(format!("DTSTART;TZID={tz}:{}", format_local(dtstart, tz)));
            lines.push(format!("DTEND;TZID={tz}:{}", format_local(dtend, tz)));
        }
        None => {
            lines.push(format!("DTSTART:{}", format_utc(dtstart)));
            lines.push(format!("DTEND:{}", format_utc(dtend)));
        }
    }

    lines.push(format!("SUMMARY:{}", escape(&summary(m))));
    lines.push(format!("STATUS:{}", status_value(m.status)));

    if let Some(location) = location(m) {
        lines.push(format!("LOCATION:{}", escape(&location)));
    }

    lines.push("END:VEVENT".to_owned());
    lines
}

/// `"{homeName} vs {awayName}"`, or on `CLOSED` with a final score
/// `"{homeName} {homeScore}:{awayScore} {awayName} [FINAL]"`
/// (`spec.md` §4.G; boundary behavior 9 — a `CLOSED` match missing scores
/// still renders as an upcoming-style summary rather than a malformed line).
fn summary(m: &Match) -> String {
    let home = m.home_team_name.as_deref().unwrap_or("TBD");
    let away = m.away_team_name.as_deref().unwrap_or("TBD");
    if m.has_final_score() {
        format!("{home} {}:{} {away} [FINAL]", m.home_score.unwrap(), m.away_score.unwrap())
    } else {
        format!("{home} vs {away}")
    }
}

fn status_value(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::NotStarted | MatchStatus::Live | MatchStatus::Closed => "CONFIRMED",
        MatchStatus::Cancelled => "CANCELLED",
    }
}

fn location(m: &Match) -> Option<String> {
    match (&m.venue, &m.venue_address) {
        (Some(venue), Some(address)) => Some(format!("{venue}, {address}")),
        (Some(venue), None) => Some(venue.clone()),
        (None, Some(address)) => Some(address.clone()),
        (None, None) => None,
    }
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn format_local(dt: DateTime<Utc>, tz: &Tz) -> String {
    dt.with_timezone(tz).format("%Y%m%dT%H%M%S").to_string()
}

/// A single-period `VTIMEZONE` approximation (`DESIGN.md` open question 4):
/// the `STANDARD`/`DAYLIGHT` offsets are read from `chrono-tz` at the
/// instant of generation rather than the zone's full historical transition
/// rule set.
fn vtimezone_block(tz: &Tz) -> Vec<String> {
    let now = Utc::now().naive_utc();
    let offset = tz.offset_from_utc_datetime(&now);
    let std_offset = offset.base_utc_offset();
    let dst_offset = offset.dst_offset();
    let total = std_offset + dst_offset;

    let mut lines = vec!["BEGIN:VTIMEZONE".to_owned(), format!("TZID:{tz}")];
    if dst_offset.num_seconds() != 0 {
        lines.push("BEGIN:DAYLIGHT".to_owned());
        lines.push("DTSTART:19700101T000000".to_owned());
        lines.push(format!("TZOFFSETFROM:{}", format_offset(std_offset)));
        lines.push(format!("TZOFFSETTO:{}", format_offset(total)));
        lines.push(format!("TZNAME:{tz}"));
        lines.push("END:DAYLIGHT".to_owned());
    }
    lines.push("BEGIN:STANDARD".to_owned());
    lines.push("DTSTART:19700101T000000".to_owned());
    lines.push(format!("TZOFFSETFROM:{}", format_offset(total)));
    lines.push(format!("TZOFFSETTO:{}", format_offset(std_offset)));
    lines.push(format!("TZNAME:{tz}"));
    lines.push("END:STANDARD".to_owned());
    lines.push("END:VTIMEZONE".to_owned());
    lines
}

fn format_offset(d: ChronoDuration) -> String {
    let total_minutes = d.num_minutes();
    let sign = if total_minutes < 0 { "-" } else { "+" };
    let abs = total_minutes.abs();
    format!("{sign}{:02}{:02}", abs / 60, abs % 60)
}

/// Folds one logical content line at 75-octet boundaries: a line whose
/// UTF-8 encoding is ≤ 75 octets is left unfolded; beyond that, `CRLF` plus
/// a single space is inserted before the 76th octet, never splitting a
/// multi-byte code point (Testable Property 8, Scenario S6).
pub fn fold_line(line: &str) -> String {
    let bytes = line.as_bytes();
    if bytes.len() <= 75 {
        return line.to_owned();
    }
    let mut out = String::with_capacity(line.len() + line.len() / 74 * 3);
    let mut start = 0usize;
    let mut limit = 75usize;
    while start < bytes.len() {
        let mut end = (start + limit).min(bytes.len());
        while end > start && !line.is_char_boundary(end) {
            end -= 1;
        }
        out.push_str(&line[start..end]);
        start = end;
        if start < bytes.len() {
            out.push_str("\r\n ");
            limit = 74;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seventy_five_octets_unfolded() {
        let line = "X".repeat(75);
        assert_eq!(fold_line(&line), line);
    }

    #[test]
    fn seventy_six_octets_folds_once() {
        let line = "X".repeat(76);
        let folded = fold_line(&line);
        assert_eq!(folded.matches("\r\n ").count(), 1);
    }

    #[test]
    fn two_hundred_octet_line_folds_per_scenario_s6() {
        let line = "X".repeat(200);
        let folded = fold_line(&line);
        let continuations = folded.matches("\r\n ").count();
        assert_eq!(continuations, ((200 - 75) as f64 / 74.0).ceil() as usize);
    }

    #[test]
    fn fold_never_splits_a_multibyte_codepoint() {
        let line = format!("SUMMARY:{}", "א".repeat(60));
        let folded = fold_line(&line);
        assert!(String::from_utf8(folded.replace("\r\n ", "").into_bytes()).is_ok());
    }

    #[test]
    fn escape_handles_backslash_semicolon_comma_and_newline() {
        assert_eq!(escape("a;b,c\\d\ne"), "a\\;b\\,c\\\\d\\ne");
    }

    #[test]
    fn closed_match_without_scores_uses_vs_summary() {
        let m = sample_match(MatchStatus::Closed, None, None);
        assert_eq!(summary(&m), "Hapoel vs Maccabi");
    }

    #[test]
    fn closed_match_with_scores_uses_final_summary() {
        let m = sample_match(MatchStatus::Closed, Some(88), Some(81));
        assert_eq!(summary(&m), "Hapoel 88:81 Maccabi [FINAL]");
    }

    fn sample_match(status: MatchStatus, home_score: Option<u32>, away_score: Option<u32>) -> Match {
        use crate::model::{CompetitionId, GroupId, MatchId, SeasonId, TeamId};
        Match {
            id: MatchId::new("M1"),
            season_id: SeasonId::new("S1"),
            competition_id: CompetitionId::new("C1"),
            competition_name: "Premier League".to_owned(),
            group_id: GroupId::new("G1"),
            group_name: "Regular".to_owned(),
            home_team_id: Some(TeamId::new("T1")),
            home_team_name: Some("Hapoel".to_owned()),
            away_team_id: Some(TeamId::new("T2")),
            away_team_name: Some("Maccabi".to_owned()),
            date: "2025-11-04T18:30:00Z".parse().unwrap(),
            end_date: None,
            status,
            home_score,
            away_score,
            venue: None,
            venue_address: None,
            raw: serde_json::Value::Null,
        }
    }
}
