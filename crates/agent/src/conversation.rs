use std::collections::BTreeSet;
use std::sync::OnceLock;

use agendum_core::domain::slots::SlotDelta;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use regex::{Captures, Regex};

/// Per-turn facts the extractor needs besides the message text.
#[derive(Clone, Copy, Debug)]
pub struct ExtractionContext {
    pub today: NaiveDate,
    /// Zone used for clock times when the message names none.
    pub zone: Tz,
    /// Date of the session's current start; a time without a date lands here.
    pub anchor_date: Option<NaiveDate>,
}

/// Deterministic fast path from free text to a partial slot update.
///
/// Total over its input: anything it does not recognise is simply absent
/// from the returned delta.
#[derive(Clone, Debug)]
pub struct SlotExtractor {
    default_duration: Duration,
}

impl Default for SlotExtractor {
    fn default() -> Self {
        Self::new(30)
    }
}

impl SlotExtractor {
    pub fn new(default_duration_minutes: u32) -> Self {
        Self { default_duration: Duration::minutes(i64::from(default_duration_minutes.max(1))) }
    }

    pub fn extract(&self, text: &str, context: &ExtractionContext) -> SlotDelta {
        let mut delta = SlotDelta::default();
        if text.trim().is_empty() {
            return delta;
        }

        delta.attendees = extract_emails(text);
        delta.meeting_link = extract_link(text);
        delta.skip_email = wants_no_email(text);

        let scrubbed = scrub_addresses(text);
        delta.timezone = extract_timezone(&scrubbed);
        delta.title = extract_quoted_title(text).or_else(|| infer_title(&scrubbed));

        let (day, remainder) = extract_day(&scrubbed, context.today);
        let zone = delta.timezone.unwrap_or(context.zone);
        let date = day.or(context.anchor_date).unwrap_or(context.today);

        match extract_clock_window(&remainder)
            .and_then(|window| self.resolve_window(zone, date, window))
        {
            Some((start, end)) => {
                delta.start = Some(start);
                delta.end = Some(end);
            }
            None => delta.day = day,
        }

        delta
    }

    fn resolve_window(
        &self,
        zone: Tz,
        date: NaiveDate,
        window: ClockWindow,
    ) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let (start, end) = match window {
            ClockWindow::Range(start, end) => {
                (localize(zone, date, start)?, localize(zone, date, end)?)
            }
            ClockWindow::At(start) => {
                let start = localize(zone, date, start)?;
                (start, start + self.default_duration)
            }
        };

        (end > start).then_some((start, end))
    }
}

/// True when the message asks to skip the notification email.
pub fn wants_no_email(text: &str) -> bool {
    no_email_re().map(|re| re.is_match(text)).unwrap_or(false)
}

/// Zone the message names explicitly, if any.
pub fn named_zone(text: &str) -> Option<Tz> {
    extract_timezone(&scrub_addresses(text))
}

/// True when all of `candidate` is one address the extractor would pick up.
pub(crate) fn is_email_address(candidate: &str) -> bool {
    email_re().is_some_and(|re| matches_whole(re, candidate))
}

/// True when all of `candidate` is one http(s) link the extractor would pick up.
pub(crate) fn is_meeting_link(candidate: &str) -> bool {
    url_re().is_some_and(|re| matches_whole(re, candidate))
}

fn matches_whole(re: &Regex, candidate: &str) -> bool {
    re.find(candidate).is_some_and(|found| found.start() == 0 && found.end() == candidate.len())
}

fn compiled(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(source).ok()).as_ref()
}

fn email_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
}

fn url_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r#"https?://[^\s<>"']+"#)
}

fn no_email_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(
        &RE,
        r"(?i)\b(?:don['’]?t|do not|no|skip|without)\s+(?:send(?:ing)?\s+)?(?:an?\s+|the\s+|any\s+)?e-?mails?\b",
    )
}

fn iana_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(
        &RE,
        r"\b(?:America|Europe|Asia|Africa|Australia|Pacific|Atlantic|Indian|Etc|US|Canada)/[A-Za-z_]+(?:/[A-Za-z_]+)?\b",
    )
}

fn tz_abbreviation_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"\b(PT|MT|CT|ET|(?i:pst|pdt|mst|mdt|cst|cdt|est|edt))\b")
}

fn tz_word_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?i)\b(pacific|mountain|central|eastern)(?:\s+(?:standard|daylight))?(?:\s+time)?\b")
}

fn quoted_title_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r#""([^"]{2,80})"|“([^”]{2,80})”"#)
}

fn iso_date_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b")
}

fn slash_date_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}))?\b")
}

fn month_date_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(
        &RE,
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b",
    )
}

fn relative_day_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?i)\b(day after tomorrow|tomorrow|today|tonight)\b")
}

fn weekday_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(
        &RE,
        r"(?i)\b(?:next\s+|this\s+|on\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
}

fn time_range_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(
        &RE,
        r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)?\s*(?:-|–|—|to|until|till)\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)?\b",
    )
}

fn at_time_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?i)(?:\bat|@)\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)?\b")
}

fn meridiem_time_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)\b")
}

fn noon_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?i)\b(?:at\s+)?noon\b")
}

fn extract_emails(text: &str) -> BTreeSet<String> {
    let Some(re) = email_re() else {
        return BTreeSet::new();
    };
    re.find_iter(text).map(|found| found.as_str().to_ascii_lowercase()).collect()
}

fn extract_link(text: &str) -> Option<String> {
    let found = url_re()?.find(text)?;
    let link = found.as_str().trim_end_matches(['.', ',', ';', ':', ')', '!', '?']);
    Some(link.to_string())
}

fn scrub_addresses(text: &str) -> String {
    let mut scrubbed = text.to_string();
    for re in [url_re(), email_re()].into_iter().flatten() {
        scrubbed = re.replace_all(&scrubbed, " ").into_owned();
    }
    scrubbed
}

fn extract_timezone(text: &str) -> Option<Tz> {
    if let Some(zone) = iana_re()
        .into_iter()
        .flat_map(|re| re.find_iter(text))
        .find_map(|found| found.as_str().parse::<Tz>().ok())
    {
        return Some(zone);
    }

    let abbreviation = tz_abbreviation_re()
        .and_then(|re| re.captures_iter(text).last())
        .and_then(|captures| captures.get(1))
        .and_then(|found| zone_for_token(found.as_str()));
    if abbreviation.is_some() {
        return abbreviation;
    }

    tz_word_re()
        .and_then(|re| re.captures_iter(text).last())
        .and_then(|captures| captures.get(1))
        .and_then(|found| zone_for_token(found.as_str()))
}

fn zone_for_token(token: &str) -> Option<Tz> {
    match token.to_ascii_lowercase().as_str() {
        "pt" | "pst" | "pdt" | "pacific" => Some(chrono_tz::America::Los_Angeles),
        "mt" | "mst" | "mdt" | "mountain" => Some(chrono_tz::America::Denver),
        "ct" | "cst" | "cdt" | "central" => Some(chrono_tz::America::Chicago),
        "et" | "est" | "edt" | "eastern" => Some(chrono_tz::America::New_York),
        _ => None,
    }
}

fn extract_quoted_title(text: &str) -> Option<String> {
    let captures = quoted_title_re()?.captures(text)?;
    let title = captures.get(1).or_else(|| captures.get(2))?.as_str().trim();
    (!title.is_empty()).then(|| title.to_string())
}

const TITLE_STOP_WORDS: &[&str] = &[
    "with", "at", "on", "for", "from", "to", "and", "add", "tomorrow", "today", "tonight", "next",
    "this", "in", "by", "between", "about", "including", "invite", "inviting", "send", "via",
    "using", "around", "until", "before", "after", "am", "pm", "noon", "please", "pt", "mt", "ct",
    "et", "pst", "pdt", "mst", "mdt", "cst", "cdt", "est", "edt", "pacific", "mountain", "central",
    "eastern", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "sept", "oct", "nov", "dec",
];

const TITLE_ARTICLES: &[&str] = &["a", "an", "the", "my", "our"];

struct Word<'a> {
    text: &'a str,
    lower: String,
    closes_clause: bool,
}

impl Word<'_> {
    fn is_stop(&self) -> bool {
        self.text.is_empty()
            || self.text.chars().any(|c| c.is_ascii_digit())
            || TITLE_STOP_WORDS.contains(&self.lower.as_str())
    }
}

fn split_words(text: &str) -> Vec<Word<'_>> {
    text.split_whitespace()
        .map(|raw| {
            let text = raw.trim_matches(|c: char| !c.is_alphanumeric());
            Word {
                text,
                lower: text.to_lowercase(),
                closes_clause: raw.ends_with([',', '.', ';', ':', '!', '?']),
            }
        })
        .collect()
}

/// "schedule coffee with ada" style phrases become "Coffee with Ada".
fn infer_title(text: &str) -> Option<String> {
    let words = split_words(text);
    let verb_end = words.iter().enumerate().find_map(|(index, word)| {
        match word.lower.as_str() {
            "schedule" | "book" | "arrange" | "plan" | "organize" | "organise" | "setup" => {
                Some(index + 1)
            }
            "set" if words.get(index + 1).is_some_and(|next| next.lower == "up") => {
                Some(index + 2)
            }
            _ => None,
        }
    })?;

    let mut index = verb_end;
    let mut clause_closed = false;
    while words.get(index).is_some_and(|word| TITLE_ARTICLES.contains(&word.lower.as_str())) {
        index += 1;
    }

    let mut object = Vec::new();
    while let Some(word) = words.get(index) {
        if word.is_stop() || object.len() == 4 {
            break;
        }
        object.push(word.text);
        index += 1;
        if word.closes_clause {
            clause_closed = true;
            break;
        }
    }

    let mut names = Vec::new();
    if !clause_closed && words.get(index).is_some_and(|word| word.lower == "with") {
        index += 1;
        while let Some(word) = words.get(index) {
            let alphabetic = word.text.chars().all(char::is_alphabetic);
            if word.is_stop() || !alphabetic || names.len() == 2 {
                break;
            }
            names.push(capitalize(word.text));
            index += 1;
            if word.closes_clause {
                break;
            }
        }
    }

    let subject = match (object.is_empty(), names.is_empty()) {
        (true, true) => return None,
        (true, false) => "Meeting".to_string(),
        (false, _) => capitalize(&object.join(" ")),
    };

    if names.is_empty() {
        Some(subject)
    } else {
        Some(format!("{subject} with {}", names.join(" ")))
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Finds the first calendar date in `text` and returns it with the text that
/// remains once the date phrase is removed.
fn extract_day(text: &str, today: NaiveDate) -> (Option<NaiveDate>, String) {
    let candidates: [(Option<&'static Regex>, fn(&Captures<'_>, NaiveDate) -> Option<NaiveDate>);
        5] = [
        (iso_date_re(), iso_date),
        (slash_date_re(), slash_date),
        (month_date_re(), month_date),
        (relative_day_re(), relative_day),
        (weekday_re(), weekday_date),
    ];

    for (re, resolve) in candidates {
        let Some(re) = re else {
            continue;
        };
        for captures in re.captures_iter(text) {
            let Some(date) = resolve(&captures, today) else {
                continue;
            };
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let mut remainder = String::with_capacity(text.len());
            remainder.push_str(&text[..whole.start()]);
            remainder.push(' ');
            remainder.push_str(&text[whole.end()..]);
            return (Some(date), remainder);
        }
    }

    (None, text.to_string())
}

fn capture_u32(captures: &Captures<'_>, index: usize) -> Option<u32> {
    captures.get(index).and_then(|found| found.as_str().parse().ok())
}

fn iso_date(captures: &Captures<'_>, _today: NaiveDate) -> Option<NaiveDate> {
    let year = captures.get(1)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, capture_u32(captures, 2)?, capture_u32(captures, 3)?)
}

fn slash_date(captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let month = capture_u32(captures, 1)?;
    let day = capture_u32(captures, 2)?;
    match captures.get(3).and_then(|found| found.as_str().parse::<i32>().ok()) {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => upcoming(today, month, day),
    }
}

fn month_date(captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let month = month_number(&captures.get(1)?.as_str().to_ascii_lowercase())?;
    let day = capture_u32(captures, 2)?;
    match captures.get(3).and_then(|found| found.as_str().parse::<i32>().ok()) {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => upcoming(today, month, day),
    }
}

/// A month/day without a year means its next occurrence, today included.
fn upcoming(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year >= today {
        Some(this_year)
    } else {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    }
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn relative_day(captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let offset = match captures.get(1)?.as_str().to_ascii_lowercase().as_str() {
        "day after tomorrow" => 2,
        "tomorrow" => 1,
        _ => 0,
    };
    today.checked_add_signed(Duration::days(offset))
}

fn weekday_date(captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let target = captures.get(1)?.as_str().parse::<Weekday>().ok()?;
    let current = i64::from(today.weekday().num_days_from_monday());
    let wanted = i64::from(target.num_days_from_monday());
    let mut ahead = (wanted - current).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    today.checked_add_signed(Duration::days(ahead))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClockWindow {
    Range(NaiveTime, NaiveTime),
    At(NaiveTime),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    fn parse(raw: Option<&str>) -> Option<Self> {
        match raw?.chars().next()?.to_ascii_lowercase() {
            'a' => Some(Self::Am),
            'p' => Some(Self::Pm),
            _ => None,
        }
    }

    fn flip(self) -> Self {
        match self {
            Self::Am => Self::Pm,
            Self::Pm => Self::Am,
        }
    }
}

fn extract_clock_window(text: &str) -> Option<ClockWindow> {
    if let Some(captures) = time_range_re().and_then(|re| re.captures(text)) {
        if let Some((start, end)) = range_times(&captures) {
            return Some(ClockWindow::Range(start, end));
        }
    }

    for re in [at_time_re(), meridiem_time_re()].into_iter().flatten() {
        if let Some(captures) = re.captures(text) {
            let meridiem = Meridiem::parse(captures.get(3).map(|found| found.as_str()));
            let minute = capture_u32(&captures, 2).unwrap_or(0);
            if let Some(start) = clock(capture_u32(&captures, 1)?, minute, meridiem) {
                return Some(ClockWindow::At(start));
            }
        }
    }

    if noon_re().is_some_and(|re| re.is_match(text)) {
        return NaiveTime::from_hms_opt(12, 0, 0).map(ClockWindow::At);
    }

    None
}

fn range_times(captures: &Captures<'_>) -> Option<(NaiveTime, NaiveTime)> {
    let start_hour = capture_u32(captures, 1)?;
    let start_minute = capture_u32(captures, 2).unwrap_or(0);
    let end_hour = capture_u32(captures, 4)?;
    let end_minute = capture_u32(captures, 5).unwrap_or(0);
    let start_meridiem = Meridiem::parse(captures.get(3).map(|found| found.as_str()));
    let end_meridiem = Meridiem::parse(captures.get(6).map(|found| found.as_str()));

    match (start_meridiem, end_meridiem) {
        (None, Some(shared)) => {
            let end = clock(end_hour, end_minute, Some(shared))?;
            let start = clock(start_hour, start_minute, Some(shared))?;
            if start > end {
                Some((clock(start_hour, start_minute, Some(shared.flip()))?, end))
            } else {
                Some((start, end))
            }
        }
        (Some(leading), None) => {
            let start = clock(start_hour, start_minute, Some(leading))?;
            let end = clock(end_hour, end_minute, Some(leading))?;
            if end <= start && leading == Meridiem::Am {
                Some((start, clock(end_hour, end_minute, Some(Meridiem::Pm))?))
            } else {
                Some((start, end))
            }
        }
        (start_meridiem, end_meridiem) => Some((
            clock(start_hour, start_minute, start_meridiem)?,
            clock(end_hour, end_minute, end_meridiem)?,
        )),
    }
}

/// Bare hours 1 through 7 are read as afternoon.
fn clock(hour: u32, minute: u32, meridiem: Option<Meridiem>) -> Option<NaiveTime> {
    let hour = match meridiem {
        Some(Meridiem::Am) if (1..=12).contains(&hour) => hour % 12,
        Some(Meridiem::Pm) if (1..=12).contains(&hour) => hour % 12 + 12,
        Some(_) => return None,
        None if (1..=7).contains(&hour) => hour + 12,
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn localize(zone: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
    zone.from_local_datetime(&date.and_time(time)).earliest().map(|at| at.fixed_offset())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset, NaiveDate};

    use super::{
        is_email_address, is_meeting_link, named_zone, wants_no_email, ExtractionContext,
        SlotExtractor,
    };

    fn context() -> ExtractionContext {
        ExtractionContext {
            today: NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date"),
            zone: chrono_tz::America::Chicago,
            anchor_date: None,
        }
    }

    fn at(value: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(value).expect("valid timestamp")
    }

    #[test]
    fn extracts_full_scheduling_request() {
        let delta = SlotExtractor::default().extract(
            "schedule coffee with ada tomorrow 10-10:30 PT, add bob@example.com",
            &context(),
        );

        assert_eq!(delta.title.as_deref(), Some("Coffee with Ada"));
        assert_eq!(delta.timezone, Some(chrono_tz::America::Los_Angeles));
        assert_eq!(delta.start, Some(at("2026-10-20T10:00:00-07:00")));
        assert_eq!(delta.end, Some(at("2026-10-20T10:30:00-07:00")));
        assert_eq!(delta.attendees.iter().collect::<Vec<_>>(), vec!["bob@example.com"]);
        assert!(!delta.skip_email);
    }

    #[test]
    fn message_without_signals_yields_empty_delta() {
        let extractor = SlotExtractor::default();
        for text in ["", "   ", "hmm, let me think about it", "thanks!"] {
            let delta = extractor.extract(text, &context());
            assert!(delta.is_empty(), "expected empty delta for {text:?}: {delta:?}");
        }
    }

    #[test]
    fn duplicate_addresses_collapse() {
        let delta = SlotExtractor::default()
            .extract("invite ada@example.com, Ada@Example.com and cy@example.org.", &context());

        assert_eq!(
            delta.attendees.iter().cloned().collect::<Vec<_>>(),
            vec!["ada@example.com".to_string(), "cy@example.org".to_string()]
        );
    }

    #[test]
    fn first_link_wins() {
        let delta = SlotExtractor::default().extract(
            "use https://meet.example.com/abc-123, or else https://zoom.example.com/j/9",
            &context(),
        );

        assert_eq!(delta.meeting_link.as_deref(), Some("https://meet.example.com/abc-123"));
        assert!(delta.start.is_none(), "digits inside links are not times");
    }

    #[test]
    fn pacific_abbreviation_follows_daylight_rules_of_the_event_date() {
        let extractor = SlotExtractor::default();

        let summer = extractor.extract("2026-10-20 10-11 PT", &context());
        assert_eq!(summer.timezone, Some(chrono_tz::America::Los_Angeles));
        assert_eq!(summer.start, Some(at("2026-10-20T10:00:00-07:00")));

        let winter = extractor.extract("2026-12-01 10-11 PT", &context());
        assert_eq!(winter.timezone, Some(chrono_tz::America::Los_Angeles));
        assert_eq!(winter.start, Some(at("2026-12-01T10:00:00-08:00")));
        assert_eq!(winter.end, Some(at("2026-12-01T11:00:00-08:00")));
    }

    #[test]
    fn explicit_zone_id_overrides_abbreviation() {
        let delta =
            SlotExtractor::default().extract("tomorrow at 9am ET, actually America/Denver", &context());

        assert_eq!(delta.timezone, Some(chrono_tz::America::Denver));
        assert_eq!(delta.start, Some(at("2026-10-20T09:00:00-06:00")));
    }

    #[test]
    fn timezone_words_map_like_abbreviations() {
        let extractor = SlotExtractor::default();
        let cases = [
            ("3pm pacific time", chrono_tz::America::Los_Angeles),
            ("mountain", chrono_tz::America::Denver),
            ("Central Standard Time please", chrono_tz::America::Chicago),
            ("eastern", chrono_tz::America::New_York),
            ("10am pst", chrono_tz::America::Los_Angeles),
        ];

        for (text, zone) in cases {
            assert_eq!(extractor.extract(text, &context()).timezone, Some(zone), "{text}");
        }
    }

    #[test]
    fn meridiem_inference_over_ranges() {
        let extractor = SlotExtractor::default();
        let cases = [
            ("tomorrow 2-3pm", "2026-10-20T14:00:00-05:00", "2026-10-20T15:00:00-05:00"),
            ("tomorrow 11-1pm", "2026-10-20T11:00:00-05:00", "2026-10-20T13:00:00-05:00"),
            ("tomorrow 11am to 1pm", "2026-10-20T11:00:00-05:00", "2026-10-20T13:00:00-05:00"),
            ("tomorrow 11am-1", "2026-10-20T11:00:00-05:00", "2026-10-20T13:00:00-05:00"),
            ("tomorrow 9-10:15", "2026-10-20T09:00:00-05:00", "2026-10-20T10:15:00-05:00"),
            ("tomorrow 2-3", "2026-10-20T14:00:00-05:00", "2026-10-20T15:00:00-05:00"),
            ("tomorrow 13:00-14:30", "2026-10-20T13:00:00-05:00", "2026-10-20T14:30:00-05:00"),
        ];

        for (text, start, end) in cases {
            let delta = extractor.extract(text, &context());
            assert_eq!(delta.start, Some(at(start)), "start for {text}");
            assert_eq!(delta.end, Some(at(end)), "end for {text}");
        }
    }

    #[test]
    fn reversed_range_is_discarded() {
        let delta = SlotExtractor::default().extract("tomorrow 5pm-4pm", &context());

        assert!(delta.start.is_none());
        assert!(delta.end.is_none());
        assert_eq!(delta.day, NaiveDate::from_ymd_opt(2026, 10, 20));
    }

    #[test]
    fn single_time_uses_default_duration() {
        let delta = SlotExtractor::new(45).extract("book a review friday at 3pm", &context());

        assert_eq!(delta.title.as_deref(), Some("Review"));
        assert_eq!(delta.start, Some(at("2026-10-23T15:00:00-05:00")));
        assert_eq!(delta.end, Some(at("2026-10-23T15:45:00-05:00")));
    }

    #[test]
    fn dates_resolve_relative_to_today() {
        let extractor = SlotExtractor::default();
        let cases = [
            ("move it to friday", NaiveDate::from_ymd_opt(2026, 10, 23)),
            ("next monday works", NaiveDate::from_ymd_opt(2026, 10, 26)),
            ("how about Oct 21", NaiveDate::from_ymd_opt(2026, 10, 21)),
            ("on March 3rd", NaiveDate::from_ymd_opt(2027, 3, 3)),
            ("11/2 then", NaiveDate::from_ymd_opt(2026, 11, 2)),
            ("2027-01-15", NaiveDate::from_ymd_opt(2027, 1, 15)),
            ("the day after tomorrow", NaiveDate::from_ymd_opt(2026, 10, 21)),
            ("today", NaiveDate::from_ymd_opt(2026, 10, 19)),
        ];

        for (text, expected) in cases {
            let delta = extractor.extract(text, &context());
            assert_eq!(delta.day, expected, "{text}");
            assert!(delta.start.is_none(), "{text} carries no clock time");
        }
    }

    #[test]
    fn time_without_date_lands_on_anchor_date() {
        let mut context = context();
        context.anchor_date = NaiveDate::from_ymd_opt(2026, 11, 4);

        let delta = SlotExtractor::default().extract("make it 2-2:30pm instead", &context);

        assert_eq!(delta.start, Some(at("2026-11-04T14:00:00-06:00")));
        assert_eq!(delta.end, Some(at("2026-11-04T14:30:00-06:00")));
    }

    #[test]
    fn titles_follow_leading_verb_phrases() {
        let extractor = SlotExtractor::default();
        let cases = [
            ("schedule meeting with Ada tomorrow 10-10:30", Some("Meeting with Ada")),
            ("please set up a team sync with Grace Hopper on friday", Some("Team sync with Grace Hopper")),
            ("schedule with ada", Some("Meeting with Ada")),
            ("book a 1:1 tomorrow", None),
            ("Let's plan \"Quarterly review\" for next week", Some("Quarterly review")),
            ("add bob@example.com", None),
        ];

        for (text, expected) in cases {
            assert_eq!(extractor.extract(text, &context()).title.as_deref(), expected, "{text}");
        }
    }

    #[test]
    fn skip_email_phrases() {
        for text in ["no email", "Don't send an email please", "skip emails", "do not email them"] {
            assert!(wants_no_email(text), "{text}");
        }
        for text in ["email bob", "no, send it", "yes"] {
            assert!(!wants_no_email(text), "{text}");
        }

        let delta = SlotExtractor::default().extract("no email", &context());
        assert!(delta.skip_email);
        assert_eq!(delta.field_names(), vec!["skip_email"]);
    }

    #[test]
    fn address_and_link_checks_cover_the_whole_value() {
        assert!(is_email_address("grace@example.com"));
        assert!(!is_email_address("a@b.c1"));
        assert!(!is_email_address("grace@example.com, bob@example.com"));
        assert!(!is_email_address("<grace@example.com>"));

        assert!(is_meeting_link("https://meet.example.com/abc-defg"));
        assert!(!is_meeting_link("ftp://files.example.com"));
        assert!(!is_meeting_link("https://meet.example.com/a b"));
    }

    #[test]
    fn named_zone_ignores_addresses() {
        assert_eq!(named_zone("tomorrow 10am PT"), Some(chrono_tz::America::Los_Angeles));
        assert_eq!(named_zone("make it eastern time"), Some(chrono_tz::America::New_York));
        assert_eq!(named_zone("add ET@example.com"), None);
        assert_eq!(named_zone("tomorrow at 10"), None);
    }
}
