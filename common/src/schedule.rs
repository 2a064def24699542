use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "weekday" => Some(Self::Weekday),
            "weekend" => Some(Self::Weekend),
            _ => None,
        }
    }

    pub fn of(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sat | Weekday::Sun => Self::Weekend,
            _ => Self::Weekday,
        }
    }
}

/// How a rule time is compared against the current time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchOrdering {
    /// A rule applies once `now.hour >= hour && now.minute >= minute`; the scan
    /// stops at the first rule later in both hour and minute.
    #[default]
    Legacy,
    /// The latest rule whose minute of day is not after now applies; ties go to
    /// the rule written last.
    MinuteOfDay,
}

impl MatchOrdering {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" => Some(Self::Legacy),
            "minute-of-day" | "minute_of_day" => Some(Self::MinuteOfDay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleRule {
    pub minute: u32,
    pub hour: u32,
    #[serde(rename = "dayType")]
    pub day_type: Option<DayType>,
    pub action: Toggle,
}

impl ScheduleRule {
    // Prepended to every evaluation so a day always starts switched off.
    const START_OF_DAY: Self = Self {
        minute: 0,
        hour: 0,
        day_type: None,
        action: Toggle::Off,
    };

    fn applies_on(&self, day: DayType) -> bool {
        self.day_type.map(|day_type| day_type == day).unwrap_or(true)
    }

    fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("schedule line {line}: {kind}")]
pub struct ScheduleError {
    pub line: usize,
    pub kind: ScheduleErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleErrorKind {
    #[error("expected 'minute hour daytype action', found {0} fields")]
    FieldCount(usize),
    #[error("action must be 'on' or 'off', found '{0}'")]
    UnknownAction(String),
    #[error("hour '{0}' is not a number")]
    InvalidHour(String),
    #[error("hour {0} is outside 0-23")]
    HourOutOfRange(i64),
    #[error("minute '{0}' is not a number")]
    InvalidMinute(String),
    #[error("minute {0} is outside 0-59")]
    MinuteOutOfRange(i64),
    #[error("day type must be 'weekday' or 'weekend', found '{0}'")]
    UnknownDayType(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    rules: Vec<ScheduleRule>,
}

impl Schedule {
    /// Parses every rule line of `text`, keeping file order. The first invalid
    /// line aborts the whole parse.
    pub fn parse(text: &str) -> Result<Self, ScheduleError> {
        let mut rules = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let rule = parse_rule(line).map_err(|kind| ScheduleError {
                line: index + 1,
                kind,
            })?;
            rules.push(rule);
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[ScheduleRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn current_action<T>(&self, now: &T, ordering: MatchOrdering) -> Option<Toggle>
    where
        T: Datelike + Timelike,
    {
        let today = DayType::of(now.weekday());
        let candidates = std::iter::once(&ScheduleRule::START_OF_DAY)
            .chain(self.rules.iter().filter(|rule| rule.applies_on(today)));

        match ordering {
            MatchOrdering::Legacy => {
                let (hour, minute) = (now.hour(), now.minute());
                let mut matched = None;
                for rule in candidates {
                    if minute >= rule.minute && hour >= rule.hour {
                        matched = Some(rule.action);
                    }
                    if matched.is_some() && minute < rule.minute && hour < rule.hour {
                        break;
                    }
                }
                matched
            }
            MatchOrdering::MinuteOfDay => {
                let current = now.hour() * 60 + now.minute();
                candidates
                    .filter(|rule| rule.minute_of_day() <= current)
                    .fold(None::<&ScheduleRule>, |best, rule| match best {
                        Some(best) if best.minute_of_day() > rule.minute_of_day() => Some(best),
                        _ => Some(rule),
                    })
                    .map(|rule| rule.action)
            }
        }
    }
}

/// Parses `text` and returns the action due at `now`. `None` means no action.
pub fn evaluate<T>(text: &str, now: &T, ordering: MatchOrdering) -> Result<Option<Toggle>, ScheduleError>
where
    T: Datelike + Timelike,
{
    Ok(Schedule::parse(text)?.current_action(now, ordering))
}

fn parse_rule(line: &str) -> Result<ScheduleRule, ScheduleErrorKind> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [minute, hour, day_type, action] = parts.as_slice() else {
        return Err(ScheduleErrorKind::FieldCount(parts.len()));
    };

    let action = Toggle::from_token(action)
        .ok_or_else(|| ScheduleErrorKind::UnknownAction(action.to_string()))?;

    let hour = hour
        .parse::<i64>()
        .map_err(|_| ScheduleErrorKind::InvalidHour(hour.to_string()))?;
    if !(0..=23).contains(&hour) {
        return Err(ScheduleErrorKind::HourOutOfRange(hour));
    }

    let minute = minute
        .parse::<i64>()
        .map_err(|_| ScheduleErrorKind::InvalidMinute(minute.to_string()))?;
    if !(0..=59).contains(&minute) {
        return Err(ScheduleErrorKind::MinuteOutOfRange(minute));
    }

    let day_type = DayType::from_token(day_type)
        .ok_or_else(|| ScheduleErrorKind::UnknownDayType(day_type.to_string()))?;

    Ok(ScheduleRule {
        minute: minute as u32,
        hour: hour as u32,
        day_type: Some(day_type),
        action,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;

    const WORKDAY: &str = "0 8 weekday on\n0 18 weekday off";

    fn fixed_time(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::west_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 1, day, hour, minute, 0)
            .unwrap()
    }

    // Jan 5, 2026 is a Monday; Jan 10 is a Saturday.
    fn weekday_at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        fixed_time(5, hour, minute)
    }

    fn weekend_at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        fixed_time(10, hour, minute)
    }

    #[test]
    fn workday_schedule_follows_thresholds() {
        let legacy = MatchOrdering::Legacy;

        assert_eq!(evaluate(WORKDAY, &weekday_at(9, 0), legacy), Ok(Some(Toggle::On)));
        assert_eq!(evaluate(WORKDAY, &weekday_at(19, 0), legacy), Ok(Some(Toggle::Off)));
        assert_eq!(evaluate(WORKDAY, &weekday_at(7, 0), legacy), Ok(Some(Toggle::Off)));
    }

    #[test]
    fn out_of_range_minute_rejects_whole_schedule() {
        let text = "0 8 weekday on\n0 18 weekday off\n70 8 weekday on";

        let err = Schedule::parse(text).unwrap_err();

        assert_eq!(err.line, 3);
        assert_eq!(err.kind, ScheduleErrorKind::MinuteOutOfRange(70));
        assert!(evaluate(text, &weekday_at(9, 0), MatchOrdering::Legacy).is_err());
    }

    #[test]
    fn day_type_filters_rules() {
        let text = "0 9 weekend on";

        assert_eq!(
            evaluate(text, &weekday_at(10, 0), MatchOrdering::Legacy),
            Ok(Some(Toggle::Off))
        );
        assert_eq!(
            evaluate(text, &weekend_at(10, 0), MatchOrdering::Legacy),
            Ok(Some(Toggle::On))
        );
        // Sunday counts as weekend too.
        assert_eq!(
            evaluate(text, &fixed_time(11, 10, 0), MatchOrdering::Legacy),
            Ok(Some(Toggle::On))
        );
    }

    #[test]
    fn filtered_rules_are_still_validated() {
        let err = Schedule::parse("0 9 weekend maybe").unwrap_err();
        assert_eq!(err.kind, ScheduleErrorKind::UnknownAction("maybe".into()));
    }

    #[test]
    fn comments_blank_lines_and_spacing_are_ignored() {
        let text = "\n# morning\n   0   8  weekday   on  \n\n#0 9 weekday off\n";
        let schedule = Schedule::parse(text).unwrap();

        assert_eq!(schedule.rules().len(), 1);
        assert_eq!(
            schedule.rules()[0],
            ScheduleRule {
                minute: 0,
                hour: 8,
                day_type: Some(DayType::Weekday),
                action: Toggle::On,
            }
        );
    }

    #[test]
    fn empty_schedule_starts_day_off() {
        let schedule = Schedule::parse("").unwrap();

        assert!(schedule.is_empty());
        assert_eq!(
            schedule.current_action(&weekday_at(12, 0), MatchOrdering::Legacy),
            Some(Toggle::Off)
        );
        assert_eq!(
            schedule.current_action(&weekday_at(12, 0), MatchOrdering::MinuteOfDay),
            Some(Toggle::Off)
        );
    }

    #[test]
    fn reports_each_grammar_violation() {
        let cases = [
            ("0 8 on", ScheduleErrorKind::FieldCount(3)),
            ("0 8 weekday on now", ScheduleErrorKind::FieldCount(5)),
            ("0 24 weekday on", ScheduleErrorKind::HourOutOfRange(24)),
            ("0 -1 weekday on", ScheduleErrorKind::HourOutOfRange(-1)),
            ("0 eight weekday on", ScheduleErrorKind::InvalidHour("eight".into())),
            ("x 8 weekday on", ScheduleErrorKind::InvalidMinute("x".into())),
            ("60 8 weekday on", ScheduleErrorKind::MinuteOutOfRange(60)),
            ("0 8 holiday on", ScheduleErrorKind::UnknownDayType("holiday".into())),
        ];

        for (line, kind) in cases {
            let err = Schedule::parse(line).unwrap_err();
            assert_eq!(err, ScheduleError { line: 1, kind }, "line {line:?}");
        }
    }

    #[test]
    fn legacy_ordering_compares_hour_and_minute_separately() {
        let text = "50 0 weekday on";

        // 23:05 is chronologically after 00:50, but 5 < 50.
        assert_eq!(
            evaluate(text, &weekday_at(23, 5), MatchOrdering::Legacy),
            Ok(Some(Toggle::Off))
        );
        assert_eq!(
            evaluate(text, &weekday_at(23, 5), MatchOrdering::MinuteOfDay),
            Ok(Some(Toggle::On))
        );
    }

    #[test]
    fn legacy_scan_stops_at_rule_later_in_hour_and_minute() {
        let text = "30 8 weekday off\n40 12 weekday off\n10 9 weekday on";

        assert_eq!(
            evaluate(text, &weekday_at(11, 20), MatchOrdering::Legacy),
            Ok(Some(Toggle::Off))
        );
        assert_eq!(
            evaluate(text, &weekday_at(11, 20), MatchOrdering::MinuteOfDay),
            Ok(Some(Toggle::On))
        );
    }

    #[test]
    fn minute_of_day_ties_go_to_last_rule() {
        let text = "0 8 weekday on\n0 8 weekday off";

        assert_eq!(
            evaluate(text, &weekday_at(8, 0), MatchOrdering::MinuteOfDay),
            Ok(Some(Toggle::Off))
        );
    }

    #[test]
    fn parses_match_ordering_names() {
        assert_eq!(MatchOrdering::parse("Legacy"), Some(MatchOrdering::Legacy));
        assert_eq!(
            MatchOrdering::parse("minute-of-day"),
            Some(MatchOrdering::MinuteOfDay)
        );
        assert_eq!(MatchOrdering::parse("chronological"), None);
    }
}
