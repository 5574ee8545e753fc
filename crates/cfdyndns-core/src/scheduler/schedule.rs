//! Schedule expressions
//!
//! Accepted forms:
//!
//! | form | example |
//! |------|---------|
//! | 5-field cron (`min hour dom month dow`) | `*/5 * * * *`, `0 3 * * MON-FRI` |
//! | named shortcut | `@hourly`, `@daily`, `@midnight`, `@weekly`, `@monthly`, `@yearly`, `@annually` |
//! | fixed interval | `@every 90s`, `@every 1h30m` |
//!
//! Cron expressions are evaluated in UTC. Day-of-week accepts 0-7 with
//! both 0 and 7 meaning Sunday. When both day-of-month and day-of-week are
//! restricted, a day matching either one fires (`0 0 1 * MON` runs on the
//! 1st and on every Monday).
//!
//! `@every` intervals are capped at `i64::MAX` nanoseconds (about 292
//! years).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::{Error, Result};

const DAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

const MAX_INTERVAL_NANOS: f64 = i64::MAX as f64;

#[derive(Debug, Clone)]
enum Kind {
    Cron(Box<CronRule>),
    Every(Duration),
}

/// One or two `cron` schedules whose fire times are merged
#[derive(Debug, Clone)]
struct CronRule {
    primary: cron::Schedule,
    /// Day-of-week half of an expression restricting both day fields
    alternate: Option<cron::Schedule>,
}

impl CronRule {
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let primary = self.primary.after(&after).next();
        let alternate = self
            .alternate
            .as_ref()
            .and_then(|schedule| schedule.after(&after).next());

        match (primary, alternate) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// A parsed schedule expression
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    kind: Kind,
}

impl Schedule {
    /// Parse a schedule expression
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(Error::schedule(expression, "empty expression"));
        }

        let kind = if let Some(descriptor) = trimmed.strip_prefix('@') {
            parse_descriptor(descriptor).map_err(|reason| Error::schedule(expression, reason))?
        } else {
            Kind::Cron(Box::new(
                parse_standard(trimmed).map_err(|reason| Error::schedule(expression, reason))?,
            ))
        };

        Ok(Self {
            expression: trimmed.to_string(),
            kind,
        })
    }

    /// The expression as given (trimmed)
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Fixed interval, for `@every` schedules
    pub fn interval(&self) -> Option<Duration> {
        match self.kind {
            Kind::Every(interval) => Some(interval),
            Kind::Cron(_) => None,
        }
    }

    /// Next cron fire time strictly after `after`
    ///
    /// Always `None` for interval schedules.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            Kind::Cron(rule) => rule.next_after(after),
            Kind::Every(_) => None,
        }
    }
}

impl FromStr for Schedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn parse_descriptor(descriptor: &str) -> std::result::Result<Kind, String> {
    let mut parts = descriptor.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();

    let standard = match name.as_str() {
        "every" => {
            let duration: String = parts.collect();
            return parse_interval(&duration).map(Kind::Every);
        }
        "yearly" | "annually" => "0 0 1 1 *",
        "monthly" => "0 0 1 * *",
        "weekly" => "0 0 * * 0",
        "daily" | "midnight" => "0 0 * * *",
        "hourly" => "0 * * * *",
        other => return Err(format!("unrecognized descriptor '@{}'", other)),
    };

    if parts.next().is_some() {
        return Err(format!("'@{}' takes no arguments", name));
    }

    parse_standard(standard).map(|rule| Kind::Cron(Box::new(rule)))
}

/// Parse a 5-field expression by handing seconds-prefixed forms to `cron`
fn parse_standard(expression: &str) -> std::result::Result<CronRule, String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!(
            "expected 5 fields (minute hour day-of-month month day-of-week), found {}",
            fields.len()
        ));
    }

    let day_of_week = translate_day_of_week(fields[4])?;
    let six_field = |day_of_month: &str, day_of_week: &str| {
        let expression = format!(
            "0 {} {} {} {} {}",
            fields[0],
            fields[1],
            day_of_month,
            fields[3].to_uppercase(),
            day_of_week
        );
        cron::Schedule::from_str(&expression).map_err(|e| e.to_string())
    };

    // `cron` requires both day fields to match; classic cron wants either
    if is_wildcard(fields[2]) || is_wildcard(fields[4]) {
        Ok(CronRule {
            primary: six_field(fields[2], day_of_week.as_str())?,
            alternate: None,
        })
    } else {
        Ok(CronRule {
            primary: six_field(fields[2], "*")?,
            alternate: Some(six_field("*", day_of_week.as_str())?),
        })
    }
}

/// Unrestricted day field; stepped forms like `*/2` count as restricted
fn is_wildcard(field: &str) -> bool {
    matches!(field, "*" | "?" | "*/1")
}

/// Rewrite numeric days (0-7, Sunday = 0 or 7) as names
///
/// The `cron` crate numbers days 1-7 starting at Sunday; names are the
/// only spelling both conventions agree on.
fn translate_day_of_week(field: &str) -> std::result::Result<String, String> {
    let items = field
        .split(',')
        .map(|item| {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (item, None),
            };

            let bounds: Vec<String> = range
                .split('-')
                .map(day_name)
                .collect::<std::result::Result<_, _>>()?;

            let range = match (bounds.as_slice(), range.split_once('-')) {
                // "x-7" wraps onto Sunday, which sorts first in `cron`
                ([start, _], Some((_, "7"))) => match (start.as_str(), step) {
                    ("SUN", _) => "SUN-SAT".to_string(),
                    (_, None) => format!("{}-SAT,SUN", start),
                    (_, Some(_)) => {
                        return Err(format!(
                            "stepped ranges ending on day 7 are not supported: '{}'",
                            item
                        ));
                    }
                },
                _ => bounds.join("-"),
            };

            Ok(match step {
                Some(step) => format!("{}/{}", range, step),
                None => range,
            })
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;

    Ok(items.join(","))
}

fn day_name(token: &str) -> std::result::Result<String, String> {
    match token.parse::<usize>() {
        Ok(day) if day < DAY_NAMES.len() => Ok(DAY_NAMES[day].to_string()),
        Ok(day) => Err(format!("day of week {} is out of range 0-7", day)),
        Err(_) => Ok(token.to_uppercase()),
    }
}

/// Parse a Go-style duration (`90s`, `1h30m`, `1.5h`, `250ms`)
///
/// The result is truncated to whole seconds, with a floor of one second.
fn parse_interval(text: &str) -> std::result::Result<Duration, String> {
    if text.is_empty() {
        return Err("'@every' requires a duration".to_string());
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = text;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration '{}'", text));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid duration '{}'", text))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            "" => return Err(format!("missing unit in duration '{}'", text)),
            unit => return Err(format!("unknown unit '{}' in duration '{}'", unit, text)),
        };
        rest = &rest[unit_len..];

        total_nanos += value * unit_nanos;
    }

    if !total_nanos.is_finite() || total_nanos > MAX_INTERVAL_NANOS {
        return Err(format!("duration '{}' is too long", text));
    }

    let seconds = (total_nanos / 1e9).floor() as u64;
    Ok(Duration::from_secs(seconds.max(1)))
}

/// Produces successive fire deadlines for one job
///
/// Cron time is read from the runtime clock, anchored to UTC when the
/// ticker is created.
pub(crate) struct Ticker {
    schedule: Schedule,
    origin: (Instant, DateTime<Utc>),
    last_fire: Option<DateTime<Utc>>,
    last_deadline: Option<Instant>,
}

impl Ticker {
    pub(crate) fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            origin: (Instant::now(), Utc::now()),
            last_fire: None,
            last_deadline: None,
        }
    }

    fn wall_clock(&self, now: Instant) -> DateTime<Utc> {
        let (origin_instant, origin_wall) = self.origin;
        chrono::Duration::from_std(now.saturating_duration_since(origin_instant))
            .ok()
            .and_then(|elapsed| origin_wall.checked_add_signed(elapsed))
            .unwrap_or_else(Utc::now)
    }

    /// Deadline of the next tick, or `None` if the schedule is exhausted
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        let now = Instant::now();

        match self.schedule.kind {
            Kind::Every(interval) => {
                let base = self.last_deadline.unwrap_or(now);
                let mut next = base.checked_add(interval)?;
                // Skip ticks missed while the runtime was not polling us
                if next < now {
                    next = now.checked_add(interval)?;
                }
                self.last_deadline = Some(next);
                Some(next)
            }
            Kind::Cron(_) => {
                let wall_now = self.wall_clock(now);
                let from = match self.last_fire {
                    Some(last) if last > wall_now => last,
                    _ => wall_now,
                };
                let fire = self.schedule.next_after(from)?;
                self.last_fire = Some(fire);

                let wait = (fire - wall_now).to_std().unwrap_or(Duration::ZERO);
                now.checked_add(wait)
            }
        }
    }
}
