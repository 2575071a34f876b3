/// Five-field cron expression matching
///
/// Grammar: `<minute> <hour> <dayOfMonth> <month> <dayOfWeek>` with ranges
/// [0,59] [0,23] [1,31] [1,12] [0,6] (0 = Sunday). Each field is `*`, a
/// literal, a comma list, a range `a-b`, or a step `*/n` / `a-b/n`.
/// Matching happens against the local-time components of the timestamp.
/// Malformed expressions never panic; `matches` simply returns false and
/// `validate` reports the problem for import-time checks.

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::error::{EngineError, Result};

/// A parsed cron schedule: the allowed values per field.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    minute: Vec<u32>,
    hour: Vec<u32>,
    day_of_month: Vec<u32>,
    month: Vec<u32>,
    day_of_week: Vec<u32>,
}

impl CronSchedule {
    /// Parse a five-field expression. Returns None on any malformed field.
    pub fn parse(expr: &str) -> Option<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return None;
        }
        Some(Self {
            minute: parse_field(fields[0], 0, 59)?,
            hour: parse_field(fields[1], 0, 23)?,
            day_of_month: parse_field(fields[2], 1, 31)?,
            month: parse_field(fields[3], 1, 12)?,
            day_of_week: parse_field(fields[4], 0, 6)?,
        })
    }

    /// Whether every field matches the given local timestamp.
    pub fn matches_at(&self, at: DateTime<Local>) -> bool {
        self.minute.contains(&at.minute())
            && self.hour.contains(&at.hour())
            && self.day_of_month.contains(&at.day())
            && self.month.contains(&at.month())
            && self.day_of_week.contains(&at.weekday().num_days_from_sunday())
    }
}

/// Evaluate an expression against a timestamp. Malformed input yields false.
pub fn matches(expr: &str, at: DateTime<Local>) -> bool {
    CronSchedule::parse(expr)
        .map(|schedule| schedule.matches_at(at))
        .unwrap_or(false)
}

/// Import-time validation of a cron expression.
pub fn validate(expr: &str) -> Result<()> {
    CronSchedule::parse(expr)
        .map(|_| ())
        .ok_or_else(|| EngineError::InvalidInput(format!("malformed cron expression: {expr}")))
}

/// Parse one field into the sorted set of values it allows.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    let mut values = Vec::new();
    for part in field.split(',') {
        expand_part(part, min, max, &mut values)?;
    }
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    values.dedup();
    Some(values)
}

/// Expand a single list element: `*`, `*/n`, `a`, `a-b`, `a-b/n`.
fn expand_part(part: &str, min: u32, max: u32, out: &mut Vec<u32>) -> Option<()> {
    let (base, step) = match part.split_once('/') {
        Some((base, step)) => {
            let step: u32 = step.parse().ok()?;
            if step == 0 {
                return None;
            }
            (base, step)
        }
        None => (part, 1),
    };

    let (lo, hi) = if base == "*" {
        (min, max)
    } else if let Some((a, b)) = base.split_once('-') {
        (a.parse().ok()?, b.parse().ok()?)
    } else {
        let literal: u32 = base.parse().ok()?;
        (literal, literal)
    };

    if lo < min || hi > max || lo > hi {
        return None;
    }

    let mut v = lo;
    while v <= hi {
        out.push(v);
        v += step;
    }
    Some(())
}
