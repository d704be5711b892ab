//! Cron expressions for the workflow schedule.
//! Format: "MIN HOUR DOM MON DOW" (5 fields, UTC, no seconds)
//! Fields accept *, */N, N, A-B, A-B/N and comma lists of those.
//! Example: "0 8 * * 1-5" = weekdays at 8:00
//!
//! Day-of-month and day-of-week follow classic cron: when both are
//! restricted a day matches if either does. A field starting with `*`
//! (including `*/N`) is not restricted.

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use leadpilot_core::error::{LeadPilotError, Result};

/// Search horizon; covers Feb 29 schedules.
const MAX_LOOKAHEAD_DAYS: i64 = 366 * 4 + 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: Field,
    hours: Field,
    days_of_month: Field,
    months: Field,
    days_of_week: Field,
}

/// Allowed values of one field as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    restricted: bool,
}

impl Field {
    fn contains(&self, value: u32) -> bool {
        self.bits & (1 << value) != 0
    }
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(LeadPilotError::Validation(format!(
                "Invalid cron expression '{expression}' (need 5 fields: MIN HOUR DOM MON DOW)"
            )));
        }

        let mut days_of_week = parse_field(parts[4], 0, 7).map_err(|e| invalid(expression, e))?;
        // 7 is Sunday too.
        if days_of_week.contains(7) {
            days_of_week.bits = (days_of_week.bits | 1) & !(1 << 7);
        }

        Ok(Self {
            expression: expression.to_string(),
            minutes: parse_field(parts[0], 0, 59).map_err(|e| invalid(expression, e))?,
            hours: parse_field(parts[1], 0, 23).map_err(|e| invalid(expression, e))?,
            days_of_month: parse_field(parts[2], 1, 31).map_err(|e| invalid(expression, e))?,
            months: parse_field(parts[3], 1, 12).map_err(|e| invalid(expression, e))?,
            days_of_week,
        })
    }

    /// First matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = after.duration_trunc(Duration::minutes(1)).ok()? + Duration::minutes(1);
        let horizon = after + Duration::days(MAX_LOOKAHEAD_DAYS);

        while candidate <= horizon {
            if !self.day_matches(candidate) {
                candidate = candidate.duration_trunc(Duration::days(1)).ok()? + Duration::days(1);
                continue;
            }
            if !self.hours.contains(candidate.hour()) {
                candidate = candidate.duration_trunc(Duration::hours(1)).ok()? + Duration::hours(1);
                continue;
            }
            if self.minutes.contains(candidate.minute()) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }

    fn day_matches(&self, at: DateTime<Utc>) -> bool {
        if !self.months.contains(at.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(at.day());
        let dow = self
            .days_of_week
            .contains(at.weekday().num_days_from_sunday());
        match (self.days_of_month.restricted, self.days_of_week.restricted) {
            (true, true) => dom || dow,
            _ => dom && dow,
        }
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

fn invalid(expression: &str, reason: String) -> LeadPilotError {
    LeadPilotError::Validation(format!("Invalid cron expression '{expression}': {reason}"))
}

fn parse_field(field: &str, min: u32, max: u32) -> std::result::Result<Field, String> {
    let mut bits = 0u64;
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("bad step in '{item}'"))?;
                if step == 0 {
                    return Err(format!("zero step in '{item}'"));
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, min, max)?, parse_value(b, min, max)?)
        } else {
            let n = parse_value(range, min, max)?;
            // "N/S" runs from N to the end of the field.
            (n, if step > 1 { max } else { n })
        };
        if start > end {
            return Err(format!("descending range '{range}'"));
        }

        for value in (start..=end).step_by(step as usize) {
            bits |= 1 << value;
        }
    }

    Ok(Field {
        bits,
        restricted: !field.starts_with('*'),
    })
}

fn parse_value(raw: &str, min: u32, max: u32) -> std::result::Result<u32, String> {
    let n: u32 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    if n < min || n > max {
        return Err(format!("{n} outside {min}-{max}"));
    }
    Ok(n)
}
