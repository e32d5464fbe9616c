//! Cron utility functions
//!
//! Schedules accept the classic 5-field form (`min hour dom mon dow`) as well
//! as the seconds-precision 6/7-field form understood by the `cron` crate.
//! Classic expressions are normalized by prepending a `0` seconds field and
//! shifting numeric weekdays from 0-7 (Sunday = 0 or 7) to 1-7 (Sunday = 1).

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Rewrite an expression into the form accepted by [`Schedule::from_str`]
pub fn normalize(cron_expression: &str) -> Result<String, String> {
    let fields: Vec<&str> = cron_expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let day_of_week = translate_day_of_week(fields[4])?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], day_of_week
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(format!(
            "Invalid cron expression '{}': expected 5, 6 or 7 fields, found {n}",
            cron_expression.trim()
        )),
    }
}

fn translate_day_of_week(field: &str) -> Result<String, String> {
    let mut days = BTreeSet::new();
    let mut named = Vec::new();

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step = step
                    .parse::<u8>()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(|| format!("invalid day of week step '{step}'"))?;
                (range, Some(step))
            }
            None => (part, None),
        };

        let bounds = match (range, range.split_once('-')) {
            ("*", _) if step.is_none() => return Ok(field.to_string()),
            ("*", _) => Some((0, 6)),
            (_, Some((first, last))) => match (parse_day(first)?, parse_day(last)?) {
                (Some(first), Some(last)) if first <= last => Some((first, last)),
                (Some(first), Some(last)) => {
                    return Err(format!("day of week range {first}-{last} is inverted"));
                }
                _ => None,
            },
            (_, None) => match parse_day(range)? {
                // `n/step` runs from n to the end of the week
                Some(first) if step.is_some() => Some((first, 7)),
                Some(day) => Some((day, day)),
                None => None,
            },
        };

        match bounds {
            Some((first, last)) => {
                let step = usize::from(step.unwrap_or(1));
                days.extend((first..=last).step_by(step).map(|day| (day % 7) + 1));
            }
            None => named.push(part.to_string()),
        }
    }

    let mut parts = compress_days(&days);
    parts.extend(named);
    Ok(parts.join(","))
}

fn parse_day(token: &str) -> Result<Option<u8>, String> {
    match token.parse::<u8>() {
        Ok(day @ 0..=7) => Ok(Some(day)),
        Ok(day) => Err(format!("day of week {day} is out of range 0-7")),
        Err(_) => Ok(None),
    }
}

/// Render sorted weekdays as comma separated runs, e.g. `1,3-5`
fn compress_days(days: &BTreeSet<u8>) -> Vec<String> {
    let mut runs: Vec<(u8, u8)> = Vec::new();
    for &day in days {
        match runs.last_mut() {
            Some((_, last)) if *last + 1 == day => *last = day,
            _ => runs.push((day, day)),
        }
    }
    runs.into_iter()
        .map(|(first, last)| match last - first {
            0 => first.to_string(),
            1 => format!("{first},{last}"),
            _ => format!("{first}-{last}"),
        })
        .collect()
}

/// Parse an expression in any accepted form
///
/// # Returns
/// * `Ok(Schedule)` - The parsed schedule
/// * `Err(String)` - Human readable reason, suitable for validation errors
pub fn parse_schedule(cron_expression: &str) -> Result<Schedule, String> {
    let normalized = normalize(cron_expression)?;
    Schedule::from_str(&normalized)
        .map_err(|e| format!("Invalid cron expression '{}': {e}", cron_expression.trim()))
}

/// Whether an expression is accepted as a job schedule
pub fn is_valid(cron_expression: &str) -> bool {
    parse_schedule(cron_expression).is_ok()
}

/// Calculate the next scheduled time from a cron expression
///
/// # Returns
/// * `Some(DateTime<Utc>)` - The next scheduled time if the expression is valid
/// * `None` - If the cron expression is invalid or has no future schedules
pub fn calculate_next_scheduled_time(cron_expression: &str) -> Option<DateTime<Utc>> {
    parse_schedule(cron_expression)
        .ok()
        .and_then(|schedule| schedule.upcoming(Utc).next())
}

/// Next fire strictly after `after`
pub fn next_after(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}
