//! Triggers — next-wake computation for interval and cron jobs.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::time::Instant;

use sqlgauge_core::TriggerSpec;

use crate::error::{SchedulerError, SchedulerResult};

/// Timezone a cron expression is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CronZone {
    Local,
    Named(Tz),
}

/// A validated trigger.
#[derive(Debug, Clone)]
pub enum Trigger {
    Interval(Duration),
    Cron {
        expression: String,
        schedule: Box<Schedule>,
        zone: CronZone,
    },
}

impl Trigger {
    /// Validate a configured trigger. Malformed cron expressions and unknown
    /// zones are rejected here so a bad job never gets scheduled.
    pub fn from_spec(spec: &TriggerSpec) -> SchedulerResult<Self> {
        match spec {
            TriggerSpec::Interval(interval) => {
                if interval.is_zero() {
                    return Err(SchedulerError::InvalidInterval);
                }
                Ok(Trigger::Interval(*interval))
            }
            TriggerSpec::Cron {
                expression,
                timezone,
            } => {
                let invalid = |reason: String| SchedulerError::InvalidCron {
                    expression: expression.clone(),
                    reason,
                };
                let normalized = normalize_cron(expression).map_err(invalid)?;
                let schedule =
                    Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;
                let zone = match timezone {
                    Some(name) => CronZone::Named(
                        name.parse::<Tz>()
                            .map_err(|_| SchedulerError::InvalidTimezone(name.clone()))?,
                    ),
                    None => CronZone::Local,
                };
                Ok(Trigger::Cron {
                    expression: expression.clone(),
                    schedule: Box::new(schedule),
                    zone,
                })
            }
        }
    }

    /// Wake instant following a run that was scheduled for `last_scheduled`
    /// and completed at `now` / `wall_now`.
    pub fn next_wake(
        &self,
        last_scheduled: Instant,
        now: Instant,
        wall_now: DateTime<Utc>,
    ) -> SchedulerResult<Instant> {
        match self {
            Trigger::Interval(interval) => next_interval_wake(last_scheduled, *interval, now),
            Trigger::Cron {
                expression,
                schedule,
                zone,
            } => {
                let delay = cron_delay(expression, schedule, *zone, wall_now)?;
                now.checked_add(delay)
                    .ok_or(SchedulerError::WakeOverflow(delay))
            }
        }
    }
}

/// `last_scheduled + k * interval` for the smallest `k >= 1` that lies
/// after `now`. Missed ticks are skipped, not replayed.
pub fn next_interval_wake(
    last_scheduled: Instant,
    interval: Duration,
    now: Instant,
) -> SchedulerResult<Instant> {
    let overflow = || SchedulerError::WakeOverflow(interval);

    let first = last_scheduled.checked_add(interval).ok_or_else(overflow)?;
    if first > now {
        return Ok(first);
    }

    let step = interval.as_nanos();
    if step == 0 {
        return Err(SchedulerError::InvalidInterval);
    }
    let skipped = now.duration_since(first).as_nanos() / step + 1;
    let advance = skipped
        .checked_mul(step)
        .and_then(|nanos| u64::try_from(nanos).ok())
        .map(Duration::from_nanos)
        .ok_or_else(overflow)?;
    first.checked_add(advance).ok_or_else(overflow)
}

/// Delay from `now` until the schedule's next match in `zone`.
pub fn cron_delay(
    expression: &str,
    schedule: &Schedule,
    zone: CronZone,
    now: DateTime<Utc>,
) -> SchedulerResult<Duration> {
    let delay = match zone {
        CronZone::Local => delay_in(schedule, now.with_timezone(&Local)),
        CronZone::Named(tz) => delay_in(schedule, now.with_timezone(&tz)),
    }
    .ok_or_else(|| SchedulerError::NoUpcomingRun(expression.to_string()))?;

    match delay.to_std() {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(SchedulerError::NonPositiveDelay(expression.to_string())),
    }
}

fn delay_in<Z: TimeZone>(schedule: &Schedule, now: DateTime<Z>) -> Option<chrono::TimeDelta> {
    let next = schedule.after(&now).next()?;
    Some(next - now)
}

/// Accept classic 5-field expressions by adding a zero seconds field.
///
/// Classic cron numbers weekdays 0-7 with both 0 and 7 meaning Sunday,
/// while the evaluator numbers them 1-7 from Sunday. The day-of-week field
/// of a 5-field expression is therefore rewritten into weekday names.
fn normalize_cron(expression: &str) -> Result<String, String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.as_slice() {
        [minute, hour, dom, month, dow] => Ok(format!(
            "0 {minute} {hour} {dom} {month} {}",
            weekday_names(dow)?
        )),
        _ => Ok(fields.join(" ")),
    }
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Rewrite a classic day-of-week field (lists, ranges, steps, numbers
/// or names) as a list of weekday names.
fn weekday_names(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = [false; 7];
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid day-of-week step {step:?}"))?;
                if step == 0 {
                    return Err("day-of-week step must be positive".to_string());
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = match range {
            "*" => (0, 6),
            _ => match range.split_once('-') {
                Some((a, b)) => (weekday_number(a)?, weekday_number(b)?),
                // `n/step` runs from n to the end of the week.
                None if step > 1 => (weekday_number(range)?, 6),
                None => {
                    let n = weekday_number(range)?;
                    (n, n)
                }
            },
        };
        if start > end {
            return Err(format!("day-of-week range {range:?} is reversed"));
        }

        for day in (start..=end).step_by(step as usize) {
            days[(day % 7) as usize] = true;
        }
    }

    Ok(WEEKDAYS
        .iter()
        .zip(days)
        .filter(|(_, set)| *set)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(","))
}

/// Classic weekday number 0-7, or a three-letter name.
fn weekday_number(token: &str) -> Result<u32, String> {
    if let Ok(n) = token.parse::<u32>() {
        return match n {
            0..=7 => Ok(n),
            _ => Err(format!("day of week {n} out of range 0-7")),
        };
    }
    WEEKDAYS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .map(|i| i as u32)
        .ok_or_else(|| format!("unknown day of week {token:?}"))
}
