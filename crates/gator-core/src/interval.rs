//! Parsing of the `agg` polling interval.
//!
//! Accepts Go-style duration expressions: a sequence of decimal numbers,
//! each with an optional fraction and a unit suffix, e.g. `"45s"`, `"1m"`,
//! `"1.5m"` or `"1h30m"`. Valid units are `ns`, `us` (or `µs`), `ms`, `s`,
//! `m` and `h`.

use std::time::Duration;

use crate::{Error, Result};

/// Shortest interval the scheduler accepts between two ticks
pub const MIN_INTERVAL: Duration = Duration::from_secs(30);

/// Parse an interval string and enforce the [`MIN_INTERVAL`] floor
pub fn parse_interval(input: &str) -> Result<Duration> {
    let interval = parse_duration(input).map_err(|reason| Error::InvalidInterval {
        input: input.to_string(),
        reason,
    })?;

    ensure_min_interval(interval)?;
    Ok(interval)
}

pub(crate) fn ensure_min_interval(interval: Duration) -> Result<()> {
    if interval < MIN_INTERVAL {
        return Err(Error::IntervalTooShort {
            interval,
            minimum: MIN_INTERVAL,
        });
    }
    Ok(())
}

fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let s = input.trim();
    let s = s.strip_prefix('+').unwrap_or(s);

    if s.starts_with('-') {
        return Err("negative durations are not allowed".to_string());
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos = 0f64;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if number.is_empty() || number == "." {
            return Err(format!("expected a number at {:?}", rest));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number {:?}", number))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let nanos_per_unit = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit after {:?}", number)),
            other => return Err(format!("unknown unit {:?}", other)),
        };
        rest = &rest[unit_len..];

        total_nanos += value * nanos_per_unit;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
