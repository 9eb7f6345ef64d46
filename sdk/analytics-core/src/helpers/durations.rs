use std::time::Duration;

// The analytics service expresses request timeouts and response metrics as
// Go-style duration strings ("65000ms", "1.748019ms", "110.826µs").

/// Renders a duration as whole milliseconds, the form the query request
/// body expects for `timeout` and `scan_wait`.
pub fn encode_duration_to_ms(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}

/// Parses a Go-style duration string. Negative durations are rejected
/// because `Duration` cannot represent them.
pub fn parse_golang_duration(s: &str) -> Result<Duration, String> {
    let orig = s;
    let rest = s.strip_prefix('+').unwrap_or(s);
    if rest.starts_with('-') {
        return Err(format!("invalid negative duration {orig:?}"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(format!("invalid duration {orig:?}"));
    }

    let mut rest = rest;
    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (int_part, after_int) = rest.split_at(int_len);

        let mut frac_part = "";
        let mut after_frac = after_int;
        if let Some(stripped) = after_int.strip_prefix('.') {
            let frac_len = stripped
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(stripped.len());
            let (frac, after) = stripped.split_at(frac_len);
            frac_part = frac;
            after_frac = after;
        }

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("invalid duration {orig:?}"));
        }

        let unit_len = after_frac
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_frac.len());
        let (unit, next) = after_frac.split_at(unit_len);
        if unit.is_empty() {
            return Err(format!("missing unit in duration {orig:?}"));
        }
        let multiplier =
            unit_multiplier(unit).ok_or_else(|| format!("unknown unit {unit:?} in duration {orig:?}"))?;

        if !int_part.is_empty() {
            let value: u128 = int_part
                .parse()
                .map_err(|_| format!("invalid duration {orig:?}"))?;
            total_nanos = value
                .checked_mul(multiplier as u128)
                .and_then(|v| total_nanos.checked_add(v))
                .ok_or_else(|| format!("invalid duration {orig:?}"))?;
        }

        if !frac_part.is_empty() {
            // Anything beyond nanosecond precision is noise; truncate before
            // parsing so absurdly long fractions cannot overflow.
            let truncated: String = frac_part.chars().take(15).collect();
            let value: u64 = truncated
                .parse()
                .map_err(|_| format!("invalid duration {orig:?}"))?;
            let scale = 10f64.powi(truncated.len() as i32);
            let nanos = (value as f64 / scale * multiplier as f64) as u128;
            total_nanos = total_nanos
                .checked_add(nanos)
                .ok_or_else(|| format!("invalid duration {orig:?}"))?;
        }

        rest = next;
    }

    Ok(Duration::from_nanos(
        total_nanos.min(u64::MAX as u128) as u64
    ))
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60_000_000_000,
        "h" => 3_600_000_000_000,
        _ => return None,
    })
}
