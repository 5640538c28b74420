//! ISO-8601 durations (`P1DT2H30M`, `PT3600S`) as whole seconds.

/// Convert an ISO-8601 duration to whole seconds. Fractional seconds are
/// truncated. Year and month designators are rejected because their length
/// in seconds is not fixed. Returns `None` for anything malformed.
pub fn parse_seconds(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut total: f64 = 0.0;
    let mut number = String::new();
    let mut in_time = false;
    let mut seen_component = false;

    for c in rest.chars() {
        match c {
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            'T' if !in_time && number.is_empty() => in_time = true,
            _ => {
                if number.is_empty() {
                    return None;
                }
                let n: f64 = number.parse().ok()?;
                number.clear();
                let unit = match (in_time, c) {
                    (false, 'W') => 7.0 * 86_400.0,
                    (false, 'D') => 86_400.0,
                    (true, 'H') => 3_600.0,
                    (true, 'M') => 60.0,
                    (true, 'S') => 1.0,
                    _ => return None,
                };
                total += n * unit;
                seen_component = true;
            }
        }
    }

    if !number.is_empty() || !seen_component {
        return None;
    }
    Some(total as u64)
}
