//! Prometheus text exposition parsing.
//!
//! Only one gauge matters here: the runner's job count, reported as one
//! line per label set. The job count of an instance is the sum over all
//! lines that start with the configured prefix.

/// Sum the last whitespace-delimited field of every line starting with `prefix`.
///
/// Fields that are not numbers count as zero.
pub fn count_jobs(payload: &str, prefix: &str) -> u64 {
    payload
        .lines()
        .filter(|line| line.starts_with(prefix))
        .map(|line| line.split_whitespace().last().map_or(0, parse_value))
        .fold(0u64, u64::saturating_add)
}

/// Parse a sample value, truncating floats and mapping junk to zero.
fn parse_value(field: &str) -> u64 {
    if let Ok(v) = field.parse::<u64>() {
        return v;
    }
    match field.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v as u64,
        _ => 0,
    }
}
