use crate::error::EngineError;

/// Trim and length-check a user-entered string. Length counts characters,
/// not bytes, so umlauts count once.
pub fn validate_bounded_string(
    value: &str,
    field: &str,
    min: usize,
    max: usize,
) -> Result<String, EngineError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min {
        return Err(EngineError::validation(
            field,
            format!("must be at least {} characters", min),
        ));
    }
    if len > max {
        return Err(EngineError::validation(
            field,
            format!("must be at most {} characters", max),
        ));
    }
    Ok(trimmed.to_string())
}

/// Offsets above a year are almost always typos (days entered as a date).
pub const MAX_REMINDER_DAYS: u32 = 365;

pub fn validate_reminder_days(days: Option<u32>, field: &str) -> Result<Option<u32>, EngineError> {
    match days {
        Some(d) if d > MAX_REMINDER_DAYS => Err(EngineError::validation(
            field,
            format!("must be at most {} days", MAX_REMINDER_DAYS),
        )),
        other => Ok(other),
    }
}
