//! Common types and traits for inventory bookkeeping.
//!
//! This module defines the shared constants (reserved rooms, weight bands)
//! and the lenient measurement parsing used wherever `cuft` / `lbs` strings
//! feed into arithmetic.

/// Identifier of a room within a stop.
pub type RoomId = u32;

/// Room id reserved for the synthetic "Boxes" room.
///
/// Items in this room never count towards the shipment weight and the room
/// cannot be toggled manually.
pub const BOXES_ROOM_ID: RoomId = 13;

/// Weight band in lb. Every full band crossed adds a batch of boxes.
pub const DEFAULT_LBS_PER_THRESHOLD: f64 = 200.0;

/// Boxes synthesized per crossed weight band.
pub const DEFAULT_BOXES_PER_THRESHOLD: u32 = 3;

/// Largest `lbs` / `cuft` value accepted from user input.
pub const MAX_MEASURE: f64 = 100_000.0;

/// Parses a measurement string the way form inputs are read.
///
/// Accepts the longest leading decimal number (`"12.5 lbs"` yields `12.5`),
/// surrounding whitespace is ignored. Anything unparsable, non-finite or
/// negative yields `0.0`.
///
/// # Examples
/// ```
/// use move_inventory::types::parse_measure;
///
/// assert_eq!(parse_measure("120"), 120.0);
/// assert_eq!(parse_measure(" 45.5lbs"), 45.5);
/// assert_eq!(parse_measure(""), 0.0);
/// assert_eq!(parse_measure("heavy"), 0.0);
/// ```
pub fn parse_measure(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let prefix_len = numeric_prefix_len(trimmed);
    if prefix_len == 0 {
        return 0.0;
    }

    match trimmed[..prefix_len].parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        _ => 0.0,
    }
}

/// Length of the leading `[+-]digits[.digits][e[+-]digits]` run.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut idx = 0;

    if idx < bytes.len() && (bytes[idx] == b'+' || bytes[idx] == b'-') {
        idx += 1;
    }

    let int_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let mut digits = idx - int_start;

    if idx < bytes.len() && bytes[idx] == b'.' {
        let frac_start = idx + 1;
        let mut end = frac_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if digits > 0 || end > frac_start {
            digits += end - frac_start;
            idx = end;
        }
    }

    if digits == 0 {
        return 0;
    }

    // Exponent only counts when followed by at least one digit.
    if idx < bytes.len() && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        let mut end = idx + 1;
        if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
            end += 1;
        }
        let exp_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end > exp_start {
            idx = end;
        }
    }

    idx
}

/// Trait for objects carrying a shipment weight.
pub trait Weighted {
    /// Returns the weight in lb this object contributes to the shipment.
    fn lbs(&self) -> f64;

    /// Returns the room the object is placed in.
    fn room_id(&self) -> RoomId;

    /// Whether the object sits in the reserved boxes room.
    fn in_boxes_room(&self) -> bool {
        self.room_id() == BOXES_ROOM_ID
    }
}

/// Validation functions shared by the model and the API layer.
pub mod validation {
    /// Validates a measurement string.
    ///
    /// Empty strings are allowed (unset). Anything else must start with a
    /// non-negative number no larger than [`MAX_MEASURE`](super::MAX_MEASURE).
    ///
    /// # Returns
    /// `Ok(())` for valid values, otherwise error text
    pub fn validate_measure(value: &str, name: &str) -> Result<(), String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        if trimmed.starts_with('-') {
            return Err(format!("{} must not be negative, got: {}", name, value));
        }
        let prefix_len = super::numeric_prefix_len(trimmed);
        if prefix_len == 0 {
            return Err(format!("{} must be a number, got: {}", name, value));
        }
        match trimmed[..prefix_len].parse::<f64>() {
            Ok(parsed) if parsed.is_finite() && parsed <= super::MAX_MEASURE => Ok(()),
            _ => Err(format!(
                "{} must not exceed {}, got: {}",
                name,
                super::MAX_MEASURE,
                value
            )),
        }
    }

    /// Validates an item link.
    pub fn validate_link(value: &str) -> Result<(), String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Ok(())
        } else {
            Err(format!("Link must be an http(s) URL, got: {}", value))
        }
    }
}
