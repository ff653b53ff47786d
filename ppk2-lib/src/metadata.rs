//! Parser for the metadata block the PPK2 sends in reply to `GET_META_DATA`.
//!
//! The block is plain text, one `KEY: value` pair per line, closed by `END`:
//!
//! ```text
//! Calibrated: 1
//! R0: 1031.64
//! GS0: 0.0
//! ...
//! HW: 9173
//! IA: 56
//! END
//! ```

use crate::calibration::{CalibrationTableBuilder, ConstantKey};
use crate::constants::METADATA_END;
use crate::error::PpkError;
use tracing::debug;

/// True once the accumulated text contains the block terminator.
pub fn metadata_complete(text: &str) -> bool {
    text.lines().any(|line| line.trim() == METADATA_END)
}

/// Parse a metadata block into a builder. Validation is left to
/// [`CalibrationTableBuilder::build`].
pub fn parse_metadata(text: &str) -> Result<CalibrationTableBuilder, PpkError> {
    let mut builder = CalibrationTableBuilder::default();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim_end_matches('\r');
        if line.trim() == METADATA_END {
            break;
        }
        let Some((key, value)) = line.split_once(": ") else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            "Calibrated" => builder.set_calibrated(parse_flag(value, line_no)?),
            "HW" => builder.set_hw(value),
            "IA" => builder.set_ia(value),
            _ => {
                let Some((constant, range)) = split_constant_key(key) else {
                    debug!(line = line_no, key, "Ignoring unrecognised metadata key");
                    continue;
                };

                let value = value.parse::<f64>().map_err(|e| PpkError::Metadata {
                    line: line_no,
                    message: format!("{key}: {value:?} is not a number ({e})"),
                })?;
                if builder.set(constant, range, value).is_err() {
                    debug!(line = line_no, key, "Ignoring constant for a range beyond the table");
                }
            }
        }
    }

    Ok(builder)
}

// `GS3` -> (GS, 3). Keys without a trailing range number are not constants.
fn split_constant_key(key: &str) -> Option<(ConstantKey, usize)> {
    let digits = key.find(|c: char| c.is_ascii_digit())?;
    let (name, range) = key.split_at(digits);
    if !range.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((name.parse().ok()?, range.parse().ok()?))
}

fn parse_flag(value: &str, line: usize) -> Result<bool, PpkError> {
    if let Ok(number) = value.parse::<i64>() {
        return Ok(number != 0);
    }
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        _ => Err(PpkError::Metadata {
            line,
            message: format!("Calibrated: {value:?} is not a flag"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert!(parse_flag("1", 1).unwrap());
        assert!(!parse_flag("0", 1).unwrap());
        assert!(parse_flag("True", 1).unwrap());
        assert!(!parse_flag("no", 1).unwrap());
        assert!(matches!(parse_flag("maybe", 7), Err(PpkError::Metadata { line: 7, .. })));
    }

    #[test]
    fn test_constant_key_split() {
        assert_eq!(split_constant_key("R0"), Some((ConstantKey::R, 0)));
        assert_eq!(split_constant_key("UG4"), Some((ConstantKey::UG, 4)));
        assert_eq!(split_constant_key("GS12"), Some((ConstantKey::GS, 12)));
        assert_eq!(split_constant_key("GS"), None);
        assert_eq!(split_constant_key("R0x"), None);
        assert_eq!(split_constant_key("0R"), None);
        assert_eq!(split_constant_key("FOO7"), None);
    }

    #[test]
    fn test_terminator_detection() {
        assert!(!metadata_complete("Calibrated: 1\nR0: 1.0\n"));
        assert!(metadata_complete("Calibrated: 1\nR0: 1.0\nEND\n"));
        assert!(metadata_complete("R0: 1.0\r\nEND\r\n"));
    }

    #[test]
    fn test_lines_after_end_are_ignored() {
        let builder = parse_metadata("R0: 1.0\nEND\nR1: 2.0\n").unwrap();
        assert_eq!(builder.get(ConstantKey::R, 0), Some(1.0));
        assert_eq!(builder.get(ConstantKey::R, 1), None);
    }
}
