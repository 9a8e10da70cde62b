//! Output formatting for CLI commands

use serde::Serialize;

use crate::error::PolicyViolation;

/// Pretty JSON, or `{}` if the value cannot be serialized
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// One line per normalization, or a note that none happened
pub fn format_violations(violations: &[PolicyViolation]) -> String {
    if violations.is_empty() {
        return "no values normalized".to_string();
    }
    violations
        .iter()
        .map(|v| format!("normalized {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_violations() {
        assert_eq!(format_violations(&[]), "no values normalized");
        let text = format_violations(&[PolicyViolation::new("delay_before_readout_secs", 9, 3)]);
        assert_eq!(text, "normalized delay_before_readout_secs: 9 is out of range, using 3");
    }
}
