//! Coordinate normalisation for raw dataset fields.
//!
//! The source marks missing survey data with empty cells, `NaN` tokens or a
//! literal zero, and some extracts use a comma as the decimal separator.

/// Normalise one raw latitude or longitude field.
///
/// Returns `None` for empty input, any-case `nan`, unparseable text,
/// non-finite values and exactly zero. Never fails.
pub fn normalize_coordinate(raw: &str) -> Option<f64> {
  let trimmed = raw.trim();
  if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
    return None;
  }

  let value: f64 = if trimmed.contains(',') {
    trimmed.replace(',', ".").parse().ok()?
  } else {
    trimmed.parse().ok()?
  };

  if !value.is_finite() || value == 0.0 {
    return None;
  }
  Some(value)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_and_nan_are_absent() {
    for raw in ["", "   ", "\t", "nan", "NaN", "NAN", " nAn "] {
      assert_eq!(normalize_coordinate(raw), None, "{raw:?}");
    }
  }

  #[test]
  fn zero_is_absent() {
    for raw in ["0", "0.0", "-0", "0,000", " 0 "] {
      assert_eq!(normalize_coordinate(raw), None, "{raw:?}");
    }
  }

  #[test]
  fn comma_decimal_separator() {
    assert_eq!(normalize_coordinate("23,5"), Some(23.5));
    assert_eq!(normalize_coordinate("-46,633308"), Some(-46.633308));
  }

  #[test]
  fn period_decimal_separator() {
    assert_eq!(normalize_coordinate("-23.550520"), Some(-23.550520));
    assert_eq!(normalize_coordinate(" 12 "), Some(12.0));
  }

  #[test]
  fn garbage_is_absent() {
    for raw in ["abc", "1.2.3", "1,234,5", "--1", "inf", "-infinity", "12°"] {
      assert_eq!(normalize_coordinate(raw), None, "{raw:?}");
    }
  }
}
