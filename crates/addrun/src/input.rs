//! # Input Layer
//!
//! Turns the two text fields into finite numbers. Nothing that fails here
//! ever reaches the bridge.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// At least one field is blank.
    Empty,
    /// At least one field is not a finite number.
    Invalid,
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Please enter both numbers"),
            Self::Invalid => write!(f, "Please enter valid numbers"),
        }
    }
}

impl std::error::Error for InputError {}

pub type Result<T> = std::result::Result<T, InputError>;

/// Parses both fields. Blank fields are reported before malformed ones.
pub fn parse_operands(a: &str, b: &str) -> Result<(f64, f64)> {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return Err(InputError::Empty);
    }
    Ok((parse_finite(a)?, parse_finite(b)?))
}

fn parse_finite(text: &str) -> Result<f64> {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(InputError::Invalid),
    }
}

/// Adds the two fields natively, without the runtime.
pub fn local_sum(a: &str, b: &str) -> Result<f64> {
    let (a, b) = parse_operands(a, b)?;
    Ok(a + b)
}

/// Text the main panel shows for a sum.
pub fn render_sum(sum: f64) -> String {
    format!("Result: {}", sum)
}
