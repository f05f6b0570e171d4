//! Identifier validation and quoting.
//!
//! Values are always bound as parameters; identifiers cannot be, so any
//! caller-supplied table name must pass [`is_valid_identifier`] before it is
//! embedded in SQL text.

/// Returns true for a non-empty string made only of ASCII letters and digits.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Quote an identifier for MySQL, doubling any embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
