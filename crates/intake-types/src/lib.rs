//! Validated primitives shared across the intake crates.

/// Errors that can occur when accepting a spoken field value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValueError {
    /// The value was empty or contained only whitespace.
    #[error("field value cannot be empty")]
    Empty,
}

/// A field value as reported by the conversational layer.
///
/// Values are trimmed on construction and never empty afterwards. Comparison is exact and
/// case-sensitive on the trimmed text, which is what duplicate detection relies on:
/// `" John "` and `"John"` are the same value, `"john"` is not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldValue(String);

impl FieldValue {
    /// Accepts `raw`, trimming leading and trailing whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Empty`] if nothing remains after trimming.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        let value = FieldValue::new("  john@example.com \n").expect("non-empty");
        assert_eq!(value.as_str(), "john@example.com");
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(FieldValue::new(""), Err(ValueError::Empty));
        assert_eq!(FieldValue::new(" \t "), Err(ValueError::Empty));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let a = FieldValue::new("John").expect("non-empty");
        let b = FieldValue::new(" John ").expect("non-empty");
        let c = FieldValue::new("john").expect("non-empty");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn serializes_as_plain_trimmed_string() {
        let value = FieldValue::new(" Texas ").expect("non-empty");
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"Texas\"");
    }
}
