//! Structured result of a service operation.

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Outcome of one operation: a count of affected entities and a summary
/// message, or the domain errors that stopped it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeleteStatus {
    errors: Vec<String>,
    value: usize,
    message: Option<String>,
}

impl Default for SoftDeleteStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftDeleteStatus {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            value: 0,
            message: None,
        }
    }

    pub fn success(value: usize, message: impl Into<String>) -> Self {
        Self {
            errors: Vec::new(),
            value,
            message: Some(message.into()),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let mut status = Self::new();
        status.add_error(error);
        status
    }

    /// Outcome of a key lookup that matched nothing.
    pub fn not_found(not_found_is_not_an_error: bool) -> Self {
        if not_found_is_not_an_error {
            Self::new()
        } else {
            Self::failure("Could not find the entry you ask for.")
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The count; always 0 once an error has been recorded.
    pub fn value(&self) -> usize {
        if self.has_errors() {
            0
        } else {
            self.value
        }
    }

    /// Summary message. With errors this is "Failed with N error(s)"
    /// regardless of any message set earlier.
    pub fn message(&self) -> String {
        match (self.errors.len(), &self.message) {
            (0, Some(message)) => message.clone(),
            (0, None) => "Success".to_string(),
            (1, _) => "Failed with 1 error".to_string(),
            (n, _) => format!("Failed with {n} errors"),
        }
    }

    pub fn add_error(&mut self, error: impl Into<String>) -> &mut Self {
        self.errors.push(error.into());
        self
    }

    pub fn set_value(&mut self, value: usize) -> &mut Self {
        self.value = value;
        self
    }

    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = Some(message.into());
        self
    }
}

impl Serialize for SoftDeleteStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("SoftDeleteStatus", 4)?;
        s.serialize_field("is_valid", &self.is_valid())?;
        s.serialize_field("errors", &self.errors)?;
        s.serialize_field("value", &self.value())?;
        s.serialize_field("message", &self.message())?;
        s.end()
    }
}
