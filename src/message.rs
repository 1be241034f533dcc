//! Validation messages and the session-scoped message log
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[n(0)]
    Error,
    #[n(1)]
    Warning,
    #[n(2)]
    Success,
    #[n(3)]
    Info,
    #[n(4)]
    #[default]
    None,
}

/// Value state of a single editable field.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueState {
    #[n(0)]
    #[default]
    None,
    #[n(1)]
    Error,
}

/// The editable fields of a movement line a message can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Reference,
    Quantity,
    EntryDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldTarget {
    pub line: usize,
    pub field: Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMessage {
    pub severity: Severity,
    pub key: String, // i18n key, or the backend message text
    pub params: Vec<String>,
    pub code: Option<String>, // backend message class/number, e.g. ZFSS_GR/003
    pub target: Option<FieldTarget>,
}

impl ValidationMessage {
    pub fn new(severity: Severity, key: impl Into<String>) -> Self {
        Self {
            severity,
            key: key.into(),
            params: vec![],
            code: None,
            target: None,
        }
    }
    pub fn error(key: impl Into<String>) -> Self {
        Self::new(Severity::Error, key)
    }
    pub fn warning(key: impl Into<String>) -> Self {
        Self::new(Severity::Warning, key)
    }
    pub fn success(key: impl Into<String>) -> Self {
        Self::new(Severity::Success, key)
    }
    pub fn with_params<I, P>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
    pub fn with_target(mut self, line: usize, field: Field) -> Self {
        self.target = Some(FieldTarget { line, field });
        self
    }
    /// Two messages with the same text render identically, so they are the same message.
    pub fn same_text(&self, other: &Self) -> bool {
        self.key == other.key && self.params == other.params
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.severity, self.key)?;
        if !self.params.is_empty() {
            write!(f, " [{}]", self.params.join(", "))?;
        }
        Ok(())
    }
}

/// Messages of the current bound-record session. Cleared at the start of
/// every validation pass and before every post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<ValidationMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn clear(&mut self) {
        self.messages.clear();
    }
    pub fn push(&mut self, message: ValidationMessage) {
        self.messages.push(message);
    }
    /// Adds the message unless one with the same text is already present.
    /// Returns whether it was added.
    pub fn push_unique(&mut self, message: ValidationMessage) -> bool {
        if self.messages.iter().any(|m| m.same_text(&message)) {
            return false;
        }
        self.messages.push(message);
        true
    }
    pub fn extend<I: IntoIterator<Item = ValidationMessage>>(&mut self, messages: I) {
        self.messages.extend(messages);
    }
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Error)
    }
    pub fn contains_code(&self, code: &str) -> bool {
        self.messages.iter().any(|m| m.code.as_deref() == Some(code))
    }
    pub fn first(&self) -> Option<&ValidationMessage> {
        self.messages.first()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationMessage> {
        self.messages.iter()
    }
    pub fn as_slice(&self) -> &[ValidationMessage] {
        &self.messages
    }
    pub fn len(&self) -> usize {
        self.messages.len()
    }
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a ValidationMessage;
    type IntoIter = std::slice::Iter<'a, ValidationMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_unique_compares_text_only() {
        let mut log = MessageLog::new();
        let a = ValidationMessage::error("duplicatePoItemError")
            .with_params(["00010"])
            .with_target(1, Field::Reference);
        let b = ValidationMessage::error("duplicatePoItemError")
            .with_params(["00010"])
            .with_target(2, Field::Reference);

        assert!(log.push_unique(a));
        assert!(!log.push_unique(b));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn contains_code_ignores_key() {
        let mut log = MessageLog::new();
        log.push(ValidationMessage::warning("Possible duplicate").with_code("ZFSS_GR/003"));

        assert!(log.contains_code("ZFSS_GR/003"));
        assert!(!log.contains_code("ZFSS_GR/004"));
        assert!(!log.has_errors());
    }
}
