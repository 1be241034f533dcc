//! Reduces a message set to the one severity the message button shows.
//!
//! Precedence is `Error > Warning > Success > Neutral`. The tier is always
//! derived from the messages themselves, callers recompute it after every
//! change to the log.
use super::message::{Severity, ValidationMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SeverityTier {
    Error,
    Warning,
    Success,
    #[default]
    Neutral, // info, none, or no messages at all
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonType {
    Reject,
    Emphasized,
    Accept,
    Ghost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonIcon {
    Error,
    Alert,
    MessageSuccess,
    Warning2,
}

impl ButtonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonType::Reject => "Reject",
            ButtonType::Emphasized => "Emphasized",
            ButtonType::Accept => "Accept",
            ButtonType::Ghost => "Ghost",
        }
    }
}

impl ButtonIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonIcon::Error => "sap-icon://error",
            ButtonIcon::Alert => "sap-icon://alert",
            ButtonIcon::MessageSuccess => "sap-icon://message-success",
            ButtonIcon::Warning2 => "sap-icon://warning2",
        }
    }
}

impl SeverityTier {
    pub fn button_type(&self) -> ButtonType {
        match self {
            SeverityTier::Error => ButtonType::Reject,
            SeverityTier::Warning => ButtonType::Emphasized,
            SeverityTier::Success => ButtonType::Accept,
            SeverityTier::Neutral => ButtonType::Ghost,
        }
    }
    pub fn icon(&self) -> ButtonIcon {
        match self {
            SeverityTier::Error => ButtonIcon::Error,
            SeverityTier::Warning => ButtonIcon::Alert,
            SeverityTier::Success => ButtonIcon::MessageSuccess,
            SeverityTier::Neutral => ButtonIcon::Warning2,
        }
    }
}

/// Single pass; an error locks the result.
pub fn resolve<'a, I>(messages: I) -> SeverityTier
where
    I: IntoIterator<Item = &'a ValidationMessage>,
{
    let mut tier = SeverityTier::Neutral;

    for message in messages {
        match message.severity {
            Severity::Error => return SeverityTier::Error,
            Severity::Warning => tier = SeverityTier::Warning,
            Severity::Success if tier == SeverityTier::Neutral => tier = SeverityTier::Success,
            _ => {}
        }
    }

    tier
}
