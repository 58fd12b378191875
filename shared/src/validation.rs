//! Declarative field constraints.
//!
//! A request type lists its fields as [`FieldRule`]s in a fixed order. Rules
//! are checked in that order and checking stops at the first failing field,
//! so the reported field is not necessarily the only problem.

use thiserror::Error;

/// A single constraint on a string field.
#[derive(Debug, Clone, Copy)]
pub enum Constraint {
    /// The field must be present and non-empty.
    Required,
    /// Minimum length in characters.
    MinLength(usize),
    /// Maximum length in characters.
    MaxLength(usize),
    /// The value must be one of the listed literals.
    OneOf(&'static [&'static str]),
    /// Any other rule. A failing predicate is reported as `is invalid`.
    Custom(fn(&str) -> bool),
}

impl Constraint {
    fn reason(&self, value: &str) -> Option<String> {
        match *self {
            Constraint::Required if value.is_empty() => Some("is required".to_string()),
            Constraint::MinLength(min) if value.chars().count() < min => {
                Some(format!("must be at least {min} characters"))
            }
            Constraint::MaxLength(max) if value.chars().count() > max => {
                Some(format!("must be at most {max} characters"))
            }
            Constraint::OneOf(allowed) if !allowed.contains(&value) => {
                Some(format!("must be one of: {}", allowed.join(" ")))
            }
            Constraint::Custom(accepts) if !accepts(value) => Some("is invalid".to_string()),
            _ => None,
        }
    }
}

/// The first constraint a request violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// One field of a request together with the constraints it must satisfy.
///
/// An absent value skips every constraint except [`Constraint::Required`].
#[derive(Debug, Clone, Copy)]
pub struct FieldRule<'a> {
    name: &'static str,
    value: Option<&'a str>,
    constraints: &'static [Constraint],
}

impl<'a> FieldRule<'a> {
    pub const fn new(
        name: &'static str,
        value: Option<&'a str>,
        constraints: &'static [Constraint],
    ) -> Self {
        Self {
            name,
            value,
            constraints,
        }
    }

    pub fn check(&self) -> Result<(), ValidationError> {
        let Some(value) = self.value else {
            let required = self
                .constraints
                .iter()
                .any(|constraint| matches!(constraint, Constraint::Required));
            if required {
                return Err(ValidationError::new(self.name, "is required"));
            }
            return Ok(());
        };

        match self
            .constraints
            .iter()
            .find_map(|constraint| constraint.reason(value))
        {
            Some(reason) => Err(ValidationError::new(self.name, reason)),
            None => Ok(()),
        }
    }
}

/// Types whose fields carry declarative constraints.
pub trait Validate {
    /// Field rules in the order they are checked.
    fn rules(&self) -> Vec<FieldRule<'_>>;

    /// Returns the first violated constraint, if any.
    fn validate(&self) -> Result<(), ValidationError> {
        self.rules().iter().try_for_each(FieldRule::check)
    }
}
