//! Structured event entity
//!
//! An [`Event`] is the record the host application hands to the tracker:
//! a category and action, plus an optional label, numeric value and free-form
//! properties. Events are immutable once they have been handed over; the
//! `with_*` methods consume the event and are meant for construction only.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::EventId;

/// A structured telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier
    id: EventId,
    /// Event category, e.g. `"notes"`
    category: String,
    /// Action performed, e.g. `"create"`
    action: String,
    /// Optional free-text label
    label: Option<String>,
    /// Optional numeric value
    value: Option<f64>,
    /// Additional properties attached by the caller
    properties: BTreeMap<String, Value>,
    /// When the event was created on the device
    created_at: DateTime<Utc>,
}

impl Event {
    /// Creates a structured event with the given category and action
    pub fn new(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            category: category.into(),
            action: action.into(),
            label: None,
            value: None,
            properties: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Sets the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the numeric value
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Adds a single property, replacing any previous value for `key`
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the creation timestamp (useful for replaying recorded events)
    pub fn with_timestamp(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Checks the invariants the collector relies on.
    ///
    /// Category and action must be non-blank and the value, when present,
    /// must be finite.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.category.trim().is_empty() {
            return Err(DomainError::EmptyField("category"));
        }
        if self.action.trim().is_empty() {
            return Err(DomainError::EmptyField("action"));
        }
        if let Some(value) = self.value {
            if !value.is_finite() {
                return Err(DomainError::NonFiniteValue(value.to_string()));
            }
        }
        Ok(())
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_has_only_required_fields() {
        let event = Event::new("Category_example", "Action_example");
        assert_eq!(event.category(), "Category_example");
        assert_eq!(event.action(), "Action_example");
        assert!(event.label().is_none());
        assert!(event.value().is_none());
        assert!(event.properties().is_empty());
    }

    #[test]
    fn test_builder_methods() {
        let event = Event::new("notes", "create")
            .with_label("checklist")
            .with_value(3.0)
            .with_property("attachments", 2)
            .with_property("locked", true);

        assert_eq!(event.label(), Some("checklist"));
        assert_eq!(event.value(), Some(3.0));
        assert_eq!(event.properties().len(), 2);
        assert_eq!(event.properties()["locked"], Value::Bool(true));
    }

    #[test]
    fn test_validate_rejects_blank_category_and_action() {
        assert_eq!(
            Event::new("  ", "a").validate(),
            Err(DomainError::EmptyField("category"))
        );
        assert_eq!(
            Event::new("c", "").validate(),
            Err(DomainError::EmptyField("action"))
        );
    }

    #[test]
    fn test_validate_rejects_non_finite_value() {
        let event = Event::new("c", "a").with_value(f64::NAN);
        assert!(matches!(
            event.validate(),
            Err(DomainError::NonFiniteValue(_))
        ));
    }

    #[test]
    fn test_each_event_gets_its_own_id() {
        let a = Event::new("c", "a");
        let b = Event::new("c", "a");
        assert_ne!(a.id(), b.id());
    }
}
