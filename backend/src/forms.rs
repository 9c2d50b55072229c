//! Posted form data and the field-level validation errors shown next to
//! each input when a form is re-rendered.

use std::collections::{BTreeMap, HashMap};

/// Validation messages keyed by field name. `__all__` holds form-wide errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

pub const NON_FIELD: &str = "__all__";

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.get(field).is_some_and(|m| !m.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// A url-encoded form body.
#[derive(Debug, Clone, Default)]
pub struct FormData(HashMap<String, String>);

impl FormData {
    pub fn new(fields: HashMap<String, String>) -> Self {
        FormData(fields)
    }

    /// The raw value, or `""` if the field was not posted.
    pub fn get(&self, field: &str) -> &str {
        self.0.get(field).map(String::as_str).unwrap_or("")
    }

    /// The value with surrounding whitespace removed.
    pub fn trimmed(&self, field: &str) -> &str {
        self.get(field).trim()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Number of forms in a formset, from its `<prefix>-TOTAL_FORMS` field.
    pub fn total_forms(&self, prefix: &str) -> usize {
        self.trimmed(&format!("{}-TOTAL_FORMS", prefix))
            .parse()
            .unwrap_or(0)
    }

    pub fn into_inner(self) -> HashMap<String, String> {
        self.0
    }
}

impl FromIterator<(String, String)> for FormData {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        FormData(iter.into_iter().collect())
    }
}
