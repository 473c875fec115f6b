//! One sensor sample: an ordered list of named scalar fields.

use std::fmt;

/// Fields returned by one successful driver read, in the order the driver
/// produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reading {
    fields: Vec<(String, f64)>,
}

impl Reading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Reading::set).
    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Sets `field`, replacing an earlier value of the same name.
    pub fn set(&mut self, field: impl Into<String>, value: f64) {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields.iter().map(|(name, v)| (name.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Renders `field=value` pairs separated by spaces.
impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}
