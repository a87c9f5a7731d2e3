//! Field-level request validation.
//!
//! Handlers collect one message per field and fail with a 422 carrying the
//! whole map, so the form can highlight every bad field at once.

use std::collections::BTreeMap;

/// Field name to message.
pub type FieldErrors = BTreeMap<String, String>;

/// Accumulates field errors. The first error recorded for a field wins.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_owned())
            .or_insert_with(|| message.to_owned());
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was recorded, the collected errors otherwise.
    ///
    /// # Errors
    ///
    /// Returns the field errors if any check failed.
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// True when `value` has at least `min` characters after trimming.
#[must_use]
pub fn min_chars(value: &str, min: usize) -> bool {
    value.trim().chars().count() >= min
}
