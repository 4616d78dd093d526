//! Localization collaborator contract

use crate::config::LocalizationOutput;
use crate::field::Field;
use async_trait::async_trait;

/// Produces per-locale fields from a multi-locale definition
///
/// With [`LocalizationOutput::Object`] the result groups locales by name;
/// with [`LocalizationOutput::Array`] it becomes an array of locales carrying
/// `_name` metadata per entry so array reconciliation can re-identify each
/// locale after a round trip.
#[async_trait]
pub trait Localizer: Send + Sync {
    /// Localize one field into the configured locale set
    async fn localize(&self, field: &Field, locales: &[String], output: LocalizationOutput) -> Field;
}
