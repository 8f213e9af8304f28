//! Postal address value object embedded in accounts.
//!
//! # Invariants
//! - An address has no identity; it is stored inline in `accounts` columns
//!   and replaced wholesale with its owner.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        zip: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            zip: zip.into(),
        }
    }

    /// Rebuilds an address from its inlined columns.
    ///
    /// All-NULL columns mean the owner has no address.
    pub(crate) fn from_columns(
        street: Option<String>,
        city: Option<String>,
        state: Option<String>,
        zip: Option<String>,
    ) -> Option<Self> {
        if street.is_none() && city.is_none() && state.is_none() && zip.is_none() {
            return None;
        }
        Some(Self {
            street: street.unwrap_or_default(),
            city: city.unwrap_or_default(),
            state: state.unwrap_or_default(),
            zip: zip.unwrap_or_default(),
        })
    }
}
