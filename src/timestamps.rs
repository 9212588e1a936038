//! Creation and modification timestamps, meant to be inlined into records.
//!
//! ```rust
//! use docmap::Record;
//! use docmap::timestamps::Timestamps;
//!
//! #[derive(Debug, Clone, PartialEq, Record)]
//! struct Note {
//!     body: String,
//!     #[docmap(inline)]
//!     timestamps: Timestamps,
//! }
//! ```

use chrono::{DateTime, Utc};

use crate::value::ZeroValue;

/// `created_at` / `updated_at` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, crate::Record)]
pub struct Timestamps {
    /// When the record was first saved.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

// Stored datetimes keep millisecond precision; truncating up front keeps reloaded
// records equal to the saved ones.
fn now() -> DateTime<Utc> {
    bson::DateTime::now().to_chrono()
}

impl Timestamps {
    /// Both timestamps set to now.
    pub fn now() -> Self {
        let at = now();
        Self {
            created_at: at,
            updated_at: at,
        }
    }

    /// Set `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = now();
    }

    /// Set `created_at` (if unset) and `updated_at` to now.
    pub fn stamp_created(&mut self) {
        let at = now();
        if self.created_at == DateTime::<Utc>::zero() {
            self.created_at = at;
        }
        self.updated_at = at;
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{apply_document, to_document};

    #[test]
    fn test_stamps() {
        let mut stamps = Timestamps::default();
        stamps.stamp_created();
        assert_ne!(stamps.created_at, DateTime::<Utc>::zero());
        let created = stamps.created_at;

        stamps.touch();
        stamps.stamp_created();
        assert_eq!(stamps.created_at, created);
        assert!(stamps.updated_at >= created);
    }

    #[test]
    fn test_round_trip_keeps_precision() {
        let stamps = Timestamps::now();
        let doc = to_document(&stamps).unwrap().unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["created_at", "updated_at"]);

        let mut restored = Timestamps::default();
        apply_document(&mut restored, &doc).unwrap();
        assert_eq!(restored, stamps);
    }
}
