//! Identifiers for routes, stops, vehicles and places.
//!
//! Route codes key live vehicles and selections and get cloned on every
//! snapshot, so each identifier wraps a shared `Arc<str>`.

use std::sync::Arc;
use std::fmt;
use std::hash::{Hash, Hasher};

macro_rules! impl_identifier {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(s.as_ref().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

// Route codes are the short operator codes ("A1", "D2") shown on the filter panel.
impl_identifier!(RouteCode);
impl_identifier!(StopIdentifier);
impl_identifier!(VehicleIdentifier);
impl_identifier!(PlaceIdentifier);
