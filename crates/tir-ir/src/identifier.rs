//! Identifiers for traced variables

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Name of a traced slot. Anonymous identifiers print as `@tmp<id>`.
///
/// Two identifiers are equal only if they came from the same construction,
/// even when they carry the same name.
#[derive(Debug, Clone)]
pub struct Identifier {
    id: u64,
    name: Option<String>,
}

impl Identifier {
    pub fn anonymous() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: None,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: if name.is_empty() { None } else { Some(name) },
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The name as given by the host, if any
    pub fn raw_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => format!("@{}", name),
            None => format!("@tmp{}", self.id),
        }
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identifier {}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
