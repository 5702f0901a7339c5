//! Name and identity indexed registry.
//!
//! Both the call manager and each call keep one of these. Entries get a
//! sequential identity starting from 1 (0 is reserved) and a unique
//! human-usable name. Lookup tries the name map first and falls back to
//! parsing the identifier as an identity.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::error::{ReplError, Result};
use crate::names::unique_name;

/// Identity type usable as a registry key.
pub trait RegistryKey: Copy + Eq + Hash + fmt::Display + FromStr + From<u64> {
    /// Registry kind, used in errors and logs.
    const KIND: &'static str;
}

macro_rules! registry_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Raw numeric value.
            #[inline]
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl RegistryKey for $name {
            const KIND: &'static str = $kind;
        }
    };
}

registry_id!(
    /// Identity of a registered call.
    CallId,
    "call"
);

registry_id!(
    /// Identity of an invocation within its call.
    InvocationId,
    "invocation"
);

/// Registry mapping names and identities to entries.
pub(crate) struct Registry<K, V> {
    /// Identities by name.
    by_name: HashMap<String, K>,
    /// Entries by identity.
    entries: HashMap<K, V>,
    /// Next identity to assign.
    next_id: u64,
}

impl<K: RegistryKey, V: Clone> Registry<K, V> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            entries: HashMap::new(),
            next_id: 1, // Start from 1, 0 is reserved
        }
    }

    /// Assign an identity and a unique name, build the entry and store it.
    ///
    /// `build` receives the assigned identity and name.
    pub fn insert(
        &mut self,
        requested: Option<&str>,
        attempts: usize,
        build: impl FnOnce(K, &str) -> V,
    ) -> Result<V> {
        let name = unique_name(K::KIND, requested, attempts, |candidate| {
            self.by_name.contains_key(candidate)
        })?;

        let id = K::from(self.next_id);
        self.next_id += 1;

        let entry = build(id, &name);
        self.entries.insert(id, entry.clone());
        self.by_name.insert(name, id);
        Ok(entry)
    }

    /// Resolve a name, or failing that an identity, to its entry.
    pub fn lookup(&self, identifier: &str) -> Result<V> {
        let id = match self.by_name.get(identifier) {
            Some(id) => Some(*id),
            None => identifier.parse::<K>().ok(),
        };

        id.and_then(|id| self.entries.get(&id))
            .cloned()
            .ok_or_else(|| ReplError::NotFound {
                kind: K::KIND,
                key: identifier.to_string(),
            })
    }

    /// Get an entry by identity.
    pub fn get(&self, id: K) -> Option<V> {
        self.entries.get(&id).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
