use std::collections::HashMap;
use std::fmt::{self, Display};
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// Static identity of a random-choice site.
///
/// Built from where the site lives (a call-site location or a user hint) and
/// the distribution's address suffix, so two executions of the same program
/// produce the same `Address` for the same site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Join a site identity with a distribution suffix.
    pub fn new(site: &Site, distribution_suffix: &str) -> Self {
        Address(format!("{}_{}", site, distribution_suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attach an occurrence index to this address.
    pub fn suffixed(&self, instance: usize) -> SuffixedAddress {
        SuffixedAddress {
            address: self.clone(),
            instance,
        }
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An address plus its occurrence index within one execution.
///
/// Unique within a trace: the `n`-th visit of the same static site gets
/// instance `n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SuffixedAddress {
    pub address: Address,
    pub instance: usize,
}

impl Display for SuffixedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}", self.address, self.instance)
    }
}

/// Where a `sample`/`observe` call comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Site {
    /// The source location of the call, captured with `#[track_caller]`.
    Location(&'static Location<'static>),
    /// An explicit, user-supplied address hint.
    Hint(String),
}

impl Site {
    #[track_caller]
    pub fn caller() -> Self {
        Site::Location(Location::caller())
    }

    /// Prefer the hint when one is given, else fall back to the call site.
    pub fn resolve(hint: Option<&str>, location: &'static Location<'static>) -> Self {
        match hint {
            Some(h) => Site::Hint(h.to_string()),
            None => Site::Location(location),
        }
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Location(loc) => write!(f, "{}:{}:{}", loc.file(), loc.line(), loc.column()),
            Site::Hint(h) => write!(f, "{}", h),
        }
    }
}

/// Per-execution occurrence counter used to suffix addresses.
#[derive(Debug, Clone, Default)]
pub struct AddressCounter {
    counts: HashMap<Address, usize>,
}

impl AddressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next suffixed address for `address` and bump its counter.
    pub fn next(&mut self, address: &Address) -> SuffixedAddress {
        let count = self.counts.entry(address.clone()).or_insert(0);
        let suffixed = address.suffixed(*count);
        *count += 1;
        suffixed
    }

    pub fn count(&self, address: &Address) -> usize {
        self.counts.get(address).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }
}

/// Macro to create addresses from identifiers or expressions
#[macro_export]
macro_rules! addr {
    ($x:ident) => {
        $crate::address::Address::from(stringify!($x))
    };
    ($x:expr) => {
        $crate::address::Address::from($x.to_string())
    };
}
