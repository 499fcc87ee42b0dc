//! Instrument definitions and the startup registry.

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of listed instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// Call option
    Call,
    /// Put option
    Put,
    /// The underlying itself
    Underlying,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
            OptionType::Underlying => write!(f, "underlying"),
        }
    }
}

/// An immutable listed instrument, identified by symbol.
///
/// Strike and expiry are `None` for underlyings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Unique trading symbol
    pub symbol: String,
    /// Strike price in cents, if an option
    pub strike: Option<u64>,
    /// Expiry date, if an option
    pub expiry: Option<NaiveDate>,
    /// Call, put, or underlying
    pub option_type: OptionType,
    /// Symbol of the underlying this instrument references
    pub underlying: String,
}

impl Instrument {
    /// Define an underlying.
    pub fn underlying(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            strike: None,
            expiry: None,
            option_type: OptionType::Underlying,
            underlying: symbol.to_string(),
        }
    }

    /// Define an option on `underlying`.
    pub fn option(
        symbol: &str,
        option_type: OptionType,
        strike: u64,
        expiry: NaiveDate,
        underlying: &str,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            strike: Some(strike),
            expiry: Some(expiry),
            option_type,
            underlying: underlying.to_string(),
        }
    }
}

/// Registry of all tradeable instruments, populated once at startup.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    by_symbol: DashMap<String, Arc<Instrument>>,
}

impl InstrumentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a startup instrument list.
    pub fn from_instruments(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let registry = Self::new();
        for instrument in instruments {
            registry.insert(instrument);
        }
        registry
    }

    /// Register an instrument. Replaces any previous definition for the
    /// same symbol.
    pub fn insert(&self, instrument: Instrument) {
        self.by_symbol
            .insert(instrument.symbol.clone(), Arc::new(instrument));
    }

    /// Look up an instrument by symbol.
    pub fn get(&self, symbol: &str) -> Option<Arc<Instrument>> {
        self.by_symbol.get(symbol).map(|entry| Arc::clone(&entry))
    }

    /// Whether the symbol is listed.
    pub fn contains(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(symbol)
    }

    /// All listed symbols, in no particular order.
    pub fn symbols(&self) -> Vec<String> {
        self.by_symbol.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of listed instruments.
    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}
