//! Trading pair definitions
//!
//! Every symbol a triangle references must be registered with its base and
//! quote currency. Leg directions are resolved from this table once, when
//! triangles are loaded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{CoreError, CoreResult, Currency, Symbol};

/// Static description of a tradable pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: Symbol,
    pub base: Currency,
    pub quote: Currency,
}

impl SymbolSpec {
    pub fn new(symbol: &str, base: &str, quote: &str) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            base: Currency::new(base),
            quote: Currency::new(quote),
        }
    }

    /// True if this pair converts between `a` and `b` in either direction
    pub fn connects(&self, a: &Currency, b: &Currency) -> bool {
        (&self.base == a && &self.quote == b) || (&self.base == b && &self.quote == a)
    }
}

/// Lookup table of known symbols
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    specs: HashMap<Symbol, SymbolSpec>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: &[SymbolSpec]) -> CoreResult<Self> {
        let mut registry = Self::new();
        for spec in specs {
            registry.insert(spec.clone())?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, spec: SymbolSpec) -> CoreResult<()> {
        if spec.base == spec.quote {
            return Err(CoreError::InvalidSymbol(format!(
                "{} has identical base and quote {}",
                spec.symbol, spec.base
            )));
        }
        if self.specs.contains_key(&spec.symbol) {
            return Err(CoreError::InvalidSymbol(format!(
                "{} registered twice",
                spec.symbol
            )));
        }
        self.specs.insert(spec.symbol.clone(), spec);
        Ok(())
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&SymbolSpec> {
        self.specs.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = SymbolRegistry::new();
        registry.insert(SymbolSpec::new("BTCUSDT", "BTC", "USDT")).unwrap();
        assert!(registry.insert(SymbolSpec::new("btcusdt", "BTC", "USDT")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_rejects_self_pair() {
        let mut registry = SymbolRegistry::new();
        assert!(registry.insert(SymbolSpec::new("USDTUSDT", "USDT", "USDT")).is_err());
    }

    #[test]
    fn test_connects_is_order_independent() {
        let spec = SymbolSpec::new("ETHBTC", "ETH", "BTC");
        assert!(spec.connects(&Currency::new("BTC"), &Currency::new("ETH")));
        assert!(spec.connects(&Currency::new("ETH"), &Currency::new("BTC")));
        assert!(!spec.connects(&Currency::new("ETH"), &Currency::new("USDT")));
    }
}
