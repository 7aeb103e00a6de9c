//! Triangle definitions
//!
//! A triangle is a closed 3-currency cycle `[X, Y, Z]` traded through three
//! pairs: pair 0 connects X-Y, pair 1 connects Y-Z and pair 2 connects Z-X.
//! Leg directions for both cycle directions are resolved once from the
//! symbol registry, so evaluation never has to inspect symbol strings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CoreError, CoreResult, Currency, Direction, Side, Symbol, SymbolRegistry, SymbolSpec};

/// Triangle as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangleSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub currencies: [Currency; 3],
    pub pairs: [Symbol; 3],
}

impl TriangleSpec {
    pub fn new(currencies: [&str; 3], pairs: [&str; 3]) -> Self {
        Self {
            id: None,
            currencies: currencies.map(Currency::new),
            pairs: pairs.map(Symbol::new),
        }
    }
}

/// How a single conversion is executed on its pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "side", rename_all = "lowercase")]
pub enum LegDirection {
    /// Spend `quote`, receive `base` by lifting asks
    Buy { base: Currency, quote: Currency },
    /// Spend `base`, receive `quote` by hitting bids
    Sell { base: Currency, quote: Currency },
}

impl LegDirection {
    pub fn side(&self) -> Side {
        match self {
            LegDirection::Buy { .. } => Side::Buy,
            LegDirection::Sell { .. } => Side::Sell,
        }
    }

    /// Currency spent by this leg
    pub fn from_currency(&self) -> &Currency {
        match self {
            LegDirection::Buy { quote, .. } => quote,
            LegDirection::Sell { base, .. } => base,
        }
    }

    /// Currency received by this leg
    pub fn to_currency(&self) -> &Currency {
        match self {
            LegDirection::Buy { base, .. } => base,
            LegDirection::Sell { quote, .. } => quote,
        }
    }

    /// The same pair traded the other way
    pub fn inverse(&self) -> LegDirection {
        match self {
            LegDirection::Buy { base, quote } => LegDirection::Sell {
                base: base.clone(),
                quote: quote.clone(),
            },
            LegDirection::Sell { base, quote } => LegDirection::Buy {
                base: base.clone(),
                quote: quote.clone(),
            },
        }
    }
}

/// One conversion within a cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Leg {
    pub symbol: Symbol,
    pub direction: LegDirection,
}

impl Leg {
    /// Resolve the direction needed to convert `from` into `to` on `spec`
    pub fn resolve(spec: &SymbolSpec, from: &Currency, to: &Currency) -> CoreResult<Self> {
        let direction = if &spec.quote == from && &spec.base == to {
            LegDirection::Buy {
                base: spec.base.clone(),
                quote: spec.quote.clone(),
            }
        } else if &spec.base == from && &spec.quote == to {
            LegDirection::Sell {
                base: spec.base.clone(),
                quote: spec.quote.clone(),
            }
        } else {
            return Err(CoreError::InvalidTriangle(format!(
                "pair {} ({}/{}) does not convert {} -> {}",
                spec.symbol, spec.base, spec.quote, from, to
            )));
        };

        Ok(Self {
            symbol: spec.symbol.clone(),
            direction,
        })
    }

    pub fn side(&self) -> Side {
        self.direction.side()
    }

    pub fn from_currency(&self) -> &Currency {
        self.direction.from_currency()
    }

    pub fn to_currency(&self) -> &Currency {
        self.direction.to_currency()
    }

    /// Opposite-side leg used to unwind this conversion
    pub fn inverse(&self) -> Leg {
        Leg {
            symbol: self.symbol.clone(),
            direction: self.direction.inverse(),
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} -> {})",
            self.side(),
            self.symbol,
            self.from_currency(),
            self.to_currency()
        )
    }
}

/// Validated, immutable triangle with its leg-direction table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    pub id: String,
    pub currencies: [Currency; 3],
    pub pairs: [Symbol; 3],
    forward: [Leg; 3],
    reverse: [Leg; 3],
}

impl Triangle {
    pub fn from_spec(spec: &TriangleSpec, registry: &SymbolRegistry) -> CoreResult<Self> {
        let [x, y, z] = &spec.currencies;
        if x == y || y == z || x == z {
            return Err(CoreError::InvalidTriangle(format!(
                "currencies must be distinct: {x}, {y}, {z}"
            )));
        }

        let [p0, p1, p2] = &spec.pairs;
        if p0 == p1 || p1 == p2 || p0 == p2 {
            return Err(CoreError::InvalidTriangle(format!(
                "pairs must be distinct: {p0}, {p1}, {p2}"
            )));
        }

        let lookup = |symbol: &Symbol| {
            registry
                .get(symbol)
                .ok_or_else(|| CoreError::UnknownSymbol(symbol.to_string()))
        };
        let (s0, s1, s2) = (lookup(p0)?, lookup(p1)?, lookup(p2)?);

        let forward = [
            Leg::resolve(s0, x, y)?,
            Leg::resolve(s1, y, z)?,
            Leg::resolve(s2, z, x)?,
        ];
        let reverse = [
            Leg::resolve(s2, x, z)?,
            Leg::resolve(s1, z, y)?,
            Leg::resolve(s0, y, x)?,
        ];

        let id = spec
            .id
            .clone()
            .unwrap_or_else(|| format!("{x}-{y}-{z}"));

        Ok(Self {
            id,
            currencies: spec.currencies.clone(),
            pairs: spec.pairs.clone(),
            forward,
            reverse,
        })
    }

    pub fn legs(&self, direction: Direction) -> &[Leg; 3] {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }

    /// Currency the cycle starts and ends in
    pub fn funding_currency(&self) -> &Currency {
        &self.currencies[0]
    }

    pub fn symbols(&self) -> &[Symbol; 3] {
        &self.pairs
    }

    pub fn route(&self, direction: Direction) -> String {
        let [x, y, z] = &self.currencies;
        match direction {
            Direction::Forward => format!("{x} -> {y} -> {z} -> {x}"),
            Direction::Reverse => format!("{x} -> {z} -> {y} -> {x}"),
        }
    }
}

impl fmt::Display for Triangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
