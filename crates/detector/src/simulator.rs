//! Price-impact simulation against order book depth
//!
//! A buy spends a quote-currency budget lifting asks from the best price
//! upward; a sell spends a base-currency quantity hitting bids from the best
//! price downward. The last touched level is prorated. Whatever input is left
//! when the levels run out is reported as `residual_unfilled`, which callers
//! must treat as an unfillable leg.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use triarb_core::precision::{checked_ratio, deviation_pct, fee_multiplier, truncate};
use triarb_core::{PriceLevel, Side};

/// Outcome of walking one side of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillSimulation {
    pub side: Side,
    /// Input requested: quote budget for a buy, base quantity for a sell
    pub requested: Decimal,
    /// Input actually consumed
    pub input_consumed: Decimal,
    /// Base quantity bought or sold
    pub filled_quantity: Decimal,
    /// Quote value paid or received, before fees
    pub value: Decimal,
    pub average_price: Decimal,
    /// Input left over when depth ran out
    pub residual_unfilled: Decimal,
    /// Output after the taker fee: base for a buy, quote for a sell
    pub output: Decimal,
}

impl FillSimulation {
    fn empty(side: Side, requested: Decimal) -> Self {
        Self {
            side,
            requested,
            input_consumed: Decimal::ZERO,
            filled_quantity: Decimal::ZERO,
            value: Decimal::ZERO,
            average_price: Decimal::ZERO,
            residual_unfilled: requested.max(Decimal::ZERO),
            output: Decimal::ZERO,
        }
    }

    /// True when the requested input could not be fully consumed
    pub fn is_unfillable(&self) -> bool {
        self.residual_unfilled > Decimal::ZERO
    }

    /// Filled share of the request, 0 to 1
    pub fn fill_ratio(&self) -> Decimal {
        checked_ratio(self.input_consumed, self.requested).unwrap_or(Decimal::ZERO)
    }
}

/// Walk `levels` (already sorted best-first) spending `amount`
pub fn walk(side: Side, amount: Decimal, levels: &[PriceLevel], fee_rate: Decimal) -> FillSimulation {
    if amount <= Decimal::ZERO {
        return FillSimulation::empty(side, amount);
    }

    let mut remaining = amount;
    let mut filled_quantity = Decimal::ZERO;
    let mut value = Decimal::ZERO;

    for level in levels {
        if remaining.is_zero() {
            break;
        }
        if level.quantity <= Decimal::ZERO || level.price <= Decimal::ZERO {
            continue;
        }

        match side {
            Side::Buy => {
                let level_cost = truncate(level.price * level.quantity);
                if remaining >= level_cost {
                    filled_quantity += level.quantity;
                    value += level_cost;
                    remaining -= level_cost;
                } else {
                    // Prorate: spend what is left at this price
                    filled_quantity += truncate(remaining / level.price);
                    value += remaining;
                    remaining = Decimal::ZERO;
                }
            }
            Side::Sell => {
                let take = remaining.min(level.quantity);
                filled_quantity += take;
                value += truncate(take * level.price);
                remaining -= take;
            }
        }
    }

    let input_consumed = amount - remaining;
    let gross_output = match side {
        Side::Buy => filled_quantity,
        Side::Sell => value,
    };

    FillSimulation {
        side,
        requested: amount,
        input_consumed,
        filled_quantity,
        value,
        average_price: checked_ratio(value, filled_quantity).unwrap_or(Decimal::ZERO),
        residual_unfilled: remaining,
        output: truncate(gross_output * fee_multiplier(fee_rate)),
    }
}

/// Instantaneous conversion at the best price, ignoring depth
///
/// Buy: `amount / ask x (1 - fee)`. Sell: `amount x bid x (1 - fee)`.
/// Returns an unfillable result when the side is empty.
pub fn top_of_book(side: Side, amount: Decimal, levels: &[PriceLevel], fee_rate: Decimal) -> FillSimulation {
    let Some(best) = levels.first() else {
        return FillSimulation::empty(side, amount);
    };
    if amount <= Decimal::ZERO || best.price <= Decimal::ZERO {
        return FillSimulation::empty(side, amount);
    }

    let (filled_quantity, value) = match side {
        Side::Buy => (truncate(amount / best.price), amount),
        Side::Sell => (amount, truncate(amount * best.price)),
    };
    let gross_output = match side {
        Side::Buy => filled_quantity,
        Side::Sell => value,
    };

    FillSimulation {
        side,
        requested: amount,
        input_consumed: amount,
        filled_quantity,
        value,
        average_price: best.price,
        residual_unfilled: Decimal::ZERO,
        output: truncate(gross_output * fee_multiplier(fee_rate)),
    }
}

/// True when the best level alone absorbs `amount`
pub fn best_level_covers(side: Side, amount: Decimal, levels: &[PriceLevel]) -> bool {
    levels.first().is_some_and(|best| match side {
        Side::Buy => best.notional() >= amount,
        Side::Sell => best.quantity >= amount,
    })
}

/// Deviation of the realized average price from the best price, in percent
pub fn slippage_pct(best_price: Decimal, average_price: Decimal) -> Decimal {
    if best_price.is_zero() || average_price.is_zero() {
        return Decimal::ZERO;
    }
    deviation_pct(best_price, average_price)
}
