//! Derived ladder metrics
//!
//! Imbalance volume, order flow strength and bid/ask size percentages, all
//! computed from the engine's current per-price state. Everything here is a
//! query except [`calculate_bid_ask_percentages`], which rebuilds the
//! percentage maps and should only run on book events.
//!
//! [`calculate_bid_ask_percentages`]: OrderFlowEngine::calculate_bid_ask_percentages

use crate::data::{BidAskPerc, BookSide, OrderFlowStrength, StrengthMode};
use crate::engine::OrderFlowEngine;
use rust_decimal::Decimal;

const PERCENT: f64 = 100.0;

/// Most levels walked per side when building bid/ask percentages
pub const MAX_VISIBLE_LEVELS: usize = 2_000;

impl OrderFlowEngine {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // IMBALANCE
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn invalidate_span(&self, tick_size: Decimal) -> Decimal {
        Decimal::from(self.config.imbalance_invalidate_distance)
            .checked_mul(tick_size)
            .unwrap_or(Decimal::MAX)
    }

    fn outweighs(&self, size: i64, opposite: i64) -> bool {
        size as f64 >= opposite as f64 * self.config.imbalance_factor
    }

    /// Window buy volume at prices that outweigh the sells one tick below.
    ///
    /// A level stops counting once `current_price` trades more than the
    /// invalidation distance below it.
    pub fn imbalanced_buy_volume(&self, current_price: Decimal, tick_size: Decimal) -> i64 {
        let span = self.invalidate_span(tick_size);

        self.buys.trades.fold(0, |acc, price, trade| {
            // A floor below Decimal::MIN can never be crossed
            if matches!(price.checked_sub(span), Some(floor) if current_price < floor) {
                return acc;
            }
            let below = price.checked_sub(tick_size);
            match below.and_then(|below| self.sells.cumulative_at(&below)) {
                Some(sells) if self.outweighs(trade.cumulative_size, sells) => acc + trade.cumulative_size,
                _ => acc,
            }
        })
    }

    /// Window sell volume at prices that outweigh the buys one tick above.
    ///
    /// A level stops counting once `current_price` trades more than the
    /// invalidation distance above it.
    pub fn imbalanced_sell_volume(&self, current_price: Decimal, tick_size: Decimal) -> i64 {
        let span = self.invalidate_span(tick_size);

        self.sells.trades.fold(0, |acc, price, trade| {
            if matches!(price.checked_add(span), Some(ceiling) if current_price > ceiling) {
                return acc;
            }
            let above = price.checked_add(tick_size);
            match above.and_then(|above| self.buys.cumulative_at(&above)) {
                Some(buys) if self.outweighs(trade.cumulative_size, buys) => acc + trade.cumulative_size,
                _ => acc,
            }
        })
    }

    /// Session buys at `price` strictly outweigh session sells one tick below
    pub fn is_session_buy_imbalance(&self, price: Decimal, tick_size: Decimal) -> bool {
        let buys = self.session_buys_at(price);
        let sells = price
            .checked_sub(tick_size)
            .map_or(0, |below| self.session_sells_at(below));
        buys > 0 && sells > 0 && buys as f64 > sells as f64 * self.config.imbalance_factor
    }

    /// Session sells at `price` strictly outweigh session buys one tick above
    pub fn is_session_sell_imbalance(&self, price: Decimal, tick_size: Decimal) -> bool {
        let sells = self.session_sells_at(price);
        let buys = price
            .checked_add(tick_size)
            .map_or(0, |above| self.session_buys_at(above));
        buys > 0 && sells > 0 && sells as f64 > buys as f64 * self.config.imbalance_factor
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // STRENGTH
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Buy/sell pressure as percentages.
    ///
    /// In `Combined` mode the imbalance and window volumes are summed before
    /// dividing, so larger volumes weigh more than an average of the two
    /// ratios would. Zero sums on either component become 1/1.
    pub fn order_flow_strength(
        &self,
        mode: StrengthMode,
        price: Decimal,
        tick_size: Decimal,
    ) -> OrderFlowStrength {
        if self.trade_levels_in_window() < self.config.min_activity_trades {
            return OrderFlowStrength::default();
        }

        let (buy_imbalance, sell_imbalance) = neutral_if_empty(
            self.imbalanced_buy_volume(price, tick_size),
            self.imbalanced_sell_volume(price, tick_size),
        );
        let (buys, sells) = neutral_if_empty(self.buys_in_window(), self.sells_in_window());

        let (buy, sell) = match mode {
            StrengthMode::Imbalance => (buy_imbalance, sell_imbalance),
            StrengthMode::BuySell => (buys, sells),
            StrengthMode::Combined => (buys + buy_imbalance, sells + sell_imbalance),
        };

        let total = (buy + sell) as f64;
        let strength = OrderFlowStrength {
            buy: buy as f64 / total * PERCENT,
            sell: sell as f64 / total * PERCENT,
        };
        tracing::trace!(?mode, %strength, "order flow strength");
        strength
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // BID/ASK PERCENTAGES
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Rebuilds the bid/ask percentage maps for the visible range.
    ///
    /// Asks are walked up from `curr_ask` while below `upper_cutoff`, bids
    /// down from `curr_bid` while above `lower_cutoff`. Each level gets its
    /// size as a fraction of the largest size found on either side.
    /// Each walk stops after [`MAX_VISIBLE_LEVELS`] ticks, so a cutoff far
    /// from the touch only costs that many lookups. Returns the largest size.
    pub fn calculate_bid_ask_percentages(
        &self,
        tick_size: Decimal,
        curr_bid: Decimal,
        curr_ask: Decimal,
        lower_cutoff: Decimal,
        upper_cutoff: Decimal,
    ) -> i64 {
        self.bids.perc.clear();
        self.asks.perc.clear();

        if tick_size <= Decimal::ZERO {
            tracing::debug!(%tick_size, "skipping bid/ask percentages for non-positive tick");
            return 0;
        }

        let asks = self.visible_levels(BookSide::Ask, curr_ask, tick_size, |p| p < upper_cutoff);
        let bids = self.visible_levels(BookSide::Bid, curr_bid, -tick_size, |p| p > lower_cutoff);

        let largest = asks
            .iter()
            .chain(bids.iter())
            .map(|(_, size)| *size)
            .max()
            .unwrap_or(0);

        for (side, levels) in [(BookSide::Ask, asks), (BookSide::Bid, bids)] {
            let perc_map = &self.book(side).perc;
            for (price, size) in levels {
                let perc = if largest > 0 { size as f64 / largest as f64 } else { 0.0 };
                perc_map.insert(price, BidAskPerc { size, perc });
            }
        }

        largest
    }

    fn visible_levels<F>(
        &self,
        side: BookSide,
        start: Decimal,
        step: Decimal,
        in_range: F,
    ) -> Vec<(Decimal, i64)>
    where
        F: Fn(Decimal) -> bool,
    {
        let resting = &self.book(side).resting;
        let mut levels = Vec::new();
        let mut price = start;

        for _ in 0..MAX_VISIBLE_LEVELS {
            if !in_range(price) {
                break;
            }
            if let Some(level) = resting.get(&price) {
                levels.push((price, level.size));
            }
            price = match price.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        levels
    }
}

fn neutral_if_empty(buy: i64, sell: i64) -> (i64, i64) {
    if buy + sell == 0 {
        (1, 1)
    } else {
        (buy, sell)
    }
}
