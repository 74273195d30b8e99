use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::Utc;

use crate::domain::models::types::{BookSnapshot, Order, Side, Trade};

use super::OrderbookError;

/// FIFO queue of resting orders at a single price, plus its aggregate
/// quantity so callers don't have to walk the queue for depth reporting.
#[derive(Debug, Default)]
pub struct PriceLevel {
    price: i64,
    orders: VecDeque<Order>,
    total_quantity: u64,
}

impl PriceLevel {
    fn new(price: i64) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_quantity: 0,
        }
    }

    fn push_back(&mut self, order: Order) {
        self.total_quantity += order.quantity;
        self.orders.push_back(order);
    }

    fn front_mut(&mut self) -> Option<&mut Order> {
        self.orders.front_mut()
    }

    fn pop_front(&mut self) -> Option<Order> {
        let order = self.orders.pop_front()?;
        self.total_quantity = self.total_quantity.saturating_sub(order.quantity);
        Some(order)
    }

    fn remove_by_id(&mut self, order_id: u64) -> Option<Order> {
        let idx = self.orders.iter().position(|o| o.id == order_id)?;
        let order = self.orders.remove(idx)?;
        self.total_quantity = self.total_quantity.saturating_sub(order.quantity);
        Some(order)
    }

    fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Called after partially filling the resting front order without
    /// removing it, so the level's cached aggregate stays consistent.
    fn note_quantity_decrease(&mut self, amount: u64) {
        self.total_quantity = self.total_quantity.saturating_sub(amount);
    }
}

/// Ordered container of price levels for one side of the book.
///
/// `descending` controls which end of the `BTreeMap` is "best": bids want
/// the highest price first, asks want the lowest. The best price is cached
/// alongside the map so `best_price()` never has to touch the tree.
pub struct PriceLevelIndex {
    levels: BTreeMap<i64, PriceLevel>,
    descending: bool,
    best: Option<i64>,
}

impl PriceLevelIndex {
    pub fn new(descending: bool) -> Self {
        Self {
            levels: BTreeMap::new(),
            descending,
            best: None,
        }
    }

    pub fn best_price(&self) -> Option<i64> {
        self.best
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    fn recompute_best(&mut self) {
        self.best = if self.descending {
            self.levels.keys().next_back().copied()
        } else {
            self.levels.keys().next().copied()
        };
    }

    pub fn insert(&mut self, order: Order) {
        let price = order.price.expect("resting order must carry a price");
        let level = self.levels.entry(price).or_insert_with(|| PriceLevel::new(price));
        level.push_back(order);

        self.best = Some(match self.best {
            None => price,
            Some(current) if self.descending => current.max(price),
            Some(current) => current.min(price),
        });
    }

    /// O(1) amortized lookup given the caller already knows the price
    /// (tracked in the book's `order_index`); only the level scan is
    /// linear, same as the teacher's existing `remove_order`.
    pub fn remove(&mut self, price: i64, order_id: u64) -> Option<Order> {
        let level = self.levels.get_mut(&price)?;
        let removed = level.remove_by_id(order_id);
        if removed.is_some() && level.is_empty() {
            self.levels.remove(&price);
            if self.best == Some(price) {
                self.recompute_best();
            }
        }
        removed
    }

    pub fn best_level_mut(&mut self) -> Option<&mut PriceLevel> {
        let price = self.best?;
        self.levels.get_mut(&price)
    }

    fn drop_price_if_empty(&mut self, price: i64) {
        if let Some(level) = self.levels.get(&price) {
            if level.is_empty() {
                self.levels.remove(&price);
                if self.best == Some(price) {
                    self.recompute_best();
                }
            }
        }
    }

    /// Aggregated (price, quantity) pairs best-first, up to `depth` levels.
    pub fn iter_from_best(&self, depth: usize) -> Vec<(i64, u64)> {
        let iter: Box<dyn Iterator<Item = (&i64, &PriceLevel)>> = if self.descending {
            Box::new(self.levels.iter().rev())
        } else {
            Box::new(self.levels.iter())
        };
        iter.take(depth)
            .map(|(price, level)| (*price, level.total_quantity))
            .collect()
    }

    pub fn best_total_quantity(&self) -> u64 {
        self.best
            .and_then(|price| self.levels.get(&price))
            .map(|level| level.total_quantity)
            .unwrap_or(0)
    }
}

/// Resting-order container plus the matching logic that crosses an
/// incoming taker order against it. One `OrderBook` exists per symbol and
/// is only ever touched by the single worker thread that owns it
/// (see `domain::services::matching_engine`).
pub struct OrderBook {
    pub symbol: String,
    bids: PriceLevelIndex,
    asks: PriceLevelIndex,
    /// order_id -> (side, price) so cancel/removal is O(1) plus a bounded
    /// level scan, without needing a second copy of order state.
    order_index: HashMap<u64, (Side, i64)>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: PriceLevelIndex::new(true),
            asks: PriceLevelIndex::new(false),
            order_index: HashMap::new(),
        }
    }

    /// Matches `order` against the opposite side and, if any quantity
    /// remains, rests it on its own side. Returns the trades generated and
    /// the residual (unfilled) quantity left resting.
    pub fn add_limit(&mut self, mut order: Order) -> Result<(Vec<Trade>, u64), OrderbookError> {
        let Some(price) = order.price else {
            return Err(OrderbookError::NoLimitPrice);
        };
        if price <= 0 {
            return Err(OrderbookError::InvalidPrice(price));
        }
        if order.quantity == 0 {
            return Err(OrderbookError::InvalidQuantity(order.quantity));
        }

        let trades = match order.side {
            Side::Buy => self.match_against(&mut order, Side::Sell, false),
            Side::Sell => self.match_against(&mut order, Side::Buy, false),
        };

        let residual = order.quantity;
        if residual > 0 {
            self.rest(order);
        }
        Ok((trades, residual))
    }

    /// Matches `order` against the opposite side ignoring price, never
    /// rests a residual: unmatched quantity on a market order is simply
    /// dropped, matching the original reference's `add_market` semantics.
    pub fn add_market(&mut self, mut order: Order) -> Result<Vec<Trade>, OrderbookError> {
        if order.quantity == 0 {
            return Err(OrderbookError::InvalidQuantity(order.quantity));
        }

        let trades = match order.side {
            Side::Buy => self.match_against(&mut order, Side::Sell, true),
            Side::Sell => self.match_against(&mut order, Side::Buy, true),
        };
        Ok(trades)
    }

    pub fn cancel(&mut self, order_id: u64) -> bool {
        let Some((side, price)) = self.order_index.remove(&order_id) else {
            return false;
        };
        let index = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        index.remove(price, order_id).is_some()
    }

    pub fn top_of_book(&self) -> (Option<i64>, u64, Option<i64>, u64) {
        (
            self.bids.best_price(),
            self.bids.best_total_quantity(),
            self.asks.best_price(),
            self.asks.best_total_quantity(),
        )
    }

    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        BookSnapshot {
            bids: self.bids.iter_from_best(depth),
            asks: self.asks.iter_from_best(depth),
        }
    }

    fn rest(&mut self, order: Order) {
        let id = order.id;
        let side = order.side;
        let price = order.price.expect("resting order must carry a price");
        self.order_index.insert(id, (side, price));
        match side {
            Side::Buy => self.bids.insert(order),
            Side::Sell => self.asks.insert(order),
        }
    }

    /// Core matching loop, shared by `add_limit`/`add_market` via the
    /// `ignore_price` flag. `taker_opposite` names which side the resting
    /// makers live on — always the side opposite `taker`'s own.
    fn match_against(&mut self, taker: &mut Order, taker_opposite: Side, ignore_price: bool) -> Vec<Trade> {
        let mut trades = Vec::with_capacity(4);
        let opposite = match taker_opposite {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };

        loop {
            if taker.quantity == 0 {
                break;
            }
            let Some(best_price) = opposite.best_price() else {
                break;
            };

            if !ignore_price {
                if let Some(limit_price) = taker.price {
                    let crossable = match taker.side {
                        Side::Buy => best_price <= limit_price,
                        Side::Sell => best_price >= limit_price,
                    };
                    if !crossable {
                        break;
                    }
                }
            }

            let Some(level) = opposite.best_level_mut() else {
                break;
            };
            let Some(maker) = level.front_mut() else {
                break;
            };

            let traded_qty = taker.quantity.min(maker.quantity);
            taker.quantity -= traded_qty;
            maker.quantity -= traded_qty;
            let maker_id = maker.id;
            let maker_filled = maker.quantity == 0;
            level.note_quantity_decrease(traded_qty);

            trades.push(Trade {
                price: best_price,
                quantity: traded_qty,
                taker_order_id: taker.id,
                maker_order_id: maker_id,
                taker_side: taker.side,
                created_at: Utc::now(),
            });

            if maker_filled {
                level.pop_front();
                self.order_index.remove(&maker_id);
            }

            opposite.drop_price_if_empty(best_price);
        }

        trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::types::OrderType;

    fn order(id: u64, side: Side, order_type: OrderType, qty: u64, price: Option<i64>) -> Order {
        Order {
            id,
            seq: id,
            symbol: "BTC-USD".into(),
            side,
            order_type,
            quantity: qty,
            price,
            user_ref: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn limit_order_rests_on_empty_book() {
        let mut book = OrderBook::new("BTC-USD");
        let (trades, residual) = book
            .add_limit(order(1, Side::Buy, OrderType::Limit, 10, Some(100)))
            .unwrap();
        assert!(trades.is_empty());
        assert_eq!(residual, 10);
        assert_eq!(book.top_of_book(), (Some(100), 10, None, 0));
    }

    #[test]
    fn crossing_limit_order_fully_matches() {
        let mut book = OrderBook::new("BTC-USD");
        book.add_limit(order(1, Side::Sell, OrderType::Limit, 10, Some(100)))
            .unwrap();
        let (trades, residual) = book
            .add_limit(order(2, Side::Buy, OrderType::Limit, 10, Some(100)))
            .unwrap();
        assert_eq!(residual, 0);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, 100);
        assert_eq!(trades[0].quantity, 10);
        assert_eq!(book.top_of_book(), (None, 0, None, 0));
    }

    #[test]
    fn price_time_priority_favors_earlier_order_at_same_price() {
        let mut book = OrderBook::new("BTC-USD");
        book.add_limit(order(1, Side::Sell, OrderType::Limit, 5, Some(100)))
            .unwrap();
        book.add_limit(order(2, Side::Sell, OrderType::Limit, 5, Some(100)))
            .unwrap();
        let (trades, _) = book
            .add_limit(order(3, Side::Buy, OrderType::Limit, 5, Some(100)))
            .unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].maker_order_id, 1);
    }

    #[test]
    fn market_sweeps_across_multiple_levels() {
        let mut book = OrderBook::new("BTC-USD");
        book.add_limit(order(1, Side::Sell, OrderType::Limit, 5, Some(100)))
            .unwrap();
        book.add_limit(order(2, Side::Sell, OrderType::Limit, 5, Some(101)))
            .unwrap();
        let trades = book
            .add_market(order(3, Side::Buy, OrderType::Market, 8, None))
            .unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].price, 100);
        assert_eq!(trades[0].quantity, 5);
        assert_eq!(trades[1].price, 101);
        assert_eq!(trades[1].quantity, 3);
    }

    #[test]
    fn market_order_against_empty_book_produces_no_trades() {
        let mut book = OrderBook::new("BTC-USD");
        let trades = book
            .add_market(order(1, Side::Buy, OrderType::Market, 8, None))
            .unwrap();
        assert!(trades.is_empty());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut book = OrderBook::new("BTC-USD");
        book.add_limit(order(1, Side::Buy, OrderType::Limit, 10, Some(100)))
            .unwrap();
        assert!(book.cancel(1));
        assert!(!book.cancel(1));
    }

    #[test]
    fn snapshot_aggregates_per_level() {
        let mut book = OrderBook::new("BTC-USD");
        book.add_limit(order(1, Side::Buy, OrderType::Limit, 4, Some(100)))
            .unwrap();
        book.add_limit(order(2, Side::Buy, OrderType::Limit, 6, Some(100)))
            .unwrap();
        let snap = book.snapshot(10);
        assert_eq!(snap.bids, vec![(100, 10)]);
        assert!(snap.asks.is_empty());
    }

    #[test]
    fn non_crossing_limit_never_trades() {
        let mut book = OrderBook::new("BTC-USD");
        book.add_limit(order(1, Side::Sell, OrderType::Limit, 5, Some(105)))
            .unwrap();
        let (trades, residual) = book
            .add_limit(order(2, Side::Buy, OrderType::Limit, 5, Some(100)))
            .unwrap();
        assert!(trades.is_empty());
        assert_eq!(residual, 5);
    }

    #[test]
    fn limit_order_with_non_positive_price_is_rejected() {
        let mut book = OrderBook::new("BTC-USD");
        let err = book
            .add_limit(order(1, Side::Buy, OrderType::Limit, 5, Some(0)))
            .unwrap_err();
        assert!(matches!(err, OrderbookError::InvalidPrice(0)));

        let err = book
            .add_limit(order(2, Side::Buy, OrderType::Limit, 5, Some(-100)))
            .unwrap_err();
        assert!(matches!(err, OrderbookError::InvalidPrice(-100)));

        assert_eq!(book.top_of_book(), (None, 0, None, 0));
    }
}
