//! Core book implementation
//!
//! This module contains the heart of the engine: two independently locked
//! sides, each a ladder of resting orders kept in rank order.
//! - Bids rank by descending deposit, asks by ascending deposit
//! - Equal deposits keep placement order (earlier id first)
//! - Ids are assigned per side at placement and never reused or renumbered
//! - Every mutation emits one sequenced `BookEvent`

use crate::error::{BookError, BookResult};
use crate::events::{BookEvent, EventLog};
use crate::fees::FeeSchedule;
use crate::metrics::BookMetrics;
use ahash::AHashMap;
use book_common::{AccountId, Amount, EngineConfig, FIRST_ORDER_ID, FIRST_SEQUENCE, OrderId, Ts};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, warn};

/// Side of the book (Bid or Ask)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side (bids)
    Bid,
    /// Sell side (asks)
    Ask,
}

impl Side {
    /// Lowercase label
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bid" | "bids" | "buy" => Ok(Side::Bid),
            "ask" | "asks" | "sell" => Ok(Side::Ask),
            other => Err(format!("unknown side '{other}', expected bid or ask")),
        }
    }
}

/// A resting order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Placement id, unique within its side
    pub id: OrderId,
    /// Side holding the order
    pub side: Side,
    /// Account that placed it
    pub owner: AccountId,
    /// Deposited amount (rank key)
    pub amount: Amount,
    /// Amount credited after the placement fee
    pub net_amount: Amount,
    /// Time of placement
    pub timestamp: Ts,
}

/// Ladder position: priority first, placement id breaks ties
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct LadderKey {
    priority: u128,
    id: OrderId,
}

impl LadderKey {
    #[inline]
    fn new(side: Side, amount: Amount, id: OrderId) -> Self {
        let priority = match side {
            Side::Bid => u128::MAX - amount.as_wei(), // Inverted for descending order
            Side::Ask => amount.as_wei(),
        };
        Self { priority, id }
    }

    #[inline]
    fn of(order: &Order) -> Self {
        Self::new(order.side, order.amount, order.id)
    }
}

/// One side of the book: the ranked ladder plus an id index
pub(crate) struct SideBook {
    side: Side,
    next_id: u64,
    ladder: BTreeSet<LadderKey>,
    orders: AHashMap<OrderId, Order>,
}

impl SideBook {
    pub(crate) fn new(side: Side) -> Self {
        Self::with_next_id(side, FIRST_ORDER_ID)
    }

    pub(crate) fn with_next_id(side: Side, next_id: u64) -> Self {
        Self {
            side,
            next_id,
            ladder: BTreeSet::new(),
            orders: AHashMap::new(),
        }
    }

    #[inline]
    fn allocate_id(&mut self) -> OrderId {
        let id = OrderId(self.next_id);
        self.next_id += 1;
        id
    }

    #[inline]
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Insert an order at its ranked position
    pub(crate) fn insert(&mut self, order: Order) {
        debug_assert_eq!(order.side, self.side);
        self.ladder.insert(LadderKey::of(&order));
        self.orders.insert(order.id, order);
    }

    fn remove(&mut self, id: OrderId) -> Option<Order> {
        let order = self.orders.remove(&id)?;
        self.ladder.remove(&LadderKey::of(&order));
        Some(order)
    }

    #[inline]
    pub(crate) fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Orders in rank order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Order> + '_ {
        self.ladder.iter().filter_map(|key| self.orders.get(&key.id))
    }

    fn rank_of(&self, id: OrderId) -> Option<usize> {
        let key = LadderKey::of(self.orders.get(&id)?);
        Some(self.ladder.range(..key).count() + 1)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.orders.len()
    }
}

/// The sorted bid/ask book
///
/// Each side sits behind its own lock, so mutations on one side are
/// serialized while readers always see a whole side. Events are sequenced
/// under the journal lock, which is only ever taken after a side lock.
pub struct OrderBook {
    /// Bid ladder (descending deposit)
    bids: RwLock<SideBook>,
    /// Ask ladder (ascending deposit)
    asks: RwLock<SideBook>,
    fees: FeeSchedule,
    journal: Mutex<EventLog>,
    metrics: BookMetrics,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    /// Create an empty book with the default 5% fee
    #[must_use]
    pub fn new() -> Self {
        Self::with_fees(FeeSchedule::default())
    }

    /// Create an empty book with a custom fee schedule
    #[must_use]
    pub fn with_fees(fees: FeeSchedule) -> Self {
        Self::from_parts(
            SideBook::new(Side::Bid),
            SideBook::new(Side::Ask),
            fees,
            EventLog::new(FIRST_SEQUENCE, true, 0),
        )
    }

    /// Create an empty book from engine configuration
    pub fn from_config(config: &EngineConfig) -> BookResult<Self> {
        config.validate()?;
        let fees = FeeSchedule::new(config.fee_bps)?;
        Ok(Self::from_parts(
            SideBook::new(Side::Bid),
            SideBook::new(Side::Ask),
            fees,
            EventLog::new(FIRST_SEQUENCE, config.journal_events, config.max_journal_events),
        ))
    }

    pub(crate) fn from_parts(bids: SideBook, asks: SideBook, fees: FeeSchedule, journal: EventLog) -> Self {
        Self {
            bids: RwLock::new(bids),
            asks: RwLock::new(asks),
            fees,
            journal: Mutex::new(journal),
            metrics: BookMetrics::new(),
        }
    }

    #[inline]
    pub(crate) fn side_book(&self, side: Side) -> &RwLock<SideBook> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub(crate) fn journal(&self) -> &Mutex<EventLog> {
        &self.journal
    }

    /// Place an order, returning its id
    pub fn place(&self, side: Side, owner: impl Into<AccountId>, amount: Amount) -> BookResult<OrderId> {
        self.place_at(side, owner, amount, Ts::now())
    }

    /// Place an order with an explicit timestamp
    pub fn place_at(
        &self,
        side: Side,
        owner: impl Into<AccountId>,
        amount: Amount,
        timestamp: Ts,
    ) -> BookResult<OrderId> {
        let start = Instant::now();

        if amount.is_zero() {
            self.metrics.record_rejection();
            warn!(%side, "Rejected placement with zero amount");
            return Err(BookError::InvalidAmount { amount });
        }

        let owner = owner.into();
        let net_amount = self.fees.net_of(amount);

        let (id, sequence) = {
            let mut book = self.side_book(side).write();
            let id = book.allocate_id();

            let sequence = {
                let mut journal = self.journal.lock();
                let sequence = journal.next_sequence();
                journal.push(BookEvent::Placed {
                    sequence,
                    side,
                    order_id: id,
                    owner: owner.clone(),
                    amount,
                    net_amount,
                    timestamp,
                });
                sequence
            };

            book.insert(Order {
                id,
                side,
                owner,
                amount,
                net_amount,
                timestamp,
            });
            (id, sequence)
        };

        let fee = amount.saturating_sub(net_amount);
        self.metrics
            .record_placement(side, fee, start.elapsed().as_nanos() as u64);
        debug!(%side, %id, %amount, %net_amount, sequence, "Order placed");

        Ok(id)
    }

    /// Place a bid
    pub fn place_bid(&self, owner: impl Into<AccountId>, amount: Amount) -> BookResult<OrderId> {
        self.place(Side::Bid, owner, amount)
    }

    /// Place an ask
    pub fn place_ask(&self, owner: impl Into<AccountId>, amount: Amount) -> BookResult<OrderId> {
        self.place(Side::Ask, owner, amount)
    }

    /// Net amount held by an active order
    pub fn get_value(&self, side: Side, id: OrderId) -> BookResult<Amount> {
        self.side_book(side)
            .read()
            .get(id)
            .map(|order| order.net_amount)
            .ok_or(BookError::OrderNotFound { side, order_id: id })
    }

    /// Net amount held by an active bid
    pub fn get_bid_value(&self, id: OrderId) -> BookResult<Amount> {
        self.get_value(Side::Bid, id)
    }

    /// Net amount held by an active ask
    pub fn get_ask_value(&self, id: OrderId) -> BookResult<Amount> {
        self.get_value(Side::Ask, id)
    }

    /// Ids in rank order, each prefixed by a single space (`" 2 3 1"`)
    ///
    /// An empty side yields the empty string.
    pub fn fetch(&self, side: Side) -> String {
        let book = self.side_book(side).read();
        let mut out = String::with_capacity(book.len() * 4);
        for order in book.iter() {
            out.push(' ');
            out.push_str(&order.id.to_string());
        }
        out
    }

    /// Bid ids in rank order
    pub fn fetch_bid(&self) -> String {
        self.fetch(Side::Bid)
    }

    /// Ask ids in rank order
    pub fn fetch_ask(&self) -> String {
        self.fetch(Side::Ask)
    }

    /// Cancel an active order, returning it
    pub fn cancel(&self, side: Side, id: OrderId) -> BookResult<Order> {
        self.cancel_at(side, id, Ts::now())
    }

    /// Cancel with an explicit timestamp
    pub fn cancel_at(&self, side: Side, id: OrderId, timestamp: Ts) -> BookResult<Order> {
        let start = Instant::now();

        let (order, sequence) = {
            let mut book = self.side_book(side).write();
            let Some(order) = book.remove(id) else {
                drop(book);
                self.metrics.record_rejection();
                warn!(%side, %id, "Cancel for unknown order");
                return Err(BookError::OrderNotFound { side, order_id: id });
            };

            let mut journal = self.journal.lock();
            let sequence = journal.next_sequence();
            journal.push(BookEvent::Cancelled {
                sequence,
                side,
                order_id: id,
                owner: order.owner.clone(),
                net_amount: order.net_amount,
                timestamp,
            });
            (order, sequence)
        };

        self.metrics
            .record_cancel(side, start.elapsed().as_nanos() as u64);
        debug!(%side, %id, sequence, "Order cancelled");

        Ok(order)
    }

    /// Cancel an active bid
    pub fn cancel_bid(&self, id: OrderId) -> BookResult<Order> {
        self.cancel(Side::Bid, id)
    }

    /// Cancel an active ask
    pub fn cancel_ask(&self, id: OrderId) -> BookResult<Order> {
        self.cancel(Side::Ask, id)
    }

    /// Active ids in rank order
    pub fn ids(&self, side: Side) -> Vec<OrderId> {
        self.side_book(side).read().iter().map(|order| order.id).collect()
    }

    /// Active orders in rank order
    pub fn orders(&self, side: Side) -> Vec<Order> {
        self.side_book(side).read().iter().cloned().collect()
    }

    /// Look up an active order
    pub fn get_order(&self, side: Side, id: OrderId) -> Option<Order> {
        self.side_book(side).read().get(id).cloned()
    }

    /// 1-based rank of an active order
    pub fn rank_of(&self, side: Side, id: OrderId) -> BookResult<usize> {
        self.side_book(side)
            .read()
            .rank_of(id)
            .ok_or(BookError::OrderNotFound { side, order_id: id })
    }

    /// Order currently at a 1-based rank
    pub fn order_at_rank(&self, side: Side, rank: usize) -> Option<Order> {
        let index = rank.checked_sub(1)?;
        self.side_book(side).read().iter().nth(index).cloned()
    }

    /// Ids placed by `owner` that are still active, in rank order
    pub fn orders_of(&self, side: Side, owner: &AccountId) -> Vec<OrderId> {
        self.side_book(side)
            .read()
            .iter()
            .filter(|order| &order.owner == owner)
            .map(|order| order.id)
            .collect()
    }

    /// Top-ranked order
    pub fn best(&self, side: Side) -> Option<Order> {
        self.side_book(side).read().iter().next().cloned()
    }

    /// Number of active orders
    pub fn len(&self, side: Side) -> usize {
        self.side_book(side).read().len()
    }

    /// True when a side holds no orders
    pub fn is_empty(&self, side: Side) -> bool {
        self.len(side) == 0
    }

    /// Sum of net amounts resting on a side
    pub fn total_net(&self, side: Side) -> Amount {
        self.side_book(side)
            .read()
            .iter()
            .fold(Amount::ZERO, |total, order| total.saturating_add(order.net_amount))
    }

    /// Id the next placement on `side` will receive
    pub fn next_order_id(&self, side: Side) -> OrderId {
        OrderId(self.side_book(side).read().next_id())
    }

    /// Fee schedule applied to placements
    #[inline]
    pub fn fees(&self) -> FeeSchedule {
        self.fees
    }

    /// Operation metrics
    #[inline]
    pub fn metrics(&self) -> &BookMetrics {
        &self.metrics
    }

    /// Sequence of the most recent event (0 before any mutation)
    pub fn last_sequence(&self) -> u64 {
        self.journal.lock().peek_sequence().saturating_sub(1)
    }

    /// Sequence the next event will receive
    pub fn next_sequence(&self) -> u64 {
        self.journal.lock().peek_sequence()
    }

    /// Take all retained events
    pub fn drain_events(&self) -> Vec<BookEvent> {
        self.journal.lock().drain()
    }

    /// Retained events after `sequence`
    pub fn events_since(&self, sequence: u64) -> Vec<BookEvent> {
        self.journal.lock().since(sequence)
    }
}
