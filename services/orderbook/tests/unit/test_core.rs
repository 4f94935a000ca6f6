//! Unit tests for core book functionality
//!
//! Tests cover:
//! - Placement, value lookup, fetch and cancellation on both sides
//! - The reference 1/5/4 ether scenarios
//! - Stable ids across cancellations and rank queries
//! - Error cases leave the book untouched
//! - Concurrent access patterns

use crate::assertions::assert_book_invariants;
use crate::utils::{eth, fixture_book, id, net_eth};
use orderbook_engine::{AccountId, Amount, BookError, EngineConfig, FeeSchedule, OrderBook, Side};
use rstest::rstest;
use std::sync::Arc;
use std::thread;

#[cfg(test)]
mod placement_tests {
    use super::*;

    #[test]
    fn test_place_bid_then_get_value() {
        let book = OrderBook::new();

        let bid = book.place_bid("person1", eth(1)).unwrap();

        assert_eq!(bid, id(1));
        assert_eq!(book.get_bid_value(id(1)).unwrap(), net_eth(1));
        assert_eq!(book.get_bid_value(id(1)).unwrap().as_wei(), 950_000_000_000_000_000);
    }

    #[test]
    fn test_place_ask_then_get_value() {
        let book = OrderBook::new();

        let ask = book.place_ask("person2", eth(5)).unwrap();

        assert_eq!(ask, id(1));
        assert_eq!(book.get_ask_value(id(1)).unwrap(), net_eth(5));
    }

    #[test]
    fn test_sides_have_independent_id_sequences() {
        let book = OrderBook::new();

        assert_eq!(book.place_bid("a", eth(1)).unwrap(), id(1));
        assert_eq!(book.place_ask("a", eth(1)).unwrap(), id(1));
        assert_eq!(book.place_bid("a", eth(2)).unwrap(), id(2));
        assert_eq!(book.place_ask("a", eth(2)).unwrap(), id(2));
        assert_eq!(book.next_order_id(Side::Bid), id(3));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let book = OrderBook::new();

        let err = book.place_bid("person1", Amount::ZERO).unwrap_err();

        assert!(matches!(err, BookError::InvalidAmount { amount } if amount.is_zero()));
        assert!(book.is_empty(Side::Bid));
        // Rejected placements do not consume an id
        assert_eq!(book.place_bid("person1", eth(1)).unwrap(), id(1));
    }

    #[test]
    fn test_value_of_second_placement() {
        let book = OrderBook::new();
        book.place_bid("person1", eth(1)).unwrap();
        book.place_bid("person1", eth(5)).unwrap();
        book.place_bid("person1", eth(4)).unwrap();

        // Ids address placements, not ranks
        assert_eq!(book.get_bid_value(id(2)).unwrap(), net_eth(5));
        assert_eq!(book.get_bid_value(id(3)).unwrap(), net_eth(4));
    }

    #[test]
    fn test_owner_recorded() {
        let book = OrderBook::new();
        book.place_bid("person1", eth(1)).unwrap();
        book.place_bid("person2", eth(3)).unwrap();
        book.place_bid("person1", eth(2)).unwrap();

        let person1 = AccountId::from("person1");
        assert_eq!(book.orders_of(Side::Bid, &person1), vec![id(3), id(1)]);
        assert_eq!(book.get_order(Side::Bid, id(2)).unwrap().owner.as_str(), "person2");
        assert!(book.orders_of(Side::Ask, &person1).is_empty());
    }
}

#[cfg(test)]
mod ordering_tests {
    use super::*;

    #[test]
    fn test_bid_fixture_order_and_cancel() {
        let book = fixture_book();

        assert_eq!(book.fetch_bid(), " 2 3 1");

        book.cancel_bid(id(3)).unwrap();
        assert_eq!(book.fetch_bid(), " 2 1");
    }

    #[test]
    fn test_ask_fixture_order_and_cancel() {
        let book = fixture_book();

        assert_eq!(book.fetch_ask(), " 1 3 2");

        book.cancel_ask(id(3)).unwrap();
        assert_eq!(book.fetch_ask(), " 1 2");
    }

    #[test]
    fn test_empty_fetch_is_empty_string() {
        let book = OrderBook::new();
        assert_eq!(book.fetch_bid(), "");
        assert_eq!(book.fetch_ask(), "");
    }

    #[test]
    fn test_equal_amounts_keep_placement_order() {
        let book = OrderBook::new();
        book.place_bid("a", eth(2)).unwrap();
        book.place_bid("b", eth(3)).unwrap();
        book.place_bid("c", eth(2)).unwrap();
        book.place_ask("a", eth(2)).unwrap();
        book.place_ask("b", eth(1)).unwrap();
        book.place_ask("c", eth(2)).unwrap();

        assert_eq!(book.fetch_bid(), " 2 1 3");
        assert_eq!(book.fetch_ask(), " 2 1 3");
    }

    #[test]
    fn test_rank_view_is_separate_from_ids() {
        let book = fixture_book();

        assert_eq!(book.rank_of(Side::Bid, id(2)).unwrap(), 1);
        assert_eq!(book.rank_of(Side::Bid, id(3)).unwrap(), 2);
        assert_eq!(book.rank_of(Side::Bid, id(1)).unwrap(), 3);
        assert_eq!(book.order_at_rank(Side::Bid, 1).unwrap().id, id(2));
        assert!(book.order_at_rank(Side::Bid, 0).is_none());
        assert!(book.order_at_rank(Side::Bid, 4).is_none());

        book.cancel_bid(id(2)).unwrap();

        // Ranks shift, ids do not
        assert_eq!(book.rank_of(Side::Bid, id(3)).unwrap(), 1);
        assert_eq!(book.get_bid_value(id(3)).unwrap(), net_eth(4));
        assert_eq!(book.fetch_bid(), " 3 1");
    }

    #[test]
    fn test_best_and_totals() {
        let book = fixture_book();

        assert_eq!(book.best(Side::Bid).unwrap().amount, eth(5));
        assert_eq!(book.best(Side::Ask).unwrap().amount, eth(1));
        assert_eq!(book.total_net(Side::Bid), net_eth(10));
        assert_eq!(book.len(Side::Ask), 3);

        let empty = OrderBook::new();
        assert!(empty.best(Side::Bid).is_none());
        assert_eq!(empty.total_net(Side::Ask), Amount::ZERO);
    }

    #[test]
    fn test_book_invariants_after_mixed_operations() {
        let book = fixture_book();
        book.place_bid("x", eth(3)).unwrap();
        book.place_ask("y", eth(3)).unwrap();
        book.cancel_bid(id(1)).unwrap();
        book.cancel_ask(id(2)).unwrap();

        assert_book_invariants(&book);
        assert_eq!(book.fetch_bid(), " 2 3 4");
        assert_eq!(book.fetch_ask(), " 1 4 3");
    }
}

#[cfg(test)]
mod cancellation_tests {
    use super::*;

    #[test]
    fn test_cancel_returns_removed_order() {
        let book = fixture_book();

        let order = book.cancel_bid(id(2)).unwrap();

        assert_eq!(order.id, id(2));
        assert_eq!(order.side, Side::Bid);
        assert_eq!(order.amount, eth(5));
        assert_eq!(order.net_amount, net_eth(5));
    }

    #[test]
    fn test_double_cancel_fails() {
        let book = fixture_book();

        book.cancel_bid(id(3)).unwrap();
        let err = book.cancel_bid(id(3)).unwrap_err();

        assert!(matches!(
            err,
            BookError::OrderNotFound { side: Side::Bid, order_id } if order_id == id(3)
        ));
        assert_eq!(book.fetch_bid(), " 2 1");
    }

    #[test]
    fn test_cancelled_order_no_longer_queryable() {
        let book = fixture_book();
        book.cancel_ask(id(1)).unwrap();

        assert!(matches!(book.get_ask_value(id(1)), Err(BookError::OrderNotFound { .. })));
        assert!(book.rank_of(Side::Ask, id(1)).is_err());
        assert!(book.get_order(Side::Ask, id(1)).is_none());
    }

    #[test]
    fn test_cancel_does_not_cross_sides() {
        let book = OrderBook::new();
        book.place_bid("a", eth(1)).unwrap();

        assert!(book.cancel_ask(id(1)).is_err());
        assert_eq!(book.fetch_bid(), " 1");
    }

    #[test]
    fn test_ids_not_reused_after_cancel() {
        let book = OrderBook::new();
        book.place_bid("a", eth(1)).unwrap();
        book.cancel_bid(id(1)).unwrap();

        assert_eq!(book.place_bid("a", eth(1)).unwrap(), id(2));
        assert_eq!(book.fetch_bid(), " 2");
    }

    #[test]
    fn test_unknown_ids_fail() {
        let book = OrderBook::new();
        assert!(book.get_bid_value(id(1)).is_err());
        assert!(book.cancel_bid(id(0)).is_err());
        assert!(book.get_ask_value(id(42)).is_err());
    }
}

#[cfg(test)]
mod fee_tests {
    use super::*;

    #[rstest]
    #[case(500, 1, 950_000_000_000_000_000)]
    #[case(250, 1, 975_000_000_000_000_000)]
    #[case(0, 2, 2_000_000_000_000_000_000)]
    #[case(10_000, 3, 0)]
    fn test_net_amount_under_fee_rate(#[case] fee_bps: u32, #[case] ether: u64, #[case] expected: u128) {
        let book = OrderBook::with_fees(FeeSchedule::new(fee_bps).unwrap());

        let bid = book.place_bid("a", eth(ether)).unwrap();

        assert_eq!(book.get_bid_value(bid).unwrap().as_wei(), expected);
    }

    #[test]
    fn test_book_from_config() {
        let config = EngineConfig::default().with_fee_bps(100);
        let book = OrderBook::from_config(&config).unwrap();
        assert_eq!(book.fees().fee_bps(), 100);

        let bad = EngineConfig::default().with_fee_bps(10_001);
        assert!(OrderBook::from_config(&bad).is_err());
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[test]
    fn test_concurrent_placements_get_unique_ids() {
        let book = Arc::new(OrderBook::new());
        let mut handles = vec![];

        for t in 0..4u64 {
            let book = Arc::clone(&book);
            handles.push(thread::spawn(move || {
                for i in 1..=100u64 {
                    let side = if i % 2 == 0 { Side::Bid } else { Side::Ask };
                    book.place(side, format!("thread{t}"), Amount::from_wei(u128::from(t * 1000 + i)))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(book.len(Side::Bid), 200);
        assert_eq!(book.len(Side::Ask), 200);
        assert_eq!(book.next_order_id(Side::Bid), id(201));
        assert_eq!(book.last_sequence(), 400);
        assert_book_invariants(&book);
    }

    #[test]
    fn test_concurrent_readers_see_ordered_ladder() {
        let book = Arc::new(OrderBook::new());
        let writer = {
            let book = Arc::clone(&book);
            thread::spawn(move || {
                for i in 1..=200u64 {
                    book.place_bid("w", Amount::from_wei(u128::from((i * 7919) % 1000 + 1)))
                        .unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let book = Arc::clone(&book);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let orders = book.orders(Side::Bid);
                        for window in orders.windows(2) {
                            assert!(window[0].amount >= window[1].amount);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(book.len(Side::Bid), 200);
    }
}
