//! Property-based tests for book invariants
//!
//! Uses QuickCheck and Proptest to verify that book operations
//! maintain their invariants under arbitrary operation streams:
//!
//! - Bids stay in descending and asks in ascending deposit order
//! - Net amounts always follow the fee rule
//! - Ids are stable and never reused after cancellation
//! - Replaying the emitted events rebuilds an identical book

use crate::assertions::{assert_book_invariants, assert_books_equal};
use orderbook_engine::replay::rebuild;
use orderbook_engine::{Amount, EngineConfig, FeeSchedule, OrderBook, OrderId, Side};
use proptest::prelude::*;
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
enum Op {
    Place(Side, u128),
    /// Cancel the n-th active order (modulo the side's size)
    Cancel(Side, usize),
}

/// Generate order side
fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Bid), Just(Side::Ask)]
}

/// Deposits from one wei up to a thousand ether
fn arb_amount() -> impl Strategy<Value = u128> {
    1u128..1_000_000_000_000_000_000_000u128
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (arb_side(), arb_amount()).prop_map(|(side, amount)| Op::Place(side, amount)),
        1 => (arb_side(), any::<usize>()).prop_map(|(side, n)| Op::Cancel(side, n)),
    ]
}

/// Apply ops, returning the model of active orders per side
fn run_ops(book: &OrderBook, ops: &[Op]) -> BTreeMap<(u8, u64), u128> {
    let mut model = BTreeMap::new();
    for op in ops {
        match *op {
            Op::Place(side, amount) => {
                let id = book.place(side, "prop", Amount::from_wei(amount)).unwrap();
                model.insert((side as u8, id.as_u64()), amount);
            }
            Op::Cancel(side, n) => {
                let ids = book.ids(side);
                if ids.is_empty() {
                    continue;
                }
                let id = ids[n % ids.len()];
                book.cancel(side, id).unwrap();
                model.remove(&(side as u8, id.as_u64()));
            }
        }
    }
    model
}

#[cfg(test)]
mod ordering_invariants {
    use super::*;

    proptest! {
        #[test]
        fn prop_ladders_stay_sorted(ops in prop::collection::vec(arb_op(), 0..200)) {
            let book = OrderBook::new();
            run_ops(&book, &ops);

            assert_book_invariants(&book);
        }

        #[test]
        fn prop_fetch_matches_ids(ops in prop::collection::vec(arb_op(), 0..100)) {
            let book = OrderBook::new();
            run_ops(&book, &ops);

            for side in [Side::Bid, Side::Ask] {
                let expected: String = book.ids(side).iter().map(|id| format!(" {id}")).collect();
                prop_assert_eq!(book.fetch(side), expected);
            }
        }

        #[test]
        fn prop_best_is_first_rank(ops in prop::collection::vec(arb_op(), 1..100)) {
            let book = OrderBook::new();
            run_ops(&book, &ops);

            for side in [Side::Bid, Side::Ask] {
                prop_assert_eq!(book.best(side), book.order_at_rank(side, 1));
            }
        }
    }
}

#[cfg(test)]
mod id_invariants {
    use super::*;

    proptest! {
        #[test]
        fn prop_active_orders_match_model(ops in prop::collection::vec(arb_op(), 0..200)) {
            let book = OrderBook::new();
            let model = run_ops(&book, &ops);

            for side in [Side::Bid, Side::Ask] {
                let active: HashSet<u64> = book.ids(side).iter().map(|id| id.as_u64()).collect();
                let expected: HashSet<u64> = model
                    .keys()
                    .filter(|(tag, _)| *tag == side as u8)
                    .map(|(_, id)| *id)
                    .collect();
                prop_assert_eq!(active, expected);
            }
            for ((tag, id), amount) in &model {
                let side = if *tag == Side::Bid as u8 { Side::Bid } else { Side::Ask };
                let order = book.get_order(side, OrderId(*id)).unwrap();
                prop_assert_eq!(order.amount.as_wei(), *amount);
            }
        }

        #[test]
        fn prop_cancel_leaves_other_values_untouched(
            amounts in prop::collection::vec(arb_amount(), 2..50),
            victim in any::<usize>(),
        ) {
            let book = OrderBook::new();
            let ids: Vec<OrderId> = amounts
                .iter()
                .map(|amount| book.place_bid("prop", Amount::from_wei(*amount)).unwrap())
                .collect();
            let before: Vec<Amount> = ids.iter().map(|id| book.get_bid_value(*id).unwrap()).collect();

            let victim = victim % ids.len();
            book.cancel_bid(ids[victim]).unwrap();

            for (i, id) in ids.iter().enumerate() {
                if i == victim {
                    prop_assert!(book.get_bid_value(*id).is_err());
                } else {
                    prop_assert_eq!(book.get_bid_value(*id).unwrap(), before[i]);
                }
            }
            let next = book.place_bid("prop", Amount::from_wei(1)).unwrap();
            prop_assert_eq!(next.as_u64(), ids.len() as u64 + 1);
        }
    }
}

#[cfg(test)]
mod replay_invariants {
    use super::*;

    proptest! {
        #[test]
        fn prop_replay_rebuilds_identical_book(ops in prop::collection::vec(arb_op(), 0..100)) {
            let book = OrderBook::new();
            run_ops(&book, &ops);

            let rebuilt = rebuild(&book.drain_events(), &EngineConfig::default()).unwrap();

            assert_books_equal(&book, &rebuilt);
        }

        #[test]
        fn prop_snapshot_round_trip(ops in prop::collection::vec(arb_op(), 0..100)) {
            let book = OrderBook::new();
            run_ops(&book, &ops);

            let restored = OrderBook::from_snapshot(book.snapshot()).unwrap();

            assert_books_equal(&book, &restored);
            prop_assert_eq!(restored.next_sequence(), book.next_sequence());
        }
    }
}

/// QuickCheck-based tests for the fee rule
#[cfg(test)]
mod quickcheck_tests {
    use super::*;

    #[quickcheck]
    fn qc_net_plus_fee_is_amount(amount: u64, fee_bps: u16) -> TestResult {
        let Ok(fees) = FeeSchedule::new(u32::from(fee_bps)) else {
            return TestResult::discard();
        };
        let amount = Amount::from_wei(u128::from(amount));

        let net = fees.net_of(amount);
        let fee = fees.fee_of(amount);

        TestResult::from_bool(net <= amount && net.checked_add(fee) == Some(amount))
    }

    #[quickcheck]
    fn qc_net_is_floor_of_kept_share(amount: u64) -> bool {
        let fees = FeeSchedule::default();
        let wide = u128::from(amount);
        fees.net_of(Amount::from_wei(wide)).as_wei() == wide * 9_500 / 10_000
    }

    #[quickcheck]
    fn qc_net_never_overflows_near_max(offset: u32) -> bool {
        let fees = FeeSchedule::default();
        let amount = Amount::from_wei(u128::MAX - u128::from(offset));
        let net = fees.net_of(amount);
        net < amount && net.as_wei() > u128::MAX / 100 * 94
    }

    #[quickcheck]
    fn qc_placed_value_round_trips(amounts: Vec<u32>) -> TestResult {
        if amounts.len() > 100 {
            return TestResult::discard();
        }
        let book = OrderBook::new();
        for raw in amounts {
            let amount = Amount::from_wei(u128::from(raw));
            match book.place_ask("qc", amount) {
                Ok(id) => {
                    if book.get_ask_value(id).ok() != Some(book.fees().net_of(amount)) {
                        return TestResult::failed();
                    }
                }
                Err(_) if raw == 0 => {}
                Err(_) => return TestResult::failed(),
            }
        }
        TestResult::passed()
    }
}
