//! Property tests for the order book invariants.

use optex_rs::orderbook::{Order, OrderBook, OrderId, Side};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Action {
    side: Side,
    price: u64,
    quantity: u64,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    (
        prop::bool::ANY,
        100u64..140,
        1u64..50,
    )
        .prop_map(|(buy, price, quantity)| Action {
            side: if buy { Side::Buy } else { Side::Sell },
            price,
            quantity,
        })
}

proptest! {
    /// After any sequence of inserts the book is never crossed at rest.
    #[test]
    fn prop_book_never_crossed(actions in prop::collection::vec(action_strategy(), 1..60)) {
        let mut book = OrderBook::new("TEST");
        for (i, action) in actions.iter().enumerate() {
            let order = Order::new(
                OrderId(i as u64 + 1),
                None,
                format!("team-{}", i % 4),
                "TEST",
                action.side,
                action.quantity,
                Some(action.price),
                i as u64 + 1,
            );
            let result = book.insert(order).unwrap();
            prop_assert!(!book.is_crossed());

            // Every trade prices at or inside the aggressor's limit.
            for trade in &result.trades {
                match action.side {
                    Side::Buy => prop_assert!(trade.price <= action.price),
                    Side::Sell => prop_assert!(trade.price >= action.price),
                }
            }
        }
    }

    /// Quantity is conserved: executed + resting + cancelled-market
    /// residual equals submitted, for every order.
    #[test]
    fn prop_quantity_conserved(actions in prop::collection::vec(action_strategy(), 1..60)) {
        let mut book = OrderBook::new("TEST");
        let mut submitted: u64 = 0;
        let mut executed: u64 = 0;
        for (i, action) in actions.iter().enumerate() {
            let order = Order::new(
                OrderId(i as u64 + 1),
                None,
                "team".to_string(),
                "TEST",
                action.side,
                action.quantity,
                Some(action.price),
                i as u64 + 1,
            );
            submitted += action.quantity;
            let result = book.insert(order).unwrap();
            // Each trade consumes quantity from both sides.
            executed += 2 * result.executed_quantity();
            prop_assert_eq!(
                result.order.quantity - result.order.remaining_quantity,
                result.executed_quantity()
            );
        }
        let snapshot = book.depth(1_000);
        let resting: u64 = snapshot
            .bids
            .iter()
            .chain(snapshot.asks.iter())
            .map(|level| level.quantity)
            .sum();
        prop_assert_eq!(submitted, executed + resting);
    }

    /// Within one price level, fills consume strictly in submission order.
    #[test]
    fn prop_time_priority_within_level(quantities in prop::collection::vec(1u64..20, 2..8)) {
        let mut book = OrderBook::new("TEST");
        for (i, quantity) in quantities.iter().enumerate() {
            let order = Order::new(
                OrderId(i as u64 + 1),
                None,
                format!("maker-{i}"),
                "TEST",
                Side::Buy,
                *quantity,
                Some(500),
                i as u64 + 1,
            );
            book.insert(order).unwrap();
        }

        let total: u64 = quantities.iter().sum();
        let taker = Order::new(
            OrderId(99),
            None,
            "taker".to_string(),
            "TEST",
            Side::Sell,
            total,
            Some(500),
            99,
        );
        let result = book.insert(taker).unwrap();

        // Fully-filled makers come back in submission order.
        let expected: Vec<OrderId> = (0..quantities.len()).map(|i| OrderId(i as u64 + 1)).collect();
        prop_assert_eq!(result.filled_order_ids, expected);

        // Counterparties appear in submission order too.
        let mut seen = Vec::new();
        for trade in &result.trades {
            if !seen.contains(&trade.buyer_team_id) {
                seen.push(trade.buyer_team_id.clone());
            }
        }
        let expected_teams: Vec<String> =
            (0..quantities.len()).map(|i| format!("maker-{i}")).collect();
        prop_assert_eq!(seen, expected_teams);
    }
}
