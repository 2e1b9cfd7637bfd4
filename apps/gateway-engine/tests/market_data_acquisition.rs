//! Market Data Acquisition Integration Tests
//!
//! Ticker batches with greeks self-healing, single-symbol snapshots,
//! historical bars, session status and administrative commands, all through
//! the service facade.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;
use tokio::time::Instant;

use gateway_engine::application::services::{StabilizationPolicy, stabilize};
use gateway_engine::domain::market_data::{Bar, Ticker};
use gateway_engine::infrastructure::memory::{
    InMemoryContainerRuntime, RecordingCommandChannel, ScriptedConnector, ScriptedUpdates,
    StaticCalendar,
};
use gateway_engine::{
    Credentials, DeltaCriteria, GatewayCommand, GatewayConfig, GatewayError, GatewayService,
    Greeks, HistoricalDataRequest, MarketDataType, SnapshotRequest, SubscriptionClass, TickData,
};

const SPY: i64 = 756_733;
const SPY_CALL: i64 = 701_234_567;
const SPY_PUT: i64 = 701_234_568;

type Service =
    GatewayService<InMemoryContainerRuntime, RecordingCommandChannel, ScriptedConnector, StaticCalendar>;

struct Harness {
    service: Service,
    connector: ScriptedConnector,
    commands: Arc<RecordingCommandChannel>,
    calendar: Arc<StaticCalendar>,
}

fn greeks(delta: f64) -> Greeks {
    Greeks {
        delta: Some(delta),
        gamma: Some(0.02),
        vega: Some(0.11),
        theta: Some(-0.05),
        implied_vol: Some(0.18),
    }
}

fn harness() -> Harness {
    let connector = ScriptedConnector::new();
    connector.add_contract(json!({
        "conId": SPY, "symbol": "SPY", "secType": "STK", "exchange": "SMART",
        "primaryExchange": "ARCA", "currency": "USD", "localSymbol": "SPY"
    }));
    connector.add_contract(json!({
        "conId": SPY_CALL, "symbol": "SPY", "secType": "OPT", "exchange": "SMART",
        "currency": "USD", "localSymbol": "SPY   250321C00500000", "strike": 500.0,
        "right": "C", "lastTradeDateOrContractMonth": "20250321", "multiplier": "100"
    }));
    connector.add_contract(json!({
        "conId": SPY_PUT, "symbol": "SPY", "secType": "OPT", "exchange": "SMART",
        "currency": "USD", "localSymbol": "SPY   250321P00480000", "strike": 480.0,
        "right": "P", "lastTradeDateOrContractMonth": "20250321", "multiplier": "100"
    }));
    connector.set_ticker(
        SPY,
        Ticker {
            last: Some(502.1),
            bid: Some(502.05),
            ask: Some(502.15),
            ..Ticker::default()
        },
    );
    connector.set_ticker(
        SPY_CALL,
        Ticker {
            last: Some(6.2),
            bid: Some(6.1),
            ask: Some(6.3),
            model_greeks: Some(greeks(0.45)),
            ..Ticker::default()
        },
    );
    connector.set_ticker(
        SPY_PUT,
        Ticker {
            last: Some(2.4),
            model_greeks: Some(greeks(-0.2)),
            ..Ticker::default()
        },
    );

    let commands = Arc::new(RecordingCommandChannel::new().linked_to(&connector));
    let calendar = Arc::new(StaticCalendar::new(true));
    let mut config = GatewayConfig::new(Credentials::new(
        "trader".to_string(),
        "secret".to_string(),
    ));
    config.persist = true;

    let service = GatewayService::new(
        config,
        Arc::new(InMemoryContainerRuntime::new()),
        Arc::new(connector.clone()),
        Arc::clone(&commands),
        Arc::clone(&calendar),
    );
    Harness {
        service,
        connector,
        commands,
        calendar,
    }
}

fn valued_tick(last: f64) -> Ticker {
    Ticker {
        time: Some(Utc::now()),
        last: Some(last),
        bid: Some(last - 0.05),
        ask: Some(last + 0.05),
        bid_size: Some(200.0),
        ask_size: Some(300.0),
        volume: Some(1_250_000.0),
        ..Ticker::default()
    }
}

// =============================================================================
// Ticker Batches
// =============================================================================

#[tokio::test(start_paused = true)]
async fn greeks_miss_triggers_exactly_one_restart_and_retry() {
    let h = harness();
    h.connector.withhold_greeks_for_requests(1);
    let started = Instant::now();

    let snapshots = h.service.get_tickers(&[SPY_CALL, SPY]).await.unwrap();

    assert_eq!(h.commands.sent(), vec!["RESTART"]);
    assert_eq!(h.connector.ticker_requests(), 2);
    assert!(started.elapsed() >= Duration::from_secs(30));

    // The restart dropped the session, so a fresh one was opened.
    assert_eq!(h.connector.connect_requests().len(), 2);

    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].greeks.unwrap().delta, Some(0.45));
    assert!(snapshots[1].greeks.is_none());
}

#[tokio::test(start_paused = true)]
async fn persistent_greeks_miss_returns_tickers_without_greeks() {
    let h = harness();
    h.connector.withhold_greeks_for_requests(usize::MAX);

    let snapshots = h.service.get_tickers(&[SPY_CALL]).await.unwrap();

    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].greeks.is_none());
    assert_eq!(snapshots[0].last, Some(6.2));
    assert_eq!(h.commands.sent().len(), 1);
    assert_eq!(h.connector.ticker_requests(), 2);
}

#[tokio::test]
async fn healthy_batch_sends_no_commands() {
    let h = harness();

    let snapshots = h.service.get_tickers(&[SPY, SPY_CALL, SPY_PUT]).await.unwrap();

    assert_eq!(snapshots.len(), 3);
    assert!(h.commands.sent().is_empty());
    assert_eq!(snapshots[1].symbol, "SPY   250321C00500000");
    assert!(snapshots.iter().all(|s| s.market_data_type == Some(MarketDataType::Live)));
}

#[tokio::test]
async fn closed_market_batches_use_delayed_data() {
    let h = harness();
    h.calendar.set_open(false);

    let snapshots = h.service.get_tickers(&[SPY]).await.unwrap();

    assert_eq!(h.connector.market_data_types(), vec![MarketDataType::Delayed]);
    assert_eq!(snapshots[0].market_data_type, Some(MarketDataType::Delayed));
    assert_eq!(h.calendar.queried(), vec!["NYSE"]);
}

#[tokio::test]
async fn session_is_reused_across_requests() {
    let h = harness();

    h.service.get_tickers(&[SPY]).await.unwrap();
    h.service.get_tickers(&[SPY_CALL]).await.unwrap();

    assert_eq!(h.connector.connect_requests().len(), 1);
}

#[tokio::test]
async fn delta_filter_selects_calls_in_range() {
    let h = harness();
    let criteria = DeltaCriteria {
        min_delta: Some(0.3),
        max_delta: Some(0.6),
    };

    let filtered = h
        .service
        .get_filtered_option_tickers(&[SPY, SPY_CALL, SPY_PUT], criteria)
        .await
        .unwrap();

    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].contract_id, SPY_CALL);
}

#[tokio::test]
async fn unreachable_gateway_is_a_connection_error() {
    let h = harness();
    h.connector.set_reachable(false);

    let err = h.service.get_tickers(&[SPY]).await.unwrap_err();

    assert!(matches!(err, GatewayError::Connection(_)));
    assert!(err.is_retryable());
}

// =============================================================================
// Single-Symbol Snapshots
// =============================================================================

#[tokio::test(start_paused = true)]
async fn snapshot_waits_for_first_timestamped_value() {
    let h = harness();
    h.connector.set_snapshot_script(vec![
        (Duration::from_millis(200), Ticker::default()),
        (Duration::from_millis(1800), valued_tick(502.1)),
        (Duration::from_millis(2500), valued_tick(503.0)),
    ]);

    let tick = h
        .service
        .get_market_data_snapshot(&SnapshotRequest::new("SPY"))
        .await
        .unwrap();

    assert_eq!(tick.symbol, "SPY");
    assert_eq!(tick.contract_id, Some(SPY));
    assert_eq!(tick.last, Some(502.1));
    assert_eq!(tick.bid_size, Some(200));
    assert_eq!(tick.volume, Some(1_250_000));
    assert_eq!(h.connector.market_data_types(), vec![MarketDataType::Live]);
}

#[tokio::test(start_paused = true)]
async fn silent_upstream_is_data_unavailable_naming_subscription() {
    let h = harness();
    h.connector.hold_snapshots_open(true);
    let started = Instant::now();

    let err = h
        .service
        .get_market_data_snapshot(&SnapshotRequest::new("SPY"))
        .await
        .unwrap_err();

    assert!(started.elapsed() <= Duration::from_secs(21));
    match err {
        GatewayError::DataUnavailable { symbol, message } => {
            assert_eq!(symbol, "SPY");
            assert!(message.contains("subscription"));
            assert!(message.contains("delayed"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn closed_market_snapshot_uses_frozen_data() {
    let h = harness();
    h.calendar.set_open(false);
    h.connector
        .set_snapshot_script(vec![(Duration::ZERO, valued_tick(501.0))]);

    let request = SnapshotRequest::new("SPY").with_class(SubscriptionClass::Delayed);
    h.service.get_market_data_snapshot(&request).await.unwrap();

    h.service
        .get_market_data_snapshot(&SnapshotRequest::new("SPY"))
        .await
        .unwrap();

    assert_eq!(
        h.connector.market_data_types(),
        vec![MarketDataType::DelayedFrozen, MarketDataType::Frozen]
    );
    assert!(h.calendar.queried().iter().all(|e| e == "ARCA"));
}

#[tokio::test(start_paused = true)]
async fn snapshot_by_contract_id() {
    let h = harness();
    h.connector
        .set_snapshot_script(vec![(Duration::from_millis(100), valued_tick(6.2))]);

    let request = SnapshotRequest::new("SPY call").with_con_id(SPY_CALL);
    let tick = h.service.get_market_data_snapshot(&request).await.unwrap();

    assert_eq!(tick.contract_id, Some(SPY_CALL));
}

#[tokio::test]
async fn unknown_symbol_snapshot_is_contract_not_found() {
    let h = harness();

    let err = h
        .service
        .get_market_data_snapshot(&SnapshotRequest::new("NOPE"))
        .await
        .unwrap_err();

    assert_eq!(err.reason(), "CONTRACT_NOT_FOUND");
    assert!(err.to_string().contains("NOPE"));
}

// =============================================================================
// Stabilization and Sanitization Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn stabilization_always_terminates_in_time(
        offsets in prop::collection::vec(0u64..30_000, 0..40),
        interval_ms in 100u64..3_000,
        overall_ms in 500u64..25_000,
        valued_at in prop::option::of(0usize..40),
        hold_open in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let (elapsed, result) = runtime.block_on(async move {
            let mut sorted = offsets;
            sorted.sort_unstable();
            let script = sorted
                .iter()
                .enumerate()
                .map(|(i, offset)| {
                    let tick = if Some(i) == valued_at { valued_tick(1.0) } else { Ticker::default() };
                    (Duration::from_millis(*offset), tick)
                })
                .collect();
            let mut updates = ScriptedUpdates::new(script);
            if hold_open {
                updates = updates.hold_open();
            }
            let policy = StabilizationPolicy::new(
                Duration::from_millis(interval_ms),
                Duration::from_millis(overall_ms),
            );

            let started = Instant::now();
            let result = stabilize(&mut updates, policy).await;
            (started.elapsed(), result)
        });

        prop_assert!(elapsed <= Duration::from_millis(overall_ms + interval_ms));
        prop_assert_eq!(result.timed_out, result.tick.is_none());
    }

    #[test]
    fn invalid_numbers_never_reach_tick_data(
        price in prop_oneof![
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ],
        size in -1.0e9f64..-0.001,
    ) {
        let ticker = Ticker {
            time: Some(Utc::now()),
            last: Some(price),
            bid: Some(price),
            ask: Some(price),
            bid_size: Some(size),
            ask_size: Some(price),
            volume: Some(size),
            ..Ticker::default()
        };

        let tick = TickData::sanitized("SPY", Some(SPY), &ticker, Utc::now());

        prop_assert!(tick.last.is_none());
        prop_assert!(tick.bid.is_none());
        prop_assert!(tick.ask.is_none());
        prop_assert!(tick.bid_size.is_none());
        prop_assert!(tick.ask_size.is_none());
        prop_assert!(tick.volume.is_none());
    }
}

// =============================================================================
// Historical Bars
// =============================================================================

#[tokio::test]
async fn historical_bars_for_lowercase_request() {
    let h = harness();
    h.connector.set_bars(vec![
        Bar {
            date: "20240115 09:30:00".to_string(),
            open: 475.0,
            high: 476.2,
            low: 474.8,
            close: 476.0,
            volume: Some(1_000_000.0),
            wap: Some(475.6),
            bar_count: Some(3_200),
        },
        Bar {
            date: "20240115 09:31:00".to_string(),
            open: 476.0,
            high: 476.5,
            low: 475.9,
            close: 476.4,
            volume: None,
            wap: None,
            bar_count: None,
        },
    ]);

    let mut request = HistoricalDataRequest::new("spy");
    request.exchange = "smart".to_string();
    let bars = h.service.get_historical_data(request).await.unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].count, Some(3_200));
    assert_eq!(bars[1].volume, 0);
    assert!(bars[1].wap.is_none());
}

#[tokio::test]
async fn historical_data_for_unknown_symbol() {
    let h = harness();

    let err = h
        .service
        .get_historical_data(HistoricalDataRequest::new("NOPE"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::ContractNotFound(_)));
}

// =============================================================================
// Session and Commands
// =============================================================================

#[tokio::test(start_paused = true)]
async fn connection_status_and_reconnect() {
    let h = harness();
    h.connector.set_accounts(vec!["DU7654321".to_string()]);

    let status = h.service.connection_status().await;
    assert!(!status.connected);
    assert!(h.connector.connect_requests().is_empty());

    h.service.get_tickers(&[SPY]).await.unwrap();
    let status = h.service.connection_status().await;
    assert!(status.connected);
    assert_eq!(status.accounts, vec!["DU7654321"]);
    assert_ne!(status.client_id, Some(1111));

    let outcome = h.service.reconnect().await;
    assert!(outcome.success);
    assert!(outcome.connected);
    assert_eq!(h.connector.connect_requests().len(), 2);
}

#[tokio::test]
async fn commands_are_forwarded_and_failures_raised() {
    let h = harness();

    h.service
        .send_command(GatewayCommand::ReconnectAccount)
        .await
        .unwrap();
    h.service.send_raw_command("ENABLEAPI").await.unwrap();
    assert_eq!(h.commands.sent(), vec!["RECONNECTACCOUNT", "ENABLEAPI"]);

    let err = h.service.send_raw_command("  ").await.unwrap_err();
    assert_eq!(err.reason(), "COMMAND_FAILED");

    h.commands.set_unreachable(true);
    let err = h
        .service
        .send_command(GatewayCommand::Restart)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Command(_)));
}

#[tokio::test(start_paused = true)]
async fn failed_restart_command_fails_ticker_request() {
    let h = harness();
    h.connector.withhold_greeks_for_requests(usize::MAX);
    h.commands.set_unreachable(true);

    let err = h.service.get_tickers(&[SPY_CALL]).await.unwrap_err();

    assert!(matches!(err, GatewayError::Command(_)));
    assert_eq!(h.connector.ticker_requests(), 1);
}
