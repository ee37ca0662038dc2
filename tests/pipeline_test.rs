mod common;

use chrono::{Duration, Utc};
use common::{count_kind, crisis_candles, test_settings, uptrend_candles, FixedSignal, Harness};
use tradeguard::engine::Evaluation;
use tradeguard::execution::PositionState;
use tradeguard::risk::RiskCheck;
use tradeguard::strategy::ModelFamily;
use tradeguard::{AlertKind, Side, Strategy, TradeDirection, TradingError, TradingMode};

fn opened(evaluation: &Evaluation) -> tradeguard::execution::Position {
    match evaluation {
        Evaluation::Opened(position) => position.clone(),
        other => panic!("expected an opened position, got {:?}", other),
    }
}

fn denied_by(evaluation: &Evaluation) -> Option<RiskCheck> {
    match evaluation {
        Evaluation::Denied(decision) => decision.check,
        _ => None,
    }
}

#[tokio::test]
async fn test_aligned_uptrend_opens_monitored_position() {
    let settings = test_settings(&["BTC"]);
    let mut h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);

    let results = h.engine.run_tick().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "BTC");

    let position = opened(&results[0].1);
    assert_eq!(position.state, PositionState::Monitoring);
    assert_eq!(position.side, Side::Long);
    assert!((position.entry_price - 579.0).abs() < 1e-9);

    // ATR 5 x 2.0 in a trending regime, target at 2.5R
    assert!((position.stop_loss - 569.0).abs() < 1e-6);
    assert!((position.take_profit - 604.0).abs() < 1e-6);

    // Fractional Kelly is well above the 15% cap on a $10k balance
    assert!((position.notional() - 1500.0).abs() < 1e-6);

    let log: Vec<PositionState> = h
        .store
        .transition_log()
        .await
        .into_iter()
        .filter(|(id, _)| *id == position.id)
        .map(|(_, state)| state)
        .collect();
    assert_eq!(
        log,
        vec![
            PositionState::Proposed,
            PositionState::Open,
            PositionState::Monitoring
        ]
    );

    let alerts = h.drain_alerts();
    assert_eq!(count_kind(&alerts, AlertKind::TradeOpened), 1);
}

#[tokio::test]
async fn test_second_tick_is_denied_while_position_active() {
    let settings = test_settings(&["BTC"]);
    let h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);

    opened(&h.engine.run_tick().await[0].1);
    let second = h.engine.run_tick().await;

    assert_eq!(denied_by(&second[0].1), Some(RiskCheck::ActivePosition));
    assert_eq!(h.engine.lifecycle().open_positions().await.len(), 1);
}

#[tokio::test]
async fn test_crisis_regime_never_trades() {
    let settings = test_settings(&["BTC"]);
    let mut h = Harness::new(&settings);
    h.feed.set_market("BTC", crisis_candles("BTC", 480), 0.01);

    let results = h.engine.run_tick().await;

    assert_eq!(results[0].1, Evaluation::Skipped("regime crisis".to_string()));
    assert!(h.engine.lifecycle().open_positions().await.is_empty());
    assert!(h.drain_alerts().is_empty());
}

#[tokio::test]
async fn test_wide_spread_turns_trading_off() {
    let settings = test_settings(&["BTC"]);
    let h = Harness::new(&settings);
    // 5.0 on a 579 price is ~86 bps
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 5.0);

    let results = h.engine.run_tick().await;

    assert_eq!(results[0].1, Evaluation::Skipped("regime off".to_string()));
}

#[tokio::test]
async fn test_missing_market_data_skips_without_alerting() {
    let settings = test_settings(&["BTC", "DOGE"]);
    let mut h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);

    let results = h.engine.run_tick().await;

    opened(&results[0].1);
    assert!(matches!(&results[1].1, Evaluation::Skipped(reason) if reason.contains("DOGE")));

    let alerts = h.drain_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::TradeOpened);
}

#[tokio::test]
async fn test_short_history_does_not_trade() {
    let settings = test_settings(&["BTC"]);
    let h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 120), 0.1);

    let results = h.engine.run_tick().await;

    assert!(!matches!(results[0].1, Evaluation::Opened(_)));
    assert!(h.engine.lifecycle().open_positions().await.is_empty());
}

/// Momentum and cycle families agreeing on `score`
fn agreeing_families(score: f64) -> Vec<Box<dyn Strategy>> {
    vec![
        FixedSignal::boxed("momentum", ModelFamily::Momentum, score, 0.8),
        FixedSignal::boxed("cycle", ModelFamily::Cycle, score, 0.8),
    ]
}

#[tokio::test]
async fn test_unaligned_timeframes_block_agreeing_families() {
    let settings = test_settings(&["BTC"]);
    let aligned = Harness::with_strategies(&settings, agreeing_families(0.8));
    aligned
        .feed
        .set_market("BTC", uptrend_candles("BTC", 480), 0.1);
    opened(&aligned.engine.evaluate_symbol("BTC", 1).await);

    // 480 base candles leave the higher horizon short of history
    let mut settings = test_settings(&["BTC"]);
    settings.timeframe.higher_factor = 64;
    let unaligned = Harness::with_strategies(&settings, agreeing_families(0.8));
    unaligned
        .feed
        .set_market("BTC", uptrend_candles("BTC", 480), 0.1);

    let evaluation = unaligned.engine.evaluate_symbol("BTC", 1).await;

    assert_eq!(
        evaluation,
        Evaluation::Skipped("timeframes not aligned".to_string())
    );
    assert!(unaligned.engine.lifecycle().open_positions().await.is_empty());
}

#[tokio::test]
async fn test_ensemble_against_alignment_does_not_trade() {
    let settings = test_settings(&["BTC"]);
    let h = Harness::with_strategies(&settings, agreeing_families(-0.8));
    // Every horizon of the uptrend is bullish
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);

    let evaluation = h.engine.evaluate_symbol("BTC", 1).await;

    match evaluation {
        Evaluation::NoSignal(decision) => {
            assert_eq!(decision.direction, TradeDirection::None);
            assert!(decision.rationale.contains("contradicts"));
        }
        other => panic!("expected no signal, got {:?}", other),
    }
    assert!(h.engine.lifecycle().open_positions().await.is_empty());
}

#[tokio::test]
async fn test_daily_loss_latch_holds_until_next_day() {
    let settings = test_settings(&["BTC"]);
    let h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);
    h.ledger.apply_realized_pnl(-600.0, Utc::now()).await;

    let first = h.engine.run_tick().await;
    assert_eq!(denied_by(&first[0].1), Some(RiskCheck::DailyLoss));
    assert_eq!(
        h.engine.risk_gate().latch().latched_on(),
        Some(Utc::now().date_naive())
    );

    // Recovering intraday does not lift the latch
    h.ledger.apply_realized_pnl(700.0, Utc::now()).await;
    let second = h.engine.run_tick().await;
    assert_eq!(denied_by(&second[0].1), Some(RiskCheck::DailyLoss));

    // The latch expires on the next UTC date
    assert!(!h
        .engine
        .risk_gate()
        .latch()
        .is_latched(Utc::now() + Duration::days(1)));
}

#[tokio::test]
async fn test_repeated_account_denials_alert_once_at_threshold() {
    let settings = test_settings(&["BTC"]);
    let mut h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);
    h.ledger.apply_realized_pnl(-600.0, Utc::now()).await;

    for _ in 0..2 {
        h.engine.run_tick().await;
    }
    assert_eq!(count_kind(&h.drain_alerts(), AlertKind::RiskBreach), 0);

    h.engine.run_tick().await;
    let alerts = h.drain_alerts();
    assert_eq!(count_kind(&alerts, AlertKind::RiskBreach), 1);

    h.engine.run_tick().await;
    assert_eq!(count_kind(&h.drain_alerts(), AlertKind::RiskBreach), 0);
}

#[tokio::test]
async fn test_paused_engine_proposes_nothing() {
    let settings = test_settings(&["BTC"]);
    let h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);

    h.engine.pause();
    let results = h.engine.run_tick().await;
    assert_eq!(results[0].1, Evaluation::Skipped("engine paused".to_string()));
    assert!(h.engine.status().await.paused);

    h.engine.resume();
    opened(&h.engine.run_tick().await[0].1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_evaluations_open_one_position() {
    let settings = test_settings(&["BTC"]);
    let h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);

    let a = h.engine.clone();
    let b = h.engine.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.evaluate_symbol("BTC", 7).await }),
        tokio::spawn(async move { b.evaluate_symbol("BTC", 7).await }),
    );
    let outcomes = [first.unwrap(), second.unwrap()];

    let opened_count = outcomes
        .iter()
        .filter(|e| matches!(e, Evaluation::Opened(_)))
        .count();
    assert_eq!(opened_count, 1);
    assert!(outcomes
        .iter()
        .any(|e| denied_by(e) == Some(RiskCheck::ActivePosition)));
    assert_eq!(h.engine.lifecycle().open_positions().await.len(), 1);
}

#[tokio::test]
async fn test_live_mode_waits_for_operator_confirmation() {
    let mut settings = test_settings(&["BTC"]);
    settings.mode = TradingMode::Live;
    let mut h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);

    let pending = opened(&h.engine.run_tick().await[0].1);
    assert_eq!(pending.state, PositionState::PendingConfirmation);
    let token = pending.confirmation.as_ref().unwrap().token;

    let alerts = h.drain_alerts();
    assert_eq!(count_kind(&alerts, AlertKind::PendingConfirmation), 1);
    assert_eq!(count_kind(&alerts, AlertKind::TradeOpened), 0);

    let wrong = h
        .engine
        .confirm_pending_order(pending.id, uuid::Uuid::new_v4(), true)
        .await;
    assert!(matches!(wrong, Err(TradingError::InvalidConfirmationToken(_))));

    let confirmed = h
        .engine
        .confirm_pending_order(pending.id, token, true)
        .await
        .unwrap();
    assert_eq!(confirmed.state, PositionState::Monitoring);
    assert!(confirmed.confirmation.is_none());
    assert_eq!(count_kind(&h.drain_alerts(), AlertKind::TradeOpened), 1);
}

#[tokio::test]
async fn test_unconfirmed_live_order_expires() {
    let mut settings = test_settings(&["BTC"]);
    settings.mode = TradingMode::Live;
    let mut h = Harness::new(&settings);
    h.feed.set_market("BTC", uptrend_candles("BTC", 480), 0.1);

    let pending = opened(&h.engine.run_tick().await[0].1);
    h.drain_alerts();

    assert!(h.engine.reap_once(Utc::now()).await.is_empty());

    let later = Utc::now() + Duration::seconds(settings.lifecycle.confirmation_ttl_secs + 1);
    let cancelled = h.engine.reap_once(later).await;
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, pending.id);
    assert_eq!(cancelled[0].state, PositionState::Cancelled);

    assert!(!h.engine.lifecycle().has_active_position("BTC").await);
    assert_eq!(
        count_kind(&h.drain_alerts(), AlertKind::ConfirmationExpired),
        1
    );
}
