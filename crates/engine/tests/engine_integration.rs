use chanledger_core::config::FactorConfig;
use chanledger_core::engine::error::EngineError;
use chanledger_core::engine::port::FactorIngest;
use chanledger_core::factor::entity::{
    ANCHOR_FACTOR, AnchorSwitchReason, FactorEvent, FactorPayload, KIND_ANCHOR_SWITCH,
    KIND_PIVOT_MAJOR, KIND_ZHONGSHU_DEAD, PEN_FACTOR, PIVOT_FACTOR, ZHONGSHU_FACTOR,
};
use chanledger_core::market::entity::Candle;
use chanledger_core::market::port::CandleStore;
use chanledger_core::observe::error::ObserveError;
use chanledger_core::observe::port::ObservabilitySink;
use chanledger_core::store::port::FactorLedger;
use chanledger_core::testing::MemoryCandleStore;
use chanledger_engine::engine::FactorEngine;
use chanledger_engine::fingerprint::FingerprintRebuildCoordinator;
use chanledger_engine::sink::NoopSink;
use chanledger_store::candle::SqliteCandleStore;
use chanledger_store::ledger::SqliteFactorLedger;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::{TempDir, tempdir};

const SERIES: &str = "test:spot:XYZ/USD:1m";

/// # Summary
/// 测试用序列：收盘价即 OHLC，时间为 `60 * (下标 + 1)`。
fn flat_candles(prices: &[f64]) -> Vec<Candle> {
    prices
        .iter()
        .zip(1i64..)
        .map(|(p, i)| Candle {
            candle_time: i * 60,
            open: *p,
            high: *p,
            low: *p,
            close: *p,
            volume: 1.0,
        })
        .collect()
}

/// 摆动点之间每段 4 根线性插值，共 41 根
fn swing_candles() -> Vec<Candle> {
    let swings = [10, 20, 12, 18, 11, 19, 13, 30, 25, 40, 35];
    let mut prices = Vec::new();
    for pair in swings.windows(2) {
        let (a, b) = (f64::from(pair[0]), f64::from(pair[1]));
        for step in 0..4u8 {
            prices.push(a + (b - a) * f64::from(step) / 4.0);
        }
    }
    prices.push(35.0);
    flat_candles(&prices)
}

fn test_config() -> FactorConfig {
    FactorConfig {
        pivot_window_major: 2,
        pivot_window_minor: 1,
        ..FactorConfig::default()
    }
}

struct Harness {
    _dir: TempDir,
    candles: Arc<MemoryCandleStore>,
    ledger: Arc<SqliteFactorLedger>,
    engine: FactorEngine,
}

async fn harness(config: FactorConfig, candles: &[Candle]) -> Harness {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = Arc::new(MemoryCandleStore::new());
    store.insert(SERIES, candles);
    let ledger = Arc::new(SqliteFactorLedger::open(dir.path()).await.unwrap());
    let engine = FactorEngine::new(&config, store.clone(), ledger.clone(), Arc::new(NoopSink))
        .unwrap();
    Harness {
        _dir: dir,
        candles: store,
        ledger,
        engine,
    }
}

async fn all_events(ledger: &SqliteFactorLedger) -> Vec<FactorEvent> {
    ledger
        .events_between(SERIES, None, i64::MIN, i64::MAX)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_delayed_confirmation_visible_exactly_after_window() {
    let closes = [1.0, 2.0, 5.0, 2.0, 1.0, 2.0, 5.0, 2.0, 1.0, 2.0, 5.0, 2.0, 1.0];
    let h = harness(test_config(), &flat_candles(&closes)).await;

    h.engine.ingest_closed(SERIES, 240).await.unwrap();
    let majors: Vec<FactorEvent> = all_events(&h.ledger)
        .await
        .into_iter()
        .filter(|e| e.kind() == KIND_PIVOT_MAJOR)
        .collect();
    assert!(majors.is_empty(), "major pivot must not be visible before 300");

    h.engine.ingest_closed(SERIES, 300).await.unwrap();
    assert!(
        h.ledger
            .events_between(SERIES, Some(PIVOT_FACTOR), 0, 299)
            .await
            .unwrap()
            .iter()
            .all(|e| e.kind() != KIND_PIVOT_MAJOR)
    );
    let at_300 = h
        .ledger
        .events_between(SERIES, Some(PIVOT_FACTOR), 0, 300)
        .await
        .unwrap();
    let major = at_300
        .iter()
        .find(|e| e.kind() == KIND_PIVOT_MAJOR)
        .expect("major pivot visible at 300");
    assert_eq!(major.event_key, "major:180:resistance");
    assert_eq!(major.visible_time, 300);
    let FactorPayload::Pivot(pivot) = major.payload else {
        panic!("unexpected payload");
    };
    assert_eq!(pivot.pivot_price, 5.0);
    assert_eq!(pivot.window, 2);

    // 笔比分型多一层确认：第一笔 (180 -> 300) 在 540 才可见
    h.engine.ingest_closed(SERIES, 780).await.unwrap();
    let pens = h
        .ledger
        .events_between(SERIES, Some(PEN_FACTOR), 0, 780)
        .await
        .unwrap();
    let keys: Vec<(&str, i64)> = pens
        .iter()
        .map(|e| (e.event_key.as_str(), e.visible_time))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("confirmed:180:300", 540),
            ("confirmed:300:420", 660),
            ("confirmed:420:540", 780),
        ]
    );
    assert_eq!(h.ledger.head_time(SERIES).await.unwrap(), Some(780));
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let h = harness(test_config(), &swing_candles()).await;
    let last = 41 * 60;

    let first = h.engine.ingest_closed(SERIES, last).await.unwrap();
    assert!(!first.rebuilt);
    let before = all_events(&h.ledger).await;
    assert!(!before.is_empty());

    let second = h.engine.ingest_closed(SERIES, last).await.unwrap();
    assert!(!second.rebuilt);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(all_events(&h.ledger).await, before);

    // 回看窗口与已处理区间重叠时也不产生新行
    let earlier = h.engine.ingest_closed(SERIES, 20 * 60).await.unwrap();
    assert!(!earlier.rebuilt);
    assert_eq!(all_events(&h.ledger).await, before);
    assert_eq!(h.ledger.head_time(SERIES).await.unwrap(), Some(last));
    assert_eq!(
        h.ledger.fingerprint(SERIES).await.unwrap(),
        Some(first.fingerprint)
    );
}

#[tokio::test]
async fn test_no_look_ahead_when_streaming() {
    let candles = swing_candles();
    let h = harness(test_config(), &candles).await;

    for candle in &candles {
        h.engine.ingest_closed(SERIES, candle.candle_time).await.unwrap();
        let events = all_events(&h.ledger).await;
        assert!(
            events.iter().all(|e| e.visible_time <= candle.candle_time),
            "event visible after {}",
            candle.candle_time
        );
    }

    for event in all_events(&h.ledger).await {
        if let FactorPayload::Pivot(p) = event.payload {
            let window = i64::from(p.window);
            assert_eq!(p.visible_time, p.pivot_time + window * 60);
        }
        if let FactorPayload::Pen(pen) = event.payload {
            assert!(pen.start_time < pen.end_time);
            assert!(pen.end_time < pen.visible_time);
        }
    }
}

#[tokio::test]
async fn test_streaming_matches_batch() {
    let candles = swing_candles();
    let last = candles.last().map(|c| c.candle_time).unwrap();

    let batch = harness(test_config(), &candles).await;
    batch.engine.ingest_closed(SERIES, last).await.unwrap();

    let streaming = harness(test_config(), &candles).await;
    for candle in &candles {
        streaming
            .engine
            .ingest_closed(SERIES, candle.candle_time)
            .await
            .unwrap();
    }

    let chunked = harness(test_config(), &candles).await;
    for chunk in candles.chunks(7) {
        let up_to = chunk.last().map(|c| c.candle_time).unwrap();
        chunked.engine.ingest_closed(SERIES, up_to).await.unwrap();
    }

    let expected = all_events(&batch.ledger).await;
    assert_eq!(all_events(&streaming.ledger).await, expected);
    assert_eq!(all_events(&chunked.ledger).await, expected);

    for factor in [PEN_FACTOR, ZHONGSHU_FACTOR, ANCHOR_FACTOR] {
        let want = batch
            .ledger
            .head_at_or_before(SERIES, factor, last)
            .await
            .unwrap()
            .unwrap();
        for other in [&streaming, &chunked] {
            let got = other
                .ledger
                .head_at_or_before(SERIES, factor, last)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got.head, want.head, "head mismatch for {}", factor);
        }
    }
}

/// 按给定 `(时间, 价格)` 构造 K 线，可表达停盘缺口
fn timed_candles(points: &[(i64, f64)]) -> Vec<Candle> {
    points
        .iter()
        .map(|(t, p)| Candle {
            candle_time: *t,
            open: *p,
            high: *p,
            low: *p,
            close: *p,
            volume: 1.0,
        })
        .collect()
}

fn keys(events: &[FactorEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event_key.as_str()).collect()
}

async fn stream_each(h: &Harness, candles: &[Candle]) {
    for candle in candles {
        h.engine.ingest_closed(SERIES, candle.candle_time).await.unwrap();
    }
}

#[tokio::test]
async fn test_streaming_matches_batch_across_gap() {
    // 180 与 600 之间停盘 6 根
    let candles = timed_candles(&[
        (60, 1.0),
        (120, 2.0),
        (180, 5.0),
        (600, 2.0),
        (660, 1.0),
        (720, 2.0),
        (780, 3.0),
    ]);

    let batch = harness(test_config(), &candles).await;
    batch.engine.ingest_closed(SERIES, 780).await.unwrap();
    let streaming = harness(test_config(), &candles).await;
    stream_each(&streaming, &candles).await;

    let expected = all_events(&batch.ledger).await;
    assert_eq!(
        keys(&expected),
        vec![
            "minor:180:resistance",
            "major:180:resistance",
            "minor:660:support",
            "major:660:support",
        ]
    );
    assert_eq!(all_events(&streaming.ledger).await, expected);
}

#[tokio::test]
async fn test_streaming_matches_batch_on_gapped_swings() {
    // 第 20 根之后整体平移 100 个周期
    let candles: Vec<Candle> = swing_candles()
        .into_iter()
        .enumerate()
        .map(|(idx, mut c)| {
            if idx >= 20 {
                c.candle_time += 6_000;
            }
            c
        })
        .collect();
    let last = candles.last().map(|c| c.candle_time).unwrap();

    let batch = harness(test_config(), &candles).await;
    batch.engine.ingest_closed(SERIES, last).await.unwrap();
    let streaming = harness(test_config(), &candles).await;
    stream_each(&streaming, &candles).await;

    let expected = all_events(&batch.ledger).await;
    assert!(
        expected
            .iter()
            .any(|e| e.kind() == KIND_PIVOT_MAJOR && e.visible_time > candles[20].candle_time)
    );
    assert_eq!(all_events(&streaming.ledger).await, expected);
}

#[tokio::test]
async fn test_streaming_matches_batch_with_paged_rebuild_scans() {
    let candles = swing_candles();
    let last = candles.last().map(|c| c.candle_time).unwrap();
    let config = FactorConfig {
        state_rebuild_event_limit: 1,
        ..test_config()
    };

    let batch = harness(config.clone(), &candles).await;
    batch.engine.ingest_closed(SERIES, last).await.unwrap();
    let streaming = harness(config, &candles).await;
    stream_each(&streaming, &candles).await;

    let expected = all_events(&batch.ledger).await;
    let pens = expected
        .iter()
        .filter(|e| e.factor_name == PEN_FACTOR)
        .count();
    assert!(pens > 1, "every rebuild scan must span several pages");
    assert_eq!(all_events(&streaming.ledger).await, expected);

    for factor in [PEN_FACTOR, ZHONGSHU_FACTOR, ANCHOR_FACTOR] {
        let want = batch
            .ledger
            .head_at_or_before(SERIES, factor, last)
            .await
            .unwrap()
            .unwrap();
        let got = streaming
            .ledger
            .head_at_or_before(SERIES, factor, last)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.head, want.head, "head mismatch for {}", factor);
    }
}

#[tokio::test]
async fn test_zhongshu_lifecycle() {
    let h = harness(test_config(), &swing_candles()).await;
    let time_of = |idx: i64| 60 * (idx + 1);

    // 第 30 根：中枢已在第 22 根形成，只出现在头快照中
    h.engine.ingest_closed(SERIES, time_of(30)).await.unwrap();
    let dead_so_far = h
        .ledger
        .events_between(SERIES, Some(ZHONGSHU_FACTOR), 0, time_of(30))
        .await
        .unwrap();
    assert!(dead_so_far.is_empty());
    let head = h
        .ledger
        .head_at_or_before(SERIES, ZHONGSHU_FACTOR, time_of(30))
        .await
        .unwrap()
        .unwrap();
    let alive = head.head["alive"].as_array().unwrap();
    assert_eq!(alive.len(), 1);
    assert_eq!(alive[0]["zg"], 18.0);
    assert_eq!(alive[0]["zd"], 12.0);
    assert_eq!(alive[0]["entry_direction"], -1);
    assert_eq!(alive[0]["formed_time"], time_of(22));
    assert_eq!(alive[0]["pen_count"], 5);
    assert!(alive[0]["death_time"].is_null());

    // 走完全部 K 线：第 38 根离开中枢，恰好一条死亡事件
    h.engine.ingest_closed(SERIES, time_of(40)).await.unwrap();
    let dead: Vec<FactorEvent> = all_events(&h.ledger)
        .await
        .into_iter()
        .filter(|e| e.kind() == KIND_ZHONGSHU_DEAD)
        .collect();
    assert_eq!(dead.len(), 1);
    let FactorPayload::ZhongshuDead(z) = dead[0].payload else {
        panic!("unexpected payload");
    };
    assert_eq!(z.start_time, time_of(4));
    assert_eq!(z.end_time, time_of(28));
    assert_eq!(z.death_time, Some(time_of(38)));
    assert_eq!(z.visible_time, time_of(38));
    assert_eq!(z.pen_count, 6);
    assert_eq!(z.entry_direction, -1);
    assert_eq!(
        dead[0].event_key,
        format!("dead:{}:{}", time_of(4), time_of(38))
    );

    let head = h
        .ledger
        .head_at_or_before(SERIES, ZHONGSHU_FACTOR, time_of(40))
        .await
        .unwrap()
        .unwrap();
    assert!(head.head["alive"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_anchor_switches_on_stronger_pens() {
    let h = harness(test_config(), &swing_candles()).await;
    let time_of = |idx: i64| 60 * (idx + 1);
    h.engine.ingest_closed(SERIES, time_of(40)).await.unwrap();

    let switches: Vec<FactorEvent> = all_events(&h.ledger)
        .await
        .into_iter()
        .filter(|e| e.kind() == KIND_ANCHOR_SWITCH)
        .collect();
    assert_eq!(switches.len(), 2);

    let FactorPayload::AnchorSwitch(first) = switches[0].payload else {
        panic!("unexpected payload");
    };
    assert_eq!(first.switch_time, time_of(14));
    assert_eq!(first.reason, AnchorSwitchReason::StrongPen);
    assert!(first.old_anchor.is_none());
    assert_eq!(first.new_anchor.start_time, time_of(4));
    assert_eq!(first.new_anchor.end_time, time_of(8));

    let FactorPayload::AnchorSwitch(second) = switches[1].payload else {
        panic!("unexpected payload");
    };
    assert_eq!(second.switch_time, time_of(34));
    assert_eq!(second.old_anchor, Some(first.new_anchor));
    assert_eq!(second.new_anchor.start_time, time_of(24));
    assert_eq!(second.new_anchor.end_time, time_of(28));
    assert_eq!(
        switches[1].event_key,
        format!("switch:{}:strong_pen", time_of(34))
    );

    let head = h
        .ledger
        .head_at_or_before(SERIES, ANCHOR_FACTOR, time_of(40))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(head.head["strength"], 17.0);
    assert_eq!(head.head["current_anchor_ref"]["start_time"], time_of(24));
}

#[tokio::test]
async fn test_fingerprint_change_triggers_bounded_rebuild_once() {
    let candles = swing_candles();
    let last = candles.last().map(|c| c.candle_time).unwrap();
    let config = FactorConfig {
        rebuild_keep_candles: 10,
        ..test_config()
    };
    let h = harness(config.clone(), &candles).await;

    // 升级后的引擎需要有新 K 线才会推进
    let first = h.engine.ingest_closed(SERIES, last - 60).await.unwrap();
    assert!(!first.rebuilt, "a fresh series is not a rebuild");

    let upgraded = FactorEngine::new(
        &FactorConfig {
            logic_version_override: Some("chan-factor-logic-v2".to_string()),
            ..config
        },
        h.candles.clone(),
        h.ledger.clone(),
        Arc::new(NoopSink),
    )
    .unwrap();

    let outcome = upgraded.ingest_closed(SERIES, last).await.unwrap();
    assert!(outcome.rebuilt);
    assert_ne!(outcome.fingerprint, first.fingerprint);
    assert_eq!(h.candles.count(SERIES), 10);
    assert_eq!(
        h.ledger.fingerprint(SERIES).await.unwrap(),
        Some(outcome.fingerprint.clone())
    );
    assert_eq!(h.ledger.head_time(SERIES).await.unwrap(), Some(last));

    // 重建只看得到保留的尾部 K 线
    let first_kept = h.candles.get_closed_between_times(SERIES, 0, last, Some(1)).await.unwrap()[0]
        .candle_time;
    assert!(
        all_events(&h.ledger)
            .await
            .iter()
            .all(|e| e.visible_time >= first_kept)
    );

    // 之后恢复正常增量
    let again = upgraded.ingest_closed(SERIES, last).await.unwrap();
    assert!(!again.rebuilt);
}

#[tokio::test]
async fn test_coordinator_trims_and_empties_ledger() {
    let candles = swing_candles();
    let last = candles.last().map(|c| c.candle_time).unwrap();
    let h = harness(test_config(), &candles).await;
    h.engine.ingest_closed(SERIES, last).await.unwrap();
    assert!(!all_events(&h.ledger).await.is_empty());

    let coordinator = FingerprintRebuildCoordinator::new(
        h.candles.clone(),
        h.ledger.clone(),
        Arc::new(NoopSink),
        10,
        true,
    );

    let outcome = coordinator
        .ensure_series_ready(SERIES, "next-fingerprint")
        .await
        .unwrap();
    assert!(outcome.forced);
    assert_eq!(outcome.keep_candles, 10);
    assert_eq!(outcome.trimmed_rows, 31);
    assert_eq!(h.candles.count(SERIES), 10);
    assert!(all_events(&h.ledger).await.is_empty());
    assert_eq!(h.ledger.head_time(SERIES).await.unwrap(), None);
    assert_eq!(
        h.ledger
            .head_at_or_before(SERIES, PEN_FACTOR, last)
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        h.ledger.fingerprint(SERIES).await.unwrap().as_deref(),
        Some("next-fingerprint")
    );

    // 指纹一致后不再重建
    let again = coordinator
        .ensure_series_ready(SERIES, "next-fingerprint")
        .await
        .unwrap();
    assert!(!again.forced);
    assert_eq!(again.trimmed_rows, 0);
    assert_eq!(h.candles.count(SERIES), 10);

    // 新序列不视为重建
    let fresh = coordinator
        .ensure_series_ready("test:spot:NEW/USD:1m", "next-fingerprint")
        .await
        .unwrap();
    assert!(!fresh.forced);
}

#[tokio::test]
async fn test_stale_call_with_changed_fingerprint_is_noop() {
    let candles = swing_candles();
    let last = candles.last().map(|c| c.candle_time).unwrap();
    let config = FactorConfig {
        rebuild_keep_candles: 10,
        ..test_config()
    };
    let h = harness(config.clone(), &candles).await;
    let first = h.engine.ingest_closed(SERIES, last).await.unwrap();
    let before = all_events(&h.ledger).await;

    let upgraded = FactorEngine::new(
        &FactorConfig {
            logic_version_override: Some("chan-factor-logic-v2".to_string()),
            ..config
        },
        h.candles.clone(),
        h.ledger.clone(),
        Arc::new(NoopSink),
    )
    .unwrap();

    for up_to in [20 * 60, last] {
        let outcome = upgraded.ingest_closed(SERIES, up_to).await.unwrap();
        assert!(!outcome.rebuilt);
    }
    assert_eq!(h.candles.count(SERIES), candles.len());
    assert_eq!(all_events(&h.ledger).await, before);
    assert_eq!(
        h.ledger.fingerprint(SERIES).await.unwrap(),
        Some(first.fingerprint)
    );
}

#[tokio::test]
async fn test_auto_rebuild_disabled_keeps_ledger() {
    let candles = swing_candles();
    let last = candles.last().map(|c| c.candle_time).unwrap();
    let h = harness(test_config(), &candles).await;
    h.engine.ingest_closed(SERIES, last - 60).await.unwrap();
    let before = all_events(&h.ledger).await;

    let other = FactorEngine::new(
        &FactorConfig {
            auto_rebuild: false,
            logic_version_override: Some("chan-factor-logic-v2".to_string()),
            ..test_config()
        },
        h.candles.clone(),
        h.ledger.clone(),
        Arc::new(NoopSink),
    )
    .unwrap();
    let outcome = other.ingest_closed(SERIES, last).await.unwrap();
    assert!(!outcome.rebuilt);
    assert_eq!(h.candles.count(SERIES), candles.len());
    let after = all_events(&h.ledger).await;
    assert_eq!(&after[..before.len()], &before[..]);
    assert_eq!(h.ledger.head_time(SERIES).await.unwrap(), Some(last));
}

#[tokio::test]
async fn test_request_rebuild_recomputes_same_ledger() {
    let candles = swing_candles();
    let last = candles.last().map(|c| c.candle_time).unwrap();
    let h = harness(test_config(), &candles).await;
    h.engine.ingest_closed(SERIES, last).await.unwrap();
    let before = all_events(&h.ledger).await;

    let report = h.engine.request_rebuild(SERIES).await.unwrap();
    assert_eq!(report.deleted_events, u64::try_from(before.len()).unwrap());
    assert_eq!(h.ledger.head_time(SERIES).await.unwrap(), None);
    assert!(h.engine.ledger().fingerprint(SERIES).await.unwrap().is_some());

    let outcome = h.engine.ingest_closed(SERIES, last).await.unwrap();
    assert!(!outcome.rebuilt);
    assert_eq!(all_events(&h.ledger).await, before);
}

#[tokio::test]
async fn test_invalid_series_id_is_config_error() {
    let h = harness(test_config(), &[]).await;
    let err = h.engine.ingest_closed("not-a-series", 60).await.unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

/// # Summary
/// 总是失败的观测输出端，记录调用次数。
struct FailingSink {
    calls: AtomicUsize,
}

impl ObservabilitySink for FailingSink {
    fn emit(
        &self,
        _pipe: &str,
        _event: &str,
        _series_id: &str,
        _message: &str,
        _data: &serde_json::Value,
    ) -> Result<(), ObserveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ObserveError::Sink("unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_sink_failure_does_not_fail_ingest_with_sqlite_candles() {
    let dir = tempdir().unwrap();
    let candle_store = Arc::new(SqliteCandleStore::new(dir.path()).unwrap());
    let closes = [1.0, 2.0, 5.0, 2.0, 1.0, 2.0, 5.0, 2.0, 1.0];
    candle_store
        .save_closed_candles(SERIES, &flat_candles(&closes))
        .await
        .unwrap();
    let ledger = Arc::new(SqliteFactorLedger::open(dir.path()).await.unwrap());
    let sink = Arc::new(FailingSink {
        calls: AtomicUsize::new(0),
    });
    let engine = FactorEngine::new(&test_config(), candle_store, ledger.clone(), sink.clone())
        .unwrap();

    let outcome = engine.ingest_closed(SERIES, 540).await.unwrap();
    assert!(!outcome.rebuilt);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.head_time(SERIES).await.unwrap(), Some(540));
    let pens = ledger
        .events_between(SERIES, Some(PEN_FACTOR), 0, 540)
        .await
        .unwrap();
    assert_eq!(pens.len(), 1);
}
