use async_trait::async_trait;
use chanledger_core::common::SeriesKey;
use chanledger_core::config::FactorConfig;
use chanledger_core::engine::entity::IngestOutcome;
use chanledger_core::engine::error::EngineError;
use chanledger_core::engine::port::FactorIngest;
use chanledger_core::market::entity::Candle;
use chanledger_core::market::port::CandleStore;
use chanledger_core::observe::port::ObservabilitySink;
use chanledger_core::store::port::{FactorLedger, LedgerCommit, ResetReport};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::factory::{FactorPipeline, default_pipeline};
use crate::fingerprint::{FingerprintRebuildCoordinator, compute_fingerprint};
use crate::rebuild::StateRebuildLoader;
use crate::runtime::{TickRun, run_ticks};
use crate::settings::FactorSettings;
use crate::tick::CandleBatch;
use crate::window::{CandleWindow, WindowPlanner};

/// # Summary
/// 增量因子引擎：把已收盘 K 线推进为因子账本中的事件与头快照。
///
/// # Invariants
/// - 同一序列的调用必须串行，引擎内部不加锁。
/// - 每次调用在单个事务内提交，失败时账本不变，可直接重试。
/// - 增量计算的结果与从头全量计算逐字节一致。
pub struct FactorEngine {
    candles: Arc<dyn CandleStore>,
    ledger: Arc<dyn FactorLedger>,
    sink: Arc<dyn ObservabilitySink>,
    settings: FactorSettings,
    pipeline: Arc<FactorPipeline>,
    planner: WindowPlanner,
    loader: StateRebuildLoader,
    coordinator: FingerprintRebuildCoordinator,
}

impl FactorEngine {
    /// # Summary
    /// 创建引擎实例。
    ///
    /// # Logic
    /// 1. 解析并校验配置。
    /// 2. 构建默认处理器注册表与依赖图，图错误在此处致命。
    /// 3. 组装窗口规划器、状态恢复器与指纹协调器。
    ///
    /// # Arguments
    /// * `config` - 因子配置。
    /// * `candles` - K 线存储。
    /// * `ledger` - 因子账本。
    /// * `sink` - 观测输出端。
    ///
    /// # Returns
    /// * `Result<Self, EngineError>`
    pub fn new(
        config: &FactorConfig,
        candles: Arc<dyn CandleStore>,
        ledger: Arc<dyn FactorLedger>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Result<Self, EngineError> {
        let settings = FactorSettings::resolve(config)?;
        let pipeline = Arc::new(default_pipeline(&settings)?);
        let planner = WindowPlanner::new(settings.required_lookback()?, settings.lookback_candles);
        let loader = StateRebuildLoader::new(ledger.clone(), settings.state_rebuild_event_limit);
        let coordinator = FingerprintRebuildCoordinator::new(
            candles.clone(),
            ledger.clone(),
            sink.clone(),
            settings.rebuild_keep_candles,
            settings.auto_rebuild,
        );

        info!(
            "FactorEngine ready: factors [{}], logic version {}",
            pipeline.graph().names().join(", "),
            settings.logic_version
        );
        Ok(Self {
            candles,
            ledger,
            sink,
            settings,
            pipeline,
            planner,
            loader,
            coordinator,
        })
    }

    pub fn settings(&self) -> &FactorSettings {
        &self.settings
    }

    /// 账本查询接口
    pub fn ledger(&self) -> Arc<dyn FactorLedger> {
        self.ledger.clone()
    }

    /// 序列在当前计算语义下的指纹
    pub fn fingerprint_for(&self, series_id: &str) -> Result<String, EngineError> {
        compute_fingerprint(series_id, &self.settings, self.pipeline.graph())
    }

    /// # Summary
    /// 外部发起的重建请求：清空序列账本，保留 K 线与指纹。
    ///
    /// # Logic
    /// 1. 在一个事务内删除事件、头快照与 head_time。
    /// 2. 下一次摄入按新序列处理。
    pub async fn request_rebuild(&self, series_id: &str) -> Result<ResetReport, EngineError> {
        let stored = self.ledger.fingerprint(series_id).await?;
        let report = self
            .ledger
            .reset_series(series_id, stored.as_deref())
            .await?;
        info!(
            "Rebuild requested for {}: removed {} events, {} heads",
            series_id, report.deleted_events, report.deleted_heads
        );
        Ok(report)
    }

    /// # Summary
    /// 按窗口加载 K 线。
    ///
    /// # Logic
    /// 1. 从起点加载：读取 `end` 及之前的全部 K 线。
    /// 2. 尾部窗口：先按根数取 `anchor` 及之前的上下文，再从上下文第一根读到 `end`。
    async fn load_window(
        &self,
        series_id: &str,
        window: CandleWindow,
    ) -> Result<Vec<Candle>, EngineError> {
        let start = match window {
            CandleWindow::FromStart { .. } => i64::MIN,
            CandleWindow::Tail {
                anchor, context, ..
            } => {
                let context = self
                    .candles
                    .get_latest_closed_at_or_before(series_id, anchor, context)
                    .await?;
                match context.first() {
                    Some(first) => first.candle_time,
                    None => anchor.saturating_add(1),
                }
            }
        };
        Ok(self
            .candles
            .get_closed_between_times(series_id, start, window.end(), None)
            .await?)
    }

    /// 只提交指纹（重建后或首次见到序列且无新 K 线时）
    async fn commit_fingerprint_only(
        &self,
        series_id: &str,
        fingerprint: &str,
    ) -> Result<(), EngineError> {
        self.ledger
            .commit(LedgerCommit {
                series_id: series_id.to_string(),
                events: Vec::new(),
                heads: Vec::new(),
                head_time: None,
                fingerprint: Some(fingerprint.to_string()),
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FactorIngest for FactorEngine {
    /// # Summary
    /// 把序列推进到 `up_to_time`（包含）。
    ///
    /// # Logic
    /// 1. 校验序列 ID，计算指纹。
    /// 2. `up_to_time` 不晚于已有 head：无写入直接返回，不触发重建。
    /// 3. 协调器确保账本与当前语义一致，必要时有界重建。
    /// 4. 规划窗口；无事可做时直接返回（必要时补记指纹）。
    /// 5. 按根数加载 K 线并从账本恢复状态。
    /// 6. 在阻塞线程池上逐根运行处理器，生成头快照。
    /// 7. 单事务提交事件、头快照、head_time 与指纹。
    /// 8. 输出 `factor.ingest.done` 观测事件，输出失败只记录告警。
    async fn ingest_closed(
        &self,
        series_id: &str,
        up_to_time: i64,
    ) -> Result<IngestOutcome, EngineError> {
        let started = Instant::now();
        SeriesKey::from_str(series_id)
            .map_err(|e| EngineError::Config(format!("{}: {}", series_id, e)))?;
        let fingerprint = self.fingerprint_for(series_id)?;

        if let Some(head) = self.ledger.head_time(series_id).await?
            && up_to_time <= head
        {
            debug!("{} already at {}, nothing to ingest", series_id, head);
            return Ok(IngestOutcome {
                rebuilt: false,
                fingerprint,
            });
        }

        let rebuild = self
            .coordinator
            .ensure_series_ready(series_id, &fingerprint)
            .await?;
        let rebuilt = rebuild.forced;

        let head_time = self.ledger.head_time(series_id).await?;
        let needs_fingerprint =
            rebuilt || self.ledger.fingerprint(series_id).await?.is_none();
        let outcome = IngestOutcome {
            rebuilt,
            fingerprint: fingerprint.clone(),
        };

        let Some(window) = self.planner.plan(head_time, up_to_time, rebuilt) else {
            if needs_fingerprint {
                self.commit_fingerprint_only(series_id, &fingerprint).await?;
            }
            debug!("{} already at {:?}, nothing to ingest", series_id, head_time);
            return Ok(outcome);
        };

        let candles = self.load_window(series_id, window).await?;
        let batch = CandleBatch::new(candles);
        let start_index = batch.first_after(head_time);
        if start_index >= batch.len() {
            if needs_fingerprint {
                self.commit_fingerprint_only(series_id, &fingerprint).await?;
            }
            debug!("{} has no new closed candles up to {}", series_id, up_to_time);
            return Ok(outcome);
        }

        let mut state = self.loader.load(series_id, head_time, rebuilt).await?;

        let pipeline = self.pipeline.clone();
        let owned_series = series_id.to_string();
        let run: TickRun = tokio::task::spawn_blocking(move || {
            run_ticks(
                pipeline.processors(),
                &mut state,
                &batch,
                start_index,
                &owned_series,
            )
        })
        .await
        .map_err(|e| EngineError::Tick(format!("tick worker failed: {}", e)))??;

        let event_count = run.events.len();
        let report = self
            .ledger
            .commit(LedgerCommit {
                series_id: series_id.to_string(),
                events: run.events,
                heads: run.heads,
                head_time: run.last_time,
                fingerprint: needs_fingerprint.then(|| fingerprint.clone()),
            })
            .await?;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            "Ingested {} candles for {} up to {:?}: {} events ({} new) in {}ms",
            run.processed, series_id, run.last_time, event_count, report.inserted_events, elapsed_ms
        );
        let data = json!({
            "candles": run.processed,
            "head_time": run.last_time,
            "inserted_events": report.inserted_events,
            "duplicate_events": report.duplicate_events,
            "inserted_heads": report.inserted_heads,
            "rebuilt": rebuilt,
            "duration_ms": elapsed_ms,
        });
        if let Err(e) = self.sink.emit(
            "factor",
            "factor.ingest.done",
            series_id,
            "factor ingest committed",
            &data,
        ) {
            warn!("Failed to emit factor.ingest.done for {}: {}", series_id, e);
        }

        Ok(outcome)
    }
}
