use chanledger_core::engine::entity::RebuildOutcome;
use chanledger_core::engine::error::EngineError;
use chanledger_core::factor::codec::to_canonical_string;
use chanledger_core::market::port::CandleStore;
use chanledger_core::observe::port::ObservabilitySink;
use chanledger_core::store::port::FactorLedger;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

use crate::graph::FactorGraph;
use crate::settings::FactorSettings;

/// 内置的计算逻辑版本号，任何改变事件语义的修改都必须提升
pub const FACTOR_LOGIC_VERSION: &str = "chan-factor-logic-v1";

#[derive(Serialize)]
struct FingerprintSettings {
    pivot_window_major: u32,
    pivot_window_minor: u32,
}

#[derive(Serialize)]
struct FingerprintNode<'a> {
    name: &'a str,
    depends_on: &'a [String],
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    series_id: &'a str,
    settings: FingerprintSettings,
    graph: Vec<FingerprintNode<'a>>,
    logic_version: &'a str,
}

/// # Summary
/// 计算序列的计算语义指纹。
///
/// # Logic
/// 1. 组装 `(series_id, 分型窗口, 拓扑序及依赖, 逻辑版本)`。
/// 2. 规范化 JSON 编码后取 sha256 的十六进制。
///
/// # Returns
/// * `Result<String, EngineError>` - 64 位十六进制字符串。
pub fn compute_fingerprint(
    series_id: &str,
    settings: &FactorSettings,
    graph: &FactorGraph,
) -> Result<String, EngineError> {
    let input = FingerprintInput {
        series_id,
        settings: FingerprintSettings {
            pivot_window_major: settings.pivot_window_major,
            pivot_window_minor: settings.pivot_window_minor,
        },
        graph: graph
            .topo_order()
            .iter()
            .map(|spec| FingerprintNode {
                name: &spec.name,
                depends_on: &spec.depends_on,
            })
            .collect(),
        logic_version: &settings.logic_version,
    };
    let value = serde_json::to_value(&input).map_err(|e| EngineError::Tick(e.to_string()))?;
    let digest = Sha256::digest(to_canonical_string(&value).as_bytes());
    Ok(hex::encode(digest))
}

/// # Summary
/// 指纹失配时的有界重建协调器。
///
/// # Invariants
/// - 一次失配只触发一次重建，重建时记录新指纹，之后恢复正常增量计算。
/// - 新序列（无指纹且无 head）不视为重建。
pub struct FingerprintRebuildCoordinator {
    candles: Arc<dyn CandleStore>,
    ledger: Arc<dyn FactorLedger>,
    sink: Arc<dyn ObservabilitySink>,
    keep_candles: usize,
    auto_rebuild: bool,
}

impl FingerprintRebuildCoordinator {
    pub fn new(
        candles: Arc<dyn CandleStore>,
        ledger: Arc<dyn FactorLedger>,
        sink: Arc<dyn ObservabilitySink>,
        keep_candles: usize,
        auto_rebuild: bool,
    ) -> Self {
        Self {
            candles,
            ledger,
            sink,
            keep_candles,
            auto_rebuild,
        }
    }

    /// # Summary
    /// 确保序列的账本与当前计算语义一致。
    ///
    /// # Logic
    /// 1. 关闭自动重建或指纹一致：无操作。
    /// 2. 无指纹且无 head：新序列，无操作。
    /// 3. 否则把 K 线裁剪到最近 `keep_candles` 根，清空账本并记录新指纹。
    /// 4. 输出 `factor.rebuild` 观测事件，输出失败只记录告警。
    ///
    /// # Arguments
    /// * `series_id` - 序列 ID。
    /// * `fingerprint` - 当前计算语义的指纹。
    ///
    /// # Returns
    /// * `RebuildOutcome` - `forced` 表示是否发生了重建。
    pub async fn ensure_series_ready(
        &self,
        series_id: &str,
        fingerprint: &str,
    ) -> Result<RebuildOutcome, EngineError> {
        let skipped = RebuildOutcome {
            forced: false,
            keep_candles: self.keep_candles,
            trimmed_rows: 0,
        };
        if !self.auto_rebuild {
            return Ok(skipped);
        }

        let stored = self.ledger.fingerprint(series_id).await?;
        if stored.as_deref() == Some(fingerprint) {
            return Ok(skipped);
        }
        if stored.is_none() && self.ledger.head_time(series_id).await?.is_none() {
            return Ok(skipped);
        }

        let trimmed_rows = self
            .candles
            .trim_series_to_latest_n(series_id, self.keep_candles)
            .await?;
        let reset = self.ledger.reset_series(series_id, Some(fingerprint)).await?;

        info!(
            "Fingerprint changed for {}, rebuilt ledger (kept {} candles, trimmed {}, removed {} events)",
            series_id, self.keep_candles, trimmed_rows, reset.deleted_events
        );

        let outcome = RebuildOutcome {
            forced: true,
            keep_candles: self.keep_candles,
            trimmed_rows,
        };
        let data = json!({
            "previous_fingerprint": stored,
            "fingerprint": fingerprint,
            "keep_candles": self.keep_candles,
            "trimmed_rows": trimmed_rows,
            "deleted_events": reset.deleted_events,
            "deleted_heads": reset.deleted_heads,
        });
        if let Err(e) = self.sink.emit(
            "factor",
            "factor.rebuild",
            series_id,
            "factor ledger rebuilt after fingerprint change",
            &data,
        ) {
            warn!("Failed to emit factor.rebuild for {}: {}", series_id, e);
        }
        Ok(outcome)
    }
}
