use chanledger_core::engine::error::EngineError;
use chanledger_core::factor::entity::{
    ConfirmedPen, EventRecord, FactorPayload, KIND_ANCHOR_SWITCH, KIND_PEN_CONFIRMED,
    KIND_PIVOT_MAJOR, KIND_ZHONGSHU_DEAD, PivotDirection, PivotPoint,
};
use chanledger_core::store::port::FactorLedger;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::processor::pivot::EffectivePivots;
use crate::tick::FactorState;

/// # Summary
/// 从账本事件恢复 `head_time` 时刻的处理器状态。
///
/// # Invariants
/// - 只读取 `visible_time <= head_time` 的事件。
/// - 恢复出的状态与从头逐根计算到 `head_time` 的状态一致。
/// - 扫描按 `page_limit` 分页，内存占用与历史长度无关。
pub struct StateRebuildLoader {
    ledger: Arc<dyn FactorLedger>,
    page_limit: usize,
}

impl StateRebuildLoader {
    pub fn new(ledger: Arc<dyn FactorLedger>, page_limit: usize) -> Self {
        Self {
            ledger,
            page_limit: page_limit.max(1),
        }
    }

    /// # Summary
    /// 恢复状态。
    ///
    /// # Logic
    /// 1. 强制重建或没有 head：返回空状态。
    /// 2. 锚点：最后一条 `anchor.switch`。
    /// 3. 笔：最近三条 `pen.confirmed`。
    /// 4. 有效分型链：以最后一笔的两个端点为种子，重放此后可见的主级别分型。
    /// 5. 中枢：从最后一次死亡开始重放其后的笔。
    ///
    /// # Arguments
    /// * `series_id` - 序列 ID。
    /// * `head_time` - 账本中的最后处理时间。
    /// * `forced` - 本次调用前是否发生了强制重建。
    pub async fn load(
        &self,
        series_id: &str,
        head_time: Option<i64>,
        forced: bool,
    ) -> Result<FactorState, EngineError> {
        let mut state = FactorState::default();
        let Some(head) = head_time else {
            return Ok(state);
        };
        if forced {
            return Ok(state);
        }

        // 锚点
        let switches = self
            .ledger
            .latest_events(series_id, KIND_ANCHOR_SWITCH, head, 1)
            .await?;
        if let Some(FactorPayload::AnchorSwitch(switch)) =
            switches.last().map(|r| &r.event.payload)
        {
            state.anchor.switch_to(switch.new_anchor);
        }

        // 最近三笔
        let pens = self
            .ledger
            .latest_events(series_id, KIND_PEN_CONFIRMED, head, 3)
            .await?;
        for record in &pens {
            if let FactorPayload::Pen(pen) = record.event.payload {
                state.pen.push(pen);
            }
        }

        // 有效分型链
        let last_pen = state.pen.last().copied();
        let (mut chain, pivot_from) = match last_pen {
            Some(pen) => {
                let seed = self.pen_endpoints(series_id, &pen, head).await?;
                (EffectivePivots::seeded(&seed), pen.visible_time)
            }
            None => (EffectivePivots::default(), i64::MIN),
        };
        self.scan(series_id, KIND_PIVOT_MAJOR, pivot_from, head, |record| {
            if let FactorPayload::Pivot(pivot) = record.event.payload {
                chain.apply(pivot, record.event.visible_time);
            }
        })
        .await?;
        state.pivot.effective = chain;

        // 中枢
        let deaths = self
            .ledger
            .latest_events(series_id, KIND_ZHONGSHU_DEAD, head, 1)
            .await?;
        let death = deaths.last().and_then(|r| match r.event.payload {
            FactorPayload::ZhongshuDead(z) => Some(z),
            _ => None,
        });
        let zhongshu = &mut state.zhongshu;
        match death {
            Some(dead) => {
                let death_time = dead.death_time.unwrap_or(dead.visible_time);
                zhongshu.floor = Some(dead.end_time);
                self.scan(series_id, KIND_PEN_CONFIRMED, death_time, head, |record| {
                    if let FactorPayload::Pen(pen) = record.event.payload {
                        if record.event.visible_time == death_time && pen.start_time == dead.end_time
                        {
                            zhongshu.seed_after_death(pen);
                        } else if record.event.visible_time > death_time {
                            zhongshu.on_pen(pen, record.event.visible_time);
                        }
                    }
                })
                .await?;
            }
            None => {
                self.scan(series_id, KIND_PEN_CONFIRMED, i64::MIN, head, |record| {
                    if let FactorPayload::Pen(pen) = record.event.payload {
                        zhongshu.on_pen(pen, record.event.visible_time);
                    }
                })
                .await?;
            }
        }
        zhongshu.formed_entry = None;

        debug!(
            "Rebuilt state for {} at {}: {} pens, {} effective pivots, zhongshu alive: {}",
            series_id,
            head,
            state.pen.recent.len(),
            state.pivot.effective.points().len(),
            state.zhongshu.alive.is_some()
        );
        Ok(state)
    }

    /// 最后一笔的两个端点分型：向上笔起于底、止于顶，向下笔相反
    async fn pen_endpoints(
        &self,
        series_id: &str,
        pen: &ConfirmedPen,
        head: i64,
    ) -> Result<Vec<PivotPoint>, EngineError> {
        let end_direction = if pen.direction > 0 {
            PivotDirection::Resistance
        } else {
            PivotDirection::Support
        };
        let wanted = [
            (pen.start_time, end_direction.opposite()),
            (pen.end_time, end_direction),
        ];

        let mut endpoints = Vec::with_capacity(2);
        for (time, direction) in wanted {
            let mut found = None;
            self.scan(series_id, KIND_PIVOT_MAJOR, time, head, |record| {
                if let FactorPayload::Pivot(p) = record.event.payload
                    && found.is_none()
                    && p.pivot_time == time
                    && p.direction == direction
                {
                    found = Some(p);
                }
            })
            .await?;
            let pivot = found.ok_or_else(|| {
                EngineError::Tick(format!(
                    "pivot at {} for pen {}:{} missing from ledger",
                    time, pen.start_time, pen.end_time
                ))
            })?;
            endpoints.push(pivot);
        }
        Ok(endpoints)
    }

    /// # Summary
    /// 分页扫描某种类在 `[min_visible, head]` 内的事件，按插入顺序回调。
    ///
    /// # Logic
    /// 1. 每页至多 `page_limit` 条，以上一页最后的 id 继续。
    /// 2. 超出一页时记录告警。
    async fn scan<F>(
        &self,
        series_id: &str,
        kind: &str,
        min_visible: i64,
        head: i64,
        mut f: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(&EventRecord),
    {
        let mut after_id = 0;
        let mut pages = 0usize;
        loop {
            let page = self
                .ledger
                .scan_events(series_id, kind, min_visible, head, after_id, self.page_limit)
                .await?;
            pages += 1;
            if pages == 2 {
                warn!(
                    "State rebuild scan of {} for {} exceeds {} events, paging",
                    kind, series_id, self.page_limit
                );
            }
            for record in &page {
                f(record);
            }
            match page.last() {
                Some(last) if page.len() >= self.page_limit => after_id = last.id,
                _ => break,
            }
        }
        Ok(())
    }
}
