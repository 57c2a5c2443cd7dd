use chanledger_core::engine::error::EngineError;
use chanledger_core::factor::entity::{
    FactorEvent, FactorPayload, PIVOT_FACTOR, PivotDirection, PivotLevel, PivotPoint,
};
use chanledger_core::market::entity::Candle;
use std::collections::VecDeque;

use crate::settings::to_usize;
use crate::tick::TickInput;

// 有效分型链保留的长度
const EFFECTIVE_CAPACITY: usize = 3;

/// # Summary
/// 主级别分型经过去重与交替约束后的有效分型链。
///
/// # Invariants
/// - 相邻元素方向交替，时间严格递增。
/// - 只保留最近三个元素。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectivePivots {
    points: VecDeque<PivotPoint>,
    // 最近一次追加发生时的 K 线时间
    pushed_at: Option<i64>,
}

impl EffectivePivots {
    /// 以给定分型为起点重建链（状态恢复用）
    pub fn seeded(points: &[PivotPoint]) -> Self {
        let mut chain = Self::default();
        for p in points {
            chain.points.push_back(*p);
        }
        while chain.points.len() > EFFECTIVE_CAPACITY {
            chain.points.pop_front();
        }
        chain
    }

    /// # Summary
    /// 把一个新的主级别分型并入链中。
    ///
    /// # Logic
    /// 1. 链为空时直接追加。
    /// 2. 与末尾同向：更极端则替换末尾，否则忽略。
    /// 3. 与末尾反向：时间严格更晚时追加。
    ///
    /// # Arguments
    /// * `pivot` - 新确认的主级别分型。
    /// * `tick_time` - 当前 K 线时间。
    ///
    /// # Returns
    /// * `bool` - 是否发生了追加。
    pub fn apply(&mut self, pivot: PivotPoint, tick_time: i64) -> bool {
        let Some(last) = self.points.back_mut() else {
            self.push(pivot, tick_time);
            return true;
        };

        if last.direction == pivot.direction {
            let more_extreme = match pivot.direction {
                PivotDirection::Resistance => pivot.pivot_price > last.pivot_price,
                PivotDirection::Support => pivot.pivot_price < last.pivot_price,
            };
            if more_extreme {
                *last = pivot;
            }
            return false;
        }

        if pivot.pivot_time > last.pivot_time {
            self.push(pivot, tick_time);
            return true;
        }
        false
    }

    fn push(&mut self, pivot: PivotPoint, tick_time: i64) {
        self.points.push_back(pivot);
        if self.points.len() > EFFECTIVE_CAPACITY {
            self.points.pop_front();
        }
        self.pushed_at = Some(tick_time);
    }

    pub fn points(&self) -> &VecDeque<PivotPoint> {
        &self.points
    }

    pub fn pushed_at(&self) -> Option<i64> {
        self.pushed_at
    }
}

/// 分型处理器的状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotState {
    pub effective: EffectivePivots,
}

/// # Summary
/// 分型检测处理器（主、次两个级别）。
///
/// # Invariants
/// - 中心 K 线 `c` 的分型只在第 `c + w` 根 K 线上判定一次，可见时间即该 K 线时间。
#[derive(Debug, Clone)]
pub struct PivotProcessor {
    major_window: u32,
    minor_window: u32,
}

impl PivotProcessor {
    pub fn new(major_window: u32, minor_window: u32) -> Self {
        Self {
            major_window,
            minor_window,
        }
    }

    /// # Summary
    /// 处理一根 K 线：先判定主级别，再判定次级别。
    ///
    /// # Logic
    /// 1. 对每个级别调用 `detect_pivots`，先顶后底。
    /// 2. 每个新分型写入一条 `pivot.{level}` 事件。
    /// 3. 主级别分型并入有效分型链。
    pub fn tick(
        &self,
        state: &mut PivotState,
        input: &TickInput<'_>,
        out: &mut Vec<FactorEvent>,
    ) -> Result<(), EngineError> {
        let levels = [
            (PivotLevel::Major, self.major_window),
            (PivotLevel::Minor, self.minor_window),
        ];
        for (level, window) in levels {
            let span = to_usize(window)?;
            for pivot in detect_pivots(input.batch.candles(), input.index, span, level, window) {
                out.push(FactorEvent {
                    series_id: input.series_id.to_string(),
                    factor_name: PIVOT_FACTOR.to_string(),
                    visible_time: pivot.visible_time,
                    event_key: format!(
                        "{}:{}:{}",
                        level.as_str(),
                        pivot.pivot_time,
                        pivot.direction.as_str()
                    ),
                    payload: FactorPayload::Pivot(pivot),
                });
                if level == PivotLevel::Major {
                    state.effective.apply(pivot, input.candle_time);
                }
            }
        }
        Ok(())
    }
}

/// # Summary
/// 判定第 `index` 根 K 线确认的分型。
///
/// # Logic
/// 1. 中心 `c = index - w`，要求 `c >= w`。
/// 2. 顶：`high[c]` 严格高于 `[c-w, c-1]`，且不低于 `[c+1, index]` 中任一高点。
/// 3. 底：对低点对称判定。
///
/// # Returns
/// 至多两个分型，顶在前。
pub fn detect_pivots(
    candles: &[Candle],
    index: usize,
    span: usize,
    level: PivotLevel,
    window: u32,
) -> Vec<PivotPoint> {
    let mut found = Vec::new();
    if span == 0 {
        return found;
    }
    let Some(start) = index.checked_sub(span.saturating_mul(2)) else {
        return found;
    };
    let Some(slice) = candles.get(start..=index) else {
        return found;
    };
    let Some((center, rest)) = slice.get(span).zip(slice.get(span + 1..)) else {
        return found;
    };
    let Some(before) = slice.get(..span) else {
        return found;
    };
    let visible_time = candles.get(index).map(|c| c.candle_time).unwrap_or(center.candle_time);

    let resistance = before.iter().all(|c| center.high > c.high)
        && rest.iter().all(|c| c.high <= center.high);
    if resistance {
        found.push(PivotPoint {
            pivot_time: center.candle_time,
            pivot_price: center.high,
            direction: PivotDirection::Resistance,
            level,
            window,
            visible_time,
        });
    }

    let support = before.iter().all(|c| center.low < c.low)
        && rest.iter().all(|c| c.low >= center.low);
    if support {
        found.push(PivotPoint {
            pivot_time: center.candle_time,
            pivot_price: center.low,
            direction: PivotDirection::Support,
            level,
            window,
            visible_time,
        });
    }
    found
}
