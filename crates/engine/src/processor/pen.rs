use chanledger_core::engine::error::EngineError;
use chanledger_core::factor::entity::{
    ConfirmedPen, FactorEvent, FactorPayload, HeadSnapshot, PEN_FACTOR, PenLeg, PivotDirection,
    PivotPoint,
};
use std::collections::VecDeque;

use super::pivot::PivotState;
use crate::tick::TickInput;

const RECENT_CAPACITY: usize = 3;

/// # Summary
/// 笔处理器的状态。
///
/// # Invariants
/// - `recent` 只保留最近三笔，按确认顺序排列。
/// - `confirmed_this_tick` 仅在当前 K 线内有效，每根 K 线开始时清空。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PenState {
    pub recent: VecDeque<ConfirmedPen>,
    pub confirmed_this_tick: Option<ConfirmedPen>,
}

impl PenState {
    pub fn push(&mut self, pen: ConfirmedPen) {
        self.recent.push_back(pen);
        if self.recent.len() > RECENT_CAPACITY {
            self.recent.pop_front();
        }
    }

    pub fn last(&self) -> Option<&ConfirmedPen> {
        self.recent.back()
    }
}

fn direction_towards(end: &PivotPoint) -> i8 {
    match end.direction {
        PivotDirection::Resistance => 1,
        PivotDirection::Support => -1,
    }
}

/// # Summary
/// 由两个有效分型构造一笔。
pub fn pen_between(start: &PivotPoint, end: &PivotPoint, visible_time: i64) -> ConfirmedPen {
    ConfirmedPen {
        start_time: start.pivot_time,
        end_time: end.pivot_time,
        start_price: start.pivot_price,
        end_price: end.pivot_price,
        direction: direction_towards(end),
        visible_time,
    }
}

/// # Summary
/// 笔确认处理器。
///
/// # Invariants
/// - 一笔在其终点之后的下一个有效分型出现时才确认，比分型多一层确认延迟。
#[derive(Debug, Clone, Default)]
pub struct PenProcessor;

impl PenProcessor {
    /// # Summary
    /// 本根 K 线有效分型链发生追加且长度达到 3 时，确认倒数第三与倒数第二个分型之间的一笔。
    ///
    /// # Arguments
    /// * `state` - 笔状态（独占）。
    /// * `pivots` - 分型状态（只读依赖）。
    /// * `input` - 当前 K 线。
    /// * `out` - 事件输出。
    pub fn tick(
        &self,
        state: &mut PenState,
        pivots: &PivotState,
        input: &TickInput<'_>,
        out: &mut Vec<FactorEvent>,
    ) -> Result<(), EngineError> {
        state.confirmed_this_tick = None;
        if pivots.effective.pushed_at() != Some(input.candle_time) {
            return Ok(());
        }
        let points = pivots.effective.points();
        let n = points.len();
        if n < 3 {
            return Ok(());
        }
        let (Some(start), Some(end)) = (points.get(n - 3), points.get(n - 2)) else {
            return Ok(());
        };

        let pen = pen_between(start, end, input.candle_time);
        out.push(FactorEvent {
            series_id: input.series_id.to_string(),
            factor_name: PEN_FACTOR.to_string(),
            visible_time: pen.visible_time,
            event_key: format!("confirmed:{}:{}", pen.start_time, pen.end_time),
            payload: FactorPayload::Pen(pen),
        });
        state.push(pen);
        state.confirmed_this_tick = Some(pen);
        Ok(())
    }

    /// 头快照：最后两个有效分型之间尚在延伸的一段
    pub fn head_snapshot(&self, pivots: &PivotState) -> HeadSnapshot {
        let points = pivots.effective.points();
        let n = points.len();
        let extending = match (n.checked_sub(2).and_then(|i| points.get(i)), points.back()) {
            (Some(start), Some(end)) if n >= 2 => Some(PenLeg {
                start_time: start.pivot_time,
                end_time: end.pivot_time,
                start_price: start.pivot_price,
                end_price: end.pivot_price,
                direction: direction_towards(end),
            }),
            _ => None,
        };
        HeadSnapshot::Pen { extending }
    }
}
