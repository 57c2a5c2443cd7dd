use chanledger_core::engine::error::EngineError;
use chanledger_core::factor::entity::{
    ConfirmedPen, FactorEvent, FactorPayload, HeadSnapshot, ZHONGSHU_FACTOR, ZhongshuRange,
};
use std::collections::VecDeque;

use super::pen::PenState;
use crate::tick::TickInput;

const FORMATION_PENS: usize = 3;

/// # Summary
/// 中枢处理器的状态。
///
/// # Invariants
/// - 同一时刻至多一个存活中枢。
/// - `window` 只包含起点不早于 `floor` 的最近三笔。
/// - `formed_entry` 仅在当前 K 线内有效，记录本根 K 线形成的中枢的进入笔。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZhongshuState {
    pub alive: Option<ZhongshuRange>,
    pub window: VecDeque<ConfirmedPen>,
    // 新中枢允许的最早起点
    pub floor: Option<i64>,
    pub formed_entry: Option<ConfirmedPen>,
}

fn overlaps(pen: &ConfirmedPen, zhongshu: &ZhongshuRange) -> bool {
    pen.high() >= zhongshu.zd && pen.low() <= zhongshu.zg
}

impl ZhongshuState {
    /// # Summary
    /// 中枢状态机的单步转移，逐笔驱动。
    ///
    /// # Logic
    /// 1. 存在存活中枢：与 `[zd, zg]` 重叠则延伸；完全在外则死亡，
    ///    `end_time` 取离开笔的起点，`floor` 设为同一时间，离开笔成为新窗口的第一笔。
    /// 2. 无存活中枢：笔进入窗口（保留最近三笔），三笔满足
    ///    `zg = min(高点) > zd = max(低点)` 时形成新中枢，进入方向取第一笔。
    ///
    /// # Arguments
    /// * `pen` - 新确认的一笔。
    /// * `tick_time` - 确认这一笔的 K 线时间。
    ///
    /// # Returns
    /// * `Option<ZhongshuRange>` - 本步死亡的中枢（带 `death_time`）。
    pub fn on_pen(&mut self, pen: ConfirmedPen, tick_time: i64) -> Option<ZhongshuRange> {
        if let Some(mut current) = self.alive {
            if overlaps(&pen, &current) {
                current.pen_count = current.pen_count.saturating_add(1);
                current.end_time = pen.end_time;
                self.alive = Some(current);
                return None;
            }
            current.end_time = pen.start_time;
            current.death_time = Some(tick_time);
            current.visible_time = tick_time;
            self.alive = None;
            self.seed_after_death(pen);
            return Some(current);
        }

        if self.floor.is_some_and(|floor| pen.start_time < floor) {
            return None;
        }
        self.window.push_back(pen);
        while self.window.len() > FORMATION_PENS {
            self.window.pop_front();
        }
        if self.window.len() < FORMATION_PENS {
            return None;
        }

        let zg = self
            .window
            .iter()
            .map(ConfirmedPen::high)
            .fold(f64::INFINITY, f64::min);
        let zd = self
            .window
            .iter()
            .map(ConfirmedPen::low)
            .fold(f64::NEG_INFINITY, f64::max);
        if zg <= zd {
            return None;
        }

        let (Some(first), Some(last)) = (self.window.front().copied(), self.window.back()) else {
            return None;
        };
        self.alive = Some(ZhongshuRange {
            start_time: first.start_time,
            end_time: last.end_time,
            zg,
            zd,
            entry_direction: first.direction,
            formed_time: tick_time,
            death_time: None,
            pen_count: 3,
            visible_time: tick_time,
        });
        self.formed_entry = Some(first);
        self.window.clear();
        None
    }

    /// 中枢死亡后以离开笔作为新窗口的起点
    pub fn seed_after_death(&mut self, exit_pen: ConfirmedPen) {
        self.floor = Some(exit_pen.start_time);
        self.window.clear();
        self.window.push_back(exit_pen);
    }
}

/// 中枢处理器
#[derive(Debug, Clone, Default)]
pub struct ZhongshuProcessor;

impl ZhongshuProcessor {
    /// # Summary
    /// 本根 K 线若确认了新笔，则推进中枢状态机；中枢死亡时写入一条 `zhongshu.dead`。
    pub fn tick(
        &self,
        state: &mut ZhongshuState,
        pens: &PenState,
        input: &TickInput<'_>,
        out: &mut Vec<FactorEvent>,
    ) -> Result<(), EngineError> {
        state.formed_entry = None;
        let Some(pen) = pens.confirmed_this_tick else {
            return Ok(());
        };
        if let Some(dead) = state.on_pen(pen, input.candle_time) {
            let death_time = dead.death_time.unwrap_or(input.candle_time);
            out.push(FactorEvent {
                series_id: input.series_id.to_string(),
                factor_name: ZHONGSHU_FACTOR.to_string(),
                visible_time: dead.visible_time,
                event_key: format!("dead:{}:{}", dead.start_time, death_time),
                payload: FactorPayload::ZhongshuDead(dead),
            });
        }
        Ok(())
    }

    /// 头快照：当前存活的中枢
    pub fn head_snapshot(&self, state: &ZhongshuState) -> HeadSnapshot {
        HeadSnapshot::Zhongshu {
            alive: state.alive.iter().copied().collect(),
        }
    }
}
