use chanledger_core::engine::error::EngineError;
use chanledger_core::factor::entity::{
    ANCHOR_FACTOR, AnchorKind, AnchorRef, AnchorSwitch, AnchorSwitchReason, FactorEvent,
    FactorPayload, HeadSnapshot,
};

use super::pen::PenState;
use super::zhongshu::ZhongshuState;
use crate::tick::TickInput;

/// # Summary
/// 锚点处理器的状态。
///
/// # Invariants
/// - `strength` 恒等于当前锚点的幅度，没有锚点时为 0。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorState {
    pub current: Option<AnchorRef>,
    pub strength: f64,
}

impl AnchorState {
    pub fn switch_to(&mut self, anchor: AnchorRef) {
        self.strength = anchor.magnitude();
        self.current = Some(anchor);
    }
}

/// # Summary
/// 把同一根 K 线上的多个候选合并为一个。
///
/// # Logic
/// 1. 幅度最大者胜出。
/// 2. 幅度相同按原因升序（`StrongPen` 优先）。
/// 3. 仍相同时取起点更晚的一段。
pub fn collapse_candidates(
    mut candidates: Vec<(AnchorSwitchReason, AnchorRef)>,
) -> Option<(AnchorSwitchReason, AnchorRef)> {
    candidates.sort_by(|a, b| {
        b.1.magnitude()
            .total_cmp(&a.1.magnitude())
            .then(a.0.cmp(&b.0))
            .then(b.1.start_time.cmp(&a.1.start_time))
    });
    candidates.into_iter().next()
}

/// 锚点处理器
#[derive(Debug, Clone, Default)]
pub struct AnchorProcessor;

impl AnchorProcessor {
    /// # Summary
    /// 收集本根 K 线的候选并至多产生一次锚点切换。
    ///
    /// # Logic
    /// 1. 本根确认的笔幅度超过当前强度时成为 `strong_pen` 候选。
    /// 2. 本根形成的中枢的进入笔成为 `zhongshu_entry` 候选。
    /// 3. 合并候选；与当前锚点是同一段走势时不切换。
    /// 4. 切换时写入一条 `anchor.switch` 并更新当前锚点与强度。
    pub fn tick(
        &self,
        state: &mut AnchorState,
        pens: &PenState,
        zhongshu: &ZhongshuState,
        input: &TickInput<'_>,
        out: &mut Vec<FactorEvent>,
    ) -> Result<(), EngineError> {
        let mut candidates = Vec::new();
        if let Some(pen) = pens.confirmed_this_tick
            && pen.magnitude() > state.strength
        {
            candidates.push((
                AnchorSwitchReason::StrongPen,
                AnchorRef::from_pen(AnchorKind::ConfirmedPen, &pen),
            ));
        }
        if let Some(entry) = zhongshu.formed_entry {
            candidates.push((
                AnchorSwitchReason::ZhongshuEntry,
                AnchorRef::from_pen(AnchorKind::ZhongshuEntry, &entry),
            ));
        }

        let Some((reason, candidate)) = collapse_candidates(candidates) else {
            return Ok(());
        };
        if state
            .current
            .as_ref()
            .is_some_and(|current| current.same_leg(&candidate))
        {
            return Ok(());
        }

        let switch = AnchorSwitch {
            old_anchor: state.current,
            new_anchor: candidate,
            reason,
            switch_time: input.candle_time,
            visible_time: input.candle_time,
        };
        out.push(FactorEvent {
            series_id: input.series_id.to_string(),
            factor_name: ANCHOR_FACTOR.to_string(),
            visible_time: switch.visible_time,
            event_key: format!("switch:{}:{}", switch.switch_time, reason.as_str()),
            payload: FactorPayload::AnchorSwitch(switch),
        });
        state.switch_to(candidate);
        Ok(())
    }

    pub fn head_snapshot(&self, state: &AnchorState) -> HeadSnapshot {
        HeadSnapshot::Anchor {
            current_anchor_ref: state.current,
            strength: state.strength,
        }
    }
}
