use chanledger_core::market::entity::Candle;
use std::collections::HashMap;

use crate::processor::anchor::AnchorState;
use crate::processor::pen::PenState;
use crate::processor::pivot::PivotState;
use crate::processor::zhongshu::ZhongshuState;

/// # Summary
/// 单次摄入加载的 K 线窗口，附带 `candle_time -> 下标` 索引。
///
/// # Invariants
/// - K 线按 `candle_time` 严格升序。
#[derive(Debug, Clone, Default)]
pub struct CandleBatch {
    candles: Vec<Candle>,
    index: HashMap<i64, usize>,
}

impl CandleBatch {
    /// 构造窗口并建立时间索引，输入会被排序去重
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.candle_time);
        candles.dedup_by_key(|c| c.candle_time);
        let index = candles
            .iter()
            .enumerate()
            .map(|(i, c)| (c.candle_time, i))
            .collect();
        Self { candles, index }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn index_of(&self, candle_time: i64) -> Option<usize> {
        self.index.get(&candle_time).copied()
    }

    /// # Summary
    /// 第一根晚于 `head_time` 的 K 线下标。
    ///
    /// # Logic
    /// 1. 没有 head 时从 0 开始。
    /// 2. head 在窗口内时取其下一根。
    /// 3. 否则二分查找第一根更晚的 K 线。
    pub fn first_after(&self, head_time: Option<i64>) -> usize {
        let Some(head) = head_time else {
            return 0;
        };
        match self.index_of(head) {
            Some(i) => i + 1,
            None => self.candles.partition_point(|c| c.candle_time <= head),
        }
    }
}

/// # Summary
/// 处理单根 K 线时传给各处理器的只读输入。
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    pub series_id: &'a str,
    pub batch: &'a CandleBatch,
    // 当前 K 线在窗口中的下标
    pub index: usize,
    pub candle_time: i64,
}

/// # Summary
/// 所有处理器共享的逐根计算状态，每个处理器独占一个字段。
///
/// # Invariants
/// - 分发时每个处理器只拿到自身字段的可变借用，以及依赖字段的只读借用。
/// - 状态大小有界：最近三个有效分型、最近三笔、至多一个存活中枢。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorState {
    pub pivot: PivotState,
    pub pen: PenState,
    pub zhongshu: ZhongshuState,
    pub anchor: AnchorState,
}
