use crate::market::entity::Candle;
use crate::market::port::CandleStore;
use crate::store::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// # Summary
/// 基于 DashMap 的内存 K 线存储，仅供测试使用。
///
/// # Invariants
/// - 每个序列内按 `candle_time` 有序且唯一。
#[derive(Default)]
pub struct MemoryCandleStore {
    series: DashMap<String, BTreeMap<i64, Candle>>,
}

impl MemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入或覆盖 K 线
    pub fn insert(&self, series_id: &str, candles: &[Candle]) {
        let mut entry = self.series.entry(series_id.to_string()).or_default();
        for candle in candles {
            entry.insert(candle.candle_time, *candle);
        }
    }

    /// 序列当前的 K 线数量
    pub fn count(&self, series_id: &str) -> usize {
        self.series.get(series_id).map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CandleStore for MemoryCandleStore {
    async fn get_closed_between_times(
        &self,
        series_id: &str,
        start: i64,
        end: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, StoreError> {
        if start > end {
            return Ok(Vec::new());
        }
        let Some(series) = self.series.get(series_id) else {
            return Ok(Vec::new());
        };
        let iter = series.range(start..=end).map(|(_, c)| *c);
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    async fn get_latest_closed_at_or_before(
        &self,
        series_id: &str,
        end: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, StoreError> {
        let Some(series) = self.series.get(series_id) else {
            return Ok(Vec::new());
        };
        let mut candles: Vec<Candle> = series
            .range(..=end)
            .rev()
            .take(limit)
            .map(|(_, c)| *c)
            .collect();
        candles.reverse();
        Ok(candles)
    }

    async fn trim_series_to_latest_n(
        &self,
        series_id: &str,
        keep: usize,
    ) -> Result<u64, StoreError> {
        let Some(mut series) = self.series.get_mut(series_id) else {
            return Ok(0);
        };
        let mut removed = 0u64;
        while series.len() > keep {
            if series.pop_first().is_none() {
                break;
            }
            removed += 1;
        }
        Ok(removed)
    }

    async fn head_time(&self, series_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .series
            .get(series_id)
            .and_then(|s| s.last_key_value().map(|(t, _)| *t)))
    }
}
