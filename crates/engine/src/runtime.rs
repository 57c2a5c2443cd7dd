use chanledger_core::engine::error::EngineError;
use chanledger_core::factor::codec::encode_head;
use chanledger_core::factor::entity::FactorEvent;
use chanledger_core::store::port::HeadWrite;

use crate::processor::FactorProcessor;
use crate::tick::{CandleBatch, FactorState, TickInput};

/// # Summary
/// 一次逐根计算的产出。
#[derive(Debug, Clone, Default)]
pub struct TickRun {
    pub events: Vec<FactorEvent>,
    pub heads: Vec<HeadWrite>,
    // 最后处理的 K 线时间，没有处理任何 K 线时为 None
    pub last_time: Option<i64>,
    pub processed: usize,
}

/// # Summary
/// 从 `start_index` 起逐根运行全部处理器，并在最后一根 K 线处生成头快照。
///
/// # Logic
/// 1. 每根 K 线按拓扑序调用所有处理器，事件按产生顺序追加。
/// 2. 处理结束后对有头的处理器生成快照，时间为最后处理的 K 线时间。
///
/// # Arguments
/// * `processors` - 拓扑序下的处理器。
/// * `state` - 已从账本恢复的状态。
/// * `batch` - K 线窗口（含回看部分）。
/// * `start_index` - 第一根新 K 线的下标。
/// * `series_id` - 序列 ID。
///
/// # Returns
/// * `Result<TickRun, EngineError>` - 纯计算，失败时没有任何副作用。
pub fn run_ticks(
    processors: &[FactorProcessor],
    state: &mut FactorState,
    batch: &CandleBatch,
    start_index: usize,
    series_id: &str,
) -> Result<TickRun, EngineError> {
    let mut run = TickRun::default();

    for (index, candle) in batch.candles().iter().enumerate().skip(start_index) {
        let input = TickInput {
            series_id,
            batch,
            index,
            candle_time: candle.candle_time,
        };
        for processor in processors {
            processor.tick(state, &input, &mut run.events)?;
        }
        run.last_time = Some(candle.candle_time);
        run.processed += 1;
    }

    if let Some(candle_time) = run.last_time {
        for processor in processors {
            if let Some(snapshot) = processor.head_snapshot(state) {
                run.heads.push(HeadWrite {
                    factor_name: processor.name().to_string(),
                    candle_time,
                    head: encode_head(&snapshot)?,
                });
            }
        }
    }
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::default_pipeline;
    use crate::settings::FactorSettings;
    use chanledger_core::config::FactorConfig;
    use chanledger_core::market::entity::Candle;

    fn batch(closes: &[f64]) -> CandleBatch {
        CandleBatch::new(
            closes
                .iter()
                .zip(1i64..)
                .map(|(c, i)| Candle {
                    candle_time: i * 60,
                    open: *c,
                    high: *c,
                    low: *c,
                    close: *c,
                    volume: 1.0,
                })
                .collect(),
        )
    }

    fn settings() -> FactorSettings {
        FactorSettings::resolve(&FactorConfig {
            pivot_window_major: 2,
            pivot_window_minor: 1,
            ..FactorConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_split_runs_match_single_run() {
        let pipeline = default_pipeline(&settings()).unwrap();
        let batch = batch(&[1.0, 2.0, 5.0, 2.0, 1.0, 2.0, 5.0, 2.0, 1.0, 2.0, 5.0, 2.0, 1.0]);

        let mut whole_state = FactorState::default();
        let whole = run_ticks(pipeline.processors(), &mut whole_state, &batch, 0, "s").unwrap();

        // 先处理前 7 根，再在完整窗口上从第 8 根继续，状态延续
        let mut state = FactorState::default();
        let head_part = CandleBatch::new(batch.candles()[..7].to_vec());
        let a = run_ticks(pipeline.processors(), &mut state, &head_part, 0, "s").unwrap();
        let b = run_ticks(pipeline.processors(), &mut state, &batch, 7, "s").unwrap();

        let mut joined = a.events.clone();
        joined.extend(b.events);
        assert_eq!(joined, whole.events);
        assert_eq!(state, whole_state);
        assert_eq!(b.heads, whole.heads);
        assert_eq!(whole.last_time, Some(780));
        assert_eq!(whole.processed, 13);
    }

    #[test]
    fn test_no_new_candles_produces_nothing() {
        let pipeline = default_pipeline(&settings()).unwrap();
        let batch = batch(&[1.0, 2.0, 3.0]);
        let mut state = FactorState::default();
        let run = run_ticks(pipeline.processors(), &mut state, &batch, 3, "s").unwrap();
        assert!(run.events.is_empty());
        assert!(run.heads.is_empty());
        assert_eq!(run.last_time, None);
    }
}
