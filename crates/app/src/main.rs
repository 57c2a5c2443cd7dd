use std::sync::Arc;
use std::time::Duration;

use chanledger_core::config::AppConfig;
use chanledger_core::engine::port::FactorIngest;
use chanledger_core::market::port::CandleStore;
use chanledger_engine::engine::FactorEngine;
use chanledger_engine::sink::TracingSink;
use chanledger_store::candle::SqliteCandleStore;
use chanledger_store::ledger::SqliteFactorLedger;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// 默认配置文件名（不含扩展名）
const DEFAULT_CONFIG_FILE: &str = "chanledger";

/// # Summary
/// 加载应用配置。
///
/// # Logic
/// 1. 可选的配置文件：参数给出的路径，否则 `CHANLEDGER_CONFIG`，否则 `chanledger.*`。
/// 2. 环境变量 `CHANLEDGER__FACTOR__PIVOT_WINDOW_MAJOR` 之类覆盖文件中的取值。
/// 3. 缺失的字段回落到默认值。
fn load_config(path: Option<&str>) -> Result<AppConfig, config::ConfigError> {
    let file = path
        .map(str::to_string)
        .or_else(|| std::env::var("CHANLEDGER_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    config::Config::builder()
        .add_source(config::File::with_name(&file).required(false))
        .add_source(
            config::Environment::with_prefix("CHANLEDGER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// # Summary
/// 把每个配置的序列追赶到 K 线存储的最新收盘时间。
///
/// # Logic
/// 1. 逐个序列读取 K 线存储的 head。
/// 2. 调用因子摄入，单个序列失败只记录错误，不影响其他序列。
async fn catch_up(series: &[String], candles: &dyn CandleStore, ingest: &dyn FactorIngest) {
    for series_id in series {
        let head = match candles.head_time(series_id).await {
            Ok(Some(head)) => head,
            Ok(None) => {
                debug!("No closed candles for {} yet", series_id);
                continue;
            }
            Err(e) => {
                error!("Failed to read candle head for {}: {}", series_id, e);
                continue;
            }
        };
        match ingest.ingest_closed(series_id, head).await {
            Ok(outcome) if outcome.rebuilt => {
                info!("{} rebuilt and caught up to {}", series_id, head)
            }
            Ok(_) => debug!("{} caught up to {}", series_id, head),
            Err(e) => error!("Factor ingest failed for {}: {}", series_id, e),
        }
    }
}

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化存储与引擎，并通过 Arc<dyn Trait> 注入到追赶循环。
///
/// # Logic
/// 1. 加载配置并初始化全局日志。
/// 2. 实例化基础设施层（K 线存储、因子账本）。
/// 3. 实例化因子引擎。
/// 4. 按轮询间隔追赶所有序列，直到收到退出信号。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置与日志
    let config = load_config(None)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("Chanledger starting with data dir {}", config.database.data_dir);

    // 2. 基础设施层
    let candles: Arc<dyn CandleStore> =
        Arc::new(SqliteCandleStore::new(&config.database.data_dir)?);
    let ledger = Arc::new(SqliteFactorLedger::open(&config.database.data_dir).await?);

    // 3. 因子引擎（App 层知道具体实现，追赶循环只依赖 FactorIngest）
    let engine: Arc<dyn FactorIngest> = Arc::new(FactorEngine::new(
        &config.factor,
        candles.clone(),
        ledger,
        Arc::new(TracingSink),
    )?);

    info!(
        "Tracking {} series every {}s. Waiting for signals...",
        config.series.len(),
        config.poll_interval_secs
    );

    // 4. 追赶循环
    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                catch_up(&config.series, candles.as_ref(), engine.as_ref()).await;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutdown signal received. Exiting...");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chanledger.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "series = [\"binance:spot:BTC/USDT:1m\"]\n\n[factor]\npivot_window_major = 7"
        )
        .unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.series, vec!["binance:spot:BTC/USDT:1m".to_string()]);
        assert_eq!(config.factor.pivot_window_major, 7);
        assert_eq!(config.factor.pivot_window_minor, 5);
        assert_eq!(config.database.data_dir, "data");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert!(config.factor.auto_rebuild);
    }
}
