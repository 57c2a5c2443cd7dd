use async_trait::async_trait;
use chanledger_core::market::entity::Candle;
use chanledger_core::market::port::CandleStore;
use chanledger_core::store::error::StoreError;
use dashmap::DashMap;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::PathBuf;
use tracing::debug;

type CandleRow = (i64, f64, f64, f64, f64, f64);

fn row_to_candle(r: CandleRow) -> Candle {
    Candle {
        candle_time: r.0,
        open: r.1,
        high: r.2,
        low: r.3,
        close: r.4,
        volume: r.5,
    }
}

/// CandleStore 的 SQLite 实现，采用“一序列一库”策略。
///
/// # Summary
/// 为每个序列维护一个独立的 SQLite 数据库文件，以实现物理数据隔离。
///
/// # Invariants
/// * 数据库文件存储在 `<root>/candles` 目录下。
/// * 连接池被缓存以避免频繁的文件打开操作。
pub struct SqliteCandleStore {
    base_path: PathBuf,
    pools: DashMap<String, SqlitePool>,
}

impl SqliteCandleStore {
    /// 创建新的 SqliteCandleStore 实例。
    ///
    /// # Logic
    /// 1. 取数据根目录下的 `candles` 子目录。
    /// 2. 确保该目录存在。
    ///
    /// # Arguments
    /// * `root` - 数据根目录。
    ///
    /// # Returns
    /// * `Result<Self, StoreError>` - 存储实例或错误。
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = root.into().join("candles");
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)
                .map_err(|e| StoreError::InitError(e.to_string()))?;
        }
        Ok(Self {
            base_path,
            pools: DashMap::new(),
        })
    }

    /// 序列 ID 中的 `:` 与 `/` 等字符不能出现在文件名里
    fn file_stem(series_id: &str) -> String {
        series_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// 获取或初始化特定序列的连接池。
    ///
    /// # Logic
    /// 1. 根据序列 ID 生成文件名。
    /// 2. 配置 SQLite 连接选项，开启 `create_if_missing`。
    /// 3. 如果缓存中没有，则创建新连接池并运行初始化建表 SQL。
    async fn get_or_init_pool(&self, series_id: &str) -> Result<SqlitePool, StoreError> {
        if let Some(pool) = self.pools.get(series_id) {
            return Ok(pool.clone());
        }

        let db_path = self
            .base_path
            .join(format!("{}.db", Self::file_stem(series_id)));

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                candle_time INTEGER PRIMARY KEY,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        self.pools.insert(series_id.to_string(), pool.clone());
        Ok(pool)
    }

    /// # Summary
    /// 批量保存已收盘 K 线。
    ///
    /// # Logic
    /// 1. 获取序列连接池。
    /// 2. 在一个事务内执行批量 `INSERT OR REPLACE`。
    ///
    /// # Arguments
    /// * `series_id` - 序列 ID。
    /// * `candles` - 数据列表。
    ///
    /// # Returns
    /// * `Result<(), StoreError>`
    pub async fn save_closed_candles(
        &self,
        series_id: &str,
        candles: &[Candle],
    ) -> Result<(), StoreError> {
        let pool = self.get_or_init_pool(series_id).await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        for candle in candles {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO candles (candle_time, open, high, low, close, volume)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(candle.candle_time)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        debug!("Saved {} candles for {}", candles.len(), series_id);
        Ok(())
    }

    /// 序列当前的 K 线数量
    pub async fn count(&self, series_id: &str) -> Result<u64, StoreError> {
        let pool = self.get_or_init_pool(series_id).await?;
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candles")
            .fetch_one(&pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        u64::try_from(n).map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl CandleStore for SqliteCandleStore {
    /// # Summary
    /// 加载时间闭区间内的 K 线。
    ///
    /// # Logic
    /// 1. 获取序列连接池。
    /// 2. 按时间区间升序查询，`limit` 为 None 时绑定 -1（SQLite 视为不限）。
    async fn get_closed_between_times(
        &self,
        series_id: &str,
        start: i64,
        end: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, StoreError> {
        let pool = self.get_or_init_pool(series_id).await?;
        let limit = match limit {
            Some(n) => i64::try_from(n).map_err(|e| StoreError::Unknown(e.to_string()))?,
            None => -1,
        };

        let records = sqlx::query_as::<_, CandleRow>(
            r#"
            SELECT candle_time, open, high, low, close, volume
            FROM candles
            WHERE candle_time >= ? AND candle_time <= ?
            ORDER BY candle_time ASC
            LIMIT ?
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(records.into_iter().map(row_to_candle).collect())
    }

    /// # Summary
    /// 读取 `end` 及之前最近的 `limit` 根 K 线。
    ///
    /// # Logic
    /// 1. 按时间降序取前 `limit` 行。
    /// 2. 反转为升序返回。
    async fn get_latest_closed_at_or_before(
        &self,
        series_id: &str,
        end: i64,
        limit: usize,
    ) -> Result<Vec<Candle>, StoreError> {
        let pool = self.get_or_init_pool(series_id).await?;
        let limit = i64::try_from(limit).map_err(|e| StoreError::Unknown(e.to_string()))?;

        let mut records = sqlx::query_as::<_, CandleRow>(
            r#"
            SELECT candle_time, open, high, low, close, volume
            FROM candles
            WHERE candle_time <= ?
            ORDER BY candle_time DESC
            LIMIT ?
            "#,
        )
        .bind(end)
        .bind(limit)
        .fetch_all(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        records.reverse();

        Ok(records.into_iter().map(row_to_candle).collect())
    }

    /// # Summary
    /// 只保留最近 `keep` 根 K 线。
    ///
    /// # Logic
    /// 1. `keep == 0` 时清空整张表。
    /// 2. 否则删除早于第 `keep` 新一根的所有行；行数不足时子查询为 NULL，不删除任何行。
    async fn trim_series_to_latest_n(
        &self,
        series_id: &str,
        keep: usize,
    ) -> Result<u64, StoreError> {
        let pool = self.get_or_init_pool(series_id).await?;
        let result = if keep == 0 {
            sqlx::query("DELETE FROM candles")
                .execute(&pool)
                .await
        } else {
            let offset = i64::try_from(keep - 1).map_err(|e| StoreError::Unknown(e.to_string()))?;
            sqlx::query(
                r#"
                DELETE FROM candles
                WHERE candle_time < (
                    SELECT candle_time FROM candles ORDER BY candle_time DESC LIMIT 1 OFFSET ?
                )
                "#,
            )
            .bind(offset)
            .execute(&pool)
            .await
        }
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn head_time(&self, series_id: &str) -> Result<Option<i64>, StoreError> {
        let pool = self.get_or_init_pool(series_id).await?;
        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(candle_time) FROM candles")
            .fetch_one(&pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}
