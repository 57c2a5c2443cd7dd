use async_trait::async_trait;
use chanledger_core::factor::codec::{decode_payload, encode_payload, to_canonical_string};
use chanledger_core::factor::entity::{EventRecord, FactorEvent, FactorHead};
use chanledger_core::store::error::StoreError;
use chanledger_core::store::port::{CommitReport, FactorLedger, LedgerCommit, ResetReport};
use chrono::Utc;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::PathBuf;
use tracing::{debug, info};

/// 默认账本数据库文件名
const DEFAULT_LEDGER_DB: &str = "factor_ledger.db";

type EventRow = (i64, String, String, i64, String, String, String);

const EVENT_COLUMNS: &str =
    "id, series_id, factor_name, visible_time, kind, event_key, payload";

/// FactorLedger 的 SQLite 实现。
///
/// # Summary
/// 在中心化的 SQLite 数据库中管理所有序列的因子事件、头快照、head_time 与指纹。
///
/// # Invariants
/// * 表结构在存储实例创建时迁移，之后不再检查。
/// * 所有写操作均在单序列事务内完成。
pub struct SqliteFactorLedger {
    pool: SqlitePool,
}

impl SqliteFactorLedger {
    /// 打开账本数据库并执行表结构迁移。
    ///
    /// # Logic
    /// 1. 确保数据根目录存在。
    /// 2. 以 WAL 模式打开 `factor_ledger.db`，开启 `create_if_missing`。
    /// 3. 执行 DDL 初始化事件、头快照、序列状态与指纹表。
    ///
    /// # Arguments
    /// * `root` - 数据根目录。
    ///
    /// # Returns
    /// * `Result<Self, StoreError>` - 存储实例或初始化错误。
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::InitError(e.to_string()))?;

        let options = SqliteConnectOptions::new()
            .filename(root.join(DEFAULT_LEDGER_DB))
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::InitError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS factor_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                series_id TEXT NOT NULL,
                factor_name TEXT NOT NULL,
                visible_time INTEGER NOT NULL,
                kind TEXT NOT NULL,
                event_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                UNIQUE (series_id, factor_name, event_key)
            );

            CREATE INDEX IF NOT EXISTS idx_factor_events_visible
                ON factor_events (series_id, visible_time, id);

            CREATE INDEX IF NOT EXISTS idx_factor_events_kind
                ON factor_events (series_id, kind, id);

            CREATE TABLE IF NOT EXISTS factor_heads (
                series_id TEXT NOT NULL,
                factor_name TEXT NOT NULL,
                candle_time INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                head TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                PRIMARY KEY (series_id, factor_name, candle_time, seq)
            );

            CREATE TABLE IF NOT EXISTS series_ledger_state (
                series_id TEXT PRIMARY KEY,
                head_time INTEGER NOT NULL,
                updated_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS series_fingerprints (
                series_id TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                updated_at DATETIME NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::InitError(e.to_string()))?;

        info!("Factor ledger opened at {}", root.display());
        Ok(Self { pool })
    }
}

fn row_to_record(row: EventRow) -> Result<EventRecord, StoreError> {
    let payload = decode_payload(&row.4, &row.6)?;
    Ok(EventRecord {
        id: row.0,
        event: FactorEvent {
            series_id: row.1,
            factor_name: row.2,
            visible_time: row.3,
            event_key: row.5,
            payload,
        },
    })
}

fn to_sql_limit(limit: usize) -> Result<i64, StoreError> {
    i64::try_from(limit).map_err(|e| StoreError::Unknown(e.to_string()))
}

#[async_trait]
impl FactorLedger for SqliteFactorLedger {
    async fn head_time(&self, series_id: &str) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT head_time FROM series_ledger_state WHERE series_id = ?",
        )
        .bind(series_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn fingerprint(&self, series_id: &str) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT fingerprint FROM series_fingerprints WHERE series_id = ?",
        )
        .bind(series_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// # Summary
    /// 查询可见时间闭区间内的事件。
    ///
    /// # Logic
    /// `factor_name` 为 NULL 时条件 `? IS NULL` 成立，返回所有因子。
    async fn events_between(
        &self,
        series_id: &str,
        factor_name: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<FactorEvent>, StoreError> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM factor_events
            WHERE series_id = ?
              AND (? IS NULL OR factor_name = ?)
              AND visible_time >= ? AND visible_time <= ?
            ORDER BY visible_time ASC, id ASC
            "#
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(series_id)
            .bind(factor_name)
            .bind(factor_name)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| row_to_record(row).map(|r| r.event))
            .collect()
    }

    async fn head_at_or_before(
        &self,
        series_id: &str,
        factor_name: &str,
        time: i64,
    ) -> Result<Option<FactorHead>, StoreError> {
        let row = sqlx::query_as::<_, (i64, i64, String)>(
            r#"
            SELECT candle_time, seq, head
            FROM factor_heads
            WHERE series_id = ? AND factor_name = ? AND candle_time <= ?
            ORDER BY candle_time DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(series_id)
        .bind(factor_name)
        .bind(time)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(|(candle_time, seq, head)| {
            Ok(FactorHead {
                series_id: series_id.to_string(),
                factor_name: factor_name.to_string(),
                candle_time,
                seq,
                head: serde_json::from_str(&head).map_err(|e| StoreError::Codec(e.to_string()))?,
            })
        })
        .transpose()
    }

    async fn latest_events(
        &self,
        series_id: &str,
        kind: &str,
        at_or_before: i64,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM factor_events
            WHERE series_id = ? AND kind = ? AND visible_time <= ?
            ORDER BY id DESC
            LIMIT ?
            "#
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(series_id)
            .bind(kind)
            .bind(at_or_before)
            .bind(to_sql_limit(limit)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut records = rows
            .into_iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;
        records.reverse();
        Ok(records)
    }

    async fn scan_events(
        &self,
        series_id: &str,
        kind: &str,
        min_visible: i64,
        max_visible: i64,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM factor_events
            WHERE series_id = ? AND kind = ?
              AND visible_time >= ? AND visible_time <= ?
              AND id > ?
            ORDER BY id ASC
            LIMIT ?
            "#
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(series_id)
            .bind(kind)
            .bind(min_visible)
            .bind(max_visible)
            .bind(after_id)
            .bind(to_sql_limit(limit)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// # Summary
    /// 原子提交一次摄入的全部结果。
    ///
    /// # Logic
    /// 1. 开启事务。
    /// 2. 逐条 `INSERT OR IGNORE` 事件，受影响行数为 0 即重复键。
    /// 3. 写入头快照，`seq` 由同一时刻已有的最大值加一得到。
    /// 4. Upsert head_time（取较大值）与指纹。
    /// 5. 提交；中途失败时事务随 drop 回滚。
    async fn commit(&self, commit: LedgerCommit) -> Result<CommitReport, StoreError> {
        let mut report = CommitReport::default();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let now = Utc::now();

        for event in &commit.events {
            let payload = encode_payload(&event.payload)?;
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO factor_events
                (series_id, factor_name, visible_time, kind, event_key, payload, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&commit.series_id)
            .bind(&event.factor_name)
            .bind(event.visible_time)
            .bind(event.kind())
            .bind(&event.event_key)
            .bind(payload)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            if result.rows_affected() == 0 {
                report.duplicate_events += 1;
            } else {
                report.inserted_events += 1;
            }
        }

        for head in &commit.heads {
            sqlx::query(
                r#"
                INSERT INTO factor_heads (series_id, factor_name, candle_time, seq, head, created_at)
                SELECT ?, ?, ?, COALESCE(MAX(seq) + 1, 0), ?, ?
                FROM factor_heads
                WHERE series_id = ? AND factor_name = ? AND candle_time = ?
                "#,
            )
            .bind(&commit.series_id)
            .bind(&head.factor_name)
            .bind(head.candle_time)
            .bind(to_canonical_string(&head.head))
            .bind(now)
            .bind(&commit.series_id)
            .bind(&head.factor_name)
            .bind(head.candle_time)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
            report.inserted_heads += 1;
        }

        if let Some(head_time) = commit.head_time {
            sqlx::query(
                r#"
                INSERT INTO series_ledger_state (series_id, head_time, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(series_id) DO UPDATE SET
                    head_time = MAX(series_ledger_state.head_time, excluded.head_time),
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&commit.series_id)
            .bind(head_time)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        if let Some(fingerprint) = &commit.fingerprint {
            sqlx::query(
                "INSERT OR REPLACE INTO series_fingerprints (series_id, fingerprint, updated_at) VALUES (?, ?, ?)",
            )
            .bind(&commit.series_id)
            .bind(fingerprint)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        debug!(
            "Ledger commit for {}: {} events ({} duplicates), {} heads",
            commit.series_id, report.inserted_events, report.duplicate_events, report.inserted_heads
        );
        Ok(report)
    }

    /// # Summary
    /// 清空序列账本。
    ///
    /// # Logic
    /// 1. 在一个事务内删除事件、头快照与序列状态。
    /// 2. 若给出新指纹则一并记录。
    async fn reset_series(
        &self,
        series_id: &str,
        fingerprint: Option<&str>,
    ) -> Result<ResetReport, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let deleted_events = sqlx::query("DELETE FROM factor_events WHERE series_id = ?")
            .bind(series_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .rows_affected();

        let deleted_heads = sqlx::query("DELETE FROM factor_heads WHERE series_id = ?")
            .bind(series_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .rows_affected();

        sqlx::query("DELETE FROM series_ledger_state WHERE series_id = ?")
            .bind(series_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if let Some(fingerprint) = fingerprint {
            sqlx::query(
                "INSERT OR REPLACE INTO series_fingerprints (series_id, fingerprint, updated_at) VALUES (?, ?, ?)",
            )
            .bind(series_id)
            .bind(fingerprint)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        info!(
            "Reset ledger for {}: {} events, {} heads removed",
            series_id, deleted_events, deleted_heads
        );
        Ok(ResetReport {
            deleted_events,
            deleted_heads,
        })
    }
}
