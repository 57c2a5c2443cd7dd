use serde::{Deserialize, Serialize};

/// 分型因子名称
pub const PIVOT_FACTOR: &str = "pivot";
/// 笔因子名称
pub const PEN_FACTOR: &str = "pen";
/// 中枢因子名称
pub const ZHONGSHU_FACTOR: &str = "zhongshu";
/// 锚点因子名称
pub const ANCHOR_FACTOR: &str = "anchor";

pub const KIND_PIVOT_MAJOR: &str = "pivot.major";
pub const KIND_PIVOT_MINOR: &str = "pivot.minor";
pub const KIND_PEN_CONFIRMED: &str = "pen.confirmed";
pub const KIND_ZHONGSHU_DEAD: &str = "zhongshu.dead";
pub const KIND_ANCHOR_SWITCH: &str = "anchor.switch";

/// # Summary
/// 分型方向。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PivotDirection {
    // 底分型（局部低点）
    Support,
    // 顶分型（局部高点）
    Resistance,
}

impl PivotDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PivotDirection::Support => "support",
            PivotDirection::Resistance => "resistance",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            PivotDirection::Support => PivotDirection::Resistance,
            PivotDirection::Resistance => PivotDirection::Support,
        }
    }
}

/// # Summary
/// 分型级别，主级别参与笔的构建，次级别仅落账。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PivotLevel {
    Major,
    Minor,
}

impl PivotLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PivotLevel::Major => "major",
            PivotLevel::Minor => "minor",
        }
    }
}

/// # Summary
/// 已确认的分型点。
///
/// # Invariants
/// - `visible_time` 为确认 K 线的时间，无缺口序列上等于 `pivot_time + window * timeframe`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PivotPoint {
    pub pivot_time: i64,
    pub pivot_price: f64,
    pub direction: PivotDirection,
    pub level: PivotLevel,
    pub window: u32,
    pub visible_time: i64,
}

/// # Summary
/// 两个方向交替的已确认分型之间的一笔。
///
/// # Invariants
/// - `direction` 为 1（向上，终点为顶）或 -1（向下，终点为底）。
/// - `start_time < end_time <= visible_time`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConfirmedPen {
    pub start_time: i64,
    pub end_time: i64,
    pub start_price: f64,
    pub end_price: f64,
    pub direction: i8,
    pub visible_time: i64,
}

impl ConfirmedPen {
    /// 笔的幅度 `|end_price - start_price|`
    pub fn magnitude(&self) -> f64 {
        (self.end_price - self.start_price).abs()
    }

    pub fn high(&self) -> f64 {
        self.start_price.max(self.end_price)
    }

    pub fn low(&self) -> f64 {
        self.start_price.min(self.end_price)
    }
}

/// # Summary
/// 由至少三笔连续重叠构成的价格中枢。
///
/// # Invariants
/// - `zg > zd`。
/// - 存活期间 `death_time` 为 None，仅出现在头快照中；死亡后落一条历史事件。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ZhongshuRange {
    pub start_time: i64,
    pub end_time: i64,
    // 中枢上沿（三笔高点的最小值）
    pub zg: f64,
    // 中枢下沿（三笔低点的最大值）
    pub zd: f64,
    pub entry_direction: i8,
    pub formed_time: i64,
    pub death_time: Option<i64>,
    pub pen_count: u32,
    pub visible_time: i64,
}

/// # Summary
/// 锚点引用的来源类型。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    ConfirmedPen,
    ZhongshuEntry,
}

/// # Summary
/// 当前最具参考意义的一段走势。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnchorRef {
    pub kind: AnchorKind,
    pub start_time: i64,
    pub end_time: i64,
    pub start_price: f64,
    pub end_price: f64,
    pub direction: i8,
}

impl AnchorRef {
    pub fn from_pen(kind: AnchorKind, pen: &ConfirmedPen) -> Self {
        Self {
            kind,
            start_time: pen.start_time,
            end_time: pen.end_time,
            start_price: pen.start_price,
            end_price: pen.end_price,
            direction: pen.direction,
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.end_price - self.start_price).abs()
    }

    /// 是否指向同一段走势（忽略来源类型）
    pub fn same_leg(&self, other: &AnchorRef) -> bool {
        self.start_time == other.start_time && self.end_time == other.end_time
    }
}

/// # Summary
/// 锚点切换原因。
///
/// # Invariants
/// - 派生的 `Ord` 即同幅度候选之间的决胜顺序。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AnchorSwitchReason {
    StrongPen,
    ZhongshuEntry,
}

impl AnchorSwitchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorSwitchReason::StrongPen => "strong_pen",
            AnchorSwitchReason::ZhongshuEntry => "zhongshu_entry",
        }
    }
}

/// # Summary
/// 锚点切换日志条目。
///
/// # Invariants
/// - 每个 `(reason, switch_time)` 至多一条。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnchorSwitch {
    pub old_anchor: Option<AnchorRef>,
    pub new_anchor: AnchorRef,
    pub reason: AnchorSwitchReason,
    pub switch_time: i64,
    pub visible_time: i64,
}

/// # Summary
/// 按事件种类区分的强类型载荷。
///
/// # Invariants
/// - `Opaque` 仅用于解码本版本未知的事件种类，引擎自身从不产生。
#[derive(Debug, Clone, PartialEq)]
pub enum FactorPayload {
    Pivot(PivotPoint),
    Pen(ConfirmedPen),
    ZhongshuDead(ZhongshuRange),
    AnchorSwitch(AnchorSwitch),
    Opaque {
        kind: String,
        body: serde_json::Value,
    },
}

impl FactorPayload {
    /// 载荷对应的事件种类
    pub fn kind(&self) -> &str {
        match self {
            FactorPayload::Pivot(p) => match p.level {
                PivotLevel::Major => KIND_PIVOT_MAJOR,
                PivotLevel::Minor => KIND_PIVOT_MINOR,
            },
            FactorPayload::Pen(_) => KIND_PEN_CONFIRMED,
            FactorPayload::ZhongshuDead(_) => KIND_ZHONGSHU_DEAD,
            FactorPayload::AnchorSwitch(_) => KIND_ANCHOR_SWITCH,
            FactorPayload::Opaque { kind, .. } => kind,
        }
    }
}

/// # Summary
/// 因子账本中的一条只追加事件。
///
/// # Invariants
/// - `(series_id, factor_name, event_key)` 唯一，是重复摄入的幂等键。
/// - 查询时刻 T 只能看到 `visible_time <= T` 的事件。
#[derive(Debug, Clone, PartialEq)]
pub struct FactorEvent {
    pub series_id: String,
    pub factor_name: String,
    pub visible_time: i64,
    pub event_key: String,
    pub payload: FactorPayload,
}

impl FactorEvent {
    pub fn kind(&self) -> &str {
        self.payload.kind()
    }
}

/// # Summary
/// 带有账本插入序号的事件，用于分页扫描。
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    // 账本自增序号，反映插入顺序
    pub id: i64,
    pub event: FactorEvent,
}

/// # Summary
/// 因子在某一时刻的未提交视图（头快照）。
///
/// # Invariants
/// - 同一 `candle_time` 可有多行，按 `seq` 区分。
#[derive(Debug, Clone, PartialEq)]
pub struct FactorHead {
    pub series_id: String,
    pub factor_name: String,
    pub candle_time: i64,
    pub seq: i64,
    pub head: serde_json::Value,
}

/// # Summary
/// 笔的延伸段（尚未被反向分型确认）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PenLeg {
    pub start_time: i64,
    pub end_time: i64,
    pub start_price: f64,
    pub end_price: f64,
    pub direction: i8,
}

/// # Summary
/// 各因子头快照的强类型形态。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HeadSnapshot {
    Pen {
        extending: Option<PenLeg>,
    },
    Zhongshu {
        alive: Vec<ZhongshuRange>,
    },
    Anchor {
        current_anchor_ref: Option<AnchorRef>,
        strength: f64,
    },
}
