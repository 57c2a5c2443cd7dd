use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// # Summary
/// K 线序列身份，由 `exchange:market:symbol:timeframe` 四段组成。
///
/// # Invariants
/// - `symbol` 可以包含 `/`，但不能包含 `:`。
/// - `timeframe` 必须是受支持的周期。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    // 交易所 (例如: binance)
    pub exchange: String,
    // 市场类型 (例如: spot, futures)
    pub market: String,
    // 交易对或证券代码 (例如: BTC/USDT)
    pub symbol: String,
    // K 线周期
    pub timeframe: TimeFrame,
}

impl FromStr for SeriesKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [exchange, market, symbol, timeframe] = parts.as_slice() else {
            return Err(format!(
                "Invalid series id '{}': expected exchange:market:symbol:timeframe",
                s
            ));
        };
        if exchange.is_empty() || market.is_empty() || symbol.is_empty() {
            return Err(format!("Invalid series id '{}': empty segment", s));
        }
        Ok(Self {
            exchange: exchange.to_string(),
            market: market.to_string(),
            symbol: symbol.to_string(),
            timeframe: timeframe.parse()?,
        })
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.exchange, self.market, self.symbol, self.timeframe
        )
    }
}

/// # Summary
/// 交易时间周期枚举，定义 K 线的时间跨度。
///
/// # Invariants
/// - `seconds()` 必须为正数。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TimeFrame {
    // 1分钟
    Minute1,
    // 3分钟
    Minute3,
    // 5分钟
    Minute5,
    // 15分钟
    Minute15,
    // 30分钟
    Minute30,
    // 1小时
    Hour1,
    // 4小时
    Hour4,
    // 1日
    Day1,
}

impl TimeFrame {
    /// # Summary
    /// 返回单根 K 线的时间跨度（秒）。
    pub fn seconds(&self) -> i64 {
        match self {
            TimeFrame::Minute1 => 60,
            TimeFrame::Minute3 => 180,
            TimeFrame::Minute5 => 300,
            TimeFrame::Minute15 => 900,
            TimeFrame::Minute30 => 1_800,
            TimeFrame::Hour1 => 3_600,
            TimeFrame::Hour4 => 14_400,
            TimeFrame::Day1 => 86_400,
        }
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "minute1" => Ok(TimeFrame::Minute1),
            "3m" | "minute3" => Ok(TimeFrame::Minute3),
            "5m" | "minute5" => Ok(TimeFrame::Minute5),
            "15m" | "minute15" => Ok(TimeFrame::Minute15),
            "30m" | "minute30" => Ok(TimeFrame::Minute30),
            "1h" | "hour1" => Ok(TimeFrame::Hour1),
            "4h" | "hour4" => Ok(TimeFrame::Hour4),
            "1d" | "day1" => Ok(TimeFrame::Day1),
            _ => Err(format!("Unknown TimeFrame: {}", s)),
        }
    }
}

impl std::fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeFrame::Minute1 => write!(f, "1m"),
            TimeFrame::Minute3 => write!(f, "3m"),
            TimeFrame::Minute5 => write!(f, "5m"),
            TimeFrame::Minute15 => write!(f, "15m"),
            TimeFrame::Minute30 => write!(f, "30m"),
            TimeFrame::Hour1 => write!(f, "1h"),
            TimeFrame::Hour4 => write!(f, "4h"),
            TimeFrame::Day1 => write!(f, "1d"),
        }
    }
}
