use crate::factor::entity::{
    FactorPayload, HeadSnapshot, KIND_ANCHOR_SWITCH, KIND_PEN_CONFIRMED, KIND_PIVOT_MAJOR,
    KIND_PIVOT_MINOR, KIND_ZHONGSHU_DEAD,
};
use crate::store::error::StoreError;
use serde_json::Value;

/// # Summary
/// 将 JSON 值编码为规范化的紧凑字符串。
///
/// # Logic
/// 1. 对象按键的字节序排序后输出，不依赖 JSON 库内部 Map 的顺序。
/// 2. 不输出任何空白。
///
/// # Arguments
/// * `value`: 待编码的 JSON 值。
///
/// # Returns
/// 跨进程可复现的字符串，可直接用于哈希与校验。
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// # Summary
/// 把强类型载荷编码为落库字符串。
///
/// # Returns
/// 规范化 JSON 字符串，序列化失败返回 `StoreError::Codec`。
pub fn encode_payload(payload: &FactorPayload) -> Result<String, StoreError> {
    let value = match payload {
        FactorPayload::Pivot(p) => serde_json::to_value(p),
        FactorPayload::Pen(p) => serde_json::to_value(p),
        FactorPayload::ZhongshuDead(z) => serde_json::to_value(z),
        FactorPayload::AnchorSwitch(s) => serde_json::to_value(s),
        FactorPayload::Opaque { body, .. } => Ok(body.clone()),
    }
    .map_err(|e| StoreError::Codec(e.to_string()))?;
    Ok(to_canonical_string(&value))
}

/// # Summary
/// 按事件种类把落库字符串解码为强类型载荷。
///
/// # Logic
/// 1. 已知种类解码为对应的变体。
/// 2. 未知种类保留为 `Opaque`，保证旧程序能读取新版本写入的行。
pub fn decode_payload(kind: &str, raw: &str) -> Result<FactorPayload, StoreError> {
    let codec_err = |e: serde_json::Error| StoreError::Codec(format!("{}: {}", kind, e));
    let payload = match kind {
        KIND_PIVOT_MAJOR | KIND_PIVOT_MINOR => {
            FactorPayload::Pivot(serde_json::from_str(raw).map_err(codec_err)?)
        }
        KIND_PEN_CONFIRMED => FactorPayload::Pen(serde_json::from_str(raw).map_err(codec_err)?),
        KIND_ZHONGSHU_DEAD => {
            FactorPayload::ZhongshuDead(serde_json::from_str(raw).map_err(codec_err)?)
        }
        KIND_ANCHOR_SWITCH => {
            FactorPayload::AnchorSwitch(serde_json::from_str(raw).map_err(codec_err)?)
        }
        other => FactorPayload::Opaque {
            kind: other.to_string(),
            body: serde_json::from_str(raw).map_err(codec_err)?,
        },
    };
    Ok(payload)
}

/// 头快照转为通用 JSON 值
pub fn encode_head(head: &HeadSnapshot) -> Result<Value, StoreError> {
    serde_json::to_value(head).map_err(|e| StoreError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::entity::{PivotDirection, PivotLevel, PivotPoint};
    use serde_json::json;

    #[test]
    fn test_canonical_string_sorts_keys_and_is_compact() {
        let value = json!({"b": 1, "a": {"d": [1, 2], "c": null}, "A": "x y"});
        assert_eq!(
            to_canonical_string(&value),
            r#"{"A":"x y","a":{"c":null,"d":[1,2]},"b":1}"#
        );
    }

    #[test]
    fn test_pivot_payload_encoding_is_stable() {
        let payload = FactorPayload::Pivot(PivotPoint {
            pivot_time: 180,
            pivot_price: 5.0,
            direction: PivotDirection::Resistance,
            level: PivotLevel::Major,
            window: 2,
            visible_time: 300,
        });
        let raw = encode_payload(&payload).unwrap();
        assert_eq!(
            raw,
            r#"{"direction":"resistance","level":"major","pivot_price":5.0,"pivot_time":180,"visible_time":300,"window":2}"#
        );
        let decoded = decode_payload(KIND_PIVOT_MAJOR, &raw).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_unknown_kind_decodes_as_opaque() {
        let decoded = decode_payload("segment.confirmed", r#"{"x":1}"#).unwrap();
        assert_eq!(decoded.kind(), "segment.confirmed");
        assert!(matches!(decoded, FactorPayload::Opaque { .. }));
    }

    #[test]
    fn test_known_kind_with_bad_body_is_codec_error() {
        let err = decode_payload(KIND_PEN_CONFIRMED, r#"{"x":1}"#).unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
    }
}
