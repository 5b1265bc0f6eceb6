//! APIレスポンスパーサー
//!
//! ポスター解析のレスポンスからJSONを抽出し、ExtractionResultに変換する

use crate::error::{Error, Result};
use crate::types::{ExtractionResult, TicketField};
use serde_json::{Map, Value};

/// APIレスポンスからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. 生の [...] 配列
/// 4. エラー
///
/// # Examples
/// ```
/// use cinestub_common::extract_json;
///
/// let response = "结果如下: {\"title\": \"我不是药神\"}";
/// let json = extract_json(response).unwrap();
/// assert_eq!(json, "{\"title\": \"我不是药神\"}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    // ```json ... ``` ブロックを探す
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(start) = response.find(open) {
            if let Some(end) = response.rfind(close) {
                if end > start {
                    return Ok(&response[start..=end]);
                }
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// ポスター解析レスポンスをパース
///
/// - 文字列以外のスカラー値は文字列化
/// - null・空文字は未設定扱い、値は前後の空白を除去
/// - 配列の場合は先頭のオブジェクトを使用
/// - 未知のキーは無視
pub fn parse_extraction_response(response: &str) -> Result<ExtractionResult> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("解析結果 JSONパースエラー: {}", e)))?;

    let obj = match value {
        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };

    let Some(map) = obj.as_object() else {
        return Err(Error::Parse("JSONオブジェクトが見つかりません".into()));
    };

    let mut result = ExtractionResult::default();
    for field in TicketField::extractable() {
        result.set(field, get_string(map, field.key()));
    }
    Ok(result)
}

fn get_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    let value = map.get(key)?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // 配列・オブジェクトは項目値として扱わない
        Value::Array(_) | Value::Object(_) => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================
    // extract_json テスト
    // =============================================

    #[test]
    fn test_extract_json_with_block() {
        let response = r#"Here is the ticket:
```json
{"title": "流浪地球"}
```
"#;
        assert_eq!(extract_json(response).unwrap(), r#"{"title": "流浪地球"}"#);
    }

    #[test]
    fn test_extract_json_raw_object() {
        let response = r#"{"title": "A", "seat": "1排1座"}"#;
        assert_eq!(extract_json(response).unwrap(), response);
    }

    #[test]
    fn test_extract_json_raw_array() {
        let response = r#"[{"title": "A"}]"#;
        // 配列内のオブジェクトが先に見つかる
        assert_eq!(extract_json(response).unwrap(), r#"{"title": "A"}"#);
    }

    #[test]
    fn test_extract_json_not_found() {
        let err = extract_json("no json here").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    // =============================================
    // parse_extraction_response テスト
    // =============================================

    #[test]
    fn test_parse_full_response() {
        let response = r##"{
            "title": "我不是药神",
            "cinemaName": "万达影城",
            "address": "上海市徐汇区",
            "date": "2026-11-01",
            "time": "19:30",
            "hall": "5号厅",
            "hallType": "IMAX",
            "language": "国语",
            "seat": "8排12座",
            "price": "¥55.9",
            "themeColor": "#7f1d1d"
        }"##;
        let result = parse_extraction_response(response).unwrap();
        assert_eq!(result.title.as_deref(), Some("我不是药神"));
        assert_eq!(result.cinema_name.as_deref(), Some("万达影城"));
        assert_eq!(result.hall_type.as_deref(), Some("IMAX"));
        assert_eq!(result.theme_color.as_deref(), Some("#7f1d1d"));
    }

    #[test]
    fn test_parse_partial_response() {
        let result = parse_extraction_response(r#"{"title": "Dune", "cinemaName": "CGV"}"#).unwrap();
        assert_eq!(result.title.as_deref(), Some("Dune"));
        assert_eq!(result.cinema_name.as_deref(), Some("CGV"));
        assert_eq!(result.seat, None);
    }

    #[test]
    fn test_parse_lenient_values() {
        let response = r#"{"title": "  Dune  ", "price": 55.9, "hall": null, "seat": "", "language": ["国语"]}"#;
        let result = parse_extraction_response(response).unwrap();
        assert_eq!(result.title.as_deref(), Some("Dune"));
        assert_eq!(result.price.as_deref(), Some("55.9"));
        assert_eq!(result.hall, None);
        assert_eq!(result.seat, None);
        assert_eq!(result.language, None);
    }

    #[test]
    fn test_parse_ignores_username_and_unknown_keys() {
        let result =
            parse_extraction_response(r#"{"title": "X", "username": "hacker", "director": "Y"}"#).unwrap();
        assert_eq!(result.title.as_deref(), Some("X"));
        assert_eq!(result.get(TicketField::Username), None);
    }

    #[test]
    fn test_parse_fenced_response() {
        let response = "```json\n{\"title\": \"阿凡达\"}\n```";
        let result = parse_extraction_response(response).unwrap();
        assert_eq!(result.title.as_deref(), Some("阿凡达"));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_extraction_response("{title: }").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_parse_non_object() {
        let err = parse_extraction_response("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
