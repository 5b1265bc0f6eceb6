//! プロンプト生成モジュール
//!
//! ポスター解析（Magic Fill）用のプロンプトとレスポンススキーマ

use crate::types::TicketField;
use serde_json::{json, Map, Value};

/// スキーマで必須とする項目
pub const REQUIRED_FIELDS: &[TicketField] = &[TicketField::Title, TicketField::CinemaName];

/// ポスター解析プロンプト
///
/// 中国の観客向けに、現実的な票根情報を生成させる。
pub fn build_poster_prompt() -> String {
    r#"Analyze this movie poster to generate realistic movie ticket details for a Chinese audience.

1. Extract the Movie Title.
2. Suggest a Cinema Name (in Chinese).
3. Suggest a realistic Address (in Chinese).
4. Pick a random future Date (YYYY-MM-DD).
5. Pick a random Time (HH:MM).
6. Suggest a Hall number (e.g., 5号厅).
7. Suggest a Hall Type (e.g., IMAX, Dolby, 2D, 3D).
8. Suggest a Language (e.g., 国语, 英语).
9. Suggest a Seat number (e.g., 8排12座).
10. Suggest a Price (e.g., ¥55.9).
11. Suggest a Theme Color (Hex Code).

Return in JSON format."#
        .to_string()
}

/// レスポンススキーマ（Gemini の responseSchema 形式）
///
/// 解析対象の全項目を STRING として列挙する。
pub fn extraction_response_schema() -> Value {
    let mut properties = Map::new();
    for field in TicketField::extractable() {
        properties.insert(field.key().to_string(), json!({ "type": "STRING" }));
    }
    let required: Vec<&str> = REQUIRED_FIELDS.iter().map(|f| f.key()).collect();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_every_item() {
        let prompt = build_poster_prompt();
        assert!(prompt.contains("Movie Title"));
        assert!(prompt.contains("5号厅"));
        assert!(prompt.contains("8排12座"));
        assert!(prompt.contains("Hex Code"));
        assert!(prompt.contains("JSON"));
    }

    #[test]
    fn test_schema_properties() {
        let schema = extraction_response_schema();
        assert_eq!(schema["type"], "OBJECT");

        let props = schema["properties"].as_object().expect("propertiesがない");
        assert_eq!(props.len(), 11);
        assert!(props.contains_key("cinemaName"));
        assert!(props.contains_key("themeColor"));
        assert!(!props.contains_key("username"));
        assert_eq!(props["hallType"]["type"], "STRING");
    }

    #[test]
    fn test_schema_required() {
        let schema = extraction_response_schema();
        assert_eq!(schema["required"], json!(["title", "cinemaName"]));
    }
}
