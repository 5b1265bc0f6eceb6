//! 票根データの型定義
//!
//! CLIとライブラリで共有される型:
//! - TicketField: テキスト項目の一覧表（キー・ラベル・マージ規則）
//! - TicketData: 票根1枚分の内容とテンプレート選択
//! - ExtractionResult: ポスター解析（Magic Fill）の出力

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 解析結果を取り込むときの規則
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// 解析結果に空でない値があれば上書き
    Extracted,
    /// 解析結果では変更しない（ユーザー入力のみ）
    UserOnly,
}

/// 票根のテキスト項目
///
/// 項目を追加する場合はここに1行足し、各テーブルに対応を追加する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TicketField {
    Title,
    CinemaName,
    Address,
    Date,
    Time,
    Hall,
    HallType,
    Language,
    Seat,
    Price,
    Username,
    ThemeColor,
}

impl TicketField {
    /// 全項目（フォーム表示順）
    pub const ALL: [TicketField; 12] = [
        TicketField::Title,
        TicketField::CinemaName,
        TicketField::Address,
        TicketField::Date,
        TicketField::Time,
        TicketField::Hall,
        TicketField::HallType,
        TicketField::Language,
        TicketField::Seat,
        TicketField::Price,
        TicketField::Username,
        TicketField::ThemeColor,
    ];

    /// JSONキー（camelCase）
    pub fn key(&self) -> &'static str {
        match self {
            TicketField::Title => "title",
            TicketField::CinemaName => "cinemaName",
            TicketField::Address => "address",
            TicketField::Date => "date",
            TicketField::Time => "time",
            TicketField::Hall => "hall",
            TicketField::HallType => "hallType",
            TicketField::Language => "language",
            TicketField::Seat => "seat",
            TicketField::Price => "price",
            TicketField::Username => "username",
            TicketField::ThemeColor => "themeColor",
        }
    }

    /// フォームの表示ラベル
    pub fn label(&self) -> &'static str {
        match self {
            TicketField::Title => "电影名称",
            TicketField::CinemaName => "影城名称",
            TicketField::Address => "影城地址",
            TicketField::Date => "日期",
            TicketField::Time => "时间",
            TicketField::Hall => "影厅",
            TicketField::HallType => "影厅类型",
            TicketField::Language => "语言",
            TicketField::Seat => "座位",
            TicketField::Price => "票价",
            TicketField::Username => "用户名",
            TicketField::ThemeColor => "主题色",
        }
    }

    pub fn merge_rule(&self) -> MergeRule {
        match self {
            TicketField::Username => MergeRule::UserOnly,
            _ => MergeRule::Extracted,
        }
    }

    /// 解析（Magic Fill）の対象項目
    pub fn extractable() -> impl Iterator<Item = TicketField> {
        Self::ALL
            .into_iter()
            .filter(|f| f.merge_rule() == MergeRule::Extracted)
    }
}

impl std::str::FromStr for TicketField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TicketField::ALL
            .into_iter()
            .find(|f| f.key() == s)
            .ok_or_else(|| Error::UnknownField(s.to_string()))
    }
}

impl std::fmt::Display for TicketField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

pub const DEFAULT_POSTER_URL: &str =
    "https://images.unsplash.com/photo-1536440136628-849c177e76a1?auto=format&fit=crop&w=800&q=80";

/// 票根データ
///
/// JSONで欠けているキーはデフォルト票根の値になる。
/// `"posterUrl": null` はポスターなし。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TicketData {
    pub title: String,
    pub cinema_name: String,
    pub address: String,
    pub date: String,
    pub time: String,
    pub hall: String,
    pub hall_type: String,
    pub language: String,
    pub seat: String,
    pub price: String,
    /// リモートURL または data: URL
    pub poster_url: Option<String>,
    pub theme_color: String,
    pub username: String,
    pub template_id: String,
}

impl Default for TicketData {
    fn default() -> Self {
        Self {
            title: "我不是药神".into(),
            cinema_name: "浙江时代影城·奥斯卡店".into(),
            address: "杭州市下城区西湖文化广场".into(),
            date: "2018-07-10".into(),
            time: "15:00".into(),
            hall: "1号厅".into(),
            hall_type: "2D".into(),
            language: "国语".into(),
            seat: "4排04座".into(),
            price: "¥ 35.0".into(),
            poster_url: Some(DEFAULT_POSTER_URL.into()),
            theme_color: "#1e3a8a".into(),
            username: "醉の晓".into(),
            template_id: "blue-mood".into(),
        }
    }
}

impl TicketData {
    /// 全テキスト項目が空、ポスターなしの票根
    pub fn blank() -> Self {
        Self {
            title: String::new(),
            cinema_name: String::new(),
            address: String::new(),
            date: String::new(),
            time: String::new(),
            hall: String::new(),
            hall_type: String::new(),
            language: String::new(),
            seat: String::new(),
            price: String::new(),
            poster_url: None,
            theme_color: String::new(),
            username: String::new(),
            template_id: crate::template::default_template().id.to_string(),
        }
    }

    pub fn get(&self, field: TicketField) -> &str {
        match field {
            TicketField::Title => &self.title,
            TicketField::CinemaName => &self.cinema_name,
            TicketField::Address => &self.address,
            TicketField::Date => &self.date,
            TicketField::Time => &self.time,
            TicketField::Hall => &self.hall,
            TicketField::HallType => &self.hall_type,
            TicketField::Language => &self.language,
            TicketField::Seat => &self.seat,
            TicketField::Price => &self.price,
            TicketField::Username => &self.username,
            TicketField::ThemeColor => &self.theme_color,
        }
    }

    fn slot_mut(&mut self, field: TicketField) -> &mut String {
        match field {
            TicketField::Title => &mut self.title,
            TicketField::CinemaName => &mut self.cinema_name,
            TicketField::Address => &mut self.address,
            TicketField::Date => &mut self.date,
            TicketField::Time => &mut self.time,
            TicketField::Hall => &mut self.hall,
            TicketField::HallType => &mut self.hall_type,
            TicketField::Language => &mut self.language,
            TicketField::Seat => &mut self.seat,
            TicketField::Price => &mut self.price,
            TicketField::Username => &mut self.username,
            TicketField::ThemeColor => &mut self.theme_color,
        }
    }

    /// 1項目をそのまま置き換える（検証・整形はしない）
    pub fn set(&mut self, field: TicketField, value: impl Into<String>) {
        *self.slot_mut(field) = value.into();
    }

    /// JSONファイルから読み込み
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// ポスター解析の出力
///
/// すべて任意項目。`username` は解析スキーマに含まれない。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cinema_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hall: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hall_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
}

/// 解析失敗時のタイトル
pub const FALLBACK_TITLE: &str = "未知电影";

impl ExtractionResult {
    /// 解析失敗時の最小結果（タイトルのみ）
    pub fn fallback() -> Self {
        Self {
            title: Some(FALLBACK_TITLE.to_string()),
            ..Default::default()
        }
    }

    pub fn get(&self, field: TicketField) -> Option<&str> {
        let slot = match field {
            TicketField::Title => &self.title,
            TicketField::CinemaName => &self.cinema_name,
            TicketField::Address => &self.address,
            TicketField::Date => &self.date,
            TicketField::Time => &self.time,
            TicketField::Hall => &self.hall,
            TicketField::HallType => &self.hall_type,
            TicketField::Language => &self.language,
            TicketField::Seat => &self.seat,
            TicketField::Price => &self.price,
            TicketField::ThemeColor => &self.theme_color,
            TicketField::Username => return None,
        };
        slot.as_deref()
    }

    /// 解析対象外の項目は無視して false を返す
    pub fn set(&mut self, field: TicketField, value: Option<String>) -> bool {
        let slot = match field {
            TicketField::Title => &mut self.title,
            TicketField::CinemaName => &mut self.cinema_name,
            TicketField::Address => &mut self.address,
            TicketField::Date => &mut self.date,
            TicketField::Time => &mut self.time,
            TicketField::Hall => &mut self.hall,
            TicketField::HallType => &mut self.hall_type,
            TicketField::Language => &mut self.language,
            TicketField::Seat => &mut self.seat,
            TicketField::Price => &mut self.price,
            TicketField::ThemeColor => &mut self.theme_color,
            TicketField::Username => return false,
        };
        *slot = value;
        true
    }

    pub fn is_empty(&self) -> bool {
        TicketField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_keys_round_trip() {
        for field in TicketField::ALL {
            let parsed: TicketField = field.key().parse().expect("キー変換失敗");
            assert_eq!(parsed, field);
        }
    }

    #[test]
    fn test_field_unknown_key() {
        let err = "director".parse::<TicketField>().unwrap_err();
        assert!(matches!(err, Error::UnknownField(ref k) if k == "director"));
    }

    #[test]
    fn test_username_is_user_only() {
        assert_eq!(TicketField::Username.merge_rule(), MergeRule::UserOnly);
        assert_eq!(TicketField::extractable().count(), 11);
        assert!(TicketField::extractable().all(|f| f != TicketField::Username));
    }

    #[test]
    fn test_default_ticket() {
        let ticket = TicketData::default();
        assert_eq!(ticket.title, "我不是药神");
        assert_eq!(ticket.template_id, "blue-mood");
        assert_eq!(ticket.poster_url.as_deref(), Some(DEFAULT_POSTER_URL));
    }

    #[test]
    fn test_get_set_all_fields() {
        let mut ticket = TicketData::blank();
        for field in TicketField::ALL {
            ticket.set(field, format!("v-{}", field.key()));
        }
        for field in TicketField::ALL {
            assert_eq!(ticket.get(field), format!("v-{}", field.key()));
        }
        assert_eq!(ticket.cinema_name, "v-cinemaName");
        assert_eq!(ticket.theme_color, "v-themeColor");
    }

    #[test]
    fn test_ticket_serialize_camel_case() {
        let json = serde_json::to_string(&TicketData::default()).expect("シリアライズ失敗");
        assert!(json.contains("\"cinemaName\":\"浙江时代影城·奥斯卡店\""));
        assert!(json.contains("\"hallType\":\"2D\""));
        assert!(json.contains("\"templateId\":\"blue-mood\""));
        assert!(json.contains("\"posterUrl\""));
    }

    #[test]
    fn test_ticket_deserialize_partial_uses_defaults() {
        let ticket = TicketData::from_json(r#"{"title": "流浪地球", "posterUrl": null}"#)
            .expect("デシリアライズ失敗");
        assert_eq!(ticket.title, "流浪地球");
        assert_eq!(ticket.poster_url, None);
        assert_eq!(ticket.cinema_name, "浙江时代影城·奥斯卡店");
    }

    #[test]
    fn test_extraction_get_username_is_none() {
        let extraction = ExtractionResult {
            title: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(extraction.get(TicketField::Title), Some("x"));
        assert_eq!(extraction.get(TicketField::Username), None);
    }

    #[test]
    fn test_extraction_set_username_rejected() {
        let mut extraction = ExtractionResult::default();
        assert!(!extraction.set(TicketField::Username, Some("me".into())));
        assert!(extraction.is_empty());
        assert!(extraction.set(TicketField::Seat, Some("8排12座".into())));
        assert_eq!(extraction.seat.as_deref(), Some("8排12座"));
    }

    #[test]
    fn test_extraction_fallback() {
        let fallback = ExtractionResult::fallback();
        assert_eq!(fallback.title.as_deref(), Some(FALLBACK_TITLE));
        assert!(!fallback.is_empty());
        assert_eq!(fallback.cinema_name, None);
    }

    #[test]
    fn test_extraction_serialize_skips_absent() {
        let json = serde_json::to_string(&ExtractionResult::fallback()).expect("シリアライズ失敗");
        assert_eq!(json, r#"{"title":"未知电影"}"#);
    }
}
