//! 色指定の検証・変換
//!
//! 主題色はユーザー入力・AI出力のまま保存されるので、描画時にここで検証する。

use regex::Regex;

pub const DEFAULT_THEME_COLOR: &str = "#1e3a8a";

lazy_static::lazy_static! {
    static ref HEX_COLOR_RE: Regex = Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap();
}

/// `#rgb` / `#rrggbb` / `#rrggbbaa` 形式か
pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR_RE.is_match(value.trim())
}

/// 16進カラーを (r, g, b, a) に変換
pub fn parse_hex_color(value: &str) -> Option<(u8, u8, u8, u8)> {
    let value = value.trim();
    if !is_hex_color(value) {
        return None;
    }
    let hex = &value[1..];
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();

    match hex.len() {
        3 => {
            let mut rgb = hex.chars().map(|c| {
                let d = c.to_digit(16).unwrap_or(0) as u8;
                d * 16 + d
            });
            Some((rgb.next()?, rgb.next()?, rgb.next()?, 255))
        }
        6 => Some((
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        )),
        8 => Some((
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            channel(&hex[6..8])?,
        )),
        _ => None,
    }
}

/// 描画用の主題色（不正値はデフォルト）
pub fn theme_color_or_default(value: &str) -> String {
    match parse_hex_color(value) {
        Some((r, g, b, _)) => format!("#{:02x}{:02x}{:02x}", r, g, b),
        None => DEFAULT_THEME_COLOR.to_string(),
    }
}
