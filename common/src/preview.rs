//! 票根プレビューの描画
//!
//! TicketData + テンプレートから固定サイズ（375×667）の構成要素を組み立てる。
//! 同じ入力からは常に同じ出力になる（副作用なし）。
//!
//! - `scale` は表示サイズだけを変える（要素の配置は変わらない）
//! - 空の項目は代替表示文字列で埋める
//! - 出力は `CaptureTarget` 経由でSVGとしてラスタライザへ渡す

use crate::color::theme_color_or_default;
use crate::template::resolve_template;
use crate::types::{TicketData, TicketField};
use std::collections::HashMap;
use std::fmt::Write as _;

/// 票根カードの論理サイズ（px）
pub const CARD_WIDTH: f32 = 375.0;
pub const CARD_HEIGHT: f32 = 667.0;
pub const CARD_RADIUS: f32 = 24.0;

/// ポスター領域はカード高さの62%（上・左右に20pxの余白）
const POSTER_SECTION_RATIO: f32 = 0.62;
const POSTER_INSET: f32 = 20.0;
const POSTER_RADIUS: f32 = 16.0;

const INFO_PADDING_X: f32 = 32.0;
const INFO_PADDING_BOTTOM: f32 = 32.0;
const TITLE_SIZE: f32 = 28.0;
const TITLE_LINE_HEIGHT: f32 = 35.0;
const TITLE_MAX_LINES: usize = 2;
const CINEMA_MAX_WIDTH: f32 = 160.0;

const FONT_FAMILY: &str =
    "'PingFang SC', 'Noto Sans CJK SC', 'Source Han Sans SC', 'Microsoft YaHei', sans-serif";

/// 空の項目の代替表示
pub fn fallback_text(field: TicketField) -> &'static str {
    match field {
        TicketField::Title => "电影名称",
        TicketField::CinemaName => "影城名称",
        TicketField::Address => "影城地址",
        TicketField::Date => "----/--/--",
        TicketField::Time => "--:--",
        TicketField::Hall => "影厅",
        TicketField::HallType => "2D",
        TicketField::Language => "国语",
        TicketField::Seat => "座位待定",
        TicketField::Price => "¥ --",
        TicketField::Username => "用户名",
        TicketField::ThemeColor => crate::color::DEFAULT_THEME_COLOR,
    }
}

/// 表示用の値（空なら代替表示）
pub fn display_value(data: &TicketData, field: TicketField) -> String {
    let value = data.get(field);
    if value.trim().is_empty() {
        return fallback_text(field).to_string();
    }
    match field {
        TicketField::Date => value.replace('-', "/"),
        _ => value.to_string(),
    }
}

// ============================================
// 構成要素
// ============================================

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f32,
    pub opacity: f32,
    pub dash: Option<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RectShape {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    pub fill: String,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Background,
    Poster,
}

/// 画像（object-fit: cover 相当で配置）
#[derive(Debug, Clone, PartialEq)]
pub struct ImageShape {
    pub role: ImageRole,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    pub href: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Title,
    Details,
    Seat,
    Schedule,
    Venue,
    Footer,
    Placeholder,
    Stamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub weight: u16,
    pub opacity: f32,
}

impl TextRun {
    fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), weight: 500, opacity: 1.0 }
    }

    fn bold(text: impl Into<String>) -> Self {
        Self { text: text.into(), weight: 700, opacity: 1.0 }
    }

    fn dim(text: impl Into<String>, opacity: f32) -> Self {
        Self { text: text.into(), weight: 500, opacity }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub role: TextRole,
    pub x: f32,
    /// ベースライン
    pub y: f32,
    pub size: f32,
    pub fill: String,
    pub opacity: f32,
    pub anchor: TextAnchor,
    pub letter_spacing: f32,
    pub runs: Vec<TextRun>,
}

impl TextBlock {
    pub fn content(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineShape {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub stroke: Stroke,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleShape {
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
    pub stroke: Stroke,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupShape {
    /// (角度, 中心x, 中心y)
    pub rotate: Option<(f32, f32, f32)>,
    pub opacity: f32,
    pub children: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Rect(RectShape),
    Image(ImageShape),
    Text(TextBlock),
    Line(LineShape),
    Circle(CircleShape),
    Group(GroupShape),
}

/// プレビューの描画結果
#[derive(Debug, Clone, PartialEq)]
pub struct TicketComposition {
    pub template_id: &'static str,
    /// 代替表示適用後のタイトル（折り返し前）
    pub title: String,
    pub background_image: &'static str,
    pub background_color: &'static str,
    pub theme_color: String,
    pub scale: f32,
    pub elements: Vec<Element>,
}

/// 票根をプレビュー構成に変換する
pub fn render_preview(data: &TicketData, scale: f32) -> TicketComposition {
    let template = resolve_template(&data.template_id);
    let theme_color = theme_color_or_default(&data.theme_color);
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };

    let mut elements = Vec::new();

    // 背景: 塗り色 + テンプレート画像
    elements.push(Element::Rect(RectShape {
        x: 0.0,
        y: 0.0,
        width: CARD_WIDTH,
        height: CARD_HEIGHT,
        radius: CARD_RADIUS,
        fill: template.preview_color.to_string(),
        opacity: 1.0,
    }));
    elements.push(Element::Image(ImageShape {
        role: ImageRole::Background,
        x: 0.0,
        y: 0.0,
        width: CARD_WIDTH,
        height: CARD_HEIGHT,
        radius: CARD_RADIUS,
        href: template.image_url.to_string(),
    }));

    // ポスター
    let section_height = CARD_HEIGHT * POSTER_SECTION_RATIO;
    let poster_width = CARD_WIDTH - POSTER_INSET * 2.0;
    let poster_height = section_height - POSTER_INSET;
    push_poster(&mut elements, data, poster_width, poster_height);

    // 点線の区切り
    let divider_y = section_height + 16.0 + 1.0;
    elements.push(Element::Line(LineShape {
        x1: 24.0,
        y1: divider_y,
        x2: CARD_WIDTH - 24.0,
        y2: divider_y,
        stroke: Stroke {
            color: "#ffffff".into(),
            width: 2.0,
            opacity: 0.3 * 0.8,
            dash: Some((6.0, 6.0)),
        },
    }));

    // 主題色の下地
    let info_top = divider_y + 17.0;
    elements.push(Element::Rect(RectShape {
        x: 0.0,
        y: divider_y,
        width: CARD_WIDTH,
        height: CARD_HEIGHT - divider_y,
        radius: 0.0,
        fill: theme_color.clone(),
        opacity: 0.25,
    }));

    // タイトル（最大2行）
    let title = display_value(data, TicketField::Title);
    let info_width = CARD_WIDTH - INFO_PADDING_X * 2.0;
    let title_lines = wrap_text(&title, TITLE_SIZE, info_width, TITLE_MAX_LINES);
    let mut cursor = info_top;
    for line in &title_lines {
        elements.push(Element::Text(TextBlock {
            role: TextRole::Title,
            x: INFO_PADDING_X,
            y: cursor + TITLE_SIZE,
            size: TITLE_SIZE,
            fill: "#ffffff".into(),
            opacity: 1.0,
            anchor: TextAnchor::Start,
            letter_spacing: 0.0,
            runs: vec![TextRun::bold(line.clone())],
        }));
        cursor += TITLE_LINE_HEIGHT;
    }
    cursor += 20.0;

    // 1行目: 言語 上映方式 | 影城
    let cinema = clamp_text(&display_value(data, TicketField::CinemaName), 14.0, CINEMA_MAX_WIDTH);
    elements.push(Element::Text(TextBlock {
        role: TextRole::Details,
        x: INFO_PADDING_X,
        y: cursor + 14.0,
        size: 14.0,
        fill: "#eff6ff".into(),
        opacity: 1.0,
        anchor: TextAnchor::Start,
        letter_spacing: 0.35,
        runs: vec![
            TextRun::plain(display_value(data, TicketField::Language)),
            TextRun::plain(format!(" {}", display_value(data, TicketField::HallType))),
            TextRun::dim(" | ", 0.4),
            TextRun::plain(cinema),
        ],
    }));
    cursor += 20.0 + 10.0;

    // 2行目: 影厅 座位
    elements.push(Element::Text(TextBlock {
        role: TextRole::Seat,
        x: INFO_PADDING_X,
        y: cursor + 18.0,
        size: 18.0,
        fill: "#eff6ff".into(),
        opacity: 1.0,
        anchor: TextAnchor::Start,
        letter_spacing: 0.45,
        runs: vec![
            TextRun::plain(display_value(data, TicketField::Hall)),
            TextRun::bold(format!(" {}", display_value(data, TicketField::Seat))),
        ],
    }));
    cursor += 28.0 + 10.0;

    // 3行目: 日付 時刻
    elements.push(Element::Text(TextBlock {
        role: TextRole::Schedule,
        x: INFO_PADDING_X,
        y: cursor + 14.0,
        size: 14.0,
        fill: "#dbeafe".into(),
        opacity: 0.8 * 0.9,
        anchor: TextAnchor::Start,
        letter_spacing: 0.35,
        runs: vec![
            TextRun::plain(display_value(data, TicketField::Date)),
            TextRun::bold(format!(" {}", display_value(data, TicketField::Time))),
        ],
    }));
    cursor += 20.0 + 10.0;

    // 4行目: 住所 · 票価
    let price = display_value(data, TicketField::Price);
    let address_width = info_width - text_width(&price, 12.0) - text_width(" · ", 12.0);
    let address = clamp_text(&display_value(data, TicketField::Address), 12.0, address_width);
    elements.push(Element::Text(TextBlock {
        role: TextRole::Venue,
        x: INFO_PADDING_X,
        y: cursor + 12.0,
        size: 12.0,
        fill: "#dbeafe".into(),
        opacity: 0.7,
        anchor: TextAnchor::Start,
        letter_spacing: 0.0,
        runs: vec![
            TextRun::plain(address),
            TextRun::dim(" · ", 0.6),
            TextRun::bold(price),
        ],
    }));

    push_footer(&mut elements, data);
    push_stamp(&mut elements);

    TicketComposition {
        template_id: template.id,
        title,
        background_image: template.image_url,
        background_color: template.preview_color,
        theme_color,
        scale,
        elements,
    }
}

fn push_poster(elements: &mut Vec<Element>, data: &TicketData, width: f32, height: f32) {
    elements.push(Element::Rect(RectShape {
        x: POSTER_INSET,
        y: POSTER_INSET,
        width,
        height,
        radius: POSTER_RADIUS,
        fill: "#111827".into(),
        opacity: 1.0,
    }));

    match data.poster_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => {
            elements.push(Element::Image(ImageShape {
                role: ImageRole::Poster,
                x: POSTER_INSET,
                y: POSTER_INSET,
                width,
                height,
                radius: POSTER_RADIUS,
                href: url.to_string(),
            }));
        }
        None => {
            let cx = POSTER_INSET + width / 2.0;
            let cy = POSTER_INSET + height / 2.0;
            // フィルムのアイコン代わりの枠
            elements.push(Element::Rect(RectShape {
                x: cx - 24.0,
                y: cy - 40.0,
                width: 48.0,
                height: 40.0,
                radius: 4.0,
                fill: "#6b7280".into(),
                opacity: 0.6,
            }));
            elements.push(Element::Text(TextBlock {
                role: TextRole::Placeholder,
                x: cx,
                y: cy + 22.0,
                size: 14.0,
                fill: "#6b7280".into(),
                opacity: 1.0,
                anchor: TextAnchor::Middle,
                letter_spacing: 0.0,
                runs: vec![TextRun::plain("无海报")],
            }));
        }
    }

    // 光沢
    elements.push(Element::Rect(RectShape {
        x: POSTER_INSET,
        y: POSTER_INSET,
        width,
        height,
        radius: POSTER_RADIUS,
        fill: "url(#poster-shine)".into(),
        opacity: 1.0,
    }));
}

fn push_footer(elements: &mut Vec<Element>, data: &TicketData) {
    let label = format!("@{} 专属", display_value(data, TicketField::Username));
    let label = clamp_text(&label, 14.0, CARD_WIDTH - 2.0 * (INFO_PADDING_X + 36.0));
    let baseline = CARD_HEIGHT - INFO_PADDING_BOTTOM - 6.0;
    let center = CARD_WIDTH / 2.0;
    let half = text_width(&label, 14.0) / 2.0 + 2.0 * (label.chars().count() as f32) / 2.0;

    let ornament = |x1: f32, x2: f32| {
        Element::Line(LineShape {
            x1,
            y1: baseline - 4.0,
            x2,
            y2: baseline - 12.0,
            stroke: Stroke {
                color: "#ffffff".into(),
                width: 2.0,
                opacity: 0.6,
                dash: None,
            },
        })
    };

    let mut children = vec![Element::Text(TextBlock {
        role: TextRole::Footer,
        x: center,
        y: baseline,
        size: 14.0,
        fill: "#bfdbfe".into(),
        opacity: 0.8,
        anchor: TextAnchor::Middle,
        letter_spacing: 2.0,
        runs: vec![TextRun::plain(label)],
    })];
    children.push(ornament(center - half - 28.0, center - half - 14.0));
    children.push(ornament(center + half + 28.0, center + half + 14.0));

    elements.push(Element::Group(GroupShape {
        rotate: None,
        opacity: 0.6,
        children,
    }));
}

fn push_stamp(elements: &mut Vec<Element>) {
    let size = 112.0;
    let cx = CARD_WIDTH - 16.0 - size / 2.0;
    let cy = CARD_HEIGHT - 96.0 - size / 2.0;
    let ring = |r: f32, width: f32| {
        Element::Circle(CircleShape {
            cx,
            cy,
            r,
            stroke: Stroke {
                color: "#ffffff".into(),
                width,
                opacity: 0.3,
                dash: None,
            },
        })
    };
    let label = |y: f32, size: f32, weight: u16, spacing: f32, text: &str| {
        Element::Text(TextBlock {
            role: TextRole::Stamp,
            x: cx,
            y,
            size,
            fill: "#ffffff".into(),
            opacity: 0.8,
            anchor: TextAnchor::Middle,
            letter_spacing: spacing,
            runs: vec![TextRun { text: text.to_string(), weight, opacity: 1.0 }],
        })
    };

    elements.push(Element::Group(GroupShape {
        rotate: Some((-12.0, cx, cy)),
        opacity: 0.5,
        children: vec![
            ring(size / 2.0 - 2.0, 4.0),
            ring(48.0 - 1.0, 2.0),
            label(cy - 26.0, 8.0, 500, 1.6, "SOUVENIR TICKET"),
            label(cy - 2.0, 20.0, 900, 0.0, "CINE"),
            label(cy + 18.0, 20.0, 900, 0.0, "VIP"),
            label(cy + 32.0, 8.0, 500, 0.8, "COLLECTION"),
        ],
    }));
}

impl TicketComposition {
    /// 表示サイズ（論理サイズ × scale）
    pub fn display_width(&self) -> f32 {
        CARD_WIDTH * self.scale
    }

    pub fn display_height(&self) -> f32 {
        CARD_HEIGHT * self.scale
    }

    /// 全テキスト要素（入れ子を含む、描画順）
    pub fn texts(&self) -> Vec<&TextBlock> {
        fn walk<'a>(elements: &'a [Element], out: &mut Vec<&'a TextBlock>) {
            for el in elements {
                match el {
                    Element::Text(t) => out.push(t),
                    Element::Group(g) => walk(&g.children, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.elements, &mut out);
        out
    }

    pub fn text_by_role(&self, role: TextRole) -> Vec<String> {
        self.texts()
            .into_iter()
            .filter(|t| t.role == role)
            .map(|t| t.content())
            .collect()
    }

    pub fn images(&self) -> Vec<&ImageShape> {
        self.elements
            .iter()
            .filter_map(|el| match el {
                Element::Image(img) => Some(img),
                _ => None,
            })
            .collect()
    }

    /// ラスタライズ対象（論理サイズ・等倍）
    pub fn capture_target(&self) -> CaptureTarget {
        CaptureTarget {
            composition: TicketComposition {
                scale: 1.0,
                ..self.clone()
            },
        }
    }

    /// 表示サイズのSVG文書
    pub fn to_svg_document(&self) -> String {
        write_svg(self, self.display_width(), self.display_height(), &HashMap::new())
    }
}

/// ラスタライザへ渡す描画対象
///
/// 描画技術に依存しないハンドル。SVGへの変換と外部画像の列挙だけを公開する。
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureTarget {
    composition: TicketComposition,
}

impl CaptureTarget {
    pub fn width(&self) -> u32 {
        CARD_WIDTH as u32
    }

    pub fn height(&self) -> u32 {
        CARD_HEIGHT as u32
    }

    pub fn composition(&self) -> &TicketComposition {
        &self.composition
    }

    /// 外部（http/https）の画像URL（重複なし、描画順）
    pub fn asset_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for img in self.composition.images() {
            if is_remote_url(&img.href) && !urls.contains(&img.href) {
                urls.push(img.href.clone());
            }
        }
        urls
    }

    /// SVGに変換
    ///
    /// `assets` のキーに一致する画像は、値が `Some` なら差し替え、`None` なら描画しない。
    pub fn to_svg(&self, assets: &HashMap<String, Option<String>>) -> String {
        write_svg(&self.composition, CARD_WIDTH, CARD_HEIGHT, assets)
    }
}

pub fn is_remote_url(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

// ============================================
// 文字幅の見積もり
// ============================================

fn char_em(c: char) -> f32 {
    if c.is_ascii() {
        if c == ' ' { 0.3 } else { 0.55 }
    } else {
        1.0
    }
}

/// 文字列の描画幅（px、概算）
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(char_em).sum::<f32>() * size
}

/// 幅に収まらなければ末尾を「…」で省略
pub fn clamp_text(text: &str, size: f32, max_width: f32) -> String {
    if text_width(text, size) <= max_width {
        return text.to_string();
    }
    with_ellipsis(text, size, max_width)
}

fn with_ellipsis(text: &str, size: f32, max_width: f32) -> String {
    let budget = max_width - text_width("…", size);
    let mut out = String::new();
    let mut used = 0.0;
    for c in text.chars() {
        let w = char_em(c) * size;
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    let mut out = out.trim_end().to_string();
    out.push('…');
    out
}

/// 英単語は途中で切らず、CJKは1文字ずつ折り返す
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        if c.is_whitespace() {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(" ".to_string());
        } else if c.is_ascii() {
            word.push(c);
        } else {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(c.to_string());
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

/// 最大 `max_lines` 行に折り返す（溢れた分は最終行を省略記号で切る）
pub fn wrap_text(text: &str, size: f32, max_width: f32, max_lines: usize) -> Vec<String> {
    let mut queue: std::collections::VecDeque<String> = tokenize(text).into();
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    while let Some(token) = queue.pop_front() {
        if token == " " && current.is_empty() {
            continue;
        }
        // 1行に収まらない単語は文字単位に分解
        if token.chars().count() > 1 && text_width(&token, size) > max_width {
            for c in token.chars().rev() {
                queue.push_front(c.to_string());
            }
            continue;
        }
        let candidate = format!("{}{}", current, token);
        if text_width(&candidate, size) <= max_width {
            current = candidate;
        } else {
            if !current.trim().is_empty() {
                lines.push(current.trim_end().to_string());
            }
            current = if token == " " { String::new() } else { token };
        }
    }
    if !current.trim().is_empty() {
        lines.push(current.trim_end().to_string());
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    if max_lines > 0 && lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            *last = with_ellipsis(last, size, max_width);
        }
    }
    lines
}

// ============================================
// SVG出力
// ============================================

pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// 小数2桁に丸めて末尾の0を省く
fn num(v: f32) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        let s = format!("{:.2}", rounded);
        s.trim_end_matches('0').to_string()
    }
}

fn write_svg(
    composition: &TicketComposition,
    width: f32,
    height: f32,
    assets: &HashMap<String, Option<String>>,
) -> String {
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        num(width),
        num(height),
        num(CARD_WIDTH),
        num(CARD_HEIGHT),
    );
    svg.push_str("<defs>");
    let _ = write!(
        svg,
        r#"<clipPath id="card-clip"><rect x="0" y="0" width="{}" height="{}" rx="{}"/></clipPath>"#,
        num(CARD_WIDTH),
        num(CARD_HEIGHT),
        num(CARD_RADIUS),
    );
    for (idx, el) in composition.elements.iter().enumerate() {
        if let Element::Image(img) = el {
            let _ = write!(
                svg,
                r#"<clipPath id="clip-{}"><rect x="{}" y="{}" width="{}" height="{}" rx="{}"/></clipPath>"#,
                idx,
                num(img.x),
                num(img.y),
                num(img.width),
                num(img.height),
                num(img.radius),
            );
        }
    }
    svg.push_str(
        r##"<linearGradient id="poster-shine" x1="0" y1="1" x2="1" y2="0"><stop offset="0" stop-color="#000000" stop-opacity="0.1"/><stop offset="1" stop-color="#ffffff" stop-opacity="0.1"/></linearGradient>"##,
    );
    svg.push_str("</defs>");

    let _ = write!(
        svg,
        r#"<g clip-path="url(#card-clip)" font-family="{}">"#,
        escape_xml(FONT_FAMILY)
    );
    for (idx, el) in composition.elements.iter().enumerate() {
        write_element(&mut svg, idx, el, assets);
    }
    svg.push_str("</g></svg>");
    svg
}

fn write_stroke(svg: &mut String, stroke: &Stroke) {
    let _ = write!(
        svg,
        r#" fill="none" stroke="{}" stroke-width="{}" stroke-opacity="{}""#,
        escape_xml(&stroke.color),
        num(stroke.width),
        num(stroke.opacity),
    );
    if let Some((on, off)) = stroke.dash {
        let _ = write!(svg, r#" stroke-dasharray="{} {}""#, num(on), num(off));
    }
}

fn write_element(
    svg: &mut String,
    idx: usize,
    el: &Element,
    assets: &HashMap<String, Option<String>>,
) {
    match el {
        Element::Rect(r) => {
            let _ = write!(
                svg,
                r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{}" fill="{}" fill-opacity="{}"/>"#,
                num(r.x),
                num(r.y),
                num(r.width),
                num(r.height),
                num(r.radius),
                escape_xml(&r.fill),
                num(r.opacity),
            );
        }
        Element::Image(img) => {
            let href = match assets.get(&img.href) {
                Some(Some(resolved)) => resolved.as_str(),
                Some(None) => return,
                None => img.href.as_str(),
            };
            let _ = write!(
                svg,
                r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="xMidYMid slice" clip-path="url(#clip-{})" xlink:href="{}"/>"#,
                num(img.x),
                num(img.y),
                num(img.width),
                num(img.height),
                idx,
                escape_xml(href),
            );
        }
        Element::Text(t) => {
            let anchor = match t.anchor {
                TextAnchor::Start => "start",
                TextAnchor::Middle => "middle",
            };
            let _ = write!(
                svg,
                r#"<text x="{}" y="{}" font-size="{}" fill="{}" fill-opacity="{}" text-anchor="{}" letter-spacing="{}">"#,
                num(t.x),
                num(t.y),
                num(t.size),
                escape_xml(&t.fill),
                num(t.opacity),
                anchor,
                num(t.letter_spacing),
            );
            for run in &t.runs {
                let _ = write!(
                    svg,
                    r#"<tspan font-weight="{}" fill-opacity="{}">{}</tspan>"#,
                    run.weight,
                    num(run.opacity * t.opacity),
                    escape_xml(&run.text),
                );
            }
            svg.push_str("</text>");
        }
        Element::Line(l) => {
            let _ = write!(
                svg,
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}""#,
                num(l.x1),
                num(l.y1),
                num(l.x2),
                num(l.y2),
            );
            write_stroke(svg, &l.stroke);
            svg.push_str("/>");
        }
        Element::Circle(c) => {
            let _ = write!(svg, r#"<circle cx="{}" cy="{}" r="{}""#, num(c.cx), num(c.cy), num(c.r));
            write_stroke(svg, &c.stroke);
            svg.push_str("/>");
        }
        Element::Group(g) => {
            svg.push_str("<g");
            if let Some((angle, cx, cy)) = g.rotate {
                let _ = write!(svg, r#" transform="rotate({} {} {})""#, num(angle), num(cx), num(cy));
            }
            let _ = write!(svg, r#" opacity="{}">"#, num(g.opacity));
            for child in &g.children {
                // 入れ子の画像は使わないので idx は親のものを流用
                write_element(svg, idx, child, assets);
            }
            svg.push_str("</g>");
        }
    }
}
