//! テンプレート定義
//!
//! 票根の背景テーマ。固定の一覧で、ユーザーは編集できない。
//! 先頭要素がデフォルト（未知のIDのフォールバック先）。

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    /// 背景画像が読めないときの塗り色
    pub preview_color: &'static str,
    pub image_url: &'static str,
}

pub const TEMPLATES: &[Template] = &[
    Template {
        id: "blue-mood",
        name: "深海蓝调",
        preview_color: "#1e3a8a",
        image_url: "https://images.unsplash.com/photo-1550684848-fac1c5b4e853?q=80&w=800&auto=format&fit=crop",
    },
    Template {
        id: "vintage",
        name: "复古纸张",
        preview_color: "#eecfa1",
        image_url: "https://images.unsplash.com/photo-1586075010923-2dd4570fb338?q=80&w=800&auto=format&fit=crop",
    },
    Template {
        id: "cyber",
        name: "暗夜霓虹",
        preview_color: "#581c87",
        image_url: "https://images.unsplash.com/photo-1555680202-c86f0e12f086?q=80&w=800&auto=format&fit=crop",
    },
    Template {
        id: "gold",
        name: "黑金尊享",
        preview_color: "#1f2937",
        image_url: "https://images.unsplash.com/photo-1618005182384-a83a8bd57fbe?q=80&w=800&auto=format&fit=crop",
    },
    Template {
        id: "simple",
        name: "极简白",
        preview_color: "#f3f4f6",
        image_url: "https://images.unsplash.com/photo-1517816743773-6e0fd518b4a6?q=80&w=800&auto=format&fit=crop",
    },
];

pub fn default_template() -> &'static Template {
    &TEMPLATES[0]
}

pub fn find_template(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// IDからテンプレートを取得（見つからなければ先頭）
pub fn resolve_template(id: &str) -> &'static Template {
    find_template(id).unwrap_or_else(default_template)
}
