//! 解析結果のマージ
//!
//! 既存の票根データにポスター解析の結果を取り込む。
//! 規則は `TicketField::merge_rule` の一覧表で決まる。

use crate::types::{ExtractionResult, MergeRule, TicketData, TicketField};

/// 解析結果を既存データにマージした新しい票根を返す
///
/// - `Extracted` 規則の項目: 解析値が存在し空でなければ上書き
/// - それ以外: 既存値のまま
/// - `poster_url` と `template_id` は変更しない
pub fn merge_extraction(prior: &TicketData, extraction: &ExtractionResult) -> TicketData {
    merge_extraction_filtered(prior, extraction, |_| false)
}

/// `keep(field)` が true の項目は解析値があっても既存値を残す
pub fn merge_extraction_filtered(
    prior: &TicketData,
    extraction: &ExtractionResult,
    keep: impl Fn(TicketField) -> bool,
) -> TicketData {
    let mut merged = prior.clone();

    for field in TicketField::ALL {
        if field.merge_rule() != MergeRule::Extracted || keep(field) {
            continue;
        }
        if let Some(value) = extraction.get(field) {
            if !value.is_empty() {
                merged.set(field, value);
            }
        }
    }

    merged
}

/// マージで値が変わる項目の一覧
pub fn changed_fields(prior: &TicketData, merged: &TicketData) -> Vec<TicketField> {
    TicketField::ALL
        .into_iter()
        .filter(|f| prior.get(*f) != merged.get(*f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FALLBACK_TITLE;

    fn full_extraction() -> ExtractionResult {
        ExtractionResult {
            title: Some("流浪地球2".into()),
            cinema_name: Some("万达影城".into()),
            address: Some("北京市朝阳区".into()),
            date: Some("2026-02-01".into()),
            time: Some("19:30".into()),
            hall: Some("5号厅".into()),
            hall_type: Some("IMAX".into()),
            language: Some("国语".into()),
            seat: Some("8排12座".into()),
            price: Some("¥55.9".into()),
            theme_color: Some("#0f172a".into()),
        }
    }

    #[test]
    fn test_merge_empty_is_identity() {
        let prior = TicketData::default();
        let merged = merge_extraction(&prior, &ExtractionResult::default());
        assert_eq!(merged, prior);
    }

    #[test]
    fn test_merge_replaces_present_fields() {
        let prior = TicketData::default();
        let merged = merge_extraction(&prior, &full_extraction());

        assert_eq!(merged.title, "流浪地球2");
        assert_eq!(merged.cinema_name, "万达影城");
        assert_eq!(merged.hall_type, "IMAX");
        assert_eq!(merged.theme_color, "#0f172a");
        // 解析対象外
        assert_eq!(merged.username, prior.username);
    }

    #[test]
    fn test_merge_keeps_absent_and_empty_fields() {
        let prior = TicketData::default();
        let extraction = ExtractionResult {
            title: Some("新片".into()),
            cinema_name: Some(String::new()),
            seat: None,
            ..Default::default()
        };
        let merged = merge_extraction(&prior, &extraction);

        assert_eq!(merged.title, "新片");
        assert_eq!(merged.cinema_name, prior.cinema_name);
        assert_eq!(merged.seat, prior.seat);
        assert_eq!(changed_fields(&prior, &merged), vec![TicketField::Title]);
    }

    #[test]
    fn test_merge_never_touches_poster_or_template() {
        let mut prior = TicketData::default();
        prior.poster_url = None;
        prior.template_id = "cyber".into();

        let merged = merge_extraction(&prior, &full_extraction());
        assert_eq!(merged.poster_url, None);
        assert_eq!(merged.template_id, "cyber");

        prior.poster_url = Some("data:image/png;base64,AAAA".into());
        let merged = merge_extraction(&prior, &full_extraction());
        assert_eq!(merged.poster_url.as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[test]
    fn test_fallback_overwrites_title() {
        // 成否ではなく値の有無で判定するため、フォールバックのタイトルも上書きする
        let prior = TicketData::default();
        let merged = merge_extraction(&prior, &ExtractionResult::fallback());
        assert_eq!(merged.title, FALLBACK_TITLE);
        assert_eq!(merged.cinema_name, prior.cinema_name);
    }

    #[test]
    fn test_merge_is_pure() {
        let prior = TicketData::default();
        let extraction = full_extraction();
        let a = merge_extraction(&prior, &extraction);
        let b = merge_extraction(&prior, &extraction);
        assert_eq!(a, b);
        assert_eq!(prior, TicketData::default());
    }

    #[test]
    fn test_merge_filtered_keeps_selected() {
        let prior = TicketData::default();
        let merged = merge_extraction_filtered(&prior, &full_extraction(), |f| {
            f == TicketField::Title || f == TicketField::Seat
        });
        assert_eq!(merged.title, prior.title);
        assert_eq!(merged.seat, prior.seat);
        assert_eq!(merged.cinema_name, "万达影城");
    }

    #[test]
    fn test_merge_over_blank_ticket() {
        let prior = TicketData::blank();
        let merged = merge_extraction(&prior, &ExtractionResult::fallback());
        assert_eq!(merged.title, FALLBACK_TITLE);
        assert_eq!(merged.cinema_name, "");
    }
}
