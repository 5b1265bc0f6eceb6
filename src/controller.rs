//! フォームコントローラー
//!
//! 票根データを単一の所有者として保持し、項目編集・テンプレート選択・
//! ポスターアップロードとMagic Fill解析の結果取り込みを行う。
//!
//! 解析はtokioタスクで実行され、結果はチャネル経由で戻る。
//! `next_analysis` / `apply_completed` を呼んだ時点のデータにマージされる。

use crate::analyzer::PosterAnalyzer;
use crate::error::{CineStubError, Result};
use crate::poster::PosterImage;
use cinestub_common::{
    changed_fields, merge_extraction, merge_extraction_filtered, render_preview, ExtractionResult,
    TicketComposition, TicketData, TicketField,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// 解析中に編集された項目の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// 解析結果が後勝ち（解析中の編集も上書きされる）
    #[default]
    LastWriterWins,
    /// アップロード開始後に編集された項目は残す
    PreserveUserEdits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// 解析機能を使えるか（APIキーの有無）
    pub analysis_enabled: bool,
    pub merge_policy: MergePolicy,
    /// 解析に送る画像の最大辺（px）
    pub max_image_size: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            analysis_enabled: false,
            merge_policy: MergePolicy::LastWriterWins,
            max_image_size: 1568,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub analysis_started: bool,
}

/// 取り込み済みの解析結果
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAnalysis {
    pub result: ExtractionResult,
    /// マージで値が変わった項目
    pub changed: Vec<TicketField>,
}

struct Completion {
    /// アップロード時点の編集クロック
    started_at: u64,
    result: ExtractionResult,
}

pub struct FormController {
    config: ControllerConfig,
    analyzer: Option<Arc<dyn PosterAnalyzer>>,
    data: TicketData,
    clock: u64,
    edited_at: HashMap<TicketField, u64>,
    in_flight: usize,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
}

impl FormController {
    pub fn new(config: ControllerConfig, analyzer: Option<Arc<dyn PosterAnalyzer>>) -> Self {
        Self::with_data(config, analyzer, TicketData::default())
    }

    pub fn with_data(
        config: ControllerConfig,
        analyzer: Option<Arc<dyn PosterAnalyzer>>,
        data: TicketData,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            analyzer,
            data,
            clock: 0,
            edited_at: HashMap::new(),
            in_flight: 0,
            tx,
            rx,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn data(&self) -> &TicketData {
        &self.data
    }

    pub fn into_data(self) -> TicketData {
        self.data
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// 1項目をそのまま置き換える
    pub fn edit_field(&mut self, field: TicketField, value: impl Into<String>) {
        let now = self.tick();
        self.edited_at.insert(field, now);
        self.data.set(field, value);
    }

    /// キー名（camelCase）で項目を編集
    pub fn edit_field_by_key(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let field: TicketField = key
            .parse()
            .map_err(|_| CineStubError::UnknownField(key.to_string()))?;
        self.edit_field(field, value);
        Ok(())
    }

    /// テンプレートIDを設定（存在チェックはしない）
    pub fn select_template(&mut self, id: impl Into<String>) {
        self.data.template_id = id.into();
    }

    pub fn clear_poster(&mut self) {
        self.data.poster_url = None;
    }

    /// ポスターを設定し、可能なら解析を開始する
    ///
    /// 解析を開始する場合はtokioランタイム内から呼ぶこと。
    /// デコードできないバイト列は `ImageLoad` を返し、データは変更しない。
    pub fn upload_poster(&mut self, bytes: Vec<u8>) -> Result<UploadOutcome> {
        let poster = PosterImage::decode(bytes)?;

        let analyzer = match (&self.analyzer, self.config.analysis_enabled) {
            (Some(analyzer), true) => Some(Arc::clone(analyzer)),
            _ => None,
        };

        let Some(analyzer) = analyzer else {
            self.data.poster_url = Some(poster.data_url());
            tracing::debug!("解析機能が無効のため、ポスター解析をスキップ");
            return Ok(UploadOutcome { analysis_started: false });
        };

        let payload = poster.analysis_payload(self.config.max_image_size)?;
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| CineStubError::Config(format!("非同期运行时不可用: {}", e)))?;

        self.data.poster_url = Some(poster.data_url());
        let started_at = self.tick();
        self.in_flight += 1;

        let tx = self.tx.clone();
        let inner = handle.clone();
        handle.spawn(async move {
            let call = inner.spawn(async move {
                analyzer.analyze(&payload.bytes, &payload.media_type).await
            });
            // パニック・キャンセル時もフォールバックで完了させる
            let result = match call.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "ポスター解析タスクが異常終了");
                    ExtractionResult::fallback()
                }
            };
            // 受信側が破棄済みなら結果は捨てる
            let _ = tx.send(Completion { started_at, result });
        });

        tracing::debug!(in_flight = self.in_flight, "ポスター解析を開始");
        Ok(UploadOutcome { analysis_started: true })
    }

    /// 解析中の呼び出しが1件以上あるか
    pub fn is_analyzing(&self) -> bool {
        self.in_flight > 0
    }

    /// 次の解析完了を待ってマージする（解析中でなければ None）
    pub async fn next_analysis(&mut self) -> Option<AppliedAnalysis> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        Some(self.apply(completion))
    }

    /// 既に届いている解析結果をすべてマージする
    pub fn apply_completed(&mut self) -> Vec<AppliedAnalysis> {
        let mut applied = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            applied.push(self.apply(completion));
        }
        applied
    }

    fn apply(&mut self, completion: Completion) -> AppliedAnalysis {
        self.in_flight = self.in_flight.saturating_sub(1);

        let Completion { started_at, result } = completion;
        let merged = match self.config.merge_policy {
            MergePolicy::LastWriterWins => merge_extraction(&self.data, &result),
            MergePolicy::PreserveUserEdits => {
                let edited_at = &self.edited_at;
                merge_extraction_filtered(&self.data, &result, |field| {
                    edited_at.get(&field).is_some_and(|t| *t > started_at)
                })
            }
        };

        let changed = changed_fields(&self.data, &merged);
        self.data = merged;
        tracing::info!(changed = changed.len(), "解析結果をマージ");

        AppliedAnalysis { result, changed }
    }

    /// 現在のデータでプレビューを構成
    pub fn render(&self, scale: f32) -> TicketComposition {
        render_preview(&self.data, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_field() {
        let mut controller = FormController::new(ControllerConfig::default(), None);
        controller.edit_field(TicketField::Seat, "1排1座");
        assert_eq!(controller.data().seat, "1排1座");

        let before = controller.data().clone();
        controller.edit_field(TicketField::Title, "  spaced  ");
        assert_eq!(controller.data().title, "  spaced  ");
        assert_eq!(controller.data().cinema_name, before.cinema_name);
    }

    #[test]
    fn test_edit_field_by_key() {
        let mut controller = FormController::new(ControllerConfig::default(), None);
        controller.edit_field_by_key("hallType", "IMAX").unwrap();
        assert_eq!(controller.data().hall_type, "IMAX");

        let err = controller.edit_field_by_key("director", "x").unwrap_err();
        assert!(matches!(err, CineStubError::UnknownField(_)));
    }

    #[test]
    fn test_select_template_without_validation() {
        let mut controller = FormController::new(ControllerConfig::default(), None);
        controller.select_template("no-such-template");
        assert_eq!(controller.data().template_id, "no-such-template");
    }

    #[test]
    fn test_clear_poster() {
        let mut controller = FormController::new(ControllerConfig::default(), None);
        assert!(controller.data().poster_url.is_some());
        controller.clear_poster();
        assert_eq!(controller.data().poster_url, None);
    }

    #[test]
    fn test_idle_controller() {
        let mut controller = FormController::new(ControllerConfig::default(), None);
        assert!(!controller.is_analyzing());
        assert!(controller.apply_completed().is_empty());
    }

    #[test]
    fn test_merge_policy_serde() {
        let json = serde_json::to_string(&MergePolicy::PreserveUserEdits).unwrap();
        assert_eq!(json, "\"preserve-user-edits\"");
        assert_eq!(MergePolicy::default(), MergePolicy::LastWriterWins);
    }
}
