//! ポスター解析（Magic Fill）
//!
//! 解析コラボレーターの境界。失敗は実装側で吸収し、常に結果を返す。

mod gemini;

pub use gemini::GeminiAnalyzer;

use async_trait::async_trait;
use cinestub_common::ExtractionResult;

/// ポスター画像から票根情報を推定する
#[async_trait]
pub trait PosterAnalyzer: Send + Sync {
    /// 解析結果を返す。失敗時はフォールバック結果を返し、エラーにはしない
    async fn analyze(&self, image: &[u8], media_type: &str) -> ExtractionResult;
}
