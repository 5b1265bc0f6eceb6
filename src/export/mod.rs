//! 画像書き出し
//!
//! プレビューのキャプチャ対象をラスタライズしてPNGにする。
//! 失敗は呼び出し側に伝えず、ユーザー向けの通知として記録する。

mod raster;

pub use raster::ResvgRasterizer;

use crate::error::{CineStubError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cinestub_common::CaptureTarget;
use std::path::Path;
use std::sync::Arc;

/// 書き出し失敗時にユーザーへ表示する文言
pub const EXPORT_FAILED_NOTICE: &str = "生成图片失败，请重试";

#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// 論理サイズに対する倍率
    pub scale: f32,
    /// 背景色（None は透過）
    pub background_color: Option<String>,
    /// リモート画像を取得して埋め込む
    pub use_cors: bool,
    /// 取得できなかったリモート画像を省いて続行する
    pub allow_taint: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 3.0,
            background_color: None,
            use_cors: true,
            allow_taint: true,
        }
    }
}

/// PNGエンコード済みの画像
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl RasterImage {
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &self.png)?;
        Ok(())
    }
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, target: &CaptureTarget, options: &RasterOptions) -> Result<RasterImage>;
}

/// 書き出し操作の状態
pub struct ExportController {
    rasterizer: Option<Arc<dyn Rasterizer>>,
    generating: bool,
    notice: Option<String>,
    last_image: Option<RasterImage>,
}

impl ExportController {
    pub fn new(rasterizer: Option<Arc<dyn Rasterizer>>) -> Self {
        Self {
            rasterizer,
            generating: false,
            notice: None,
            last_image: None,
        }
    }

    /// 画像を生成する。失敗時は通知を記録して None を返す
    pub async fn generate(
        &mut self,
        target: &CaptureTarget,
        options: &RasterOptions,
    ) -> Option<&RasterImage> {
        self.generating = true;
        self.notice = None;

        let outcome = match &self.rasterizer {
            Some(rasterizer) => rasterizer.rasterize(target, options).await,
            None => Err(CineStubError::Export("渲染器不可用".into())),
        };

        self.generating = false;

        match outcome {
            Ok(image) => {
                tracing::info!(width = image.width, height = image.height, "画像を生成");
                self.last_image = Some(image);
                self.last_image.as_ref()
            }
            Err(e) => {
                tracing::error!(error = %e, "画像生成に失敗");
                self.notice = Some(EXPORT_FAILED_NOTICE.to_string());
                None
            }
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn last_image(&self) -> Option<&RasterImage> {
        self.last_image.as_ref()
    }

    /// 結果と通知を閉じる
    pub fn dismiss(&mut self) {
        self.notice = None;
        self.last_image = None;
    }
}
