//! resvg によるラスタライズ

use super::{RasterImage, RasterOptions, Rasterizer};
use crate::error::{CineStubError, Result};
use crate::poster::to_data_url;
use async_trait::async_trait;
use cinestub_common::color::parse_hex_color;
use cinestub_common::CaptureTarget;
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::tiny_skia::{Color, Pixmap, Transform};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// 1辺の最大ピクセル数
const MAX_DIM: u32 = 16_384;

/// リモート画像1件あたりの取得タイムアウト
pub const ASSET_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ResvgRasterizer {
    client: reqwest::Client,
    fontdb: Arc<usvg::fontdb::Database>,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("cinestub/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| CineStubError::Export(format!("HTTP client error: {}", e)))
}

impl ResvgRasterizer {
    /// システムフォントを読み込んで生成
    pub fn new() -> Result<Self> {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "フォントを読み込み");
        Self::with_fontdb(Arc::new(db))
    }

    pub fn with_fontdb(fontdb: Arc<usvg::fontdb::Database>) -> Result<Self> {
        let client = build_client(ASSET_TIMEOUT)?;
        Ok(Self { client, fontdb })
    }

    /// リモート画像の取得タイムアウトを変更
    pub fn with_asset_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    async fn fetch_asset(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CineStubError::Export(format!("资源下载失败 {}: {}", url, e)))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CineStubError::Export(format!("资源下载失败 {}: {}", url, e)))?;

        let format = image::guess_format(&bytes)
            .map_err(|e| CineStubError::Export(format!("不支持的资源格式 {}: {}", url, e)))?;
        Ok(to_data_url(format.to_mime_type(), &bytes))
    }

    /// リモート画像の差し替え表を作る
    ///
    /// 値が None の画像は描画しない。
    async fn resolve_assets(
        &self,
        target: &CaptureTarget,
        options: &RasterOptions,
    ) -> Result<HashMap<String, Option<String>>> {
        self.resolve_urls(target.asset_urls(), options).await
    }

    async fn resolve_urls(
        &self,
        urls: Vec<String>,
        options: &RasterOptions,
    ) -> Result<HashMap<String, Option<String>>> {
        let mut assets = HashMap::new();

        for url in urls {
            if !options.use_cors {
                tracing::warn!(%url, "跨域资源未加载");
                assets.insert(url, None);
                continue;
            }

            match self.fetch_asset(&url).await {
                Ok(data_url) => {
                    assets.insert(url, Some(data_url));
                }
                Err(e) if options.allow_taint => {
                    tracing::warn!(error = %e, "资源加载失败，已跳过");
                    assets.insert(url, None);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(assets)
    }
}

/// 出力サイズを計算
pub(crate) fn raster_size(width: u32, height: u32, scale: f32) -> Result<(u32, u32)> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(CineStubError::Export(format!("无效的缩放比例: {}", scale)));
    }

    let w = ((width as f32) * scale).ceil().max(1.0) as u32;
    let h = ((height as f32) * scale).ceil().max(1.0) as u32;
    if w > MAX_DIM || h > MAX_DIM {
        return Err(CineStubError::Export(format!(
            "图片尺寸过大: {w}x{h} (最大 {MAX_DIM}x{MAX_DIM})"
        )));
    }
    Ok((w, h))
}

fn background(value: &str) -> Option<Color> {
    let Some((r, g, b, a)) = parse_hex_color(value) else {
        tracing::warn!(color = value, "背景色が不正なため透過で出力");
        return None;
    };
    Some(Color::from_rgba8(r, g, b, a))
}

fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let image = RgbaImage::from_raw(pixmap.width(), pixmap.height(), rgba)
        .ok_or_else(|| CineStubError::Export("像素缓冲区尺寸不匹配".into()))?;

    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| CineStubError::Export(format!("PNG 编码失败: {}", e)))?;
    Ok(buf)
}

#[async_trait]
impl Rasterizer for ResvgRasterizer {
    async fn rasterize(&self, target: &CaptureTarget, options: &RasterOptions) -> Result<RasterImage> {
        let (width, height) = raster_size(target.width(), target.height(), options.scale)?;

        let assets = self.resolve_assets(target, options).await?;
        let svg = target.to_svg(&assets);

        let opts = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts)
            .map_err(|e| CineStubError::Export(format!("SVG 解析失败: {}", e)))?;

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| CineStubError::Export("无法分配画布".into()))?;
        if let Some(color) = options.background_color.as_deref().and_then(background) {
            pixmap.fill(color);
        }

        let sx = width as f32 / tree.size().width();
        let sy = height as f32 / tree.size().height();
        resvg::render(&tree, Transform::from_scale(sx, sy), &mut pixmap.as_mut());

        let png = encode_png(&pixmap)?;
        Ok(RasterImage { width, height, png })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn rasterizer() -> ResvgRasterizer {
        ResvgRasterizer::with_fontdb(Arc::new(usvg::fontdb::Database::new())).unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let mut pixmap = Pixmap::new(4, 6).unwrap();
        pixmap.fill(Color::from_rgba8(0, 128, 255, 255));
        encode_png(&pixmap).unwrap()
    }

    fn options(use_cors: bool, allow_taint: bool) -> RasterOptions {
        RasterOptions {
            use_cors,
            allow_taint,
            ..Default::default()
        }
    }

    /// 1リクエストだけ応答するHTTPサーバー
    async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            // GET なのでヘッダーの終わりまで読めばよい
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let header = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(header.as_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
            stream.shutdown().await.ok();
        });

        format!("http://{}/poster.png", addr)
    }

    /// 接続は受け付けるが応答しないサーバー
    async fn serve_stalled() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        format!("http://{}/poster.png", addr)
    }

    #[test]
    fn test_raster_size() {
        assert_eq!(raster_size(375, 667, 3.0).unwrap(), (1125, 2001));
        assert_eq!(raster_size(375, 667, 0.5).unwrap(), (188, 334));
    }

    #[test]
    fn test_raster_size_invalid() {
        assert!(raster_size(375, 667, 0.0).is_err());
        assert!(raster_size(375, 667, f32::NAN).is_err());
        assert!(raster_size(375, 667, 100.0).is_err());
    }

    #[test]
    fn test_background_color() {
        assert!(background("#ffffff").is_some());
        assert!(background("white").is_none());
    }

    #[test]
    fn test_encode_png_keeps_fill() {
        let mut pixmap = Pixmap::new(2, 3).unwrap();
        pixmap.fill(Color::from_rgba8(255, 0, 0, 255));
        let png = encode_png(&pixmap).unwrap();

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 3));
        assert_eq!(decoded.get_pixel(1, 2).0, [255, 0, 0, 255]);
    }

    // =============================================
    // リモート画像の取得
    // =============================================

    #[tokio::test]
    async fn test_remote_asset_inlined_as_data_url() {
        let png = png_bytes();
        let url = serve_once("200 OK", png.clone()).await;

        let assets = rasterizer()
            .resolve_urls(vec![url.clone()], &options(true, false))
            .await
            .unwrap();
        assert_eq!(assets.get(&url), Some(&Some(to_data_url("image/png", &png))));
    }

    #[tokio::test]
    async fn test_missing_asset_skipped_when_taint_allowed() {
        let url = serve_once("404 Not Found", Vec::new()).await;

        let assets = rasterizer()
            .resolve_urls(vec![url.clone()], &options(true, true))
            .await
            .unwrap();
        assert_eq!(assets.get(&url), Some(&None));
    }

    #[tokio::test]
    async fn test_missing_asset_fails_when_taint_disallowed() {
        let url = serve_once("404 Not Found", Vec::new()).await;

        let result = rasterizer().resolve_urls(vec![url], &options(true, false)).await;
        assert!(matches!(result, Err(CineStubError::Export(_))));
    }

    #[tokio::test]
    async fn test_remote_asset_not_fetched_without_cors() {
        // 取得すると失敗するURLでも、取得しなければエラーにならない
        let url = "http://127.0.0.1:9/poster.png".to_string();
        let assets = rasterizer()
            .resolve_urls(vec![url.clone()], &options(false, false))
            .await
            .unwrap();
        assert_eq!(assets.get(&url), Some(&None));
    }

    #[tokio::test]
    async fn test_stalled_asset_times_out() {
        let url = serve_stalled().await;
        let rasterizer = rasterizer().with_asset_timeout(Duration::from_millis(200)).unwrap();

        let started = std::time::Instant::now();
        let skipped = rasterizer
            .resolve_urls(vec![url.clone()], &options(true, true))
            .await
            .unwrap();
        assert_eq!(skipped.get(&url), Some(&None));
        assert!(started.elapsed() < Duration::from_secs(10));

        let failed = rasterizer.resolve_urls(vec![url], &options(true, false)).await;
        assert!(matches!(failed, Err(CineStubError::Export(_))));
    }
}
