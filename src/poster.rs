//! ポスター画像
//!
//! アップロードされたバイト列を検証し、プレビュー用のData URLと
//! 解析用の縮小画像を作る。

use crate::error::{CineStubError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;

/// デコード済みのポスター
#[derive(Debug, Clone)]
pub struct PosterImage {
    bytes: Vec<u8>,
    format: ImageFormat,
    image: DynamicImage,
}

/// 解析に送る画像
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPayload {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl PosterImage {
    /// バイト列から画像形式を判定してデコード
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes)
            .map_err(|e| CineStubError::ImageLoad(format!("不支持的图片格式: {}", e)))?;
        let image = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| CineStubError::ImageLoad(format!("图片解码失败: {}", e)))?;

        Ok(Self { bytes, format, image })
    }

    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CineStubError::FileNotFound(path.display().to_string()));
        }
        Self::decode(std::fs::read(path)?)
    }

    pub fn media_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 元のバイト列をそのまま埋め込んだData URL
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type(), STANDARD.encode(&self.bytes))
    }

    /// 解析用ペイロード
    ///
    /// 長辺が `max_size` を超える場合のみ縮小してJPEGで再エンコードする。
    pub fn analysis_payload(&self, max_size: u32) -> Result<AnalysisPayload> {
        let (width, height) = self.dimensions();
        if max_size == 0 || width.max(height) <= max_size {
            return Ok(AnalysisPayload {
                bytes: self.bytes.clone(),
                media_type: self.media_type().to_string(),
            });
        }

        let resized = self.image.resize(max_size, max_size, FilterType::Lanczos3);
        // JPEGはアルファを持てない
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

        let mut buf = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .map_err(|e| CineStubError::ImageLoad(format!("图片压缩失败: {}", e)))?;

        Ok(AnalysisPayload {
            bytes: buf,
            media_type: "image/jpeg".to_string(),
        })
    }
}

/// Data URLからBase64データ部分を抽出
///
/// # Arguments
/// * `data_url` - "data:image/jpeg;base64,/9j/4AAQ..." 形式のData URL
pub fn extract_base64_from_data_url(data_url: &str) -> Option<&str> {
    if !data_url.starts_with("data:") {
        return None;
    }
    data_url.split_once(',').map(|(_, data)| data)
}

/// Data URLからMIMEタイプを抽出（失敗時は "image/jpeg"）
pub fn extract_mime_type_from_data_url(data_url: &str) -> &str {
    data_url
        .strip_prefix("data:")
        .and_then(|s| s.split(';').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("image/jpeg")
}

/// 任意のバイト列をData URLにする
pub fn to_data_url(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Data URLをバイト列に戻す
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let data = extract_base64_from_data_url(data_url)
        .ok_or_else(|| CineStubError::ImageLoad("无效的 Data URL".into()))?;
    STANDARD
        .decode(data)
        .map_err(|e| CineStubError::ImageLoad(format!("Base64 解码失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    // =============================================
    // デコード
    // =============================================

    #[test]
    fn test_decode_png() {
        let poster = PosterImage::decode(png_bytes(4, 6)).unwrap();
        assert_eq!(poster.media_type(), "image/png");
        assert_eq!(poster.dimensions(), (4, 6));
        assert!(poster.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = PosterImage::decode(b"not an image".to_vec()).unwrap_err();
        assert!(matches!(err, CineStubError::ImageLoad(_)));
    }

    #[test]
    fn test_decode_truncated_png_fails() {
        let mut bytes = png_bytes(8, 8);
        bytes.truncate(20);
        assert!(PosterImage::decode(bytes).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let err = PosterImage::open(Path::new("/nonexistent/poster.png")).unwrap_err();
        assert!(matches!(err, CineStubError::FileNotFound(_)));
    }

    // =============================================
    // 解析用ペイロード
    // =============================================

    #[test]
    fn test_small_image_is_sent_as_is() {
        let bytes = png_bytes(10, 20);
        let poster = PosterImage::decode(bytes.clone()).unwrap();
        let payload = poster.analysis_payload(1568).unwrap();
        assert_eq!(payload.bytes, bytes);
        assert_eq!(payload.media_type, "image/png");
    }

    #[test]
    fn test_large_image_is_downscaled() {
        let poster = PosterImage::decode(png_bytes(300, 150)).unwrap();
        let payload = poster.analysis_payload(100).unwrap();
        assert_eq!(payload.media_type, "image/jpeg");

        let resized = image::load_from_memory(&payload.bytes).unwrap();
        assert_eq!(resized.dimensions(), (100, 50));
    }

    // =============================================
    // Data URL
    // =============================================

    #[test]
    fn test_extract_base64_from_data_url() {
        assert_eq!(extract_base64_from_data_url("data:image/png;base64,AAAA"), Some("AAAA"));
        assert_eq!(extract_base64_from_data_url("https://example.com/a,b"), None);
        assert_eq!(extract_base64_from_data_url("data:image/png;base64"), None);
    }

    #[test]
    fn test_extract_mime_type_from_data_url() {
        assert_eq!(extract_mime_type_from_data_url("data:image/webp;base64,AAAA"), "image/webp");
        assert_eq!(extract_mime_type_from_data_url("garbage"), "image/jpeg");
    }

    #[test]
    fn test_data_url_decode_matches_source() {
        let bytes = png_bytes(2, 2);
        let url = to_data_url("image/png", &bytes);
        assert_eq!(decode_data_url(&url).unwrap(), bytes);

        let poster = PosterImage::decode(bytes.clone()).unwrap();
        assert_eq!(poster.data_url(), url);
    }

    #[test]
    fn test_decode_data_url_invalid() {
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
        assert!(decode_data_url("no-comma").is_err());
    }
}
