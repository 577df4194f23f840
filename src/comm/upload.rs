//! multipart 图片上传的解析与校验
//!
//! 图片与图文日志各有一个上传口，规则相同：单文件字段 `file`，
//! 只收常见图片类型，最大 5MB。

use actix_multipart::Multipart;
use futures_util::StreamExt as _;

use crate::error::{AppError, AppResult};

/// 允许的图片 MIME 类型
pub const ALLOWED_IMAGE_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// 上传大小上限（5MB）
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// 从 multipart 流里取出 `file` 字段并校验类型与大小
pub async fn read_image_field(mut payload: Multipart) -> AppResult<UploadedImage> {
    let mut uploaded: Option<UploadedImage> = None;

    while let Some(field) = payload.next().await {
        let mut field =
            field.map_err(|e| AppError::validation("file", format!("上传解析失败: {}", e)))?;
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_default();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("file")
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::validation("file", format!("上传解析失败: {}", e)))?;
            if bytes.len() + chunk.len() > MAX_FILE_SIZE {
                return Err(AppError::validation("file", "文件大小超过限制"));
            }
            bytes.extend_from_slice(&chunk);
        }
        uploaded = Some(UploadedImage {
            filename,
            content_type,
            bytes,
        });
    }

    let uploaded = uploaded.ok_or_else(|| AppError::validation("file", "未找到上传的文件"))?;
    check_image_type(&uploaded.content_type)?;
    Ok(uploaded)
}

pub fn check_image_type(content_type: &str) -> AppResult<()> {
    if ALLOWED_IMAGE_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(AppError::validation("file", "不支持的文件类型"))
    }
}
