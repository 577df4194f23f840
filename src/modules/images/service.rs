use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use tracing::warn;

use crate::auth::extractor::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::storage::ObjectStorage;

use super::models::{
    CreateImageDto, CreatedByFilter, Creator, Image, ImagePage, ImagePageQuery, ImagePagination,
    ImageWithCreator, UpdateImageDto, DEFAULT_CATEGORY,
};

#[derive(FromRow)]
struct ImageRow {
    #[sqlx(flatten)]
    image: Image,
    creator_id: i64,
    creator_username: Option<String>,
    creator_avatar: String,
}

impl ImageRow {
    fn into_entry(self) -> ImageWithCreator {
        ImageWithCreator {
            image: self.image,
            created_by: Creator {
                id: self.creator_id,
                username: self.creator_username,
                avatar: self.creator_avatar,
            },
        }
    }
}

pub async fn create(
    state: &AppState,
    dto: &CreateImageDto,
    user_id: i64,
) -> AppResult<ImageWithCreator> {
    let location = encode_location(&dto.location)?;
    let category = dto
        .category
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let tags = dto.tags.clone().unwrap_or_default();

    let row: ImageRow = sqlx::query_as(
        r#"
        WITH inserted AS (
            INSERT INTO images (description, area, photos, location, stake_number, "offset", category, tags, created_by_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
        )
        SELECT i.*, u.id AS creator_id, u.username AS creator_username, u.avatar AS creator_avatar
        FROM inserted i
        JOIN users u ON u.id = i.created_by_id
        "#,
    )
    .bind(&dto.description)
    .bind(&dto.area)
    .bind(&dto.photos)
    .bind(&location)
    .bind(&dto.stake_number)
    .bind(dto.offset)
    .bind(&category)
    .bind(&tags)
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(row.into_entry())
}

/// 按条件分页，photos 中的对象路径换成 24 小时预签名链接
pub async fn find_all(state: &AppState, query: &ImagePageQuery) -> AppResult<ImagePage> {
    let tags = parse_tags(query.tags.as_deref());
    let created_by = parse_created_by(query.created_by.as_deref());
    let start = parse_date_param(query.start_date.as_deref());
    let end = parse_date_param(query.end_date.as_deref());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM images i
        JOIN users u ON u.id = i.created_by_id
        WHERE ($1::text IS NULL OR i.description ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR i.area ILIKE '%' || $2 || '%')
          AND ($3::text IS NULL OR i.category = $3)
          AND ($4::text IS NULL OR i.stake_number ILIKE '%' || $4 || '%')
          AND ($5::text[] IS NULL OR i.tags && $5)
          AND ($6::text IS NULL OR u.username ILIKE '%' || $6 || '%')
          AND ($7::timestamptz IS NULL OR i.created_at >= $7)
          AND ($8::timestamptz IS NULL OR i.created_at <= $8)
        "#,
    )
    .bind(&query.description)
    .bind(&query.area)
    .bind(&query.category)
    .bind(&query.stake_number)
    .bind(&tags)
    .bind(&created_by)
    .bind(start)
    .bind(end)
    .fetch_one(&state.pool)
    .await?;

    let page = crate::comm::pagination::PageQuery {
        current: query.current,
        page_size: query.page_size,
    };
    let rows: Vec<ImageRow> = sqlx::query_as(
        r#"
        SELECT i.*, u.id AS creator_id, u.username AS creator_username, u.avatar AS creator_avatar
        FROM images i
        JOIN users u ON u.id = i.created_by_id
        WHERE ($1::text IS NULL OR i.description ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR i.area ILIKE '%' || $2 || '%')
          AND ($3::text IS NULL OR i.category = $3)
          AND ($4::text IS NULL OR i.stake_number ILIKE '%' || $4 || '%')
          AND ($5::text[] IS NULL OR i.tags && $5)
          AND ($6::text IS NULL OR u.username ILIKE '%' || $6 || '%')
          AND ($7::timestamptz IS NULL OR i.created_at >= $7)
          AND ($8::timestamptz IS NULL OR i.created_at <= $8)
        ORDER BY i.created_at DESC
        LIMIT $9 OFFSET $10
        "#,
    )
    .bind(&query.description)
    .bind(&query.area)
    .bind(&query.category)
    .bind(&query.stake_number)
    .bind(&tags)
    .bind(&created_by)
    .bind(start)
    .bind(end)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    let data = rows
        .into_iter()
        .map(|row| {
            let mut entry = row.into_entry();
            entry.image.photos = presign_photos(&state.storage, entry.image.photos);
            entry
        })
        .collect();

    Ok(ImagePage {
        data,
        pagination: ImagePagination {
            current: query.current,
            page_size: query.page_size,
            total: total as u64,
        },
    })
}

pub async fn find_one(state: &AppState, id: i64, user: &AuthUser) -> AppResult<ImageWithCreator> {
    let row: Option<ImageRow> = sqlx::query_as(
        r#"
        SELECT i.*, u.id AS creator_id, u.username AS creator_username, u.avatar AS creator_avatar
        FROM images i
        JOIN users u ON u.id = i.created_by_id
        WHERE i.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;
    let mut entry = row
        .ok_or_else(|| AppError::not_found("图片"))?
        .into_entry();
    ensure_owner(entry.image.created_by_id, user, "访问")?;
    entry.image.photos = presign_photos(&state.storage, entry.image.photos);
    Ok(entry)
}

pub async fn update(
    state: &AppState,
    id: i64,
    dto: &UpdateImageDto,
    user: &AuthUser,
) -> AppResult<ImageWithCreator> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT created_by_id FROM images WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let owner = owner.ok_or_else(|| AppError::not_found("图片"))?;
    ensure_owner(owner, user, "更新")?;

    let location = encode_location(&dto.location)?;
    let thumbnails = dto.thumbnails.clone().map(sqlx::types::Json);
    let row: ImageRow = sqlx::query_as(
        r#"
        WITH updated AS (
            UPDATE images SET
                description = COALESCE($2, description),
                area = COALESCE($3, area),
                photos = COALESCE($4, photos),
                thumbnails = COALESCE($5, thumbnails),
                location = COALESCE($6, location),
                stake_number = COALESCE($7, stake_number),
                "offset" = COALESCE($8, "offset"),
                category = COALESCE($9, category),
                tags = COALESCE($10, tags),
                updated_at = now()
            WHERE id = $1
            RETURNING *
        )
        SELECT i.*, u.id AS creator_id, u.username AS creator_username, u.avatar AS creator_avatar
        FROM updated i
        JOIN users u ON u.id = i.created_by_id
        "#,
    )
    .bind(id)
    .bind(&dto.description)
    .bind(&dto.area)
    .bind(&dto.photos)
    .bind(&thumbnails)
    .bind(&location)
    .bind(&dto.stake_number)
    .bind(dto.offset)
    .bind(&dto.category)
    .bind(&dto.tags)
    .fetch_one(&state.pool)
    .await?;
    Ok(row.into_entry())
}

/// 删除记录前尽力清理存储中的对象，失败只告警
pub async fn remove(state: &AppState, id: i64, user: &AuthUser) -> AppResult<Image> {
    let image: Option<Image> = sqlx::query_as("SELECT * FROM images WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let image = image.ok_or_else(|| AppError::not_found("图片"))?;
    ensure_owner(image.created_by_id, user, "删除")?;

    for photo in &image.photos {
        let key = strip_cdn_prefix(photo, state.storage.cdn_url());
        if key.is_empty() {
            continue;
        }
        if let Err(e) = state.storage.delete(key).await {
            warn!(photo = %photo, error = %e, "删除图片文件失败");
        }
    }

    let deleted: Image = sqlx::query_as("DELETE FROM images WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    Ok(deleted)
}

fn ensure_owner(owner_id: i64, user: &AuthUser, action: &str) -> AppResult<()> {
    if user.is_admin || owner_id == user.id {
        Ok(())
    } else {
        Err(AppError::permission(format!("无权{}此图片", action)))
    }
}

fn encode_location(
    location: &Option<super::models::LocationDto>,
) -> AppResult<Option<String>> {
    location
        .as_ref()
        .map(|l| serde_json::to_string(l).map_err(|e| AppError::Internal(e.into())))
        .transpose()
}

/// 非 http(s) 的对象路径换成预签名链接
pub fn presign_photos(storage: &ObjectStorage, photos: Vec<String>) -> Vec<String> {
    photos
        .into_iter()
        .map(|photo| {
            if needs_presign(&photo) {
                storage.presigned_get_url(&photo)
            } else {
                photo
            }
        })
        .collect()
}

pub fn needs_presign(photo: &str) -> bool {
    !(photo.starts_with("http://") || photo.starts_with("https://"))
}

/// CDN 域名前缀剥掉后才是对象键
pub fn strip_cdn_prefix<'a>(photo: &'a str, cdn_url: &str) -> &'a str {
    if !cdn_url.is_empty() {
        if let Some(stripped) = photo.strip_prefix(cdn_url) {
            return stripped.trim_start_matches('/');
        }
    }
    photo
}

pub fn parse_tags(raw: Option<&str>) -> Option<Vec<String>> {
    let tags: Vec<String> = raw?
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}

pub fn parse_created_by(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    match serde_json::from_str::<CreatedByFilter>(raw) {
        Ok(filter) => filter.username.filter(|u| !u.is_empty()),
        Err(e) => {
            warn!(raw, error = %e, "createdBy 过滤参数解析失败");
            None
        }
    }
}

/// 接受 RFC3339 或 `YYYY-MM-DD`，无法解析时忽略该过滤条件
pub fn parse_date_param(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}
