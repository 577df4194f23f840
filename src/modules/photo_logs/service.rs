use sqlx::FromRow;

use crate::auth::extractor::AuthUser;
use crate::error::{AppError, AppResult};
use crate::modules::images::models::Creator;
use crate::modules::images::service::presign_photos;
use crate::state::AppState;

use super::models::{
    CreatePhotoLogDto, PhotoLog, PhotoLogPage, PhotoLogPageQuery, PhotoLogPagination,
    PhotoLogWithCreator, UpdatePhotoLogDto,
};

#[derive(FromRow)]
struct PhotoLogRow {
    #[sqlx(flatten)]
    log: PhotoLog,
    creator_id: i64,
    creator_username: Option<String>,
    creator_avatar: String,
}

impl PhotoLogRow {
    fn into_entry(self) -> PhotoLogWithCreator {
        PhotoLogWithCreator {
            log: self.log,
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
    dto: &CreatePhotoLogDto,
    user_id: i64,
) -> AppResult<PhotoLogWithCreator> {
    let row: PhotoLogRow = sqlx::query_as(
        r#"
        WITH inserted AS (
            INSERT INTO photo_logs (description, area, photos, created_by_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        )
        SELECT l.*, u.id AS creator_id, u.username AS creator_username, u.avatar AS creator_avatar
        FROM inserted l
        JOIN users u ON u.id = l.created_by_id
        "#,
    )
    .bind(&dto.description)
    .bind(&dto.area)
    .bind(&dto.photos)
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(row.into_entry())
}

/// 简单分页，列表里的照片路径换成预签名链接
pub async fn find_all(state: &AppState, query: &PhotoLogPageQuery) -> AppResult<PhotoLogPage> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photo_logs")
        .fetch_one(&state.pool)
        .await?;

    let page = crate::comm::pagination::PageQuery {
        current: query.current,
        page_size: query.page_size,
    };
    let rows: Vec<PhotoLogRow> = sqlx::query_as(
        r#"
        SELECT l.*, u.id AS creator_id, u.username AS creator_username, u.avatar AS creator_avatar
        FROM photo_logs l
        JOIN users u ON u.id = l.created_by_id
        ORDER BY l.id
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.pool)
    .await?;

    let data = rows
        .into_iter()
        .map(|row| {
            let mut entry = row.into_entry();
            entry.log.photos = presign_photos(&state.storage, entry.log.photos);
            entry
        })
        .collect();

    Ok(PhotoLogPage {
        data,
        pagination: PhotoLogPagination {
            current: query.current,
            page_size: query.page_size,
            total: total as u64,
        },
    })
}

pub async fn find_one(state: &AppState, id: i64, user: &AuthUser) -> AppResult<PhotoLogWithCreator> {
    let row: Option<PhotoLogRow> = sqlx::query_as(
        r#"
        SELECT l.*, u.id AS creator_id, u.username AS creator_username, u.avatar AS creator_avatar
        FROM photo_logs l
        JOIN users u ON u.id = l.created_by_id
        WHERE l.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;
    let entry = row
        .ok_or_else(|| AppError::not_found("图文日志"))?
        .into_entry();
    ensure_owner(entry.log.created_by_id, user, "访问")?;
    Ok(entry)
}

pub async fn update(
    state: &AppState,
    id: i64,
    dto: &UpdatePhotoLogDto,
    user: &AuthUser,
) -> AppResult<PhotoLogWithCreator> {
    let owner: Option<i64> =
        sqlx::query_scalar("SELECT created_by_id FROM photo_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let owner = owner.ok_or_else(|| AppError::not_found("图文日志"))?;
    ensure_owner(owner, user, "更新")?;

    let row: PhotoLogRow = sqlx::query_as(
        r#"
        WITH updated AS (
            UPDATE photo_logs SET
                description = COALESCE($2, description),
                area = COALESCE($3, area),
                photos = COALESCE($4, photos),
                updated_at = now()
            WHERE id = $1
            RETURNING *
        )
        SELECT l.*, u.id AS creator_id, u.username AS creator_username, u.avatar AS creator_avatar
        FROM updated l
        JOIN users u ON u.id = l.created_by_id
        "#,
    )
    .bind(id)
    .bind(&dto.description)
    .bind(&dto.area)
    .bind(&dto.photos)
    .fetch_one(&state.pool)
    .await?;
    Ok(row.into_entry())
}

/// 删除记录，存储中的照片保留
pub async fn remove(state: &AppState, id: i64, user: &AuthUser) -> AppResult<PhotoLog> {
    let owner: Option<i64> =
        sqlx::query_scalar("SELECT created_by_id FROM photo_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let owner = owner.ok_or_else(|| AppError::not_found("图文日志"))?;
    ensure_owner(owner, user, "删除")?;

    let deleted: PhotoLog = sqlx::query_as("DELETE FROM photo_logs WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    Ok(deleted)
}

fn ensure_owner(owner_id: i64, user: &AuthUser, action: &str) -> AppResult<()> {
    if user.is_admin || owner_id == user.id {
        Ok(())
    } else {
        Err(AppError::permission(format!("无权{}此图文日志", action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, is_admin: bool) -> AuthUser {
        AuthUser {
            id,
            email: format!("u{}@example.com", id),
            username: None,
            is_admin,
        }
    }

    #[test]
    fn test_owner_check() {
        assert!(ensure_owner(5, &user(5, false), "更新").is_ok());
        assert!(ensure_owner(5, &user(9, true), "更新").is_ok());
        let err = ensure_owner(5, &user(9, false), "删除").unwrap_err();
        assert!(err.to_string().contains("无权删除此图文日志"));
    }
}
