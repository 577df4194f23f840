use sqlx::{Pool, Postgres};

use crate::error::{AppError, AppResult};

use super::models::{Article, CreateArticleDto, UpdateArticleDto};

pub async fn create(pool: &Pool<Postgres>, dto: &CreateArticleDto) -> AppResult<Article> {
    let article = sqlx::query_as(
        r#"
        INSERT INTO articles (title, description, body, published, author_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&dto.title)
    .bind(&dto.description)
    .bind(&dto.body)
    .bind(dto.published)
    .bind(dto.author_id)
    .fetch_one(pool)
    .await?;
    Ok(article)
}

/// 已发布的文章
pub async fn find_published(pool: &Pool<Postgres>) -> AppResult<Vec<Article>> {
    let articles = sqlx::query_as("SELECT * FROM articles WHERE published = true ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(articles)
}

/// 未发布的草稿
pub async fn find_drafts(pool: &Pool<Postgres>) -> AppResult<Vec<Article>> {
    let articles = sqlx::query_as("SELECT * FROM articles WHERE published = false ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(articles)
}

pub async fn find_one(pool: &Pool<Postgres>, id: i64) -> AppResult<Article> {
    sqlx::query_as("SELECT * FROM articles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("文章"))
}

pub async fn update(pool: &Pool<Postgres>, id: i64, dto: &UpdateArticleDto) -> AppResult<Article> {
    sqlx::query_as(
        r#"
        UPDATE articles SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            body = COALESCE($4, body),
            published = COALESCE($5, published),
            author_id = COALESCE($6, author_id),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&dto.title)
    .bind(&dto.description)
    .bind(&dto.body)
    .bind(dto.published)
    .bind(dto.author_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("文章"))
}

pub async fn remove(pool: &Pool<Postgres>, id: i64) -> AppResult<Article> {
    sqlx::query_as("DELETE FROM articles WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("文章"))
}
