use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::portfolios::dto::CreatePortfolioRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub company: String,
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub school: String,
    pub degree: String,
    #[serde(default)]
    pub field: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub gpa: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub github_link: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub featured: bool,
}

/// Portfolio document. Sub-record lists ride in JSONB columns; skills in a
/// text array.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Portfolio {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub title: String,
    pub bio: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub website: String,
    pub linkedin: String,
    pub github: String,
    pub experience: Json<Vec<Experience>>,
    pub education: Json<Vec<Education>>,
    pub projects: Json<Vec<Project>>,
    pub skills: Vec<String>,
    pub template: String,
    pub is_public: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    req: CreatePortfolioRequest,
) -> sqlx::Result<Portfolio> {
    sqlx::query_as::<_, Portfolio>(
        r#"
        INSERT INTO portfolios
            (user_id, name, title, bio, email, phone, location, website,
             linkedin, github, experience, education, projects, skills, template)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&req.name)
    .bind(&req.title)
    .bind(&req.bio)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.location)
    .bind(&req.website)
    .bind(&req.linkedin)
    .bind(&req.github)
    .bind(Json(&req.experience))
    .bind(Json(&req.education))
    .bind(Json(&req.projects))
    .bind(&req.skills)
    .bind(&req.template)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Portfolio>> {
    sqlx::query_as::<_, Portfolio>(r#"SELECT * FROM portfolios WHERE id = $1"#)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<Portfolio>> {
    sqlx::query_as::<_, Portfolio>(
        r#"
        SELECT * FROM portfolios
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

/// Persist an already-merged portfolio row.
pub async fn update(db: &PgPool, portfolio: &Portfolio) -> sqlx::Result<Portfolio> {
    sqlx::query_as::<_, Portfolio>(
        r#"
        UPDATE portfolios
        SET name = $2, title = $3, bio = $4, email = $5, phone = $6,
            location = $7, website = $8, linkedin = $9, github = $10,
            experience = $11, education = $12, projects = $13, skills = $14,
            template = $15, is_public = $16, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(portfolio.id)
    .bind(&portfolio.name)
    .bind(&portfolio.title)
    .bind(&portfolio.bio)
    .bind(&portfolio.email)
    .bind(&portfolio.phone)
    .bind(&portfolio.location)
    .bind(&portfolio.website)
    .bind(&portfolio.linkedin)
    .bind(&portfolio.github)
    .bind(&portfolio.experience)
    .bind(&portfolio.education)
    .bind(&portfolio.projects)
    .bind(&portfolio.skills)
    .bind(&portfolio.template)
    .bind(portfolio.is_public)
    .fetch_one(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(r#"DELETE FROM portfolios WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_public(db: &PgPool, limit: i64, offset: i64) -> sqlx::Result<Vec<Portfolio>> {
    sqlx::query_as::<_, Portfolio>(
        r#"
        SELECT * FROM portfolios
        WHERE is_public
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

/// Case-insensitive substring match over name, title, bio and skills of
/// public portfolios, newest first.
pub async fn search(
    db: &PgPool,
    query: &str,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Portfolio>> {
    sqlx::query_as::<_, Portfolio>(
        r#"
        SELECT * FROM portfolios
        WHERE is_public
          AND (name ILIKE $1 OR title ILIKE $1 OR bio ILIKE $1
               OR array_to_string(skills, ' ') ILIKE $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(like_pattern(query))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

/// `%`/`_` in user input must match literally, not as wildcards.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("snake_case"), "%snake\\_case%");
        assert_eq!(like_pattern("back\\slash"), "%back\\\\slash%");
    }
}
