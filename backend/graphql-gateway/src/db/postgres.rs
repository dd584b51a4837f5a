use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{Store, DUPLICATE_EMAIL, DUPLICATE_USERNAME};
use crate::error::{GatewayError, Result};
use crate::models::{
    Comment, Course, CoursePatch, NewCourse, NewUser, Page, PageContent, Question, Rating, Step,
    User, UserPatch,
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const USER_COLUMNS: &str = "id, first_name, last_name, username, email, password_hash, bio, \
                            notes, profile_image, role, last_login, created_at";
const PAGE_COLUMNS: &str = "id, course_id, position, kind, title, video_url, questions, steps";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    username: String,
    email: String,
    password_hash: String,
    bio: Option<String>,
    notes: Option<String>,
    profile_image: String,
    role: String,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = GatewayError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            bio: row.bio,
            notes: row.notes,
            profile_image: row.profile_image,
            role: row.role.parse()?,
            last_login: row.last_login,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct CourseRow {
    id: Uuid,
    title: String,
    description: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Course {
            id: row.id,
            title: row.title,
            description: row.description,
            image: row.image,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct PageRow {
    id: Uuid,
    course_id: Uuid,
    position: i32,
    kind: String,
    title: String,
    video_url: Option<String>,
    questions: Json<Vec<Question>>,
    steps: Json<Vec<Step>>,
}

impl TryFrom<PageRow> for Page {
    type Error = GatewayError;

    fn try_from(row: PageRow) -> Result<Self> {
        Ok(Page {
            id: row.id,
            course_id: row.course_id,
            position: row.position,
            kind: row.kind.parse()?,
            title: row.title,
            video_url: row.video_url,
            questions: row.questions.0,
            steps: row.steps.0,
        })
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    course_id: Uuid,
    user_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            course_id: row.course_id,
            user_id: row.user_id,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

/// Translate unique violations on the user table into `Conflict`
fn map_user_write_error(err: sqlx::Error) -> GatewayError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("users_email_key") => GatewayError::Conflict(DUPLICATE_EMAIL.to_string()),
                _ => GatewayError::Conflict(DUPLICATE_USERNAME.to_string()),
            };
        }
    }
    GatewayError::Database(err)
}

/// Foreign key violations mean a referenced row vanished mid-request
fn map_course_ref_error(err: sqlx::Error) -> GatewayError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return foreign_key_error(db_err.constraint());
        }
    }
    GatewayError::Database(err)
}

/// Map a violated `<table>_<column>_fkey` constraint to the missing entity
fn foreign_key_error(constraint: Option<&str>) -> GatewayError {
    match constraint {
        // Token outlived its account
        Some(name) if name.ends_with("_user_id_fkey") => GatewayError::Unauthenticated,
        Some(name) if name.ends_with("_page_id_fkey") => GatewayError::not_found("Page"),
        _ => GatewayError::not_found("Course"),
    }
}

fn rows_into<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = GatewayError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows_into(rows)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows_into(rows)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, first_name, last_name, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_write_error)?;
        row.try_into()
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET username      = COALESCE($2, username),
                password_hash = COALESCE($3, password_hash),
                bio           = COALESCE($4, bio),
                notes         = COALESCE($5, notes),
                profile_image = COALESCE($6, profile_image)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.username)
        .bind(patch.password_hash)
        .bind(patch.bio)
        .bind(patch.notes)
        .bind(patch.profile_image)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_user_write_error)?;
        row.map(User::try_from).transpose()
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn users_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE last_login IS NOT NULL AND last_login <= $1
            ORDER BY last_login ASC
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows_into(rows)
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(
            "SELECT id, title, description, image, created_at FROM courses ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>> {
        let row = sqlx::query_as::<_, CourseRow>(
            "SELECT id, title, description, image, created_at FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Course::from))
    }

    async fn create_course(&self, new: NewCourse) -> Result<Course> {
        let row = sqlx::query_as::<_, CourseRow>(
            r#"
            INSERT INTO courses (id, title, description, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, image, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.image)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_course(&self, id: Uuid, patch: CoursePatch) -> Result<Option<Course>> {
        let row = sqlx::query_as::<_, CourseRow>(
            r#"
            UPDATE courses
            SET title       = COALESCE($2, title),
                description = COALESCE($3, description),
                image       = COALESCE($4, image)
            WHERE id = $1
            RETURNING id, title, description, image, created_at
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.image)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Course::from))
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool> {
        // Pages, ratings, comments and progress rows go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_pages(&self, course_id: Uuid) -> Result<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE course_id = $1 ORDER BY position ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        rows_into(rows)
    }

    async fn find_page(&self, id: Uuid) -> Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Page::try_from).transpose()
    }

    async fn append_page(&self, course_id: Uuid, content: PageContent) -> Result<Page> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the course serialises concurrent appends
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
                .bind(course_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(GatewayError::not_found("Course"));
        }

        let position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM pages WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

        let page = Page::new(course_id, position, content);
        sqlx::query(
            r#"
            INSERT INTO pages (id, course_id, position, kind, title, video_url, questions, steps)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(page.id)
        .bind(page.course_id)
        .bind(page.position)
        .bind(page.kind.as_str())
        .bind(&page.title)
        .bind(&page.video_url)
        .bind(Json(&page.questions))
        .bind(Json(&page.steps))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(page)
    }

    async fn replace_page_content(&self, id: Uuid, content: PageContent) -> Result<Option<Page>> {
        let Some(mut page) = self.find_page(id).await? else {
            return Ok(None);
        };
        page.set_content(content);

        let result = sqlx::query(
            r#"
            UPDATE pages
            SET kind = $2, title = $3, video_url = $4, questions = $5, steps = $6
            WHERE id = $1
            "#,
        )
        .bind(page.id)
        .bind(page.kind.as_str())
        .bind(&page.title)
        .bind(&page.video_url)
        .bind(Json(&page.questions))
        .bind(Json(&page.steps))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(page))
    }

    async fn all_questions(&self) -> Result<Vec<Question>> {
        let rows: Vec<Json<Vec<Question>>> =
            sqlx::query_scalar("SELECT questions FROM pages WHERE kind = 'video'")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().flat_map(|q| q.0).collect())
    }

    async fn upsert_rating(&self, rating: Rating) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO course_ratings (course_id, user_id, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (course_id, user_id) DO UPDATE
            SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(rating.course_id)
        .bind(rating.user_id)
        .bind(rating.value)
        .execute(&self.pool)
        .await
        .map_err(map_course_ref_error)?;
        Ok(())
    }

    async fn list_ratings(&self, course_id: Uuid) -> Result<Vec<Rating>> {
        let rows: Vec<(Uuid, Uuid, i32)> = sqlx::query_as(
            "SELECT course_id, user_id, value FROM course_ratings WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(course_id, user_id, value)| Rating {
                course_id,
                user_id,
                value,
            })
            .collect())
    }

    async fn add_comment(&self, course_id: Uuid, user_id: Uuid, text: &str) -> Result<Comment> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO course_comments (id, course_id, user_id, text)
            VALUES ($1, $2, $3, $4)
            RETURNING id, course_id, user_id, text, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(user_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(map_course_ref_error)?;
        Ok(row.into())
    }

    async fn list_comments(&self, course_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, course_id, user_id, text, created_at
            FROM course_comments
            WHERE course_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn mark_page_complete(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        page_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_course_progress (user_id, course_id, page_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, course_id, page_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(page_id)
        .execute(&self.pool)
        .await
        .map_err(map_course_ref_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn completed_pages(&self, user_id: Uuid, course_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT page_id FROM user_course_progress
            WHERE user_id = $1 AND course_id = $2
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
