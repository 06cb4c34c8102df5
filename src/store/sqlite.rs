use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::str::FromStr;

use super::{
    EdgeKind, NewPost, NewUser, PostPage, PostPatch, PostQuery, ProfilePatch, Store, StoreError,
    StoreResult,
};
use crate::db::models::{Category, Comment, Post, ReactionKind, TokenPurpose, TokenSlot, User};
use crate::db::{from_db_time, to_db_time};
use crate::state::DbPool;

const USER_COLUMNS: &str = "id, username, email, role, is_verified, account_level, bio, location, \
     gender, profile_picture, cover_image, last_login, created_at, updated_at, \
     password_reset_token_hash, password_reset_expires_at, \
     account_verification_token_hash, account_verification_expires_at";

const POST_COLUMNS: &str = "id, title, content, image, author_id, category_id, claps, shares, \
     scheduled_publish_at, is_blocked, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, description, author_id, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, content, author_id, post_id, created_at, updated_at";

/// SQLite implementation
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

// --- Row mapping ---

fn parse_column<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    from_db_time(&value)
}

fn optional_time_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(idx)?;
    value.as_deref().map(from_db_time).transpose()
}

fn token_slot_columns(row: &Row, hash_idx: usize, expires_idx: usize) -> rusqlite::Result<Option<TokenSlot>> {
    let hash: Option<String> = row.get(hash_idx)?;
    let expires_at = optional_time_column(row, expires_idx)?;
    Ok(match (hash, expires_at) {
        (Some(hash), Some(expires_at)) => Some(TokenSlot { hash, expires_at }),
        _ => None,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: parse_column(row, 3)?,
        is_verified: row.get(4)?,
        account_level: parse_column(row, 5)?,
        bio: row.get(6)?,
        location: row.get(7)?,
        gender: parse_column(row, 8)?,
        profile_picture: row.get(9)?,
        cover_image: row.get(10)?,
        last_login: optional_time_column(row, 11)?,
        created_at: time_column(row, 12)?,
        updated_at: time_column(row, 13)?,
        password_reset: token_slot_columns(row, 14, 15)?,
        account_verification: token_slot_columns(row, 16, 17)?,
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        image: row.get(3)?,
        author_id: row.get(4)?,
        category_id: row.get(5)?,
        claps: row.get(6)?,
        shares: row.get(7)?,
        scheduled_publish_at: optional_time_column(row, 8)?,
        is_blocked: row.get(9)?,
        likes: Vec::new(),
        dislikes: Vec::new(),
        viewers: Vec::new(),
        comments: Vec::new(),
        created_at: time_column(row, 10)?,
        updated_at: time_column(row, 11)?,
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        author_id: row.get(3)?,
        posts: Vec::new(),
        created_at: time_column(row, 4)?,
        updated_at: time_column(row, 5)?,
    })
}

fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        content: row.get(1)?,
        author_id: row.get(2)?,
        post_id: row.get(3)?,
        created_at: time_column(row, 4)?,
        updated_at: time_column(row, 5)?,
    })
}

// --- Query helpers ---

fn query_ids(conn: &Connection, sql: &str, key: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params![key], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Fill the reference sets of a post from its edge tables.
fn load_post_sets(conn: &Connection, post: &mut Post) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT user_id, kind FROM post_reactions WHERE post_id = ?1 ORDER BY created_at, user_id",
    )?;
    let reactions = stmt
        .query_map(params![post.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    post.likes.clear();
    post.dislikes.clear();
    for (user_id, kind) in reactions {
        if kind == ReactionKind::Like.as_str() {
            post.likes.push(user_id);
        } else {
            post.dislikes.push(user_id);
        }
    }

    post.viewers = query_ids(
        conn,
        "SELECT user_id FROM post_views WHERE post_id = ?1 ORDER BY created_at, user_id",
        &post.id,
    )?;
    post.comments = query_ids(
        conn,
        "SELECT id FROM comments WHERE post_id = ?1 ORDER BY created_at, id",
        &post.id,
    )?;
    Ok(())
}

fn fetch_user(conn: &Connection, column: &str, value: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column),
        params![value],
        user_from_row,
    )
    .optional()
}

fn fetch_post(conn: &Connection, column: &str, value: &str) -> rusqlite::Result<Option<Post>> {
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE {} = ?1", POST_COLUMNS, column),
            params![value],
            post_from_row,
        )
        .optional()?;

    match post {
        Some(mut post) => {
            load_post_sets(conn, &mut post)?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

fn fetch_category(conn: &Connection, column: &str, value: &str) -> rusqlite::Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!("SELECT {} FROM categories WHERE {} = ?1", CATEGORY_COLUMNS, column),
            params![value],
            category_from_row,
        )
        .optional()?;

    match category {
        Some(mut category) => {
            category.posts = query_ids(
                conn,
                "SELECT id FROM posts WHERE category_id = ?1 ORDER BY created_at, id",
                &category.id,
            )?;
            Ok(Some(category))
        }
        None => Ok(None),
    }
}

fn fetch_comment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Comment>> {
    conn.query_row(
        &format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS),
        params![id],
        comment_from_row,
    )
    .optional()
}

fn token_columns(purpose: TokenPurpose) -> (&'static str, &'static str) {
    match purpose {
        TokenPurpose::PasswordReset => ("password_reset_token_hash", "password_reset_expires_at"),
        TokenPurpose::AccountVerification => (
            "account_verification_token_hash",
            "account_verification_expires_at",
        ),
    }
}

fn edge_columns(kind: EdgeKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        EdgeKind::Follow => ("follows", "follower_id", "followee_id"),
        EdgeKind::Block => ("blocks", "blocker_id", "blocked_id"),
        EdgeKind::ProfileView => ("profile_views", "viewer_id", "owner_id"),
    }
}

/// Uniqueness violations become conflicts; everything else stays a SQL error.
fn map_write_error(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, Some(detail)) = &err {
        if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return StoreError::Conflict(conflict_message(detail).to_string());
        }
    }
    StoreError::Sql(err)
}

fn conflict_message(detail: &str) -> &'static str {
    if detail.contains("users.username") {
        "Username is already taken. Please choose a different one."
    } else if detail.contains("users.email") {
        "Email is already registered."
    } else if detail.contains("posts.title") {
        "A post with this title already exists."
    } else if detail.contains("categories.name") {
        "Category already exists."
    } else {
        "Resource already exists."
    }
}

fn missing_row() -> StoreError {
    StoreError::Sql(rusqlite::Error::QueryReturnedNoRows)
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        let now = to_db_time(&now);

        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id,
                user.username,
                user.email,
                user.password_hash,
                user.role.as_str(),
                now
            ],
        )
        .map_err(map_write_error)?;

        fetch_user(&conn, "id", &id)?.ok_or_else(missing_row)
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        let conn = self.pool.get()?;
        Ok(fetch_user(&conn, "id", id)?)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let conn = self.pool.get()?;
        Ok(fetch_user(&conn, "username", username)?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.pool.get()?;
        Ok(fetch_user(&conn, "email", email)?)
    }

    async fn find_credential(&self, username: &str) -> StoreResult<Option<(User, String)>> {
        let conn = self.pool.get()?;
        let credential = conn
            .query_row(
                &format!(
                    "SELECT {}, password_hash FROM users WHERE username = ?1",
                    USER_COLUMNS
                ),
                params![username],
                |row| Ok((user_from_row(row)?, row.get::<_, String>(18)?)),
            )
            .optional()?;
        Ok(credential)
    }

    async fn update_profile(
        &self,
        id: &str,
        patch: ProfilePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE users SET
                   username = COALESCE(?2, username),
                   email = COALESCE(?3, email),
                   bio = COALESCE(?4, bio),
                   location = COALESCE(?5, location),
                   gender = COALESCE(?6, gender),
                   profile_picture = COALESCE(?7, profile_picture),
                   cover_image = COALESCE(?8, cover_image),
                   updated_at = ?9
                 WHERE id = ?1",
                params![
                    id,
                    patch.username,
                    patch.email,
                    patch.bio,
                    patch.location,
                    patch.gender.map(|g| g.as_str()),
                    patch.profile_picture,
                    patch.cover_image,
                    to_db_time(&now)
                ],
            )
            .map_err(map_write_error)?;

        if rows == 0 {
            return Ok(None);
        }
        Ok(fetch_user(&conn, "id", id)?)
    }

    async fn set_password_hash(&self, id: &str, hash: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, hash, to_db_time(&now)],
        )?;
        Ok(rows > 0)
    }

    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET last_login = ?2 WHERE id = ?1",
            params![id, to_db_time(&at)],
        )?;
        Ok(())
    }

    async fn set_verified(&self, id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE users SET is_verified = 1, updated_at = ?2 WHERE id = ?1",
            params![id, to_db_time(&now)],
        )?;
        Ok(rows > 0)
    }

    async fn save_token(
        &self,
        id: &str,
        purpose: TokenPurpose,
        slot: Option<&TokenSlot>,
    ) -> StoreResult<()> {
        let conn = self.pool.get()?;
        let (hash_col, expires_col) = token_columns(purpose);
        conn.execute(
            &format!(
                "UPDATE users SET {} = ?2, {} = ?3 WHERE id = ?1",
                hash_col, expires_col
            ),
            params![
                id,
                slot.map(|s| s.hash.as_str()),
                slot.map(|s| to_db_time(&s.expires_at))
            ],
        )?;
        Ok(())
    }

    async fn find_user_by_token(&self, purpose: TokenPurpose, hash: &str) -> StoreResult<Option<User>> {
        let conn = self.pool.get()?;
        let (hash_col, _) = token_columns(purpose);
        Ok(fetch_user(&conn, hash_col, hash)?)
    }

    async fn clear_token(&self, id: &str, purpose: TokenPurpose, hash: &str) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        let (hash_col, expires_col) = token_columns(purpose);
        let rows = conn.execute(
            &format!(
                "UPDATE users SET {hash} = NULL, {expires} = NULL WHERE id = ?1 AND {hash} = ?2",
                hash = hash_col,
                expires = expires_col
            ),
            params![id, hash],
        )?;
        Ok(rows > 0)
    }

    async fn add_edge(&self, kind: EdgeKind, from: &str, to: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        let (table, from_col, to_col) = edge_columns(kind);
        let rows = conn.execute(
            &format!(
                "INSERT INTO {table} ({from_col}, {to_col}, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT DO NOTHING",
                table = table,
                from_col = from_col,
                to_col = to_col
            ),
            params![from, to, to_db_time(&now)],
        )?;
        Ok(rows > 0)
    }

    async fn remove_edge(&self, kind: EdgeKind, from: &str, to: &str) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        let (table, from_col, to_col) = edge_columns(kind);
        let rows = conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                table, from_col, to_col
            ),
            params![from, to],
        )?;
        Ok(rows > 0)
    }

    async fn has_edge(&self, kind: EdgeKind, from: &str, to: &str) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        let (table, from_col, to_col) = edge_columns(kind);
        let exists: bool = conn.query_row(
            &format!(
                "SELECT COUNT(*) > 0 FROM {} WHERE {} = ?1 AND {} = ?2",
                table, from_col, to_col
            ),
            params![from, to],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn edges_from(&self, kind: EdgeKind, from: &str) -> StoreResult<Vec<String>> {
        let conn = self.pool.get()?;
        let (table, from_col, to_col) = edge_columns(kind);
        Ok(query_ids(
            &conn,
            &format!(
                "SELECT {to_col} FROM {table} WHERE {from_col} = ?1 ORDER BY created_at, {to_col}",
                table = table,
                from_col = from_col,
                to_col = to_col
            ),
            from,
        )?)
    }

    async fn edges_to(&self, kind: EdgeKind, to: &str) -> StoreResult<Vec<String>> {
        let conn = self.pool.get()?;
        let (table, from_col, to_col) = edge_columns(kind);
        Ok(query_ids(
            &conn,
            &format!(
                "SELECT {from_col} FROM {table} WHERE {to_col} = ?1 ORDER BY created_at, {from_col}",
                table = table,
                from_col = from_col,
                to_col = to_col
            ),
            to,
        )?)
    }

    async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        author_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Category> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO categories (id, name, description, author_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, name, description, author_id, to_db_time(&now)],
        )
        .map_err(map_write_error)?;

        fetch_category(&conn, "id", &id)?.ok_or_else(missing_row)
    }

    async fn find_category(&self, id: &str) -> StoreResult<Option<Category>> {
        let conn = self.pool.get()?;
        Ok(fetch_category(&conn, "id", id)?)
    }

    async fn find_category_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        let conn = self.pool.get()?;
        Ok(fetch_category(&conn, "name", name)?)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM categories ORDER BY name",
            CATEGORY_COLUMNS
        ))?;
        let mut categories = stmt
            .query_map([], category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for category in categories.iter_mut() {
            category.posts = query_ids(
                &conn,
                "SELECT id FROM posts WHERE category_id = ?1 ORDER BY created_at, id",
                &category.id,
            )?;
        }
        Ok(categories)
    }

    async fn update_category(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Category>> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE categories SET
                   name = COALESCE(?2, name),
                   description = COALESCE(?3, description),
                   updated_at = ?4
                 WHERE id = ?1",
                params![id, name, description, to_db_time(&now)],
            )
            .map_err(map_write_error)?;

        if rows == 0 {
            return Ok(None);
        }
        Ok(fetch_category(&conn, "id", id)?)
    }

    async fn delete_category(&self, id: &str) -> StoreResult<Option<Category>> {
        let conn = self.pool.get()?;
        let Some(category) = fetch_category(&conn, "id", id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        Ok(Some(category))
    }

    async fn create_post(&self, post: NewPost, now: DateTime<Utc>) -> StoreResult<Post> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO posts (id, title, content, image, author_id, category_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                post.title,
                post.content,
                post.image,
                post.author_id,
                post.category_id,
                to_db_time(&now)
            ],
        )
        .map_err(map_write_error)?;

        fetch_post(&conn, "id", &id)?.ok_or_else(missing_row)
    }

    async fn find_post(&self, id: &str) -> StoreResult<Option<Post>> {
        let conn = self.pool.get()?;
        Ok(fetch_post(&conn, "id", id)?)
    }

    async fn find_post_by_title(&self, title: &str) -> StoreResult<Option<Post>> {
        let conn = self.pool.get()?;
        Ok(fetch_post(&conn, "title", title)?)
    }

    async fn update_post(&self, id: &str, patch: PostPatch, now: DateTime<Utc>) -> StoreResult<Option<Post>> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE posts SET
                   title = COALESCE(?2, title),
                   content = COALESCE(?3, content),
                   image = COALESCE(?4, image),
                   category_id = COALESCE(?5, category_id),
                   updated_at = ?6
                 WHERE id = ?1",
                params![
                    id,
                    patch.title,
                    patch.content,
                    patch.image,
                    patch.category_id,
                    to_db_time(&now)
                ],
            )
            .map_err(map_write_error)?;

        if rows == 0 {
            return Ok(None);
        }
        Ok(fetch_post(&conn, "id", id)?)
    }

    async fn delete_post(&self, id: &str) -> StoreResult<Option<Post>> {
        let conn = self.pool.get()?;
        let Some(post) = fetch_post(&conn, "id", id)? else {
            return Ok(None);
        };
        // reactions, views and comments cascade
        conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(Some(post))
    }

    async fn set_schedule(
        &self,
        id: &str,
        publish_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE posts SET scheduled_publish_at = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, publish_at.as_ref().map(to_db_time), to_db_time(&now)],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        Ok(fetch_post(&conn, "id", id)?)
    }

    async fn query_posts(&self, query: &PostQuery) -> StoreResult<PostPage> {
        let conn = self.pool.get()?;

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !query.excluded_authors.is_empty() {
            let placeholders = vec!["?"; query.excluded_authors.len()].join(", ");
            clauses.push(format!("author_id NOT IN ({})", placeholders));
            values.extend(query.excluded_authors.iter().cloned().map(Value::Text));
        }
        if let Some(author_id) = &query.author_id {
            clauses.push("author_id = ?".to_string());
            values.push(Value::Text(author_id.clone()));
        }
        if let Some(category_id) = &query.category_id {
            clauses.push("category_id = ?".to_string());
            values.push(Value::Text(category_id.clone()));
        }
        if let Some(term) = &query.search_term {
            clauses.push("instr(lower(title), lower(?)) > 0".to_string());
            values.push(Value::Text(term.clone()));
        }
        if let Some(at) = &query.published_at {
            clauses.push("(scheduled_publish_at IS NULL OR scheduled_publish_at <= ?)".to_string());
            values.push(Value::Text(to_db_time(at)));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM posts{}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let total = u64::try_from(total).unwrap_or_default();
        let (Ok(limit), Ok(offset)) = (i64::try_from(query.limit), i64::try_from(query.offset)) else {
            return Ok(PostPage {
                posts: Vec::new(),
                total,
            });
        };
        values.push(Value::Integer(limit));
        values.push(Value::Integer(offset));

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS, where_sql
        ))?;
        let mut posts = stmt
            .query_map(params_from_iter(values.iter()), post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for post in posts.iter_mut() {
            load_post_sets(&conn, post)?;
        }

        Ok(PostPage { posts, total })
    }

    async fn post_ids_by_author(&self, author_id: &str) -> StoreResult<Vec<String>> {
        let conn = self.pool.get()?;
        Ok(query_ids(
            &conn,
            "SELECT id FROM posts WHERE author_id = ?1 ORDER BY created_at, id",
            author_id,
        )?)
    }

    async fn set_reaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: ReactionKind,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO post_reactions (post_id, user_id, kind, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(post_id, user_id) DO UPDATE SET
               kind = excluded.kind,
               created_at = excluded.created_at
             WHERE post_reactions.kind <> excluded.kind",
            params![post_id, user_id, kind.as_str(), to_db_time(&now)],
        )?;
        Ok(())
    }

    async fn increment_claps(&self, post_id: &str) -> StoreResult<Option<i64>> {
        let conn = self.pool.get()?;
        let claps = conn
            .query_row(
                "UPDATE posts SET claps = claps + 1 WHERE id = ?1 RETURNING claps",
                params![post_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(claps)
    }

    async fn add_post_view(&self, post_id: &str, user_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "INSERT INTO post_views (post_id, user_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT DO NOTHING",
            params![post_id, user_id, to_db_time(&now)],
        )?;
        Ok(rows > 0)
    }

    async fn create_comment(
        &self,
        content: &str,
        author_id: &str,
        post_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Comment> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO comments (id, content, author_id, post_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, content, author_id, post_id, to_db_time(&now)],
        )?;
        fetch_comment(&conn, &id)?.ok_or_else(missing_row)
    }

    async fn find_comment(&self, id: &str) -> StoreResult<Option<Comment>> {
        let conn = self.pool.get()?;
        Ok(fetch_comment(&conn, id)?)
    }

    async fn update_comment(&self, id: &str, content: &str, now: DateTime<Utc>) -> StoreResult<Option<Comment>> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, content, to_db_time(&now)],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        Ok(fetch_comment(&conn, id)?)
    }

    async fn delete_comment(&self, id: &str) -> StoreResult<Option<Comment>> {
        let conn = self.pool.get()?;
        let Some(comment) = fetch_comment(&conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(Some(comment))
    }

    async fn list_comments(&self, post_id: &str) -> StoreResult<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM comments WHERE post_id = ?1 ORDER BY created_at, id",
            COMMENT_COLUMNS
        ))?;
        let comments = stmt
            .query_map(params![post_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::Role;
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = db::create_pool(&db_path).unwrap();
        db::run_migrations(&pool).unwrap();

        (SqliteStore::new(pool), temp_dir)
    }

    async fn user(store: &SqliteStore, name: &str) -> User {
        store
            .create_user(
                NewUser {
                    username: name.to_string(),
                    email: Some(format!("{}@x.com", name)),
                    password_hash: "hash".to_string(),
                    role: Role::User,
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    async fn post(store: &SqliteStore, author: &User, category: &Category, title: &str, at: DateTime<Utc>) -> Post {
        store
            .create_post(
                NewPost {
                    title: title.to_string(),
                    content: "some content here".to_string(),
                    image: None,
                    author_id: author.id.clone(),
                    category_id: category.id.clone(),
                },
                at,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let (store, _temp) = create_test_store();
        let alice = user(&store, "alice").await;

        let found = store.find_user(&alice.id).await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
        assert!(!found.is_verified);

        let by_name = store.find_user_by_username("alice").await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(alice.id.clone()));

        let (_, hash) = store.find_credential("alice").await.unwrap().unwrap();
        assert_eq!(hash, "hash");
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let (store, _temp) = create_test_store();
        user(&store, "alice").await;

        let result = store
            .create_user(
                NewUser {
                    username: "alice".to_string(),
                    email: Some("other@x.com".to_string()),
                    password_hash: "hash".to_string(),
                    role: Role::User,
                },
                Utc::now(),
            )
            .await;

        match result {
            Err(StoreError::Conflict(msg)) => assert!(msg.contains("Username")),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_edges_have_set_semantics() {
        let (store, _temp) = create_test_store();
        let a = user(&store, "alice").await;
        let b = user(&store, "bob").await;
        let now = Utc::now();

        assert!(store.add_edge(EdgeKind::Follow, &a.id, &b.id, now).await.unwrap());
        assert!(!store.add_edge(EdgeKind::Follow, &a.id, &b.id, now).await.unwrap());

        assert_eq!(store.edges_from(EdgeKind::Follow, &a.id).await.unwrap(), vec![b.id.clone()]);
        assert_eq!(store.edges_to(EdgeKind::Follow, &b.id).await.unwrap(), vec![a.id.clone()]);
        assert!(store.edges_to(EdgeKind::Follow, &a.id).await.unwrap().is_empty());

        assert!(store.remove_edge(EdgeKind::Follow, &a.id, &b.id).await.unwrap());
        assert!(!store.remove_edge(EdgeKind::Follow, &a.id, &b.id).await.unwrap());
        assert!(!store.has_edge(EdgeKind::Follow, &a.id, &b.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reaction_replaces_opposite_kind() {
        let (store, _temp) = create_test_store();
        let a = user(&store, "alice").await;
        let cat = store.create_category("tech", None, &a.id, Utc::now()).await.unwrap();
        let p = post(&store, &a, &cat, "Hello", Utc::now()).await;

        store.set_reaction(&p.id, &a.id, ReactionKind::Like, Utc::now()).await.unwrap();
        let loaded = store.find_post(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.likes, vec![a.id.clone()]);
        assert!(loaded.dislikes.is_empty());

        store.set_reaction(&p.id, &a.id, ReactionKind::Dislike, Utc::now()).await.unwrap();
        let loaded = store.find_post(&p.id).await.unwrap().unwrap();
        assert!(loaded.likes.is_empty());
        assert_eq!(loaded.dislikes, vec![a.id.clone()]);
    }

    #[tokio::test]
    async fn test_query_posts_filters_and_windows() {
        let (store, _temp) = create_test_store();
        let a = user(&store, "alice").await;
        let b = user(&store, "bob").await;
        let cat = store.create_category("tech", None, &a.id, Utc::now()).await.unwrap();
        let other = store.create_category("food", None, &a.id, Utc::now()).await.unwrap();
        let base = Utc::now();

        post(&store, &a, &cat, "Rust tips", base).await;
        post(&store, &a, &other, "Pasta night", base + Duration::seconds(1)).await;
        post(&store, &b, &cat, "More RUST", base + Duration::seconds(2)).await;

        let page = store
            .query_posts(&PostQuery {
                search_term: Some("rust".into()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.posts[0].title, "More RUST");

        let page = store
            .query_posts(&PostQuery {
                excluded_authors: vec![b.id.clone()],
                category_id: Some(cat.id.clone()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.posts[0].title, "Rust tips");

        let page = store
            .query_posts(&PostQuery {
                offset: 2,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].title, "Rust tips");

        let page = store
            .query_posts(&PostQuery {
                offset: u64::MAX,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.posts.is_empty());
    }

    #[tokio::test]
    async fn test_clear_token_is_conditional() {
        let (store, _temp) = create_test_store();
        let a = user(&store, "alice").await;
        let slot = TokenSlot {
            hash: "abc".into(),
            expires_at: Utc::now() + Duration::minutes(10),
        };

        store.save_token(&a.id, TokenPurpose::PasswordReset, Some(&slot)).await.unwrap();
        let found = store
            .find_user_by_token(TokenPurpose::PasswordReset, "abc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.password_reset.as_ref().map(|s| s.hash.as_str()), Some("abc"));
        assert!(store
            .find_user_by_token(TokenPurpose::AccountVerification, "abc")
            .await
            .unwrap()
            .is_none());

        assert!(store.clear_token(&a.id, TokenPurpose::PasswordReset, "abc").await.unwrap());
        assert!(!store.clear_token(&a.id, TokenPurpose::PasswordReset, "abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_post_cascades() {
        let (store, _temp) = create_test_store();
        let a = user(&store, "alice").await;
        let cat = store.create_category("tech", None, &a.id, Utc::now()).await.unwrap();
        let p = post(&store, &a, &cat, "Hello", Utc::now()).await;
        store.create_comment("nice", &a.id, &p.id, Utc::now()).await.unwrap();
        store.add_post_view(&p.id, &a.id, Utc::now()).await.unwrap();

        let deleted = store.delete_post(&p.id).await.unwrap().unwrap();
        assert_eq!(deleted.comments.len(), 1);
        assert!(store.list_comments(&p.id).await.unwrap().is_empty());

        let conn = store.pool().get().unwrap();
        let views: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_views", [], |row| row.get(0))
            .unwrap();
        assert_eq!(views, 0);
    }

    #[tokio::test]
    async fn test_delete_category_detaches_posts() {
        let (store, _temp) = create_test_store();
        let a = user(&store, "alice").await;
        let cat = store.create_category("tech", None, &a.id, Utc::now()).await.unwrap();
        let p = post(&store, &a, &cat, "Hello", Utc::now()).await;

        let deleted = store.delete_category(&cat.id).await.unwrap().unwrap();
        assert_eq!(deleted.posts, vec![p.id.clone()]);

        let loaded = store.find_post(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.category_id, None);
    }
}
