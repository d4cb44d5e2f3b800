// Story Store: stories, users, and the likes relation on SQLite via sqlx.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub duration: String,
    pub story: String,
    pub likes: i64,
    pub liked_by: Vec<i64>,
    pub creator_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub name: String,
    pub bio: String,
    pub profile_photo: String,
    pub work: String,
    pub gender: String,
    pub dob: String,
    pub liked_stories: Vec<i64>,
    pub created_at: String,
}

/// Fields of a story at publish time; counters start at zero.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub duration: String,
    pub story: String,
    pub creator_id: i64,
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub profile_photo: Option<String>,
    pub work: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
    pub story_id: i64,
    pub liked: bool,
    pub likes: i64,
}

// Rows carry the like set as a comma-separated `group_concat`.

#[derive(sqlx::FromRow)]
struct StoryRow {
    id: i64,
    title: String,
    author: String,
    genre: String,
    description: String,
    duration: String,
    story: String,
    likes: i64,
    liked_by: String,
    creator_id: Option<i64>,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    name: String,
    bio: String,
    profile_photo: String,
    work: String,
    gender: String,
    dob: String,
    liked_stories: String,
    created_at: String,
}

fn parse_id_list(list: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = list
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    ids.sort_unstable();
    ids
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Story {
            id: row.id,
            title: row.title,
            author: row.author,
            genre: row.genre,
            description: row.description,
            duration: row.duration,
            story: row.story,
            likes: row.likes,
            liked_by: parse_id_list(&row.liked_by),
            creator_id: row.creator_id,
            created_at: row.created_at,
        }
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            bio: row.bio,
            profile_photo: row.profile_photo,
            work: row.work,
            gender: row.gender,
            dob: row.dob,
            liked_stories: parse_id_list(&row.liked_stories),
            created_at: row.created_at,
        }
    }
}

const STORY_SELECT: &str = r#"
    SELECT s.id, s.title, s.author, s.genre, s.description, s.duration, s.story,
           s.likes, s.creator_id, s.created_at,
           COALESCE((SELECT group_concat(l.user_id) FROM story_likes l WHERE l.story_id = s.id), '') AS liked_by
    FROM stories s
"#;

const USER_SELECT: &str = r#"
    SELECT u.id, u.email, u.password_hash, u.name, u.bio, u.profile_photo, u.work,
           u.gender, u.dob, u.created_at,
           COALESCE((SELECT group_concat(l.story_id) FROM story_likes l WHERE l.user_id = u.id), '') AS liked_stories
    FROM users u
"#;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                bio TEXT NOT NULL DEFAULT '',
                profile_photo TEXT NOT NULL DEFAULT '',
                work TEXT NOT NULL DEFAULT '',
                gender TEXT NOT NULL DEFAULT '',
                dob TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL DEFAULT 'Untitled',
                author TEXT NOT NULL,
                genre TEXT NOT NULL,
                description TEXT NOT NULL,
                duration TEXT NOT NULL,
                story TEXT NOT NULL,
                likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
                creator_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_stories_creator ON stories(creator_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS story_likes (
                story_id INTEGER NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (story_id, user_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Users ─────────────────────────────────────────────────────────

    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
        bio: &str,
    ) -> Result<User, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, name, bio) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(bio)
        .fetch_one(&self.pool)
        .await?;

        self.get_user(id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("{USER_SELECT} WHERE u.id = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("{USER_SELECT} WHERE u.email = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    pub async fn update_user(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                bio = COALESCE(?, bio),
                profile_photo = COALESCE(?, profile_photo),
                work = COALESCE(?, work),
                gender = COALESCE(?, gender),
                dob = COALESCE(?, dob)
            WHERE id = ?
        "#,
        )
        .bind(update.name.as_deref())
        .bind(update.bio.as_deref())
        .bind(update.profile_photo.as_deref())
        .bind(update.work.as_deref())
        .bind(update.gender.as_deref())
        .bind(update.dob.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_user(id).await
    }

    // ── Stories ───────────────────────────────────────────────────────

    pub async fn create_story(&self, new: &NewStory) -> Result<Story, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO stories (title, author, genre, description, duration, story, creator_id) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&new.title)
        .bind(&new.author)
        .bind(&new.genre)
        .bind(&new.description)
        .bind(&new.duration)
        .bind(&new.story)
        .bind(new.creator_id)
        .fetch_one(&self.pool)
        .await?;

        self.get_story(id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_story(&self, id: i64) -> Result<Option<Story>, sqlx::Error> {
        let sql = format!("{STORY_SELECT} WHERE s.id = ?");
        let row = sqlx::query_as::<_, StoryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Story::from))
    }

    /// All stories in retrieval order (oldest first).
    pub async fn list_stories(&self) -> Result<Vec<Story>, sqlx::Error> {
        let sql = format!("{STORY_SELECT} ORDER BY s.id");
        let rows = sqlx::query_as::<_, StoryRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Story::from).collect())
    }

    pub async fn list_stories_by_creator(&self, creator_id: i64) -> Result<Vec<Story>, sqlx::Error> {
        let sql = format!("{STORY_SELECT} WHERE s.creator_id = ? ORDER BY s.id");
        let rows = sqlx::query_as::<_, StoryRow>(&sql)
            .bind(creator_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Story::from).collect())
    }

    /// Like rows cascade, so no user keeps a dangling entry in `likedStories`.
    pub async fn delete_story(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM stories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Likes ─────────────────────────────────────────────────────────

    /// Flip `user_id`'s like on `story_id` in a single transaction. The
    /// counter is recomputed from the relation so `likes == |likedBy|`.
    ///
    /// The first statement is a write, so the transaction takes SQLite's
    /// write lock before it reads anything and concurrent toggles queue on
    /// the busy timeout instead of failing a lock upgrade.
    pub async fn toggle_like(&self, story_id: i64, user_id: i64) -> Result<LikeOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query("UPDATE stories SET likes = likes WHERE id = ?")
            .bind(story_id)
            .execute(&mut *tx)
            .await?;
        if locked.rows_affected() == 0 {
            return Err(AppError::NotFound("Story"));
        }

        let user_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if user_exists.is_none() {
            return Err(AppError::NotFound("User"));
        }

        let already_liked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM story_likes WHERE story_id = ? AND user_id = ?",
        )
        .bind(story_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let liked = if already_liked > 0 {
            sqlx::query("DELETE FROM story_likes WHERE story_id = ? AND user_id = ?")
                .bind(story_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            false
        } else {
            sqlx::query("INSERT INTO story_likes (story_id, user_id) VALUES (?, ?)")
                .bind(story_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            true
        };

        let likes: i64 = sqlx::query_scalar(
            r#"
            UPDATE stories
            SET likes = (SELECT COUNT(*) FROM story_likes WHERE story_id = ?)
            WHERE id = ?
            RETURNING likes
        "#,
        )
        .bind(story_id)
        .bind(story_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(LikeOutcome {
            story_id,
            liked,
            likes,
        })
    }
}
