//! Database connection management and question storage.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Transaction};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{GenerationRequest, Pagination, ParsedQuestion, QuestionPage, QuestionRecord};
use crate::{Config, Result};

const CREATE_QUESTIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS questions (
        id UUID PRIMARY KEY,
        topics JSONB NOT NULL,
        question_text TEXT NOT NULL,
        correct_answer TEXT NOT NULL,
        question_type TEXT NOT NULL,
        difficulty TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

const CREATE_CREATED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS questions_created_at_idx ON questions (created_at DESC)";

/// Create a database connection pool.
///
/// Connections are opened on first use, so the service starts even while the
/// database is down.
pub fn create_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.db_connect_timeout)
        .connect_lazy(&config.database_url())?;

    Ok(pool)
}

/// Persistence for generated questions.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Create the questions table if it does not exist yet.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert all questions of one request in a single transaction.
    async fn save_questions(
        &self,
        request: &GenerationRequest,
        questions: &[ParsedQuestion],
    ) -> Result<()>;

    /// Newest questions first. `page` is 1-based.
    async fn list_questions(&self, page: u32, per_page: u32) -> Result<QuestionPage>;
}

/// Postgres-backed [`QuestionStore`].
pub struct PgQuestionStore {
    pool: PgPool,
}

impl PgQuestionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionStore for PgQuestionStore {
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_QUESTIONS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_CREATED_AT_INDEX)
            .execute(&self.pool)
            .await?;
        info!("Questions table ready");
        Ok(())
    }

    async fn save_questions(
        &self,
        request: &GenerationRequest,
        questions: &[ParsedQuestion],
    ) -> Result<()> {
        if questions.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        if let Err(e) = insert_questions(&mut tx, request, questions).await {
            error!(error = %e, "Failed to save questions, rolling back");
            tx.rollback().await.ok();
            return Err(e);
        }

        tx.commit().await?;
        info!(count = questions.len(), "Saved questions");
        Ok(())
    }

    async fn list_questions(&self, page: u32, per_page: u32) -> Result<QuestionPage> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);

        let data: Vec<QuestionRecord> = sqlx::query_as(
            r#"
            SELECT id, topics, question_text, correct_answer,
                   question_type, difficulty, created_at
            FROM questions
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await?;

        Ok(QuestionPage {
            data,
            pagination: Pagination::new(page, per_page, total),
        })
    }
}

async fn insert_questions(
    tx: &mut Transaction<'_, Postgres>,
    request: &GenerationRequest,
    questions: &[ParsedQuestion],
) -> Result<()> {
    sqlx::query(CREATE_QUESTIONS_TABLE).execute(&mut **tx).await?;

    let mut insert = QueryBuilder::<Postgres>::new(
        "INSERT INTO questions (id, topics, question_text, correct_answer, question_type, difficulty) ",
    );
    insert.push_values(questions, |mut row, question| {
        row.push_bind(Uuid::new_v4())
            .push_bind(Json(request.topics.clone()))
            .push_bind(question.question_text.clone())
            .push_bind(question.answer_text.clone())
            .push_bind(request.question_type.clone())
            .push_bind(request.difficulty.clone());
    });

    insert.build().execute(&mut **tx).await?;
    Ok(())
}
