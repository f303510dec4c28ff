use std::collections::HashMap;

use qbank_core::model::{
    BankId, Difficulty, OptionId, Question, QuestionId, QuestionOption, ValidatedQuestion,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{bank_id, conn, from_json, i64_to_u64, id_i64, question_id, ser, to_json};
use crate::repository::{Page, QuestionQuery, QuestionRepository, StorageError};

const QUESTION_COLUMNS: &str = r"
    id, bank_id, text, correct_answer, explanation, subject, system,
    difficulty, tags, images, created_at
";

fn map_question_row(
    row: &SqliteRow,
    options: Vec<QuestionOption>,
) -> Result<Question, StorageError> {
    let difficulty: String = row.try_get("difficulty").map_err(ser)?;
    let tags: String = row.try_get("tags").map_err(ser)?;
    let images: String = row.try_get("images").map_err(ser)?;

    Ok(Question {
        id: question_id(row, "id")?,
        bank_id: bank_id(row, "bank_id")?,
        text: row.try_get("text").map_err(ser)?,
        options,
        correct_answer: OptionId::new(row.try_get::<String, _>("correct_answer").map_err(ser)?)
            .map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
        subject: row.try_get("subject").map_err(ser)?,
        system: row.try_get("system").map_err(ser)?,
        difficulty: difficulty.parse::<Difficulty>().map_err(ser)?,
        tags: from_json(&tags)?,
        images: from_json(&images)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

impl SqliteRepository {
    /// Options for each of `ids`, in presentation order.
    async fn load_options(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, Vec<QuestionOption>>, StorageError> {
        let mut by_question: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
        if ids.is_empty() {
            return Ok(by_question);
        }

        let mut sql = String::from(
            r"
            SELECT question_id, option_id, letter, text
            FROM question_options
            WHERE question_id IN (
            ",
        );
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(")\nORDER BY question_id ASC, position ASC");

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(*id);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;

        for row in rows {
            let owner: i64 = row.try_get("question_id").map_err(ser)?;
            by_question.entry(owner).or_default().push(QuestionOption {
                id: OptionId::new(row.try_get::<String, _>("option_id").map_err(ser)?)
                    .map_err(ser)?,
                letter: row.try_get("letter").map_err(ser)?,
                text: row.try_get("text").map_err(ser)?,
            });
        }
        Ok(by_question)
    }

    async fn assemble(&self, rows: Vec<SqliteRow>) -> Result<Vec<Question>, StorageError> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(ser))
            .collect::<Result<Vec<_>, _>>()?;
        let mut options = self.load_options(&ids).await?;

        let mut out = Vec::with_capacity(rows.len());
        for (row, id) in rows.iter().zip(ids) {
            let opts = options.remove(&id).unwrap_or_default();
            out.push(map_question_row(row, opts)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_question(&self, question: &ValidatedQuestion) -> Result<Question, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO questions (
                bank_id, text, correct_answer, explanation, subject, system,
                difficulty, tags, images, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(id_i64("bank_id", question.bank_id.value())?)
        .bind(&question.text)
        .bind(question.correct_answer.as_str())
        .bind(&question.explanation)
        .bind(&question.subject)
        .bind(&question.system)
        .bind(question.difficulty.as_str())
        .bind(to_json(&question.tags)?)
        .bind(to_json(&question.images)?)
        .bind(question.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;
        let id = res.last_insert_rowid();

        for (position, option) in question.options.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO question_options (question_id, position, option_id, letter, text)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(id)
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(option.id.as_str())
            .bind(&option.letter)
            .bind(&option.text)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(question
            .clone()
            .assign_id(QuestionId::new(i64_to_u64("id", id)?)))
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("question_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_questions(&self, query: &QuestionQuery) -> Result<Page<Question>, StorageError> {
        let mut filter = String::from(" WHERE 1 = 1");
        let mut bind_index = 1;
        if query.bank_id.is_some() {
            filter.push_str(&format!(" AND bank_id = ?{bind_index}"));
            bind_index += 1;
        }
        if query.review_for.is_some() {
            filter.push_str(&format!(
                " AND id IN (
                    SELECT question_id FROM user_answers
                    WHERE user_id = ?{bind_index} AND (is_correct = 0 OR is_flagged = 1)
                )"
            ));
            bind_index += 1;
        }

        let bank = query
            .bank_id
            .map(|b| id_i64("bank_id", b.value()))
            .transpose()?;
        let user = query.review_for.as_ref().map(|u| u.as_str().to_owned());

        let count_sql = format!("SELECT COUNT(*) AS n FROM questions{filter}");
        let mut count = sqlx::query(&count_sql);
        if let Some(bank) = bank {
            count = count.bind(bank);
        }
        if let Some(user) = &user {
            count = count.bind(user.clone());
        }
        let total: i64 = count
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?
            .try_get("n")
            .map_err(ser)?;

        let list_sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions{filter} ORDER BY id ASC LIMIT ?{} OFFSET ?{}",
            bind_index,
            bind_index + 1
        );
        let mut list = sqlx::query(&list_sql);
        if let Some(bank) = bank {
            list = list.bind(bank);
        }
        if let Some(user) = user {
            list = list.bind(user);
        }
        let rows = list
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        Ok(Page {
            items: self.assemble(rows).await?,
            total: i64_to_u64("total", total)?,
        })
    }

    async fn count_questions(&self, bank_id: BankId) -> Result<u32, StorageError> {
        let n: i64 = sqlx::query("SELECT COUNT(*) AS n FROM questions WHERE bank_id = ?1")
            .bind(id_i64("bank_id", bank_id.value())?)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?
            .try_get("n")
            .map_err(ser)?;
        u32::try_from(n).map_err(ser)
    }

    async fn next_question_id(
        &self,
        bank_id: BankId,
        after: QuestionId,
    ) -> Result<Option<QuestionId>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id FROM questions
            WHERE bank_id = ?1 AND id > ?2
            ORDER BY id ASC
            LIMIT 1
            ",
        )
        .bind(id_i64("bank_id", bank_id.value())?)
        .bind(id_i64("question_id", after.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.map(|r| question_id(&r, "id")).transpose()
    }
}
