use qbank_core::model::{
    AnswerFact, AnswerId, DateRange, Difficulty, NewUserAnswer, UserAnswer, UserId,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, i64_to_u64, id_i64, map_answer_row, map_session_row, ser, u32_from_i64};
use crate::repository::{AnswerRepository, RecordedAnswer, StorageError};

const ANSWER_COLUMNS: &str = r"
    id, user_id, question_id, session_id, selected_option,
    is_correct, time_spent, is_flagged, answered_at
";

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn record_answer(&self, answer: &NewUserAnswer) -> Result<RecordedAnswer, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let session_id = answer
            .session_id()
            .map(|s| id_i64("session_id", s.value()))
            .transpose()?;

        if let Some(session_id) = session_id {
            // Counters only move while the session is active and has room.
            let res = sqlx::query(
                r"
                UPDATE practice_sessions
                SET completed_questions = completed_questions + 1,
                    correct_answers = correct_answers + ?2,
                    time_spent = time_spent + ?3,
                    status = CASE
                        WHEN completed_questions + 1 >= total_questions THEN 'completed'
                        ELSE status
                    END,
                    completed_at = CASE
                        WHEN completed_questions + 1 >= total_questions THEN ?4
                        ELSE completed_at
                    END
                WHERE id = ?1
                  AND status = 'active'
                  AND completed_questions < total_questions
                ",
            )
            .bind(session_id)
            .bind(i64::from(answer.is_correct()))
            .bind(i64::from(answer.time_spent()))
            .bind(answer.answered_at())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            if res.rows_affected() == 0 {
                return Err(StorageError::Conflict);
            }
        }

        let res = sqlx::query(
            r"
            INSERT INTO user_answers (
                user_id, question_id, session_id, selected_option,
                is_correct, time_spent, is_flagged, answered_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(answer.user_id().as_str())
        .bind(id_i64("question_id", answer.question_id().value())?)
        .bind(session_id)
        .bind(answer.selected_option().as_str())
        .bind(answer.is_correct())
        .bind(i64::from(answer.time_spent()))
        .bind(answer.is_flagged())
        .bind(answer.answered_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;
        let id = AnswerId::new(i64_to_u64("id", res.last_insert_rowid())?);

        let session = match session_id {
            Some(session_id) => {
                let row = sqlx::query(
                    r"
                    SELECT
                        id, user_id, bank_id, mode, total_questions, completed_questions,
                        correct_answers, time_spent, status, started_at, completed_at, metadata
                    FROM practice_sessions
                    WHERE id = ?1
                    ",
                )
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(conn)?;
                Some(map_session_row(&row)?)
            }
            None => None,
        };

        tx.commit().await.map_err(conn)?;

        Ok(RecordedAnswer {
            answer: answer.clone().assign_id(id),
            session,
        })
    }

    async fn get_answer(&self, id: AnswerId) -> Result<Option<UserAnswer>, StorageError> {
        let sql = format!("SELECT {ANSWER_COLUMNS} FROM user_answers WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("answer_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_answer_row).transpose()
    }

    async fn set_flag(&self, id: AnswerId, flagged: bool) -> Result<UserAnswer, StorageError> {
        let res = sqlx::query("UPDATE user_answers SET is_flagged = ?2 WHERE id = ?1")
            .bind(id_i64("answer_id", id.value())?)
            .bind(flagged)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.get_answer(id).await?.ok_or(StorageError::NotFound)
    }

    async fn answer_facts(
        &self,
        user_id: &UserId,
        range: DateRange,
    ) -> Result<Vec<AnswerFact>, StorageError> {
        let mut sql = String::from(
            r"
            SELECT
                a.answered_at, a.is_correct, a.time_spent, a.is_flagged,
                q.subject, q.system, q.difficulty
            FROM user_answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.user_id = ?1
            ",
        );
        let mut bind_index = 2;
        if range.from().is_some() {
            sql.push_str(&format!(" AND a.answered_at >= ?{bind_index}"));
            bind_index += 1;
        }
        if range.to().is_some() {
            sql.push_str(&format!(" AND a.answered_at <= ?{bind_index}"));
        }
        sql.push_str(" ORDER BY a.answered_at ASC, a.id ASC");

        let mut query = sqlx::query(&sql).bind(user_id.as_str());
        if let Some(from) = range.from() {
            query = query.bind(from);
        }
        if let Some(to) = range.to() {
            query = query.bind(to);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut facts = Vec::with_capacity(rows.len());
        for row in rows {
            let difficulty: Option<String> = row.try_get("difficulty").map_err(ser)?;
            facts.push(AnswerFact {
                answered_at: row.try_get("answered_at").map_err(ser)?,
                is_correct: row.try_get("is_correct").map_err(ser)?,
                time_spent: u32_from_i64(
                    "time_spent",
                    row.try_get::<i64, _>("time_spent").map_err(ser)?,
                )?,
                is_flagged: row.try_get("is_flagged").map_err(ser)?,
                subject: row.try_get("subject").map_err(ser)?,
                system: row.try_get("system").map_err(ser)?,
                difficulty: difficulty
                    .map(|d| d.parse::<Difficulty>())
                    .transpose()
                    .map_err(ser)?,
            });
        }
        Ok(facts)
    }
}
