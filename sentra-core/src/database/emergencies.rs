use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::{EmergencyStore, parse_text_col};
use crate::error::{Result, SentraError};
use crate::model::{Emergency, EmergencyInput, EmergencyResponse, EmergencyStatus, Operator};

/// Fixed note attached to the operator-assignment audit row.
pub const ASSIGNED_NOTE: &str = "Operator auto-assigned to emergency";

/// How many eligible operators the claim query considers.
const CANDIDATE_WINDOW: i64 = 5;

#[derive(Clone, Debug)]
pub struct PostgresEmergencyRepository {
    pool: PgPool,
}

impl PostgresEmergencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmergencyStore for PostgresEmergencyRepository {
    async fn insert(&self, input: &EmergencyInput) -> Result<Emergency> {
        let row = sqlx::query(
            r#"
            INSERT INTO emergencies (id, customer_id, device_id, severity, type, description, location_data, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING id, customer_id, device_id, severity, type, description, location_data, status, created_at, resolved_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.customer_id)
        .bind(input.device_id)
        .bind(input.severity.as_str())
        .bind(input.kind.as_str())
        .bind(input.description.as_deref())
        .bind(input.location_data.as_ref())
        .try_map(|row: PgRow| map_emergency(&row))
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Emergency>> {
        let row = sqlx::query(
            "SELECT id, customer_id, device_id, severity, type, description, location_data, status, created_at, resolved_at \
             FROM emergencies WHERE id = $1",
        )
        .bind(id)
        .try_map(|row: PgRow| map_emergency(&row))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Append one row to the audit trail. Rows are never updated or
    /// deleted afterwards.
    async fn append_response(
        &self,
        emergency_id: Uuid,
        operator_id: Option<Uuid>,
        action: &str,
        response_time_seconds: Option<i32>,
        notes: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO emergency_responses (id, emergency_id, operator_id, action, response_time, notes) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(emergency_id)
        .bind(operator_id)
        .bind(action)
        .bind(response_time_seconds)
        .bind(notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_responses(&self, emergency_id: Uuid) -> Result<Vec<EmergencyResponse>> {
        let rows = sqlx::query(
            r#"
            SELECT er.id, er.emergency_id, er.operator_id, er.action,
                   er.response_time, er.notes, er.created_at,
                   o.name AS operator_name
            FROM emergency_responses er
            LEFT JOIN operators o ON er.operator_id = o.id
            WHERE er.emergency_id = $1
            ORDER BY er.created_at
            "#,
        )
        .bind(emergency_id)
        .try_map(|row: PgRow| map_response(&row))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Claim the least-recently-assigned available operator for an
    /// emergency, atomically.
    ///
    /// Candidates are operators with no open `in_progress` assignment,
    /// locked with SKIP LOCKED so two concurrent triggers can never
    /// claim the same one. The successful claim appends the "assigned"
    /// audit row, moves the emergency to `in_progress` and stamps the
    /// operator, all in one transaction.
    async fn claim_operator(&self, emergency_id: Uuid) -> Result<Operator> {
        let mut tx = self.pool.begin().await?;

        let candidates = sqlx::query(
            r#"
            SELECT id, name, last_assigned_at
            FROM operators
            WHERE id NOT IN (
                SELECT er.operator_id
                FROM emergency_responses er
                JOIN emergencies e ON e.id = er.emergency_id
                WHERE er.operator_id IS NOT NULL
                  AND er.action = 'assigned'
                  AND e.status = 'in_progress'
            )
            ORDER BY last_assigned_at ASC NULLS FIRST, id ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(CANDIDATE_WINDOW)
        .try_map(|row: PgRow| map_operator(&row))
        .fetch_all(&mut *tx)
        .await?;

        let Some(operator) = candidates.into_iter().next() else {
            return Err(SentraError::CapacityExhausted(format!(
                "no available operators for emergency {emergency_id}"
            )));
        };

        sqlx::query(
            "INSERT INTO emergency_responses (id, emergency_id, operator_id, action, notes) \
             VALUES ($1, $2, $3, 'assigned', $4)",
        )
        .bind(Uuid::new_v4())
        .bind(emergency_id)
        .bind(operator.id)
        .bind(ASSIGNED_NOTE)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE emergencies SET status = 'in_progress' WHERE id = $1 AND status = 'pending'",
        )
        .bind(emergency_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // The emergency was resolved or cancelled while we were
            // selecting; dropping the transaction rolls the claim back.
            return Err(SentraError::StateConflict(format!(
                "emergency {emergency_id} is no longer pending"
            )));
        }

        sqlx::query("UPDATE operators SET last_assigned_at = NOW() WHERE id = $1")
            .bind(operator.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(%emergency_id, operator_id = %operator.id, "operator claimed");
        Ok(operator)
    }

    /// Guarded terminal transition. Succeeds only while the emergency
    /// is non-terminal; a terminal current state yields StateConflict
    /// and an unknown id NotFound, with no writes either way.
    async fn transition_to_terminal(
        &self,
        id: Uuid,
        target: EmergencyStatus,
    ) -> Result<Emergency> {
        debug_assert!(target.is_terminal());

        let updated = sqlx::query(
            r#"
            UPDATE emergencies
            SET status = $2, resolved_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'in_progress')
            RETURNING id, customer_id, device_id, severity, type, description, location_data, status, created_at, resolved_at
            "#,
        )
        .bind(id)
        .bind(target.as_str())
        .try_map(|row: PgRow| map_emergency(&row))
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(emergency) => Ok(emergency),
            None => match self.get(id).await? {
                Some(existing) => Err(SentraError::StateConflict(format!(
                    "emergency {id} is already {}",
                    existing.status
                ))),
                None => Err(SentraError::NotFound(format!("emergency {id}"))),
            },
        }
    }

    async fn history(
        &self,
        customer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Emergency>, i64)> {
        let rows = sqlx::query(
            "SELECT id, customer_id, device_id, severity, type, description, location_data, status, created_at, resolved_at \
             FROM emergencies WHERE customer_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(customer_id)
        .bind(limit)
        .bind(offset)
        .try_map(|row: PgRow| map_emergency(&row))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM emergencies WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_one(&self.pool)
                .await?;

        Ok((rows, total))
    }
}

fn map_emergency(row: &PgRow) -> std::result::Result<Emergency, sqlx::Error> {
    Ok(Emergency {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        device_id: row.try_get("device_id")?,
        severity: parse_text_col(row, "severity")?,
        kind: parse_text_col(row, "type")?,
        description: row.try_get("description")?,
        location_data: row.try_get("location_data")?,
        status: parse_text_col(row, "status")?,
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn map_response(row: &PgRow) -> std::result::Result<EmergencyResponse, sqlx::Error> {
    Ok(EmergencyResponse {
        id: row.try_get("id")?,
        emergency_id: row.try_get("emergency_id")?,
        operator_id: row.try_get("operator_id")?,
        action: row.try_get("action")?,
        response_time_seconds: row.try_get("response_time")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        operator_name: row.try_get("operator_name")?,
    })
}

fn map_operator(row: &PgRow) -> std::result::Result<Operator, sqlx::Error> {
    Ok(Operator {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        last_assigned_at: row.try_get("last_assigned_at")?,
    })
}
