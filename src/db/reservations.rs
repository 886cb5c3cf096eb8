use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::models::{Event, Reservation};
use crate::store::{Admission, ReservationStore};
use crate::utils::error::AppError;

#[async_trait]
impl ReservationStore for PgStore {
    #[tracing::instrument(skip(self, email, name))]
    async fn admit(&self, event_id: Uuid, email: &str, name: &str) -> Result<Admission, AppError> {
        let mut tx = self.pool.begin().await?;

        // Conditional increment: the row lock taken here serializes
        // concurrent admissions, and the WHERE clause is re-checked after
        // waiting, so the counter cannot pass max_reservations.
        let event = sqlx::query_as::<_, Event>(
            "UPDATE events
             SET amount_reservations = amount_reservations + 1, updated_at = now()
             WHERE id = $1
               AND (max_reservations IS NULL OR amount_reservations < max_reservations)
             RETURNING *",
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(event) = event else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
                    .bind(event_id)
                    .fetch_one(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return Ok(if exists {
                Admission::CapacityReached
            } else {
                Admission::EventNotFound
            });
        };

        let reservation = sqlx::query_as::<_, Reservation>(
            "INSERT INTO reservations (id, event_id, email, name, created_at, updated_at)
             VALUES ($1, $2, $3, $4, clock_timestamp(), clock_timestamp())
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(email)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Admission::Admitted { event, reservation })
    }

    async fn reservations_for_event(&self, event_id: Uuid) -> Result<Vec<Reservation>, AppError> {
        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE event_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn reservations_by_owner(
        &self,
        owner_id: Uuid,
        cursor: Option<DateTime<Utc>>,
        fetch: i64,
    ) -> Result<Vec<Reservation>, AppError> {
        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT r.*
             FROM reservations r
             JOIN events e ON e.id = r.event_id
             WHERE e.creator_id = $1
               AND ($2::TIMESTAMPTZ IS NULL OR r.created_at < $2::TIMESTAMPTZ)
             ORDER BY r.created_at DESC, r.id DESC
             LIMIT $3",
        )
        .bind(owner_id)
        .bind(cursor)
        .bind(fetch)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }
}
