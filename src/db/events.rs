use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Event, EventPatch, NewEvent};
use crate::store::{EventStore, EventUpdate};
use crate::utils::error::AppError;

#[async_trait]
impl EventStore for PgStore {
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn insert_event(&self, new: NewEvent) -> Result<Event, AppError> {
        let event = sqlx::query_as::<_, Event>(
            "INSERT INTO events (id, creator_id, title, description, max_reservations, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new.creator_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.max_reservations)
        .bind(new.start_date)
        .bind(new.end_date)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(event_id = %event.id, creator_id = %event.creator_id, "Event created");
        Ok(event)
    }

    async fn update_event(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: EventPatch,
    ) -> Result<EventUpdate, AppError> {
        let (touch_max, max_reservations) = match patch.max_reservations {
            Some(max) => (true, max),
            None => (false, None),
        };
        let (touch_end_date, end_date) = match patch.end_date {
            Some(end_date) => (true, end_date),
            None => (false, None),
        };

        // The capacity guard sits in the WHERE clause so it is evaluated
        // under the same row lock that admissions take.
        let updated = sqlx::query_as::<_, Event>(
            "UPDATE events SET
                 title = COALESCE($3, title),
                 description = COALESCE($4, description),
                 max_reservations = CASE WHEN $5 THEN $6::INT ELSE max_reservations END,
                 start_date = COALESCE($7, start_date),
                 end_date = CASE WHEN $8 THEN $9 ELSE end_date END,
                 updated_at = now()
             WHERE id = $1
               AND creator_id = $2
               AND ($6::INT IS NULL OR $6::INT >= amount_reservations)
             RETURNING *",
        )
        .bind(id)
        .bind(owner_id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(touch_max)
        .bind(max_reservations)
        .bind(patch.start_date)
        .bind(touch_end_date)
        .bind(end_date)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(event) = updated {
            return Ok(EventUpdate::Updated(event));
        }

        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM events WHERE id = $1 AND creator_id = $2)",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(if owned {
            EventUpdate::BelowCurrentAmount
        } else {
            EventUpdate::NotFound
        })
    }

    async fn delete_event(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let owned: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM events WHERE id = $1 AND creator_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owned.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        let removed = sqlx::query("DELETE FROM reservations WHERE event_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(event_id = %id, reservations_removed = removed, "Event deleted");
        Ok(true)
    }

    async fn events_by_creator(&self, creator_id: Uuid) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE creator_id = $1 ORDER BY created_at DESC",
        )
        .bind(creator_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}
