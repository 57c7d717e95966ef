use async_trait::async_trait;
use sqlx::migrate::MigrateError;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Executor, PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{EventStore, StoreTx};
use crate::error::StoreResult;
use crate::models::{Event, NewEvent, NewRegistration, Registrant, Registration, User};

const EVENT_COLUMNS: &str =
    "id, organizer_id, title, description, venue, speaker, starts_at, total_seats, seats_available";

const REGISTRATION_COLUMNS: &str = "id, user_id, event_id, seats_booked, registered_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open the pool. Every connection gets a bounded `lock_timeout`, so a
    /// `FOR UPDATE` that waits too long fails with 55P03 -> Conflict.
    pub async fn connect(url: &str, pool_size: u32, lock_timeout_ms: u64) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(format!("SET lock_timeout = '{}ms'", lock_timeout_ms).as_str())
                        .await?;
                    Ok(())
                })
            })
            .connect(url)
            .await?;

        info!("Postgres pool ready ({} connections, lock_timeout {}ms)", pool_size, lock_timeout_ms);
        Ok(Self { pool })
    }

    /// Схема events/registrations/users из `src/migrations`.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl EventStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> StoreResult<PgTx> {
        Ok(PgTx { tx: self.pool.begin().await? })
    }

    async fn insert_event(&self, organizer_id: i64, event: &NewEvent) -> StoreResult<Event> {
        let created = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events
                (organizer_id, title, description, venue, speaker, starts_at, total_seats, seats_available)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(organizer_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.venue)
        .bind(&event.speaker)
        .bind(event.starts_at)
        .bind(event.total_seats)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn fetch_event(&self, event_id: i64) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY starts_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn fetch_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email, role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn registrants(&self, event_id: i64) -> StoreResult<Vec<Registrant>> {
        let rows = sqlx::query(REGISTRANTS_QUERY)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;

        registrants_from_rows(event_id, rows)
    }

    async fn registrations_for_user(&self, user_id: i64) -> StoreResult<Vec<(Registration, Event)>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id AS rid, r.seats_booked, r.registered_at,
                   e.id, e.organizer_id, e.title, e.description, e.venue, e.speaker,
                   e.starts_at, e.total_seats, e.seats_available
            FROM registrations r
            JOIN events e ON e.id = r.event_id
            WHERE r.user_id = $1
            ORDER BY r.registered_at DESC, r.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let event = Event {
                id: row.try_get("id")?,
                organizer_id: row.try_get("organizer_id")?,
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                venue: row.try_get("venue")?,
                speaker: row.try_get("speaker")?,
                starts_at: row.try_get("starts_at")?,
                total_seats: row.try_get("total_seats")?,
                seats_available: row.try_get("seats_available")?,
            };
            let registration = Registration {
                id: row.try_get("rid")?,
                user_id,
                event_id: event.id,
                seats_booked: row.try_get("seats_booked")?,
                registered_at: row.try_get("registered_at")?,
            };
            out.push((registration, event));
        }

        Ok(out)
    }
}

const REGISTRANTS_QUERY: &str = r#"
    SELECT r.user_id, u.name, u.email, r.seats_booked, r.registered_at
    FROM registrations r
    LEFT JOIN users u ON u.id = r.user_id
    WHERE r.event_id = $1
    ORDER BY r.registered_at, r.id
"#;

// Регистрация без записи в справочнике пользователей: адресата нет, пропускаем
fn registrants_from_rows(event_id: i64, rows: Vec<PgRow>) -> StoreResult<Vec<Registrant>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let user_id: i64 = row.try_get("user_id")?;
        let name: Option<String> = row.try_get("name")?;
        let email: Option<String> = row.try_get("email")?;
        match (name, email) {
            (Some(name), Some(email)) => out.push(Registrant {
                user_id,
                name,
                email,
                seats_booked: row.try_get("seats_booked")?,
                registered_at: row.try_get("registered_at")?,
            }),
            _ => warn!("registrant {} of event {} has no user record, skipped", user_id, event_id),
        }
    }
    Ok(out)
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_event(&mut self, event_id: i64) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
        ))
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        debug!("locked event row {}", event_id);
        Ok(event)
    }

    async fn find_registration(&mut self, event_id: i64, user_id: i64) -> StoreResult<Option<Registration>> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE event_id = $1 AND user_id = $2"
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(registration)
    }

    async fn insert_registration(&mut self, registration: &NewRegistration) -> StoreResult<Registration> {
        let created = sqlx::query_as::<_, Registration>(&format!(
            "INSERT INTO registrations (user_id, event_id, seats_booked, registered_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(registration.user_id)
        .bind(registration.event_id)
        .bind(registration.seats_booked)
        .bind(registration.registered_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(created)
    }

    async fn delete_registration(&mut self, registration_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(registration_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn adjust_seats(&mut self, event_id: i64, delta: i32) -> StoreResult<i32> {
        // CHECK ck_event_seats_bounds отклонит выход за 0..=total_seats
        let seats = sqlx::query_scalar::<_, i32>(
            "UPDATE events SET seats_available = seats_available + $2
             WHERE id = $1
             RETURNING seats_available",
        )
        .bind(event_id)
        .bind(delta)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(seats)
    }

    async fn update_event(&mut self, event: &Event) -> StoreResult<()> {
        sqlx::query(
            "UPDATE events
             SET title = $2, description = $3, venue = $4, speaker = $5, starts_at = $6
             WHERE id = $1",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.venue)
        .bind(&event.speaker)
        .bind(event.starts_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn registrants(&mut self, event_id: i64) -> StoreResult<Vec<Registrant>> {
        let rows = sqlx::query(REGISTRANTS_QUERY)
            .bind(event_id)
            .fetch_all(&mut *self.tx)
            .await?;

        registrants_from_rows(event_id, rows)
    }

    async fn delete_registrations(&mut self, event_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM registrations WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_event(&mut self, event_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
