// src/repositories/postgres/tickets.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use clinicbot_common::models::{CrmSyncState, Priority, Ticket, TicketStatus};
use clinicbot_common::traits::TicketRepository;
use clinicbot_common::Error;

/// Tickets plus their per-CRM sync rows. The one-active-ticket rule is
/// enforced by the `tickets_one_active_per_conversation` partial unique index.
pub struct PostgresTicketRepository {
    pub pool: Pool<Postgres>,
}

const TICKET_COLUMNS: &str =
    "ticket_id, conversation_id, status, priority, summary, created_at, last_updated, notes";

impl PostgresTicketRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Fills `crm_sync_state` for each ticket in one query.
    async fn attach_sync_states(&self, mut tickets: Vec<Ticket>) -> Result<Vec<Ticket>, Error> {
        if tickets.is_empty() {
            return Ok(tickets);
        }
        let ids: Vec<Uuid> = tickets.iter().map(|t| t.ticket_id).collect();
        let rows = sqlx::query(
            r#"
            SELECT ticket_id, target, state
            FROM ticket_crm_sync
            WHERE ticket_id = ANY($1)
            "#,
        )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut states: HashMap<Uuid, BTreeMap<String, CrmSyncState>> = HashMap::new();
        for r in rows {
            let ticket_id: Uuid = r.try_get("ticket_id")?;
            let target: String = r.try_get("target")?;
            let state = r.try_get::<String, _>("state")?.parse::<CrmSyncState>()?;
            states.entry(ticket_id).or_default().insert(target, state);
        }

        for ticket in &mut tickets {
            if let Some(s) = states.remove(&ticket.ticket_id) {
                ticket.crm_sync_state = s;
            }
        }
        Ok(tickets)
    }

    async fn fetch_one(&self, sql: &str, id: Uuid) -> Result<Option<Ticket>, Error> {
        let row = sqlx::query(sql).bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(r) => {
                let ticket = row_to_ticket(&r)?;
                Ok(self.attach_sync_states(vec![ticket]).await?.pop())
            }
            None => Ok(None),
        }
    }
}

fn row_to_ticket(r: &PgRow) -> Result<Ticket, Error> {
    Ok(Ticket {
        ticket_id: r.try_get("ticket_id")?,
        conversation_id: r.try_get("conversation_id")?,
        status: r.try_get::<String, _>("status")?.parse::<TicketStatus>()?,
        priority: r.try_get::<String, _>("priority")?.parse::<Priority>()?,
        summary: r.try_get("summary")?,
        created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        last_updated: r.try_get::<DateTime<Utc>, _>("last_updated")?,
        crm_sync_state: BTreeMap::new(),
        notes: r.try_get("notes")?,
    })
}

#[async_trait]
impl TicketRepository for PostgresTicketRepository {
    async fn create_unless_active(&self, ticket: &Ticket) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO tickets (
                ticket_id, conversation_id, status, priority, summary, created_at, last_updated, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
            .bind(ticket.ticket_id)
            .bind(ticket.conversation_id)
            .bind(ticket.status.to_string())
            .bind(ticket.priority.to_string())
            .bind(&ticket.summary)
            .bind(ticket.created_at)
            .bind(ticket.last_updated)
            .bind(&ticket.notes)
            .execute(&mut *tx)
            .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(Error::DuplicateActiveTicket(ticket.conversation_id));
            }
            Err(e) => return Err(e.into()),
        }

        for (target, state) in &ticket.crm_sync_state {
            sqlx::query(
                r#"
                INSERT INTO ticket_crm_sync (ticket_id, target, state, updated_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
                .bind(ticket.ticket_id)
                .bind(target)
                .bind(state.to_string())
                .bind(ticket.created_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, Error> {
        let sql = format!("SELECT {} FROM tickets WHERE ticket_id = $1", TICKET_COLUMNS);
        self.fetch_one(&sql, ticket_id).await
    }

    async fn active_for_conversation(&self, conversation_id: Uuid) -> Result<Option<Ticket>, Error> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE conversation_id = $1 AND status IN ('open', 'in_progress')",
            TICKET_COLUMNS
        );
        self.fetch_one(&sql, conversation_id).await
    }

    async fn update_status(
        &self,
        ticket_id: Uuid,
        expected: TicketStatus,
        status: TicketStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $1,
                last_updated = $2,
                notes = COALESCE($5, notes)
            WHERE ticket_id = $3
              AND status = $4
            "#,
        )
            .bind(status.to_string())
            .bind(at)
            .bind(ticket_id)
            .bind(expected.to_string())
            .bind(notes)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("ticket {} in status {}", ticket_id, expected)));
        }
        Ok(())
    }

    async fn update_crm_sync_state(
        &self,
        ticket_id: Uuid,
        states: &BTreeMap<String, CrmSyncState>,
    ) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        for (target, state) in states {
            sqlx::query(
                r#"
                INSERT INTO ticket_crm_sync (ticket_id, target, state, updated_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (ticket_id, target)
                DO UPDATE SET state = EXCLUDED.state,
                              updated_at = EXCLUDED.updated_at
                "#,
            )
                .bind(ticket_id)
                .bind(target)
                .bind(state.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_with_failed_sync(&self, limit: i64) -> Result<Vec<Ticket>, Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tickets t
            WHERE EXISTS (
                SELECT 1 FROM ticket_crm_sync s
                WHERE s.ticket_id = t.ticket_id AND s.state = 'failed'
            )
            ORDER BY (
                SELECT MAX(s.updated_at) FROM ticket_crm_sync s
                WHERE s.ticket_id = t.ticket_id
            ) ASC, created_at ASC
            LIMIT $1
            "#,
            TICKET_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        let tickets = rows.iter().map(row_to_ticket).collect::<Result<Vec<_>, _>>()?;
        self.attach_sync_states(tickets).await
    }

    async fn list_tickets(&self, status: Option<TicketStatus>, limit: i64) -> Result<Vec<Ticket>, Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tickets
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            TICKET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(status.map(|s| s.to_string()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        let tickets = rows.iter().map(row_to_ticket).collect::<Result<Vec<_>, _>>()?;
        self.attach_sync_states(tickets).await
    }
}
