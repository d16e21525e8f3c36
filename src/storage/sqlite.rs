//! SQLite storage backend built on `sqlx`

use super::repository::{
    AttachmentRepository, ReadMarkRepository, ReplyRepository, TicketFilter, TicketRepository,
    UnreadQuery,
};
use crate::core::{
    Attachment, AttachmentId, AttachmentOwner, ReadMark, Reply, ReplyId, Role, Status, Ticket,
    TicketId, UserId,
};
use crate::error::{HelpdeskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

const TICKET_COLUMNS: &str =
    "id, title, description, urgency, status, product, customer_id, created_at, updated_at";
const REPLY_COLUMNS: &str = "id, ticket_id, author_id, role, message, created_at, updated_at";
const ATTACHMENT_COLUMNS: &str =
    "id, ticket_id, reply_id, filename, original_name, uploaded_by, created_at";

/// Storage backed by a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database at `url`
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if url.contains(":memory:") {
            // Every connection opens its own private in-memory database.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        info!("Connected to database at {url}");
        Ok(Self { pool })
    }

    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database schema is up to date");
        Ok(())
    }
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(column: &str, micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        HelpdeskError::Serialization(format!("{column} holds an out-of-range timestamp"))
    })
}

fn parse_uuid<T: From<Uuid>>(column: &str, value: &str) -> Result<T> {
    Uuid::parse_str(value)
        .map(T::from)
        .map_err(|e| HelpdeskError::Serialization(format!("{column} is not a UUID: {e}")))
}

fn decode_enum<T: FromStr<Err = HelpdeskError>>(column: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|e| HelpdeskError::Serialization(format!("{column}: {e}")))
}

#[derive(FromRow)]
struct TicketRow {
    id: String,
    title: String,
    description: String,
    urgency: String,
    status: String,
    product: String,
    customer_id: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = HelpdeskError;

    fn try_from(row: TicketRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid("tickets.id", &row.id)?,
            title: row.title,
            description: row.description,
            urgency: decode_enum("tickets.urgency", &row.urgency)?,
            status: decode_enum("tickets.status", &row.status)?,
            product: row.product,
            customer_id: parse_uuid("tickets.customer_id", &row.customer_id)?,
            created_at: from_micros("tickets.created_at", row.created_at)?,
            updated_at: from_micros("tickets.updated_at", row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct ReplyRow {
    id: String,
    ticket_id: String,
    author_id: String,
    role: String,
    message: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ReplyRow> for Reply {
    type Error = HelpdeskError;

    fn try_from(row: ReplyRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid("replies.id", &row.id)?,
            ticket_id: parse_uuid("replies.ticket_id", &row.ticket_id)?,
            author_id: parse_uuid("replies.author_id", &row.author_id)?,
            role: decode_enum("replies.role", &row.role)?,
            message: row.message,
            created_at: from_micros("replies.created_at", row.created_at)?,
            updated_at: from_micros("replies.updated_at", row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct AttachmentRow {
    id: String,
    ticket_id: String,
    reply_id: Option<String>,
    filename: String,
    original_name: String,
    uploaded_by: String,
    created_at: i64,
}

impl TryFrom<AttachmentRow> for Attachment {
    type Error = HelpdeskError;

    fn try_from(row: AttachmentRow) -> Result<Self> {
        let ticket_id: TicketId = parse_uuid("attachments.ticket_id", &row.ticket_id)?;
        let owner = match row.reply_id.as_deref() {
            Some(reply_id) => AttachmentOwner::Reply(parse_uuid("attachments.reply_id", reply_id)?),
            None => AttachmentOwner::Ticket(ticket_id),
        };
        Ok(Self {
            id: parse_uuid("attachments.id", &row.id)?,
            owner,
            ticket_id,
            filename: row.filename,
            original_name: row.original_name,
            uploaded_by: parse_uuid("attachments.uploaded_by", &row.uploaded_by)?,
            created_at: from_micros("attachments.created_at", row.created_at)?,
        })
    }
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = HelpdeskError>,
{
    rows.into_iter().map(T::try_from).collect()
}

async fn insert_attachment_rows(
    conn: &mut SqliteConnection,
    attachments: &[Attachment],
) -> Result<()> {
    for attachment in attachments {
        let reply_id = match attachment.owner {
            AttachmentOwner::Reply(id) => Some(id.to_string()),
            AttachmentOwner::Ticket(_) => None,
        };
        sqlx::query(
            "INSERT INTO attachments (id, ticket_id, reply_id, filename, original_name, uploaded_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(attachment.id.to_string())
        .bind(attachment.ticket_id.to_string())
        .bind(reply_id)
        .bind(&attachment.filename)
        .bind(&attachment.original_name)
        .bind(attachment.uploaded_by.to_string())
        .bind(to_micros(attachment.created_at))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl TicketRepository for SqliteStorage {
    async fn insert_ticket_with_attachments(
        &self,
        ticket: &Ticket,
        attachments: &[Attachment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO tickets (id, title, description, urgency, status, product, customer_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(ticket.id.to_string())
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.urgency.label())
        .bind(ticket.status.label())
        .bind(&ticket.product)
        .bind(ticket.customer_id.to_string())
        .bind(to_micros(ticket.created_at))
        .bind(to_micros(ticket.updated_at))
        .execute(&mut *tx)
        .await?;
        insert_attachment_rows(&mut tx, attachments).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn load_ticket(&self, id: &TicketId) -> Result<Ticket> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1");
        sqlx::query_as::<_, TicketRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| HelpdeskError::ticket_not_found(id))?
            .try_into()
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE (?1 IS NULL OR customer_id = ?1) \
               AND (?2 IS NULL OR status = ?2) \
               AND (?3 IS NULL OR urgency = ?3) \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(filter.customer_id.map(|c| c.to_string()))
            .bind(filter.status.map(Status::label))
            .bind(filter.urgency.map(|u| u.label()))
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn update_status(&self, id: &TicketId, status: Status, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tickets SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status <> ?4",
        )
        .bind(status.label())
        .bind(to_micros(at))
        .bind(id.to_string())
        .bind(Status::Closed.label())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM tickets WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Err(HelpdeskError::TerminalState { id: id.to_string() }),
            None => Err(HelpdeskError::ticket_not_found(id)),
        }
    }

    async fn close_stale_answered(
        &self,
        id: &TicketId,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tickets SET status = ?1, updated_at = ?2 \
             WHERE id = ?3 AND status = ?4 \
               AND EXISTS ( \
                   SELECT 1 FROM ( \
                       SELECT role, created_at FROM replies WHERE ticket_id = ?3 \
                       ORDER BY created_at DESC LIMIT 1 \
                   ) last \
                   WHERE last.role = ?5 AND last.created_at < ?6 \
               )",
        )
        .bind(Status::Closed.label())
        .bind(to_micros(at))
        .bind(id.to_string())
        .bind(Status::Answered.label())
        .bind(Role::Admin.as_str())
        .bind(to_micros(cutoff))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_ticket(&self, id: &TicketId) -> Result<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        for sql in [
            "DELETE FROM attachments WHERE ticket_id = ?1",
            "DELETE FROM ticket_reads WHERE ticket_id = ?1",
            "DELETE FROM replies WHERE ticket_id = ?1",
        ] {
            sqlx::query(sql).bind(&id_str).execute(&mut *tx).await?;
        }

        let result = sqlx::query("DELETE FROM tickets WHERE id = ?1")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HelpdeskError::ticket_not_found(id));
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ReplyRepository for SqliteStorage {
    async fn insert_reply_with_attachments(
        &self,
        reply: &Reply,
        attachments: &[Attachment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO replies (id, ticket_id, author_id, role, message, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(reply.id.to_string())
        .bind(reply.ticket_id.to_string())
        .bind(reply.author_id.to_string())
        .bind(reply.role.as_str())
        .bind(&reply.message)
        .bind(to_micros(reply.created_at))
        .bind(to_micros(reply.updated_at))
        .execute(&mut *tx)
        .await?;
        insert_attachment_rows(&mut tx, attachments).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn load_reply(&self, ticket_id: &TicketId, reply_id: &ReplyId) -> Result<Reply> {
        let sql = format!("SELECT {REPLY_COLUMNS} FROM replies WHERE id = ?1 AND ticket_id = ?2");
        sqlx::query_as::<_, ReplyRow>(&sql)
            .bind(reply_id.to_string())
            .bind(ticket_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| HelpdeskError::reply_not_found(reply_id))?
            .try_into()
    }

    async fn list_replies(&self, ticket_id: &TicketId) -> Result<Vec<Reply>> {
        let sql = format!(
            "SELECT {REPLY_COLUMNS} FROM replies WHERE ticket_id = ?1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, ReplyRow>(&sql)
            .bind(ticket_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn update_reply_message(
        &self,
        reply_id: &ReplyId,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE replies SET message = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(message)
            .bind(to_micros(at))
            .bind(reply_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HelpdeskError::reply_not_found(reply_id));
        }
        Ok(())
    }

    async fn delete_reply(&self, reply_id: &ReplyId) -> Result<()> {
        let result = sqlx::query("DELETE FROM replies WHERE id = ?1")
            .bind(reply_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HelpdeskError::reply_not_found(reply_id));
        }
        Ok(())
    }
}

#[async_trait]
impl ReadMarkRepository for SqliteStorage {
    async fn upsert_read_mark(&self, mark: &ReadMark) -> Result<()> {
        sqlx::query(
            "INSERT INTO ticket_reads (ticket_id, user_id, last_read_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT (ticket_id, user_id) \
             DO UPDATE SET last_read_at = MAX(ticket_reads.last_read_at, excluded.last_read_at)",
        )
        .bind(mark.ticket_id.to_string())
        .bind(mark.user_id.to_string())
        .bind(to_micros(mark.last_read_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_read_mark(
        &self,
        ticket_id: &TicketId,
        user_id: &UserId,
    ) -> Result<Option<ReadMark>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT last_read_at FROM ticket_reads WHERE ticket_id = ?1 AND user_id = ?2",
        )
        .bind(ticket_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(micros,)| {
            Ok(ReadMark {
                ticket_id: *ticket_id,
                user_id: *user_id,
                last_read_at: from_micros("ticket_reads.last_read_at", micros)?,
            })
        })
        .transpose()
    }

    async fn unread_counts(&self, query: &UnreadQuery) -> Result<HashMap<TicketId, u64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT t.id, COUNT(r.id) \
             FROM tickets t \
             LEFT JOIN ticket_reads m ON m.ticket_id = t.id AND m.user_id = ?1 \
             LEFT JOIN replies r ON r.ticket_id = t.id AND r.role = ?2 \
                  AND (m.last_read_at IS NULL OR r.created_at > m.last_read_at) \
             WHERE (?3 IS NULL OR t.customer_id = ?3) \
             GROUP BY t.id",
        )
        .bind(query.viewer.to_string())
        .bind(query.author_role.as_str())
        .bind(query.customer_id.map(|c| c.to_string()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, count)| {
                let id: TicketId = parse_uuid("tickets.id", &id)?;
                Ok((id, u64::try_from(count).unwrap_or_default()))
            })
            .collect()
    }
}

#[async_trait]
impl AttachmentRepository for SqliteStorage {
    async fn load_attachment(&self, id: &AttachmentId) -> Result<Attachment> {
        let sql = format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?1");
        sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| HelpdeskError::attachment_not_found(id))?
            .try_into()
    }

    async fn list_ticket_attachments(&self, ticket_id: &TicketId) -> Result<Vec<Attachment>> {
        let sql = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments \
             WHERE ticket_id = ?1 AND reply_id IS NULL ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(ticket_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn list_reply_attachments(&self, reply_id: &ReplyId) -> Result<Vec<Attachment>> {
        let sql = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE reply_id = ?1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(reply_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        collect(rows)
    }

    async fn delete_attachment(&self, id: &AttachmentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HelpdeskError::attachment_not_found(id));
        }
        Ok(())
    }
}
