//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{
    CreateTicketRequest, Ticket, TicketError, TicketFilter, TicketStage, TicketStore,
    TicketSummary, UpdateTicketRequest, UpsertStore,
};
use crate::batch::UpsertCommand;

const TICKET_COLUMNS: &str = "id, ticket_id, category_id, serial_number, order_number, capex, \
     invoice_number, supplier, distribution_center_id, distribution_center_name, stage, \
     created_at, updated_at, deleted_at";

/// Single-statement insert-or-merge keyed by business identifier.
/// Absent fields (NULL parameters) keep the stored value.
const UPSERT_SQL: &str = r#"
    INSERT INTO tickets (
        ticket_id, serial_number, order_number, capex, invoice_number, supplier, stage,
        created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
    ON CONFLICT(ticket_id) DO UPDATE SET
        serial_number = COALESCE(excluded.serial_number, tickets.serial_number),
        order_number = COALESCE(excluded.order_number, tickets.order_number),
        capex = COALESCE(excluded.capex, tickets.capex),
        invoice_number = COALESCE(excluded.invoice_number, tickets.invoice_number),
        supplier = COALESCE(excluded.supplier, tickets.supplier),
        stage = COALESCE(excluded.stage, tickets.stage),
        updated_at = excluded.updated_at,
        deleted_at = NULL
"#;

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path, busy_timeout: Duration) -> Result<Self, TicketError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_id INTEGER NOT NULL UNIQUE,
                category_id INTEGER,
                serial_number TEXT,
                order_number TEXT,
                capex TEXT,
                invoice_number TEXT,
                supplier TEXT,
                distribution_center_id INTEGER,
                distribution_center_name TEXT,
                stage TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_serial_number ON tickets(serial_number);
            CREATE INDEX IF NOT EXISTS idx_tickets_stage ON tickets(stage);
            CREATE INDEX IF NOT EXISTS idx_tickets_created_at ON tickets(created_at);
            "#,
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.conn
            .lock()
            .map_err(|_| TicketError::Database("connection mutex poisoned".to_string()))
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = vec!["deleted_at IS NULL"];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(stage) = filter.stage {
            conditions.push("stage = ?");
            params.push(Box::new(stage.as_str()));
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let stage: Option<String> = row.get(10)?;
        let created_at_str: String = row.get(11)?;
        let updated_at_str: String = row.get(12)?;
        let deleted_at_str: Option<String> = row.get(13)?;

        Ok(Ticket {
            id: row.get(0)?,
            ticket_id: row.get(1)?,
            category_id: row.get(2)?,
            serial_number: row.get(3)?,
            order_number: row.get(4)?,
            capex: row.get(5)?,
            invoice_number: row.get(6)?,
            supplier: row.get(7)?,
            distribution_center_id: row.get(8)?,
            distribution_center_name: row.get(9)?,
            stage: stage.and_then(|s| s.parse::<TicketStage>().ok()),
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
            deleted_at: deleted_at_str.as_deref().map(parse_timestamp),
        })
    }

    fn find_active(conn: &Connection, ticket_id: i64) -> Result<Option<Ticket>, TicketError> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE ticket_id = ? AND deleted_at IS NULL",
            TICKET_COLUMNS
        );
        let ticket = conn
            .query_row(&sql, params![ticket_id], Self::row_to_ticket)
            .optional()?;
        Ok(ticket)
    }

    fn find_stored(conn: &Connection, ticket_id: i64) -> Result<Option<Ticket>, TicketError> {
        let sql = format!("SELECT {} FROM tickets WHERE ticket_id = ?", TICKET_COLUMNS);
        let ticket = conn
            .query_row(&sql, params![ticket_id], Self::row_to_ticket)
            .optional()?;
        Ok(ticket)
    }

    fn serial_in_use(
        conn: &Connection,
        serial_number: &str,
        exclude_ticket_id: i64,
    ) -> Result<bool, TicketError> {
        let exists: bool = conn.query_row(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM tickets
                WHERE serial_number = ?1
                  AND ticket_id != ?2
                  AND deleted_at IS NULL
                  AND (stage IS NULL OR stage != ?3)
            )
            "#,
            params![
                serial_number,
                exclude_ticket_id,
                TicketStage::Completed.as_str()
            ],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// Use now if parsing fails (shouldn't happen with rows written by this store)
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl UpsertStore for SqliteTicketStore {
    fn upsert(&self, command: &UpsertCommand) -> Result<(), TicketError> {
        let conn = self.conn()?;

        conn.execute(
            UPSERT_SQL,
            params![
                command.ticket_id,
                command.serial_number,
                command.order_number,
                command.capex,
                command.invoice_number,
                command.supplier,
                command.stage.map(|s| s.as_str()),
                timestamp(Utc::now()),
            ],
        )?;

        Ok(())
    }

    fn exists_active_conflict(
        &self,
        serial_number: &str,
        exclude_ticket_id: i64,
    ) -> Result<bool, TicketError> {
        let conn = self.conn()?;
        Self::serial_in_use(&conn, serial_number, exclude_ticket_id)
    }

    fn find_any(&self, ticket_id: i64) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn()?;
        Self::find_stored(&conn, ticket_id)
    }
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError> {
        let conn = self.conn()?;

        let completed = request.stage.is_some_and(|s| s.is_completed());
        if let Some(serial) = request.serial_number.as_deref() {
            if !completed && Self::serial_in_use(&conn, serial, request.ticket_id)? {
                return Err(TicketError::SerialConflict {
                    serial_number: serial.to_string(),
                    ticket_id: request.ticket_id,
                });
            }
        }

        let now = timestamp(Utc::now());
        let result = conn.execute(
            "INSERT INTO tickets (ticket_id, category_id, serial_number, order_number, capex, invoice_number, supplier, distribution_center_id, distribution_center_name, stage, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                request.ticket_id,
                request.category_id,
                request.serial_number,
                request.order_number,
                request.capex,
                request.invoice_number,
                request.supplier,
                request.distribution_center_id,
                request.distribution_center_name,
                request.stage.map(|s| s.as_str()),
                now,
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(TicketError::AlreadyExists(request.ticket_id));
            }
            Err(e) => return Err(e.into()),
        }

        Self::find_active(&conn, request.ticket_id)?
            .ok_or(TicketError::NotFound(request.ticket_id))
    }

    fn get(&self, ticket_id: i64) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn()?;
        Self::find_active(&conn, ticket_id)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        // Build parameter slice with limit and offset
        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_ticket)?;

        let mut tickets = Vec::new();
        for row_result in rows {
            tickets.push(row_result?);
        }

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;

        Ok(count)
    }

    fn list_summaries(&self) -> Result<Vec<TicketSummary>, TicketError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT ticket_id, serial_number, order_number, stage FROM tickets WHERE deleted_at IS NULL ORDER BY ticket_id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let stage: Option<String> = row.get(3)?;
            Ok(TicketSummary {
                ticket_id: row.get(0)?,
                serial_number: row.get(1)?,
                order_number: row.get(2)?,
                stage: stage.and_then(|s| s.parse().ok()),
            })
        })?;

        let mut summaries = Vec::new();
        for row_result in rows {
            summaries.push(row_result?);
        }

        Ok(summaries)
    }

    fn update(&self, ticket_id: i64, request: UpdateTicketRequest) -> Result<Ticket, TicketError> {
        let conn = self.conn()?;

        let current =
            Self::find_active(&conn, ticket_id)?.ok_or(TicketError::NotFound(ticket_id))?;

        // Only re-check the serial rule when the write can affect it
        if request.serial_number.is_some() || request.stage.is_some() {
            let serial = request
                .serial_number
                .as_deref()
                .or(current.serial_number.as_deref());
            let completed = request
                .stage
                .or(current.stage)
                .is_some_and(|s| s.is_completed());

            if let Some(serial) = serial {
                if !completed && Self::serial_in_use(&conn, serial, ticket_id)? {
                    return Err(TicketError::SerialConflict {
                        serial_number: serial.to_string(),
                        ticket_id,
                    });
                }
            }
        }

        conn.execute(
            r#"
            UPDATE tickets SET
                category_id = COALESCE(?1, category_id),
                serial_number = COALESCE(?2, serial_number),
                order_number = COALESCE(?3, order_number),
                capex = COALESCE(?4, capex),
                invoice_number = COALESCE(?5, invoice_number),
                supplier = COALESCE(?6, supplier),
                distribution_center_id = COALESCE(?7, distribution_center_id),
                distribution_center_name = COALESCE(?8, distribution_center_name),
                stage = COALESCE(?9, stage),
                updated_at = ?10
            WHERE ticket_id = ?11 AND deleted_at IS NULL
            "#,
            params![
                request.category_id,
                request.serial_number,
                request.order_number,
                request.capex,
                request.invoice_number,
                request.supplier,
                request.distribution_center_id,
                request.distribution_center_name,
                request.stage.map(|s| s.as_str()),
                timestamp(Utc::now()),
                ticket_id,
            ],
        )?;

        Self::find_active(&conn, ticket_id)?.ok_or(TicketError::NotFound(ticket_id))
    }

    fn soft_delete(&self, ticket_id: i64) -> Result<Ticket, TicketError> {
        let conn = self.conn()?;

        let ticket =
            Self::find_active(&conn, ticket_id)?.ok_or(TicketError::NotFound(ticket_id))?;

        let now = Utc::now();
        conn.execute(
            "UPDATE tickets SET deleted_at = ?1, updated_at = ?1 WHERE ticket_id = ?2",
            params![timestamp(now), ticket_id],
        )?;

        Ok(Ticket {
            deleted_at: Some(now),
            updated_at: now,
            ..ticket
        })
    }
}
