use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ParkingError, Result};
use crate::model::{ParkingSpot, ParkingType, Ticket};
use crate::ports::{SpotStore, TicketStore};

/// How long a connection waits on another writer before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Event for audit trail: every ticket opened or closed leaves one
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    debug!(path = %path.display(), "database opened");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Spot registry
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS parking (
            number INTEGER PRIMARY KEY CHECK (number > 0),
            parking_type TEXT NOT NULL,
            available INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    // ==========================================================================
    // Tickets (out_time and price stay NULL while the vehicle is parked)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ticket (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parking_number INTEGER NOT NULL REFERENCES parking(number),
            vehicle_reg_number TEXT NOT NULL,
            price REAL,
            in_time TEXT NOT NULL,
            out_time TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ticket_vehicle ON ticket(vehicle_reg_number)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_parking_type ON parking(parking_type, available)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// FACILITY LAYOUT
// ============================================================================

#[derive(Debug, Deserialize)]
struct LayoutRow {
    number: i64,
    parking_type: String,
}

/// Spots 1-3 for cars, 4-5 for bikes
pub fn default_layout() -> Vec<ParkingSpot> {
    vec![
        ParkingSpot::new(1, ParkingType::Car, true),
        ParkingSpot::new(2, ParkingType::Car, true),
        ParkingSpot::new(3, ParkingType::Car, true),
        ParkingSpot::new(4, ParkingType::Bike, true),
        ParkingSpot::new(5, ParkingType::Bike, true),
    ]
}

/// Read a `number,parking_type` CSV describing the facility
pub fn load_layout_csv(csv_path: &Path) -> Result<Vec<ParkingSpot>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut spots = Vec::new();
    for result in rdr.deserialize() {
        let row: LayoutRow = result?;
        if row.number <= 0 {
            return Err(ParkingError::InvalidInput(format!(
                "spot number must be positive, got {}",
                row.number
            )));
        }
        let parking_type: ParkingType = row.parking_type.parse()?;
        spots.push(ParkingSpot::new(row.number, parking_type, true));
    }

    Ok(spots)
}

/// Insert spots that do not exist yet. Existing spots keep their state.
pub fn seed_spots(conn: &Connection, spots: &[ParkingSpot]) -> Result<usize> {
    let mut inserted = 0;

    for spot in spots {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO parking (number, parking_type, available) VALUES (?1, ?2, ?3)",
            params![spot.number, spot.parking_type.as_str(), spot.available],
        )?;
    }

    info!(inserted, skipped = spots.len() - inserted, "facility layout seeded");
    Ok(inserted)
}

pub fn list_spots(conn: &Connection) -> Result<Vec<ParkingSpot>> {
    let mut stmt = conn.prepare(
        "SELECT number, parking_type, available FROM parking ORDER BY number",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, bool>(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(number, tag, available)| -> Result<ParkingSpot> {
            Ok(ParkingSpot::new(number, tag.parse()?, available))
        })
        .collect()
}

pub fn list_open_tickets(conn: &Connection) -> Result<Vec<Ticket>> {
    let sql = format!(
        "{} WHERE t.out_time IS NULL ORDER BY t.in_time, t.id",
        TICKET_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], read_ticket_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(TicketRow::into_ticket).collect()
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            format_time(event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(event_id, timestamp, event_type, entity_type, entity_id, data, actor)| -> Result<Event> {
            Ok(Event {
                event_id,
                timestamp: parse_time(&timestamp)?,
                event_type,
                entity_type,
                entity_id,
                data: serde_json::from_str(&data)?,
                actor,
            })
        })
        .collect()
}

// ============================================================================
// SPOT STORE
// ============================================================================

pub struct SqliteSpotStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteSpotStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl SpotStore for SqliteSpotStore<'_> {
    fn next_available(&self, parking_type: ParkingType) -> Result<Option<ParkingSpot>> {
        let number: Option<i64> = self
            .conn
            .query_row(
                "SELECT MIN(number) FROM parking WHERE parking_type = ?1 AND available = 1",
                params![parking_type.as_str()],
                |row| row.get(0),
            )?;

        Ok(number.map(|number| ParkingSpot::new(number, parking_type, true)))
    }

    fn update_availability(&self, number: i64, available: bool) -> Result<bool> {
        // Conditional flip: only one writer can move a spot from free to taken
        let changed = self.conn.execute(
            "UPDATE parking SET available = ?1 WHERE number = ?2 AND available != ?1",
            params![available, number],
        )?;

        if changed == 0 && self.get_spot(number)?.is_none() {
            return Err(ParkingError::SpotNotFound(number));
        }

        Ok(changed == 1)
    }

    fn get_spot(&self, number: i64) -> Result<Option<ParkingSpot>> {
        let row = self
            .conn
            .query_row(
                "SELECT parking_type, available FROM parking WHERE number = ?1",
                params![number],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;

        match row {
            Some((tag, available)) => Ok(Some(ParkingSpot::new(number, tag.parse()?, available))),
            None => Ok(None),
        }
    }
}

// ============================================================================
// TICKET STORE
// ============================================================================

const TICKET_SELECT: &str = "SELECT t.id, t.parking_number, p.parking_type, t.vehicle_reg_number,
            t.price, t.in_time, t.out_time
     FROM ticket t
     INNER JOIN parking p ON p.number = t.parking_number";

/// Raw columns of a ticket row, converted outside the rusqlite closure so
/// tag and timestamp failures keep their own error kinds
struct TicketRow {
    id: i64,
    spot_number: i64,
    parking_type: String,
    vehicle_reg: String,
    price: Option<f64>,
    in_time: String,
    out_time: Option<String>,
}

fn read_ticket_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        id: row.get(0)?,
        spot_number: row.get(1)?,
        parking_type: row.get(2)?,
        vehicle_reg: row.get(3)?,
        price: row.get(4)?,
        in_time: row.get(5)?,
        out_time: row.get(6)?,
    })
}

impl TicketRow {
    fn into_ticket(self) -> Result<Ticket> {
        Ok(Ticket {
            id: Some(self.id),
            spot_number: self.spot_number,
            parking_type: self.parking_type.parse()?,
            vehicle_reg: self.vehicle_reg,
            in_time: parse_time(&self.in_time)?,
            out_time: self.out_time.as_deref().map(parse_time).transpose()?,
            price: self.price,
        })
    }
}

/// Fixed-width UTC timestamps so text order matches time order
fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(ParkingError::store)
}

pub struct SqliteTicketStore<'c> {
    conn: &'c Connection,
    actor: String,
}

impl<'c> SqliteTicketStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self::with_actor(conn, "parking_desk")
    }

    /// Name recorded as the actor of audit events
    pub fn with_actor(conn: &'c Connection, actor: &str) -> Self {
        Self {
            conn,
            actor: actor.to_string(),
        }
    }
}

impl TicketStore for SqliteTicketStore<'_> {
    fn save(&self, ticket: &Ticket) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO ticket (parking_number, vehicle_reg_number, price, in_time, out_time)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ticket.spot_number,
                ticket.vehicle_reg,
                ticket.price,
                format_time(ticket.in_time),
                ticket.out_time.map(format_time),
            ],
        )?;
        let id = tx.last_insert_rowid();

        let event = Event::new(
            "ticket_opened",
            "ticket",
            &id.to_string(),
            serde_json::json!({
                "vehicle_reg": ticket.vehicle_reg,
                "spot": ticket.spot_number,
                "parking_type": ticket.parking_type,
            }),
            &self.actor,
        );
        insert_event(&tx, &event)?;

        tx.commit()?;
        Ok(id)
    }

    fn get_open_ticket(&self, vehicle_reg: &str) -> Result<Option<Ticket>> {
        let sql = format!(
            "{} WHERE t.vehicle_reg_number = ?1 AND t.out_time IS NULL
             ORDER BY t.in_time DESC, t.id DESC LIMIT 1",
            TICKET_SELECT
        );

        let row = self
            .conn
            .query_row(&sql, params![vehicle_reg], read_ticket_row)
            .optional()?;

        row.map(TicketRow::into_ticket).transpose()
    }

    fn count_prior_closed_tickets(&self, vehicle_reg: &str) -> Result<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM ticket WHERE vehicle_reg_number = ?1 AND out_time IS NOT NULL",
            params![vehicle_reg],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    fn update(&self, ticket: &Ticket) -> Result<()> {
        let id = ticket.id.ok_or_else(|| {
            ParkingError::InvalidInput(format!(
                "ticket for {} has never been saved",
                ticket.vehicle_reg
            ))
        })?;

        let tx = self.conn.unchecked_transaction()?;

        // Only a ticket still open in the store can be closed
        let sql = if ticket.is_open() {
            "UPDATE ticket SET price = ?1, out_time = ?2 WHERE id = ?3"
        } else {
            "UPDATE ticket SET price = ?1, out_time = ?2 WHERE id = ?3 AND out_time IS NULL"
        };
        let changed = tx.execute(sql, params![ticket.price, ticket.out_time.map(format_time), id])?;
        if changed == 0 {
            return Err(ParkingError::TicketNotFound(ticket.vehicle_reg.clone()));
        }

        let event_type = if ticket.is_open() { "ticket_reopened" } else { "ticket_closed" };
        let event = Event::new(
            event_type,
            "ticket",
            &id.to_string(),
            serde_json::json!({
                "vehicle_reg": ticket.vehicle_reg,
                "spot": ticket.spot_number,
                "price": ticket.price,
            }),
            &self.actor,
        );
        insert_event(&tx, &event)?;

        tx.commit()?;
        Ok(())
    }
}
