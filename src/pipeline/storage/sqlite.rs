use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::HolidayStore;
use crate::domain::{Country, Holiday, HolidayCategory};
use crate::error::{IngestError, Result};
use crate::types::IdentityKey;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS holidays (
        id                 TEXT PRIMARY KEY,
        name               TEXT NOT NULL,
        slug               TEXT NOT NULL,
        description        TEXT,
        date               TEXT NOT NULL,
        year               INTEGER NOT NULL,
        is_global          INTEGER NOT NULL DEFAULT 0,
        is_public_holiday  INTEGER NOT NULL DEFAULT 0,
        sources            TEXT NOT NULL DEFAULT '[]',
        wikipedia_url      TEXT,
        created_at         TEXT NOT NULL,
        updated_at         TEXT NOT NULL,
        last_verified      TEXT,
        UNIQUE (name, date, year)
    );
    CREATE INDEX IF NOT EXISTS holidays_year_idx ON holidays (year, date);
    CREATE TABLE IF NOT EXISTS countries (
        id          TEXT PRIMARY KEY,
        code        TEXT NOT NULL UNIQUE,
        name        TEXT NOT NULL,
        flag_emoji  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS holiday_categories (
        id             TEXT PRIMARY KEY,
        name           TEXT NOT NULL,
        slug           TEXT NOT NULL UNIQUE,
        category_type  TEXT NOT NULL,
        color          TEXT NOT NULL,
        icon           TEXT
    );
    CREATE TABLE IF NOT EXISTS holiday_countries (
        holiday_id  TEXT NOT NULL REFERENCES holidays (id),
        country_id  TEXT NOT NULL REFERENCES countries (id),
        PRIMARY KEY (holiday_id, country_id)
    );
    CREATE TABLE IF NOT EXISTS holiday_category_links (
        holiday_id   TEXT NOT NULL REFERENCES holidays (id),
        category_id  TEXT NOT NULL REFERENCES holiday_categories (id),
        PRIMARY KEY (holiday_id, category_id)
    );
"#;

const HOLIDAY_COLUMNS: &str = "id, name, slug, description, date, year, is_global, \
    is_public_holiday, sources, wikipedia_url, created_at, updated_at, last_verified";

/// SQLite-backed holiday store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!("Opened holiday store at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Constraint violations reject one record; everything else is a store failure.
fn write_error(err: rusqlite::Error, what: impl std::fmt::Display) -> IngestError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            IngestError::PersistenceConflict(format!("{}: {}", what, err))
        }
        _ => IngestError::Database(err),
    }
}

fn parse_column<T, E>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    parse(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(text: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc))
}

fn holiday_from_row(row: &Row<'_>) -> rusqlite::Result<Holiday> {
    let last_verified: Option<String> = row.get(12)?;
    Ok(Holiday {
        id: Some(parse_column(row, 0, Uuid::parse_str)?),
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        date: parse_column(row, 4, |s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))?,
        year: row.get(5)?,
        is_global: row.get(6)?,
        is_public_holiday: row.get(7)?,
        sources: parse_column(row, 8, |s| serde_json::from_str::<Vec<String>>(s))?,
        wikipedia_url: row.get(9)?,
        created_at: parse_column(row, 10, parse_timestamp)?,
        updated_at: parse_column(row, 11, parse_timestamp)?,
        last_verified: last_verified
            .map(|s| parse_timestamp(&s))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?,
    })
}

fn country_from_row(row: &Row<'_>) -> rusqlite::Result<Country> {
    Ok(Country {
        id: Some(parse_column(row, 0, Uuid::parse_str)?),
        code: row.get(1)?,
        name: row.get(2)?,
        flag_emoji: row.get(3)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<HolidayCategory> {
    Ok(HolidayCategory {
        id: Some(parse_column(row, 0, Uuid::parse_str)?),
        name: row.get(1)?,
        slug: row.get(2)?,
        category_type: row.get(3)?,
        color: row.get(4)?,
        icon: row.get(5)?,
    })
}

#[async_trait]
impl HolidayStore for SqliteStore {
    async fn find_holiday(&self, key: &IdentityKey) -> Result<Option<Holiday>> {
        let conn = self.conn();
        let holiday = conn
            .query_row(
                &format!(
                    "SELECT {} FROM holidays WHERE name = ?1 AND date = ?2 AND year = ?3",
                    HOLIDAY_COLUMNS
                ),
                params![key.name, key.date.to_string(), key.year],
                holiday_from_row,
            )
            .optional()?;
        Ok(holiday)
    }

    async fn insert_holiday(&self, holiday: &mut Holiday) -> Result<()> {
        let id = Uuid::new_v4();
        let sources = serde_json::to_string(&holiday.sources)?;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO holidays ({}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    HOLIDAY_COLUMNS
                ),
                params![
                    id.to_string(),
                    holiday.name,
                    holiday.slug,
                    holiday.description,
                    holiday.date.to_string(),
                    holiday.year,
                    holiday.is_global,
                    holiday.is_public_holiday,
                    sources,
                    holiday.wikipedia_url,
                    holiday.created_at.to_rfc3339(),
                    holiday.updated_at.to_rfc3339(),
                    holiday.last_verified.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| write_error(e, holiday.identity_key()))?;
        holiday.id = Some(id);

        debug!("Created holiday: {} with id {}", holiday.name, id);
        Ok(())
    }

    async fn update_holiday(&self, holiday: &Holiday) -> Result<()> {
        let id = holiday.id.ok_or_else(|| {
            IngestError::PersistenceConflict(format!("holiday {} has no id", holiday.name))
        })?;
        let sources = serde_json::to_string(&holiday.sources)?;
        let changed = self
            .conn()
            .execute(
                "UPDATE holidays SET description = ?2, is_global = ?3, is_public_holiday = ?4,
                    sources = ?5, wikipedia_url = ?6, updated_at = ?7, last_verified = ?8
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    holiday.description,
                    holiday.is_global,
                    holiday.is_public_holiday,
                    sources,
                    holiday.wikipedia_url,
                    holiday.updated_at.to_rfc3339(),
                    holiday.last_verified.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| write_error(e, holiday.identity_key()))?;
        if changed == 0 {
            return Err(IngestError::PersistenceConflict(format!(
                "holiday {} not found",
                id
            )));
        }
        Ok(())
    }

    async fn list_holidays(&self, year: Option<i32>) -> Result<Vec<Holiday>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM holidays WHERE ?1 IS NULL OR year = ?1 ORDER BY date, name",
            HOLIDAY_COLUMNS
        ))?;
        let holidays = stmt
            .query_map(params![year], holiday_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(holidays)
    }

    async fn get_or_create_country(&self, country: &Country) -> Result<Country> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO countries (id, code, name, flag_emoji) VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                country.code,
                country.name,
                country.flag_emoji
            ],
        )
        .map_err(|e| write_error(e, &country.code))?;
        let stored = conn.query_row(
            "SELECT id, code, name, flag_emoji FROM countries WHERE code = ?1",
            params![country.code],
            country_from_row,
        )?;
        Ok(stored)
    }

    async fn get_or_create_category(&self, category: &HolidayCategory) -> Result<HolidayCategory> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO holiday_categories (id, name, slug, category_type, color, icon)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                category.name,
                category.slug,
                category.category_type,
                category.color,
                category.icon
            ],
        )
        .map_err(|e| write_error(e, &category.slug))?;
        let stored = conn.query_row(
            "SELECT id, name, slug, category_type, color, icon \
             FROM holiday_categories WHERE slug = ?1",
            params![category.slug],
            category_from_row,
        )?;
        Ok(stored)
    }

    async fn attach_country(&self, holiday_id: Uuid, country_id: Uuid) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO holiday_countries (holiday_id, country_id) VALUES (?1, ?2)",
                params![holiday_id.to_string(), country_id.to_string()],
            )
            .map_err(|e| write_error(e, holiday_id))?;
        Ok(())
    }

    async fn attach_category(&self, holiday_id: Uuid, category_id: Uuid) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO holiday_category_links (holiday_id, category_id) \
                 VALUES (?1, ?2)",
                params![holiday_id.to_string(), category_id.to_string()],
            )
            .map_err(|e| write_error(e, holiday_id))?;
        Ok(())
    }

    async fn holiday_countries(&self, holiday_id: Uuid) -> Result<Vec<Country>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.code, c.name, c.flag_emoji FROM countries c
             JOIN holiday_countries hc ON hc.country_id = c.id
             WHERE hc.holiday_id = ?1 ORDER BY c.code",
        )?;
        let countries = stmt
            .query_map(params![holiday_id.to_string()], country_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(countries)
    }

    async fn holiday_categories(&self, holiday_id: Uuid) -> Result<Vec<HolidayCategory>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.slug, c.category_type, c.color, c.icon FROM holiday_categories c
             JOIN holiday_category_links l ON l.category_id = c.id
             WHERE l.holiday_id = ?1 ORDER BY c.slug",
        )?;
        let categories = stmt
            .query_map(params![holiday_id.to_string()], category_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }
}
