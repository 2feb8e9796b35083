//! SQLite-backed contact store
//!
//! One row per contact. Every write is a single INSERT, which SQLite
//! commits atomically; the WAL journal lets readers proceed while a write
//! is in flight.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use tidewatch_core::{Contact, Significance, StoredContact, UNKNOWN_VESSEL_TYPE};

use crate::{ContactStore, SkipReason, StoreError, StoreOutcome};

const CREATE_CONTACTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS contacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        latitude REAL,
        longitude REAL,
        speed REAL,
        type TEXT,
        timestamp TEXT,
        significance TEXT,
        heading REAL,
        confidence REAL,
        description TEXT
    )
"#;

const SELECT_COLUMNS: &str =
    "id, latitude, longitude, speed, type, timestamp, significance, heading, confidence, description";

/// Contact store on a SQLite database
#[derive(Clone)]
pub struct SqliteContactStore {
    pool: Pool<Sqlite>,
}

impl SqliteContactStore {
    /// Open (creating if needed) the database named by a `sqlite://` URL
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?;
        Self::connect_with(options).await
    }

    /// Open (creating if needed) a database file
    pub async fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().filename(path.as_ref());
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_CONTACTS_TABLE).execute(&pool).await?;
        info!("Contact store ready");

        Ok(Self { pool })
    }

    fn row_to_contact(row: &SqliteRow) -> Result<StoredContact, StoreError> {
        let id: i64 = row.try_get("id")?;

        let significance = match row.try_get::<Option<String>, _>("significance")? {
            Some(label) => label.parse::<Significance>().map_err(|e| StoreError::Corrupt {
                id,
                reason: e.to_string(),
            })?,
            None => Significance::default(),
        };

        let vessel_type = row
            .try_get::<Option<String>, _>("type")?
            .unwrap_or_else(|| UNKNOWN_VESSEL_TYPE.to_string());
        let timestamp = row
            .try_get::<Option<String>, _>("timestamp")?
            .unwrap_or_default();

        let mut contact = Contact::new(&vessel_type, &timestamp)
            .with_speed(row.try_get("speed")?)
            .with_heading(row.try_get("heading")?)
            .with_significance(significance)
            .with_confidence(row.try_get::<Option<f64>, _>("confidence")?.unwrap_or(0.0))
            .with_description(&row.try_get::<Option<String>, _>("description")?.unwrap_or_default());
        contact.latitude = row.try_get("latitude")?;
        contact.longitude = row.try_get("longitude")?;

        Ok(StoredContact { id, contact })
    }
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    async fn store(&self, contact: &Contact) -> Result<StoreOutcome, StoreError> {
        if let Some(reason) = SkipReason::for_contact(contact) {
            debug!("Skipping contact ({}): {}", reason, contact.vessel_type);
            return Ok(StoreOutcome::Skipped(reason));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO contacts
                (latitude, longitude, speed, type, timestamp, significance, heading, confidence, description)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(contact.latitude)
        .bind(contact.longitude)
        .bind(contact.speed)
        .bind(&contact.vessel_type)
        .bind(&contact.timestamp)
        .bind(contact.significance.as_str())
        .bind(contact.heading)
        .bind(contact.confidence)
        .bind(&contact.description)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Stored contact {} ({})", id, contact.vessel_type);
        Ok(StoreOutcome::Stored(id))
    }

    async fn latest(&self) -> Result<Option<StoredContact>, StoreError> {
        let sql = format!(
            "SELECT {} FROM contacts WHERE latitude IS NOT NULL AND longitude IS NOT NULL ORDER BY id DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_contact).transpose()
    }

    async fn all_valid(&self) -> Result<Vec<StoredContact>, StoreError> {
        let sql = format!(
            "SELECT {} FROM contacts WHERE latitude IS NOT NULL AND longitude IS NOT NULL ORDER BY id ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_contact).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &str {
        "sqlite"
    }
}
