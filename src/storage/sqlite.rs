use crate::model::{Offer, OfferCategory, OfferSettings, StorageError};
use crate::storage::OfferSink;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use std::path::Path;
use tracing::info;

const OFFER_COLUMNS: &str = "audience_model, make, model, trim, year, offer_type,
    payment, payment_label, term, down_payment, down_payment_label, expiration,
    price, disclaimer, apr, name, amount, free_text, vin, msrp, full_offer";

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database and makes sure the offers table is current.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path)?;
        Self::create_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::create_schema(&conn)?;
        Ok(Self { conn })
    }

    fn create_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS offers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                audience_model TEXT NOT NULL,
                make TEXT NOT NULL,
                model TEXT,
                trim TEXT,
                year INTEGER,
                offer_type TEXT,
                payment REAL,
                payment_label TEXT,
                term INTEGER,
                down_payment REAL,
                down_payment_label TEXT,
                expiration TEXT,
                price TEXT,
                disclaimer TEXT NOT NULL DEFAULT '',
                apr TEXT,
                name TEXT,
                amount REAL,
                free_text TEXT,
                vin TEXT,
                msrp REAL,
                full_offer TEXT NOT NULL DEFAULT '',
                scraped_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts one offer stamped with `scraped_at`.
    fn insert_offer(
        conn: &Connection,
        offer: &Offer,
        scraped_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let settings = &offer.offer_settings;
        conn.execute(
            &format!(
                "INSERT INTO offers ({}, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
                OFFER_COLUMNS
            ),
            params![
                &offer.audience_model,
                &offer.make,
                &offer.model,
                &offer.trim,
                &offer.year,
                offer.offer_type.map(|t| t.as_str()),
                &settings.payment,
                &settings.payment_label,
                &settings.term,
                &settings.down_payment,
                &settings.down_payment_label,
                &settings.expiration,
                &settings.price,
                &settings.disclaimer,
                &settings.apr,
                &settings.name,
                &settings.amount,
                &settings.free_text,
                &settings.vin,
                &settings.msrp,
                &settings.full_offer,
                &scraped_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All stored offers in insertion order.
    pub fn get_all_offers(&self) -> Result<Vec<Offer>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM offers ORDER BY id ASC", OFFER_COLUMNS))?;

        let rows = stmt.query_map([], Self::map_offer)?;
        let mut offers = Vec::new();
        for offer in rows {
            offers.push(offer?);
        }

        Ok(offers)
    }

    fn map_offer(row: &Row) -> Result<Offer, rusqlite::Error> {
        let offer_type: Option<String> = row.get(5)?;
        Ok(Offer {
            audience_model: row.get(0)?,
            make: row.get(1)?,
            model: row.get(2)?,
            trim: row.get(3)?,
            year: row.get(4)?,
            offer_type: offer_type.as_deref().and_then(OfferCategory::parse),
            offer_settings: OfferSettings {
                payment: row.get(6)?,
                payment_label: row.get(7)?,
                term: row.get(8)?,
                down_payment: row.get(9)?,
                down_payment_label: row.get(10)?,
                expiration: row.get(11)?,
                price: row.get(12)?,
                disclaimer: row.get(13)?,
                apr: row.get(14)?,
                name: row.get(15)?,
                amount: row.get(16)?,
                free_text: row.get(17)?,
                vin: row.get(18)?,
                msrp: row.get(19)?,
                full_offer: row.get(20)?,
            },
        })
    }
}

impl OfferSink for SqliteStorage {
    fn save_all(&mut self, offers: &[Offer]) -> Result<(), StorageError> {
        let scraped_at = Utc::now();
        let tx = self.conn.transaction()?;
        for offer in offers {
            Self::insert_offer(&tx, offer, scraped_at)?;
        }
        tx.commit()?;
        info!("Saved {} offers to SQLite", offers.len());
        Ok(())
    }
}
