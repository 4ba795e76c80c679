// Inventory engine
// Resolves free-form room selectors to canonical rooms and computes availability and tax-inclusive prices

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::data_store::{DataStore, DataStoreError};
use crate::hotel_data::{HotelSnapshot, Provenance, RoomRecord, RoomTypeId};

// Rooms assumed free on a check-in date the inventory does not list
pub const DEFAULT_ROOMS_WHEN_UNLISTED: u32 = 5;

pub const UNKNOWN_ROOM_NAME: &str = "Unknown";

// Selector values sent by the booking widget
pub const UI_ROOM_SELECTORS: [(&str, RoomTypeId); 6] = [
    ("executive-view", RoomTypeId::ExecutiveView),
    ("executive-non-view", RoomTypeId::ExecutiveNonView),
    ("family-view", RoomTypeId::FamilyView),
    ("family-non-view", RoomTypeId::FamilyNonView),
    ("junior-view", RoomTypeId::JuniorView),
    ("junior-non-view", RoomTypeId::JuniorNonView),
];

// Keyword rules, first match wins. "view" is tested before "non", so "executive non view"
// lands on the view room; only the exact widget selector reaches the non-view one.
const KEYWORD_RULES: [(&str, Option<&str>, RoomTypeId); 9] = [
    ("executive", Some("view"), RoomTypeId::ExecutiveView),
    ("executive", Some("non"), RoomTypeId::ExecutiveNonView),
    ("family", Some("view"), RoomTypeId::FamilyView),
    ("family", Some("non"), RoomTypeId::FamilyNonView),
    ("junior", Some("view"), RoomTypeId::JuniorView),
    ("junior", Some("non"), RoomTypeId::JuniorNonView),
    ("executive", None, RoomTypeId::ExecutiveView),
    ("family", None, RoomTypeId::FamilyNonView),
    ("junior", None, RoomTypeId::JuniorNonView),
];

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error(transparent)]
    DataStore(#[from] DataStoreError),

    #[error("Malformed inventory payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

impl InventoryError {
    pub fn kind(&self) -> &'static str {
        match self {
            InventoryError::DataStore(e) => e.kind(),
            InventoryError::MalformedPayload(_) => "MalformedPayload",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DateRangeError {
    #[error("Invalid {field} date '{value}', expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("Check-out date {check_out} must be after check-in date {check_in}")]
    CheckOutNotAfterCheckIn {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
}

// A stay with check_out strictly after check_in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayDates {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayDates {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, DateRangeError> {
        if check_out <= check_in {
            return Err(DateRangeError::CheckOutNotAfterCheckIn {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn parse(check_in: &str, check_out: &str) -> Result<Self, DateRangeError> {
        let parse = |field: &'static str, value: &str| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
                DateRangeError::InvalidDate {
                    field,
                    value: value.to_string(),
                }
            })
        };
        Self::new(parse("check-in", check_in)?, parse("check-out", check_out)?)
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    // Calendar dates have no fractional days, so this is already the ceiling
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    // Half-open: the check-out night is not stayed
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.check_in && date < self.check_out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub available: bool,
    pub room_type: String,
    pub room_name: String,
    pub price_per_night: f64,
    pub total_price_with_taxes: f64,
    pub available_rooms_on_check_in: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub nights: i64,
    pub base_price: f64,
    pub gst: f64,
    pub service_charge: f64,
    pub total_price: f64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub room_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
}

// Facts the assistant is briefed with
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub check_in_time: String,
    pub check_out_time: String,
    pub rooms: Vec<RoomSummary>,
    pub data_source: Provenance,
}

// Round half up to the whole currency unit
pub fn round_currency(amount: f64) -> f64 {
    (amount + 0.5).floor()
}

// Exact widget selector, then keyword rules. None means "no preference".
pub fn resolve_room_type(selector: &str) -> Option<RoomTypeId> {
    let selector = selector.trim().to_lowercase();

    if let Some((_, id)) = UI_ROOM_SELECTORS.iter().find(|(ui, _)| *ui == selector) {
        return Some(*id);
    }

    KEYWORD_RULES
        .iter()
        .find(|(category, qualifier, _)| {
            selector.contains(category) && qualifier.map_or(true, |q| selector.contains(q))
        })
        .map(|(_, _, id)| *id)
}

impl HotelSnapshot {
    // Degrades to the first room rather than failing; None only for an empty snapshot
    pub fn resolve_room(&self, selector: &str) -> Option<&RoomRecord> {
        resolve_room_type(selector)
            .and_then(|id| self.room(id))
            .or_else(|| self.rooms.first())
    }
}

impl RoomRecord {
    pub fn is_available(&self, stay: &StayDates) -> bool {
        !self
            .availability
            .iter()
            .any(|entry| stay.covers(entry.date) && entry.rooms_remaining == 0)
    }

    pub fn rooms_remaining_on(&self, date: NaiveDate) -> Option<u32> {
        self.availability
            .iter()
            .find(|entry| entry.date == date)
            .map(|entry| entry.rooms_remaining)
    }

    // One night with taxes, preferring the estimate published with the inventory
    pub fn nightly_price_with_taxes(&self) -> f64 {
        self.total_price_estimate.unwrap_or_else(|| {
            let taxes = self.taxes.gst_percentage + self.taxes.service_charge_percentage;
            round_currency(self.base_nightly_price * (100.0 + taxes) / 100.0)
        })
    }

    pub fn quote(&self, stay: &StayDates) -> PriceQuote {
        let nights = stay.nights();
        let base_price = self.base_nightly_price * nights as f64;
        let gst = base_price * self.taxes.gst_percentage / 100.0;
        let service_charge = base_price * self.taxes.service_charge_percentage / 100.0;

        PriceQuote {
            nights,
            base_price,
            gst,
            service_charge,
            total_price: round_currency(base_price + gst + service_charge),
            check_in: stay.check_in(),
            check_out: stay.check_out(),
            room_name: self.name.clone(),
        }
    }
}

pub fn check_availability(
    snapshot: &HotelSnapshot,
    stay: &StayDates,
    selector: &str,
    unlisted_rooms: u32,
) -> AvailabilityReport {
    match snapshot.resolve_room(selector) {
        Some(room) => AvailabilityReport {
            available: room.is_available(stay),
            room_type: selector.to_string(),
            room_name: room.name.clone(),
            price_per_night: room.base_nightly_price,
            total_price_with_taxes: room.nightly_price_with_taxes(),
            available_rooms_on_check_in: room
                .rooms_remaining_on(stay.check_in())
                .unwrap_or(unlisted_rooms),
        },
        None => AvailabilityReport {
            available: false,
            room_type: selector.to_string(),
            room_name: UNKNOWN_ROOM_NAME.to_string(),
            price_per_night: 0.0,
            total_price_with_taxes: 0.0,
            available_rooms_on_check_in: 0,
        },
    }
}

pub fn calculate_price(snapshot: &HotelSnapshot, stay: &StayDates, selector: &str) -> PriceQuote {
    match snapshot.resolve_room(selector) {
        Some(room) => room.quote(stay),
        None => PriceQuote {
            nights: 0,
            base_price: 0.0,
            gst: 0.0,
            service_charge: 0.0,
            total_price: 0.0,
            check_in: stay.check_in(),
            check_out: stay.check_out(),
            room_name: UNKNOWN_ROOM_NAME.to_string(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub unlisted_rooms: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            unlisted_rooms: DEFAULT_ROOMS_WHEN_UNLISTED,
        }
    }
}

// A snapshot together with the tier it was served from
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub snapshot: Arc<HotelSnapshot>,
    pub provenance: Provenance,
}

pub struct InventoryEngine {
    store: DataStore,
    config: InventoryConfig,
    current: RwLock<Option<LoadedSnapshot>>,
    // Held while a snapshot is being (re)loaded
    load_lock: Mutex<()>,
}

impl InventoryEngine {
    pub fn new(store: DataStore, config: InventoryConfig) -> Self {
        Self {
            store,
            config,
            current: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    // Loads the snapshot on first use; later calls return the memoized one
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<LoadedSnapshot, InventoryError> {
        let current = self.current.read().clone();
        if let Some(loaded) = current {
            return Ok(loaded);
        }

        let _guard = self.load_lock.lock().await;
        let current = self.current.read().clone();
        if let Some(loaded) = current {
            return Ok(loaded);
        }

        let (payload, provenance) = self.store.fetch_inventory().await?;
        let loaded = self.install(&payload, provenance)?;
        info!(
            provenance = %provenance,
            rooms = loaded.snapshot.rooms.len(),
            "Hotel snapshot loaded"
        );
        Ok(loaded)
    }

    // Drops the snapshot so the next read goes back through the data store
    pub fn invalidate(&self) {
        if self.current.write().take().is_some() {
            debug!("Hotel snapshot invalidated");
        }
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Provenance, InventoryError> {
        let _guard = self.load_lock.lock().await;
        let (payload, provenance) = self.store.force_refresh().await?;
        let loaded = self.install(&payload, provenance)?;
        info!(
            provenance = %provenance,
            rooms = loaded.snapshot.rooms.len(),
            "Hotel snapshot refreshed"
        );
        Ok(provenance)
    }

    fn install(
        &self,
        payload: &serde_json::Value,
        provenance: Provenance,
    ) -> Result<LoadedSnapshot, InventoryError> {
        let loaded = LoadedSnapshot {
            snapshot: Arc::new(HotelSnapshot::from_payload(payload)?),
            provenance,
        };
        *self.current.write() = Some(loaded.clone());
        Ok(loaded)
    }

    pub async fn provenance(&self) -> Result<Provenance, InventoryError> {
        Ok(self.initialize().await?.provenance)
    }

    pub async fn hotel_info(&self) -> Result<HotelInfo, InventoryError> {
        let loaded = self.initialize().await?;
        let snapshot = &loaded.snapshot;

        Ok(HotelInfo {
            name: snapshot.name.clone(),
            address: snapshot.address.clone(),
            phone: snapshot.phone.clone(),
            check_in_time: snapshot.check_in_time.clone(),
            check_out_time: snapshot.check_out_time.clone(),
            rooms: snapshot
                .rooms
                .iter()
                .map(|room| RoomSummary {
                    name: room.name.clone(),
                    description: room.description.clone(),
                    price: room.base_nightly_price,
                    currency: room.currency.clone(),
                })
                .collect(),
            data_source: loaded.provenance,
        })
    }

    pub async fn resolve_room(&self, selector: &str) -> Result<Option<RoomRecord>, InventoryError> {
        let loaded = self.initialize().await?;
        Ok(loaded.snapshot.resolve_room(selector).cloned())
    }

    pub async fn check_availability(
        &self,
        stay: &StayDates,
        selector: &str,
    ) -> Result<AvailabilityReport, InventoryError> {
        let loaded = self.initialize().await?;
        Ok(check_availability(
            &loaded.snapshot,
            stay,
            selector,
            self.config.unlisted_rooms,
        ))
    }

    pub async fn calculate_price(
        &self,
        stay: &StayDates,
        selector: &str,
    ) -> Result<PriceQuote, InventoryError> {
        let loaded = self.initialize().await?;
        Ok(calculate_price(&loaded.snapshot, stay, selector))
    }
}
