// Hotel inventory data model
// Wire shapes of the inventory payload and the in-memory snapshot the rest of the service reads

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

// Where a read of hotel data was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Live,
    Cached,
    Fallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Live => "live",
            Provenance::Cached => "cached",
            Provenance::Fallback => "fallback",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Provenance::Live)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// The six room types the hotel sells: three categories, each with and without a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomTypeId {
    #[serde(rename = "EXEC_VIEW_001")]
    ExecutiveView,
    #[serde(rename = "EXEC_NON_002")]
    ExecutiveNonView,
    #[serde(rename = "FAM_VIEW_003")]
    FamilyView,
    #[serde(rename = "FAM_NON_004")]
    FamilyNonView,
    #[serde(rename = "JUNIOR_VIEW_005")]
    JuniorView,
    #[serde(rename = "JUNIOR_NON_006")]
    JuniorNonView,
}

impl RoomTypeId {
    pub const ALL: [RoomTypeId; 6] = [
        RoomTypeId::ExecutiveView,
        RoomTypeId::ExecutiveNonView,
        RoomTypeId::FamilyView,
        RoomTypeId::FamilyNonView,
        RoomTypeId::JuniorView,
        RoomTypeId::JuniorNonView,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomTypeId::ExecutiveView => "EXEC_VIEW_001",
            RoomTypeId::ExecutiveNonView => "EXEC_NON_002",
            RoomTypeId::FamilyView => "FAM_VIEW_003",
            RoomTypeId::FamilyNonView => "FAM_NON_004",
            RoomTypeId::JuniorView => "JUNIOR_VIEW_005",
            RoomTypeId::JuniorNonView => "JUNIOR_NON_006",
        }
    }
}

impl fmt::Display for RoomTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Unknown room type id: {0}")]
pub struct UnknownRoomType(pub String);

impl FromStr for RoomTypeId {
    type Err = UnknownRoomType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoomTypeId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownRoomType(s.to_string()))
    }
}

// Data structures for the inventory source JSON payload
#[derive(Debug, Deserialize, Serialize)]
pub struct HotelPayload {
    pub hotel_name: String,
    pub location: HotelLocation,
    pub contact: HotelContact,
    pub checkin_checkout: CheckinCheckout,
    #[serde(default)]
    pub rooms: Vec<RoomPayload>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HotelLocation {
    pub address: HotelAddress,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HotelAddress {
    pub line1: String,
    pub city: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HotelContact {
    pub phone: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CheckinCheckout {
    pub check_in_time: String,
    pub check_out_time: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RoomPayload {
    pub room_type_id: String,
    pub room_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bed_type: String,
    #[serde(default)]
    pub max_occupancy: Occupancy,
    #[serde(default)]
    pub room_size_sqft: u32,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub pricing: RoomPricing,
    #[serde(default)]
    pub availability: Vec<AvailabilityPayload>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Occupancy {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RoomPricing {
    #[serde(default = "default_currency")]
    pub currency: String,
    pub base_price_per_night: f64,
    pub taxes: TaxRates,
    #[serde(default)]
    pub total_price_estimate: Option<f64>,
}

fn default_currency() -> String {
    "INR".to_string()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TaxRates {
    pub gst_percentage: f64,
    pub service_charge_percentage: f64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AvailabilityPayload {
    pub date: NaiveDate,
    pub available_rooms: u32,
    #[serde(default)]
    pub status: String,
}

// In-memory view of the hotel, rebuilt whenever a new payload is loaded
#[derive(Debug, Clone, PartialEq)]
pub struct HotelSnapshot {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub check_in_time: String,
    pub check_out_time: String,
    pub rooms: Vec<RoomRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomRecord {
    pub id: RoomTypeId,
    pub name: String,
    pub description: String,
    pub bed_type: String,
    pub occupancy: Occupancy,
    pub size_sqft: u32,
    pub amenities: Vec<String>,
    pub currency: String,
    pub base_nightly_price: f64,
    pub taxes: TaxRates,
    pub total_price_estimate: Option<f64>,
    pub availability: Vec<AvailabilityEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityEntry {
    pub date: NaiveDate,
    pub rooms_remaining: u32,
    pub status: String,
}

impl HotelSnapshot {
    // Accepts either the bare hotel object or one wrapped as {"hotel": {...}}
    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        let hotel = payload.get("hotel").unwrap_or(payload);
        let parsed = HotelPayload::deserialize(hotel)?;
        Ok(parsed.into())
    }

    pub fn room(&self, id: RoomTypeId) -> Option<&RoomRecord> {
        self.rooms.iter().find(|room| room.id == id)
    }
}

impl From<HotelPayload> for HotelSnapshot {
    fn from(item: HotelPayload) -> Self {
        let rooms = item
            .rooms
            .into_iter()
            .filter_map(|room| match RoomRecord::try_from(room) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Dropping room with non-canonical id");
                    None
                }
            })
            .collect();

        HotelSnapshot {
            name: item.hotel_name,
            address: format!(
                "{}, {}",
                item.location.address.line1, item.location.address.city
            ),
            phone: item.contact.phone,
            check_in_time: item.checkin_checkout.check_in_time,
            check_out_time: item.checkin_checkout.check_out_time,
            rooms,
        }
    }
}

impl TryFrom<RoomPayload> for RoomRecord {
    type Error = UnknownRoomType;

    fn try_from(item: RoomPayload) -> Result<Self, Self::Error> {
        let id = item.room_type_id.parse::<RoomTypeId>()?;

        // Dates must be unique per room, first entry wins
        let mut seen = HashSet::new();
        let availability = item
            .availability
            .into_iter()
            .filter(|entry| {
                let first = seen.insert(entry.date);
                if !first {
                    warn!(room = %id, date = %entry.date, "Ignoring duplicate availability date");
                }
                first
            })
            .map(|entry| AvailabilityEntry {
                date: entry.date,
                rooms_remaining: entry.available_rooms,
                status: entry.status,
            })
            .collect();

        Ok(RoomRecord {
            id,
            name: item.room_name,
            description: item.description,
            bed_type: item.bed_type,
            occupancy: item.max_occupancy,
            size_sqft: item.room_size_sqft,
            amenities: item.amenities,
            currency: item.pricing.currency,
            base_nightly_price: item.pricing.base_price_per_night,
            taxes: item.pricing.taxes,
            total_price_estimate: item.pricing.total_price_estimate,
            availability,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wrapped_sample_payload() {
        let snapshot = sample_snapshot();

        assert_eq!(snapshot.name, "Lakeview Grand Hotel");
        assert_eq!(snapshot.address, "12 Lake Shore Road, Udaipur");
        assert_eq!(snapshot.phone, "+91 294 555 0101");
        assert_eq!(snapshot.check_in_time, "14:00");
        assert_eq!(snapshot.rooms.len(), 6);

        let ids: Vec<RoomTypeId> = snapshot.rooms.iter().map(|r| r.id).collect();
        assert_eq!(ids, RoomTypeId::ALL.to_vec());

        let exec = snapshot.room(RoomTypeId::ExecutiveView).unwrap();
        assert_eq!(exec.base_nightly_price, 5000.0);
        assert_eq!(exec.taxes.gst_percentage, 12.0);
        assert_eq!(exec.taxes.service_charge_percentage, 5.0);
        assert_eq!(exec.occupancy.adults, 2);
    }

    #[test]
    fn test_parse_unwrapped_payload() {
        let payload = sample_payload();
        let hotel = payload.get("hotel").unwrap().clone();

        let snapshot = HotelSnapshot::from_payload(&hotel).unwrap();
        assert_eq!(snapshot, sample_snapshot());
    }

    #[test]
    fn test_non_canonical_rooms_are_dropped() {
        let payload = json!({
            "hotel_name": "Test Hotel",
            "location": {"address": {"line1": "1 Main St", "city": "Pune"}},
            "contact": {"phone": "123"},
            "checkin_checkout": {"check_in_time": "12:00", "check_out_time": "10:00"},
            "rooms": [
                {
                    "room_type_id": "PENTHOUSE_999",
                    "room_name": "Penthouse",
                    "pricing": {"base_price_per_night": 90000, "taxes": {"gst_percentage": 18, "service_charge_percentage": 10}}
                },
                {
                    "room_type_id": "JUNIOR_NON_006",
                    "room_name": "Junior Suite Non-View",
                    "pricing": {"base_price_per_night": 3000, "taxes": {"gst_percentage": 12, "service_charge_percentage": 5}}
                }
            ]
        });

        let snapshot = HotelSnapshot::from_payload(&payload).unwrap();
        assert_eq!(snapshot.rooms.len(), 1);
        assert_eq!(snapshot.rooms[0].id, RoomTypeId::JuniorNonView);
        assert_eq!(snapshot.rooms[0].currency, "INR");
        assert!(snapshot.rooms[0].availability.is_empty());
    }

    #[test]
    fn test_duplicate_availability_dates_keep_first() {
        let payload = json!({
            "hotel_name": "Test Hotel",
            "location": {"address": {"line1": "1 Main St", "city": "Pune"}},
            "contact": {"phone": "123"},
            "checkin_checkout": {"check_in_time": "12:00", "check_out_time": "10:00"},
            "rooms": [{
                "room_type_id": "FAM_VIEW_003",
                "room_name": "Family Suite View",
                "pricing": {"base_price_per_night": 6500, "taxes": {"gst_percentage": 12, "service_charge_percentage": 5}},
                "availability": [
                    {"date": "2025-06-01", "available_rooms": 3, "status": "available"},
                    {"date": "2025-06-01", "available_rooms": 0, "status": "sold_out"},
                    {"date": "2025-06-02", "available_rooms": 1, "status": "available"}
                ]
            }]
        });

        let snapshot = HotelSnapshot::from_payload(&payload).unwrap();
        let room = &snapshot.rooms[0];
        assert_eq!(room.availability.len(), 2);
        assert_eq!(room.availability[0].rooms_remaining, 3);
    }

    #[test]
    fn test_missing_required_fields_fail() {
        let result = HotelSnapshot::from_payload(&json!({"rooms": []}));
        assert!(result.is_err());
    }

    #[test]
    fn test_room_type_id_round_trips_through_str() {
        for id in RoomTypeId::ALL {
            assert_eq!(id.as_str().parse::<RoomTypeId>(), Ok(id));
        }
        assert_eq!(
            "DELUXE_007".parse::<RoomTypeId>(),
            Err(UnknownRoomType("DELUXE_007".to_string()))
        );
    }

    #[test]
    fn test_provenance_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Provenance::Live).unwrap(), json!("live"));
        assert_eq!(serde_json::to_value(Provenance::Cached).unwrap(), json!("cached"));
        assert_eq!(serde_json::to_value(Provenance::Fallback).unwrap(), json!("fallback"));
        assert!(!Provenance::Fallback.is_live());
    }
}
