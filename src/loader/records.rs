//! Raw row shapes deserialized straight off the GTFS CSVs, before they're translated
//! into `search_core::schedule` types. Field sets mirror `src/gtfs/model.rs`, trimmed
//! to the columns spec §6 actually consumes.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RouteRow {
    pub route_id: String,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_type: u16,
}

#[derive(Debug, Deserialize)]
pub struct TripRow {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    pub trip_short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StopTimeRow {
    pub trip_id: String,
    pub stop_sequence: u32,
    pub arrival_time: String,
    pub departure_time: String,
    pub stop_id: String,
    pub pickup_type: Option<u8>,
    pub drop_off_type: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarRow {
    pub service_id: String,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize)]
pub struct CalendarDateRow {
    pub service_id: String,
    pub date: String,
    pub exception_type: u8,
}

#[derive(Debug, Deserialize)]
pub struct TransferRow {
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub transfer_type: Option<u8>,
    pub min_transfer_time: Option<i32>,
    #[serde(default)]
    pub from_trip_id: Option<String>,
    #[serde(default)]
    pub to_trip_id: Option<String>,
    #[serde(default)]
    pub from_route_id: Option<String>,
    #[serde(default)]
    pub to_route_id: Option<String>,
}
