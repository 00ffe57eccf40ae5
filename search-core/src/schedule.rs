use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::time::{Duration, Instant, ServiceDay, Time};

pub type StopId = String;
pub type RouteId = String;
pub type TripId = String;
pub type ServiceId = String;

/// Refers to a specific stop-time: the trip it belongs to, and its index within that
/// trip's `stop_times`, ordered by `stop_sequence`.
pub type TripStopRef = (TripId, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopKind {
    Platform,
    Station,
    Entrance,
    GenericNode,
    BoardingArea,
}

impl StopKind {
    pub fn from_location_type(location_type: u8) -> Result<StopKind, ScheduleError> {
        match location_type {
            0 => Ok(StopKind::Platform),
            1 => Ok(StopKind::Station),
            2 => Ok(StopKind::Entrance),
            3 => Ok(StopKind::GenericNode),
            4 => Ok(StopKind::BoardingArea),
            other => Err(ScheduleError::UnknownEnumValue {
                field: "stops.location_type",
                value: other as i64,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stop {
    pub stop_id: StopId,
    pub stop_name: Option<String>,
    pub kind: StopKind,
    pub parent_station: Option<StopId>,
    pub transfer_node_id: Option<String>,
}

/// The GTFS/Google-Transit mode tags the engine is agnostic to but the schedule
/// model still needs a concrete type for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteType {
    TramLightRail,
    Metro,
    Rail,
    Bus,
    Ferry,
    CableTram,
    AerialLift,
    Funicular,
    Trolleybus,
    Monorail,
}

impl RouteType {
    /// Standard GTFS `route_type` codes, plus the Google Transit extended ranges,
    /// collapsed onto the mode tags above. Values outside both ranges are errors.
    pub fn from_gtfs_code(code: u16) -> Result<RouteType, ScheduleError> {
        use RouteType::*;
        let tag = match code {
            0 => TramLightRail,
            1 => Metro,
            2 => Rail,
            3 => Bus,
            4 => Ferry,
            5 => CableTram,
            6 => AerialLift,
            7 => Funicular,
            11 => Trolleybus,
            12 => Monorail,
            100..=199 => Rail,
            200..=299 => Bus,
            300..=399 => Rail,
            400..=499 => Metro,
            500..=599 => Metro,
            600..=699 => Metro,
            700..=799 => Bus,
            800..=899 => Trolleybus,
            900..=999 => TramLightRail,
            1000..=1099 => Ferry,
            1200..=1299 => Ferry,
            1300..=1399 => AerialLift,
            1400..=1499 => Funicular,
            other => {
                return Err(ScheduleError::UnknownEnumValue {
                    field: "routes.route_type",
                    value: other as i64,
                })
            }
        };
        Ok(tag)
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub route_id: RouteId,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub route_type: RouteType,
}

#[derive(Debug, Clone)]
pub struct Trip {
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub service_id: ServiceId,
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickupDropoffType {
    Regular,
    NotAvailable,
    PhoneAgency,
    CoordinateWithDriver,
}

impl PickupDropoffType {
    pub fn from_gtfs_code(code: Option<u8>) -> Result<PickupDropoffType, ScheduleError> {
        match code.unwrap_or(0) {
            0 => Ok(PickupDropoffType::Regular),
            1 => Ok(PickupDropoffType::NotAvailable),
            2 => Ok(PickupDropoffType::PhoneAgency),
            3 => Ok(PickupDropoffType::CoordinateWithDriver),
            other => Err(ScheduleError::UnknownEnumValue {
                field: "stop_times.pickup_type/drop_off_type",
                value: other as i64,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StopTime {
    pub trip_id: TripId,
    pub stop_sequence: u32,
    pub arrival: Time,
    pub departure: Time,
    pub stop_id: StopId,
    pub pickup_policy: PickupDropoffType,
    pub dropoff_policy: PickupDropoffType,
}

#[derive(Debug, Clone)]
pub struct CalendarRecord {
    pub service_id: ServiceId,
    pub weekday_active: [bool; 7], // Monday = 0 .. Sunday = 6, per chrono::Weekday::num_days_from_monday
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMode {
    None,
    ByNodeId,
    ByParentStation,
    ByTransfersTxt,
}

impl std::str::FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<TransferMode, String> {
        match s {
            "none" => Ok(TransferMode::None),
            "by_node_id" => Ok(TransferMode::ByNodeId),
            "by_parent_station" => Ok(TransferMode::ByParentStation),
            "by_transfers_txt" => Ok(TransferMode::ByTransfersTxt),
            other => Err(format!("unknown TRANSFER_MODE {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferKind {
    /// Synthesized by the engine from `by_node_id` or `by_parent_station` mode.
    Synthesized,
    /// From `transfers.txt`, GTFS `transfer_type` 0-5.
    Recommended,
    Timed,
    MinimumTime,
    NotPossible,
    InSeat,
    InSeatReboard,
}

impl TransferKind {
    pub fn from_gtfs_code(code: Option<u8>) -> Result<TransferKind, ScheduleError> {
        match code.unwrap_or(0) {
            0 => Ok(TransferKind::Recommended),
            1 => Ok(TransferKind::Timed),
            2 => Ok(TransferKind::MinimumTime),
            3 => Ok(TransferKind::NotPossible),
            4 => Ok(TransferKind::InSeat),
            5 => Ok(TransferKind::InSeatReboard),
            other => Err(ScheduleError::UnknownEnumValue {
                field: "transfers.transfer_type",
                value: other as i64,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from_stop_id: StopId,
    pub to_stop_id: StopId,
    pub kind: TransferKind,
    pub transfer_time: Duration,
}

/// A validated candidate departure found by [`ScheduleIndex::seek_departure`] or
/// [`ScheduleIndex::next_departure`]. `sweep_day` continues the cyclic index scan;
/// `service_day` is the GTFS service day the trip's offsets are anchored to, for use
/// in `Connection`/`OpenConnection` segments.
#[derive(Debug, Clone)]
pub struct DepartureCandidate {
    pub idx: usize,
    pub sweep_day: ServiceDay,
    pub service_day: ServiceDay,
    pub wall_clock: Instant,
    pub stop_ref: TripStopRef,
}

/// The in-memory, read-only model built once from GTFS inputs. Answers the lookups and
/// secondary groupings the search engine needs without ever touching disk again.
pub struct ScheduleIndex {
    stops_by_id: HashMap<StopId, Stop>,
    trips_by_id: HashMap<TripId, Trip>,
    stop_times_by_trip: HashMap<TripId, Vec<StopTime>>,
    /// Departures leaving each stop, as `(departure mod 24h, stop-time ref)`, sorted
    /// ascending by that key so a cyclic sweep can enumerate subsequent departures.
    stop_times_by_stop: HashMap<StopId, Vec<(Time, TripStopRef)>>,
    calendar_by_service_id: HashMap<ServiceId, CalendarRecord>,
    calendar_exceptions: HashMap<(ServiceId, chrono::NaiveDate), bool>,

    transfer_mode: TransferMode,
    min_transfer_time: Duration,
    stops_by_transfer_node_id: HashMap<String, Vec<StopId>>,
    stops_by_parent_station: HashMap<StopId, Vec<StopId>>,
    transfers_by_from_stop: HashMap<StopId, Vec<Transfer>>,

    runs_on_day_cache: RefCell<HashMap<(ServiceId, chrono::NaiveDate), bool>>,
}

impl ScheduleIndex {
    pub fn get_stop(&self, id: &str) -> Result<&Stop, UnknownId> {
        self.stops_by_id.get(id).ok_or_else(|| UnknownId::stop(id))
    }

    /// All stop-times of a trip, ordered by `stop_sequence`.
    pub fn stop_times_on_trip(&self, trip_id: &str) -> &[StopTime] {
        self.stop_times_by_trip
            .get(trip_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn stop_time(&self, stop_ref: &TripStopRef) -> &StopTime {
        &self.stop_times_by_trip.get(&stop_ref.0).expect(
            "TripStopRef trip_id to be present: every ref is produced from a validated index",
        )[stop_ref.1]
    }

    fn departures_at_stop(&self, stop_id: &str) -> &[(Time, TripStopRef)] {
        self.stop_times_by_stop
            .get(stop_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `runs_on_day` as specified: exceptions win, otherwise the weekly pattern bounded
    /// by `[start_date, end_date]`. Memoized per `(service_id, date)`.
    pub fn runs_on_day(&self, service_id: &str, day: ServiceDay) -> bool {
        let key = (service_id.to_owned(), day.date());
        if let Some(&cached) = self.runs_on_day_cache.borrow().get(&key) {
            return cached;
        }
        let result = if let Some(&available) = self.calendar_exceptions.get(&key) {
            available
        } else if let Some(record) = self.calendar_by_service_id.get(service_id) {
            day.date() >= record.start_date
                && day.date() <= record.end_date
                && record.weekday_active[day.weekday().num_days_from_monday() as usize]
        } else {
            false
        };
        self.runs_on_day_cache.borrow_mut().insert(key, result);
        result
    }

    /// Transfers leaving `stop_id`, per the configured `TransferMode`. Self-loops are
    /// never returned.
    pub fn transfers_from(&self, stop_id: &str) -> Vec<Transfer> {
        match self.transfer_mode {
            TransferMode::None => vec![],
            TransferMode::ByNodeId => {
                let node_id = match self.stops_by_id.get(stop_id).and_then(|s| s.transfer_node_id.as_deref()) {
                    Some(id) => id,
                    None => return vec![],
                };
                self.stops_by_transfer_node_id
                    .get(node_id)
                    .into_iter()
                    .flatten()
                    .filter(|to_stop_id| to_stop_id.as_str() != stop_id)
                    .map(|to_stop_id| Transfer {
                        from_stop_id: stop_id.to_owned(),
                        to_stop_id: to_stop_id.clone(),
                        kind: TransferKind::Synthesized,
                        transfer_time: self.min_transfer_time,
                    })
                    .collect()
            }
            TransferMode::ByParentStation => {
                let parent = match self.stops_by_id.get(stop_id).and_then(|s| s.parent_station.as_deref()) {
                    Some(id) => id,
                    None => return vec![],
                };
                self.stops_by_parent_station
                    .get(parent)
                    .into_iter()
                    .flatten()
                    .filter(|to_stop_id| to_stop_id.as_str() != stop_id)
                    .map(|to_stop_id| Transfer {
                        from_stop_id: stop_id.to_owned(),
                        to_stop_id: to_stop_id.clone(),
                        kind: TransferKind::Synthesized,
                        transfer_time: self.min_transfer_time,
                    })
                    .collect()
            }
            TransferMode::ByTransfersTxt => self
                .transfers_by_from_stop
                .get(stop_id)
                .into_iter()
                .flatten()
                .filter(|t| t.to_stop_id != stop_id)
                .map(|t| Transfer {
                    from_stop_id: t.from_stop_id.clone(),
                    to_stop_id: t.to_stop_id.clone(),
                    kind: t.kind,
                    transfer_time: std::cmp::max(t.transfer_time, self.min_transfer_time),
                })
                .collect(),
        }
    }

    /// Seek the first departure from `stop_id` at or after `not_before`, then validate
    /// it (and advance past invalid candidates) within a `window` of `not_before`.
    pub fn seek_departure(
        &self,
        stop_id: &str,
        not_before: Instant,
        window: Duration,
    ) -> Option<DepartureCandidate> {
        let deps = self.departures_at_stop(stop_id);
        if deps.is_empty() {
            return None;
        }
        let time_of_day = not_before.time_of_day();
        let start_idx = deps.partition_point(|(key, _)| *key < time_of_day);
        self.next_departure(stop_id, start_idx, not_before.date(), not_before + window)
    }

    /// Advance from `(from_idx, from_day)` (inclusive) to the next valid departure at
    /// or before `window_end`, wrapping the index at the end of the day's departures.
    pub fn next_departure(
        &self,
        stop_id: &str,
        mut idx: usize,
        mut sweep_day: ServiceDay,
        window_end: Instant,
    ) -> Option<DepartureCandidate> {
        let deps = self.departures_at_stop(stop_id);
        if deps.is_empty() {
            return None;
        }
        loop {
            if idx >= deps.len() {
                idx = 0;
                sweep_day = sweep_day.succ();
            }
            let (mod24_key, stop_ref) = &deps[idx];
            let wall_clock = Instant::new(sweep_day, *mod24_key);
            if wall_clock > window_end {
                return None;
            }
            let stop_time = self.stop_time(stop_ref);
            let service_day = sweep_day.add_days(-stop_time.departure.day_offset());
            let trip = self.trips_by_id.get(&stop_ref.0).expect(
                "TripStopRef trip_id to be present: every ref is produced from a validated index",
            );
            if stop_time.pickup_policy != PickupDropoffType::NotAvailable
                && self.runs_on_day(&trip.service_id, service_day)
            {
                return Some(DepartureCandidate {
                    idx,
                    sweep_day,
                    service_day,
                    wall_clock,
                    stop_ref: stop_ref.clone(),
                });
            }
            idx += 1;
        }
    }

    /// Locate `departure_stoptime`'s index within its trip, then advance to the next
    /// stop-time with drop-off allowed. `None` if the trip ends before one is found.
    pub fn next_dropoff_after(&self, stop_ref: &TripStopRef) -> Option<TripStopRef> {
        let stop_times = self.stop_times_on_trip(&stop_ref.0);
        ((stop_ref.1 + 1)..stop_times.len())
            .find(|&i| stop_times[i].dropoff_policy != PickupDropoffType::NotAvailable)
            .map(|i| (stop_ref.0.clone(), i))
    }

}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownId {
    pub kind: &'static str,
    pub id: String,
}

impl UnknownId {
    fn stop(id: &str) -> UnknownId {
        UnknownId { kind: "stop", id: id.to_owned() }
    }
}

impl std::fmt::Display for UnknownId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} id {:?}", self.kind, self.id)
    }
}

impl std::error::Error for UnknownId {}

/// Builds a `ScheduleIndex` from individually-added records. Pure and in-memory: no
/// I/O, no knowledge of CSV or the on-disk GTFS layout.
pub struct ScheduleIndexBuilder {
    stops_by_id: HashMap<StopId, Stop>,
    routes_by_id: HashMap<RouteId, Route>,
    trips_by_id: HashMap<TripId, Trip>,
    stop_times_by_trip: HashMap<TripId, Vec<StopTime>>,
    calendar_by_service_id: HashMap<ServiceId, CalendarRecord>,
    calendar_exceptions: HashMap<(ServiceId, chrono::NaiveDate), bool>,
    raw_transfers: Vec<Transfer>,

    transfer_mode: TransferMode,
    min_transfer_time: Duration,
}

impl ScheduleIndexBuilder {
    pub fn new(transfer_mode: TransferMode, min_transfer_time: Duration) -> ScheduleIndexBuilder {
        ScheduleIndexBuilder {
            stops_by_id: HashMap::new(),
            routes_by_id: HashMap::new(),
            trips_by_id: HashMap::new(),
            stop_times_by_trip: HashMap::new(),
            calendar_by_service_id: HashMap::new(),
            calendar_exceptions: HashMap::new(),
            raw_transfers: Vec::new(),
            transfer_mode,
            min_transfer_time,
        }
    }

    pub fn add_stop(&mut self, stop: Stop) -> Result<(), ScheduleError> {
        if self.stops_by_id.contains_key(&stop.stop_id) {
            return Err(ScheduleError::DuplicateStop(stop.stop_id));
        }
        self.stops_by_id.insert(stop.stop_id.clone(), stop);
        Ok(())
    }

    pub fn add_route(
        &mut self,
        route_id: RouteId,
        short_name: Option<String>,
        long_name: Option<String>,
        route_type: RouteType,
    ) -> Result<(), ScheduleError> {
        if short_name.is_none() && long_name.is_none() {
            return Err(ScheduleError::EmptyRouteName(route_id));
        }
        if self.routes_by_id.contains_key(&route_id) {
            return Err(ScheduleError::DuplicateRoute(route_id));
        }
        self.routes_by_id.insert(
            route_id.clone(),
            Route { route_id, short_name, long_name, route_type },
        );
        Ok(())
    }

    pub fn add_trip(
        &mut self,
        trip_id: TripId,
        route_id: RouteId,
        service_id: ServiceId,
        short_name: Option<String>,
    ) -> Result<(), ScheduleError> {
        if self.trips_by_id.contains_key(&trip_id) {
            return Err(ScheduleError::DuplicateTrip(trip_id));
        }
        if !self.routes_by_id.contains_key(&route_id) {
            return Err(ScheduleError::ReferencesUnknownRoute { trip_id, route_id });
        }
        self.trips_by_id.insert(
            trip_id.clone(),
            Trip { trip_id, route_id, service_id, short_name },
        );
        Ok(())
    }

    pub fn add_stop_time(&mut self, stop_time: StopTime) -> Result<(), ScheduleError> {
        if !self.stops_by_id.contains_key(&stop_time.stop_id) {
            return Err(ScheduleError::ReferencesUnknownStop {
                trip_id: stop_time.trip_id,
                stop_id: stop_time.stop_id,
            });
        }
        self.stop_times_by_trip
            .entry(stop_time.trip_id.clone())
            .or_default()
            .push(stop_time);
        Ok(())
    }

    pub fn add_calendar(&mut self, record: CalendarRecord) -> Result<(), ScheduleError> {
        if self.calendar_by_service_id.contains_key(&record.service_id) {
            return Err(ScheduleError::DuplicateCalendar(record.service_id));
        }
        self.calendar_by_service_id
            .insert(record.service_id.clone(), record);
        Ok(())
    }

    pub fn add_calendar_exception(
        &mut self,
        service_id: ServiceId,
        date: chrono::NaiveDate,
        available: bool,
    ) {
        self.calendar_exceptions.insert((service_id, date), available);
    }

    pub fn add_transfer(&mut self, transfer: Transfer) {
        self.raw_transfers.push(transfer);
    }

    pub fn build(mut self) -> Result<ScheduleIndex, ScheduleError> {
        for stop_times in self.stop_times_by_trip.values_mut() {
            stop_times.sort_by_key(|st| st.stop_sequence);
        }

        let mut stop_times_by_stop: HashMap<StopId, Vec<(Time, TripStopRef)>> = HashMap::new();
        for (trip_id, stop_times) in &self.stop_times_by_trip {
            for (idx, stop_time) in stop_times.iter().enumerate() {
                stop_times_by_stop
                    .entry(stop_time.stop_id.clone())
                    .or_default()
                    .push((stop_time.departure.mod24(), (trip_id.clone(), idx)));
            }
        }
        for deps in stop_times_by_stop.values_mut() {
            deps.sort_by_key(|(key, stop_ref)| (*key, stop_ref.clone()));
        }

        let mut stops_by_transfer_node_id: HashMap<String, Vec<StopId>> = HashMap::new();
        let mut stops_by_parent_station: HashMap<StopId, Vec<StopId>> = HashMap::new();
        for stop in self.stops_by_id.values() {
            if let Some(node_id) = &stop.transfer_node_id {
                stops_by_transfer_node_id
                    .entry(node_id.clone())
                    .or_default()
                    .push(stop.stop_id.clone());
            }
            if let Some(parent) = &stop.parent_station {
                stops_by_parent_station
                    .entry(parent.clone())
                    .or_default()
                    .push(stop.stop_id.clone());
            }
        }

        let mut transfers_by_from_stop: HashMap<StopId, Vec<Transfer>> = HashMap::new();
        for transfer in self.raw_transfers {
            transfers_by_from_stop
                .entry(transfer.from_stop_id.clone())
                .or_default()
                .push(transfer);
        }

        eprintln!(
            "schedule index built: {} stops, {} routes, {} trips",
            self.stops_by_id.len(),
            self.routes_by_id.len(),
            self.trips_by_id.len(),
        );

        Ok(ScheduleIndex {
            stops_by_id: self.stops_by_id,
            trips_by_id: self.trips_by_id,
            stop_times_by_trip: self.stop_times_by_trip,
            stop_times_by_stop,
            calendar_by_service_id: self.calendar_by_service_id,
            calendar_exceptions: self.calendar_exceptions,
            transfer_mode: self.transfer_mode,
            min_transfer_time: self.min_transfer_time,
            stops_by_transfer_node_id,
            stops_by_parent_station,
            transfers_by_from_stop,
            runs_on_day_cache: RefCell::new(HashMap::new()),
        })
    }
}
