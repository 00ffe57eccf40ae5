use std::collections::HashMap;

use crate::connection::{Connection, OpenConnection};
use crate::schedule::{ScheduleIndex, StopId, Transfer, TripId, TripStopRef};
use crate::time::{Duration, Instant, ServiceDay};

pub type BestPerStop = HashMap<StopId, Connection>;
pub type BestPerTrip = HashMap<TripId, OpenConnection>;

const SEARCH_WINDOW_HOURS: i32 = 24;

fn search_window() -> Duration {
    Duration::seconds(SEARCH_WINDOW_HOURS * 60 * 60)
}

/// Standing at a stop, waiting to board the next pickup-allowed departure.
#[derive(Debug, Clone)]
pub struct StopEvent {
    stop: StopId,
    next_departure_time: Instant,
    departure_idx: usize,
    sweep_day: ServiceDay,
    service_day: ServiceDay,
    next_stop_ref: TripStopRef,
    window_end: Instant,
}

impl StopEvent {
    fn seeking(stop: StopId, not_before: Instant, index: &ScheduleIndex) -> Option<StopEvent> {
        let window_end = not_before + search_window();
        let candidate = index.seek_departure(&stop, not_before, search_window())?;
        Some(StopEvent {
            stop,
            next_departure_time: candidate.wall_clock,
            departure_idx: candidate.idx,
            sweep_day: candidate.sweep_day,
            service_day: candidate.service_day,
            next_stop_ref: candidate.stop_ref,
            window_end,
        })
    }

    pub fn at_origin(stop: StopId, start_time: Instant, index: &ScheduleIndex) -> Option<StopEvent> {
        StopEvent::seeking(stop, start_time, index)
    }

    pub fn after_arrival(
        stoptime: &TripStopRef,
        service_day: ServiceDay,
        index: &ScheduleIndex,
    ) -> Option<StopEvent> {
        let arrival_stop_time = index.stop_time(stoptime);
        let stop = arrival_stop_time.stop_id.clone();
        let arrival_time = Instant::new(service_day, arrival_stop_time.arrival);
        StopEvent::seeking(stop, arrival_time, index)
    }

    pub fn after_transfer(transfer: &Transfer, arrival_time: Instant, index: &ScheduleIndex) -> Option<StopEvent> {
        StopEvent::seeking(transfer.to_stop_id.clone(), arrival_time, index)
    }

    pub fn next_event_time(&self) -> Instant {
        self.next_departure_time
    }

    pub fn step(
        self,
        best_per_stop: &mut BestPerStop,
        best_per_trip: &mut BestPerTrip,
        index: &ScheduleIndex,
    ) -> Vec<Event> {
        let mut emitted = Vec::new();

        let base = best_per_stop
            .get(&self.stop)
            .cloned()
            .unwrap_or_else(Connection::empty);
        let new_conn = base.to_open(self.next_stop_ref.clone(), self.service_day);
        let trip_id = &self.next_stop_ref.0;

        let improves = match best_per_trip.get(trip_id) {
            Some(existing) => new_conn.quality(index) > existing.quality(index),
            None => true,
        };
        if improves {
            let unseen = !best_per_trip.contains_key(trip_id);
            best_per_trip.insert(trip_id.clone(), new_conn.clone());
            if unseen {
                if let Some(trip_event) = TripEvent::from_departure(&self.next_stop_ref, self.service_day, index) {
                    emitted.push(Event::Trip(trip_event));
                }
            }
        }

        if let Some(candidate) =
            index.next_departure(&self.stop, self.departure_idx + 1, self.sweep_day, self.window_end)
        {
            emitted.push(Event::Stop(StopEvent {
                stop: self.stop,
                next_departure_time: candidate.wall_clock,
                departure_idx: candidate.idx,
                sweep_day: candidate.sweep_day,
                service_day: candidate.service_day,
                next_stop_ref: candidate.stop_ref,
                window_end: self.window_end,
            }));
        }

        emitted
    }
}

/// Riding a specific trip, about to arrive at the next drop-off-allowed stop.
#[derive(Debug, Clone)]
pub struct TripEvent {
    trip_id: TripId,
    service_day: ServiceDay,
    next_stoptime_idx: usize,
    next_arrival_time: Instant,
}

impl TripEvent {
    pub fn from_departure(
        departure_stoptime: &TripStopRef,
        service_day: ServiceDay,
        index: &ScheduleIndex,
    ) -> Option<TripEvent> {
        let next_stop_ref = index.next_dropoff_after(departure_stoptime)?;
        let next_arrival_time = Instant::new(service_day, index.stop_time(&next_stop_ref).arrival);
        Some(TripEvent {
            trip_id: next_stop_ref.0,
            service_day,
            next_stoptime_idx: next_stop_ref.1,
            next_arrival_time,
        })
    }

    pub fn next_event_time(&self) -> Instant {
        self.next_arrival_time
    }

    pub fn step(
        self,
        best_per_stop: &mut BestPerStop,
        best_per_trip: &mut BestPerTrip,
        index: &ScheduleIndex,
    ) -> Vec<Event> {
        let mut emitted = Vec::new();
        let next_stop_ref = (self.trip_id.clone(), self.next_stoptime_idx);

        let open = best_per_trip
            .get(&self.trip_id)
            .expect("TripEvent to only step after StopEvent seeded best_per_trip for this trip")
            .clone();
        let new_conn = open.close(next_stop_ref.clone());
        let arrival_stop = index.stop_time(&next_stop_ref).stop_id.clone();

        let unseen = !best_per_stop.contains_key(&arrival_stop);
        let improves = unseen
            || new_conn.quality(index) > best_per_stop[&arrival_stop].quality(index);

        if improves {
            best_per_stop.insert(arrival_stop.clone(), new_conn.clone());
            if unseen {
                if let Some(stop_event) = StopEvent::after_arrival(&next_stop_ref, self.service_day, index) {
                    emitted.push(Event::Stop(stop_event));
                }
            }
            let arrival_time = Instant::new(self.service_day, index.stop_time(&next_stop_ref).arrival);
            for transfer in index.transfers_from(&arrival_stop) {
                emitted.push(Event::Transfer(TransferEvent::new(transfer, arrival_time, new_conn.clone())));
            }
        }

        if let Some(next_ref) = index.next_dropoff_after(&next_stop_ref) {
            let next_arrival_time = Instant::new(self.service_day, index.stop_time(&next_ref).arrival);
            emitted.push(Event::Trip(TripEvent {
                trip_id: self.trip_id,
                service_day: self.service_day,
                next_stoptime_idx: next_ref.1,
                next_arrival_time,
            }));
        }

        emitted
    }
}

/// Walking between two stops, starting from a connection snapshot taken by value so
/// later updates to `best_per_stop` can't retroactively change this transfer's origin.
#[derive(Debug, Clone)]
pub struct TransferEvent {
    transfer: Transfer,
    start_departure: Instant,
    end_arrival: Instant,
    connection: Connection,
}

impl TransferEvent {
    pub fn new(transfer: Transfer, start_departure: Instant, connection: Connection) -> TransferEvent {
        let end_arrival = start_departure + transfer.transfer_time;
        TransferEvent { transfer, start_departure, end_arrival, connection }
    }

    pub fn next_event_time(&self) -> Instant {
        self.end_arrival
    }

    pub fn step(
        self,
        best_per_stop: &mut BestPerStop,
        _best_per_trip: &mut BestPerTrip,
        index: &ScheduleIndex,
    ) -> Vec<Event> {
        let new_conn = self.connection.with_transfer(self.transfer.clone(), self.start_departure, self.end_arrival);
        let to_stop = self.transfer.to_stop_id.clone();

        let unseen = !best_per_stop.contains_key(&to_stop);
        let improves = unseen || new_conn.quality(index) > best_per_stop[&to_stop].quality(index);

        if improves {
            best_per_stop.insert(to_stop, new_conn.clone());
            if unseen {
                if let Some(stop_event) = StopEvent::after_transfer(&self.transfer, self.end_arrival, index) {
                    return vec![Event::Stop(stop_event)];
                }
            }
        }
        Vec::new()
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Stop(StopEvent),
    Trip(TripEvent),
    Transfer(TransferEvent),
}

impl Event {
    pub fn next_event_time(&self) -> Instant {
        match self {
            Event::Stop(e) => e.next_event_time(),
            Event::Trip(e) => e.next_event_time(),
            Event::Transfer(e) => e.next_event_time(),
        }
    }

    pub fn step(
        self,
        best_per_stop: &mut BestPerStop,
        best_per_trip: &mut BestPerTrip,
        index: &ScheduleIndex,
    ) -> Vec<Event> {
        match self {
            Event::Stop(e) => e.step(best_per_stop, best_per_trip, index),
            Event::Trip(e) => e.step(best_per_stop, best_per_trip, index),
            Event::Transfer(e) => e.step(best_per_stop, best_per_trip, index),
        }
    }
}
