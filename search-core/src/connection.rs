use std::cmp::Ordering;

use crate::schedule::{ScheduleIndex, Transfer, TripStopRef};
use crate::time::{Instant, ServiceDay};

/// A trip ridden from `start_stoptime` to `end_stoptime`, both indices into the same
/// trip's stop-times. `service_day` is the calendar date the trip's offsets anchor to,
/// not necessarily the wall-clock date of travel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripSegment {
    pub start_stoptime: TripStopRef,
    pub end_stoptime: TripStopRef,
    pub service_day: ServiceDay,
}

/// A trip boarded but not yet closed: only the departure end is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTripSegment {
    pub start_stoptime: TripStopRef,
    pub service_day: ServiceDay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSegment {
    pub transfer: Transfer,
    pub start_departure: Instant,
    pub end_arrival: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Trip(TripSegment),
    Transfer(TransferSegment),
}

impl Segment {
    fn departure(&self, index: &ScheduleIndex) -> Instant {
        match self {
            Segment::Trip(seg) => {
                Instant::new(seg.service_day, index.stop_time(&seg.start_stoptime).departure)
            }
            Segment::Transfer(seg) => seg.start_departure,
        }
    }

    fn arrival(&self, index: &ScheduleIndex) -> Instant {
        match self {
            Segment::Trip(seg) => {
                Instant::new(seg.service_day, index.stop_time(&seg.end_stoptime).arrival)
            }
            Segment::Transfer(seg) => seg.end_arrival,
        }
    }

    fn is_trip(&self) -> bool {
        matches!(self, Segment::Trip(_))
    }
}

/// A completed journey, built only by appending to `Connection::empty()`. Every
/// constructor is pure: given the same inputs, it always returns the same value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Connection {
    segments: Vec<Segment>,
}

impl Connection {
    pub fn empty() -> Connection {
        Connection { segments: Vec::new() }
    }

    pub fn with_transfer(
        &self,
        transfer: Transfer,
        start_departure: Instant,
        end_arrival: Instant,
    ) -> Connection {
        let mut segments = self.segments.clone();
        segments.push(Segment::Transfer(TransferSegment {
            transfer,
            start_departure,
            end_arrival,
        }));
        Connection { segments }
    }

    pub fn to_open(&self, departure_stoptime: TripStopRef, service_day: ServiceDay) -> OpenConnection {
        OpenConnection {
            segments: self.segments.clone(),
            open_trip: OpenTripSegment { start_stoptime: departure_stoptime, service_day },
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn first_departure(&self, index: &ScheduleIndex) -> Option<Instant> {
        self.segments.first().map(|s| s.departure(index))
    }

    pub fn last_arrival(&self, index: &ScheduleIndex) -> Option<Instant> {
        self.segments.last().map(|s| s.arrival(index))
    }

    pub fn transfer_count(&self) -> usize {
        let trips = self.segments.iter().filter(|s| s.is_trip()).count();
        trips.saturating_sub(1)
    }

    pub fn quality(&self, index: &ScheduleIndex) -> ConnectionQuality {
        ConnectionQuality {
            first_departure: self.first_departure(index),
            transfer_count: self.transfer_count(),
        }
    }
}

/// A journey with its last leg boarded but not yet arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnection {
    segments: Vec<Segment>,
    open_trip: OpenTripSegment,
}

impl OpenConnection {
    /// Closes the open trip into a full `TripSegment`, yielding a `Connection`.
    pub fn close(&self, arrival_stoptime: TripStopRef) -> Connection {
        let mut segments = self.segments.clone();
        segments.push(Segment::Trip(TripSegment {
            start_stoptime: self.open_trip.start_stoptime.clone(),
            end_stoptime: arrival_stoptime,
            service_day: self.open_trip.service_day,
        }));
        Connection { segments }
    }

    pub fn first_departure(&self, index: &ScheduleIndex) -> Instant {
        match self.segments.first() {
            Some(s) => s.departure(index),
            None => Instant::new(
                self.open_trip.service_day,
                index.stop_time(&self.open_trip.start_stoptime).departure,
            ),
        }
    }

    /// The open trip itself is not yet counted: it becomes the final `TripSegment`
    /// only once closed.
    pub fn transfer_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_trip()).count()
    }

    pub fn quality(&self, index: &ScheduleIndex) -> ConnectionQuality {
        ConnectionQuality {
            first_departure: Some(self.first_departure(index)),
            transfer_count: self.transfer_count(),
        }
    }
}

/// `(first_departure, transfer_count)`, ordered so that "better" is "greater":
/// an empty connection (`first_departure = None`) beats every non-empty one, a later
/// `first_departure` beats an earlier one, and amongst equal `first_departure`s, fewer
/// transfers wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionQuality {
    pub first_departure: Option<Instant>,
    pub transfer_count: usize,
}

impl PartialOrd for ConnectionQuality {
    fn partial_cmp(&self, other: &ConnectionQuality) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConnectionQuality {
    fn cmp(&self, other: &ConnectionQuality) -> Ordering {
        match (self.first_departure, other.first_departure) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a
                .cmp(&b)
                .then_with(|| other.transfer_count.cmp(&self.transfer_count)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn instant(hour: u32, minute: u32) -> Instant {
        Instant::new(ServiceDay::from_ymd(2024, 11, 11), crate::time::Time::from_hms(hour, minute, 0))
    }

    #[test]
    fn empty_connection_beats_any_non_empty_one() {
        let empty = ConnectionQuality { first_departure: None, transfer_count: 0 };
        let non_empty = ConnectionQuality { first_departure: Some(instant(8, 0)), transfer_count: 0 };
        assert!(empty > non_empty);
    }

    #[test]
    fn later_first_departure_is_better() {
        let earlier = ConnectionQuality { first_departure: Some(instant(8, 0)), transfer_count: 0 };
        let later = ConnectionQuality { first_departure: Some(instant(8, 30)), transfer_count: 2 };
        assert!(later > earlier);
    }

    #[test]
    fn fewer_transfers_breaks_ties() {
        let fewer = ConnectionQuality { first_departure: Some(instant(8, 0)), transfer_count: 0 };
        let more = ConnectionQuality { first_departure: Some(instant(8, 0)), transfer_count: 1 };
        assert!(fewer > more);
    }

    #[test]
    fn connection_transfer_count_is_trips_minus_one_floored_at_zero() {
        assert_eq!(Connection::empty().transfer_count(), 0);
    }
}
