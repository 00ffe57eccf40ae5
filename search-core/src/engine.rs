use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::connection::Connection;
use crate::event::{BestPerStop, BestPerTrip, Event, StopEvent, TransferEvent};
use crate::schedule::{ScheduleIndex, StopId};
use crate::time::{Duration, Instant};

/// A single journey search: where to start, where any of is an acceptable end, and how
/// far forward in wall-clock time the search may range.
#[derive(Debug, Clone)]
pub struct Query {
    pub origins: Vec<StopId>,
    pub destinations: HashSet<StopId>,
    pub start_time: Instant,
    pub max_search_time: Duration,
}

struct QueueItem {
    time: Instant,
    seq: u64,
    event: Event,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &QueueItem) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &QueueItem) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    /// Reversed so `BinaryHeap` (a max-heap) pops the earliest event time first,
    /// breaking ties by insertion order (smaller `seq` first).
    fn cmp(&self, other: &QueueItem) -> Ordering {
        other.time.cmp(&self.time).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Runs one earliest-arrival, minimum-transfer journey search over a `ScheduleIndex`.
pub struct SearchEngine<'r> {
    index: &'r ScheduleIndex,
}

impl<'r> SearchEngine<'r> {
    pub fn new(index: &'r ScheduleIndex) -> SearchEngine<'r> {
        SearchEngine { index }
    }

    pub fn run(&self, query: &Query) -> Option<Connection> {
        let mut heap: BinaryHeap<QueueItem> = BinaryHeap::new();
        let mut next_seq: u64 = 0;
        let mut best_per_stop: BestPerStop = BestPerStop::new();
        let mut best_per_trip: BestPerTrip = BestPerTrip::new();
        let horizon = query.start_time + query.max_search_time;
        let mut previous_time = query.start_time;

        let origins: HashSet<&str> = query.origins.iter().map(String::as_str).collect();

        let push = |heap: &mut BinaryHeap<QueueItem>, seq: &mut u64, event: Event| {
            let time = event.next_event_time();
            heap.push(QueueItem { time, seq: *seq, event });
            *seq += 1;
        };

        for origin in &query.origins {
            if let Some(stop_event) = StopEvent::at_origin(origin.clone(), query.start_time, self.index) {
                push(&mut heap, &mut next_seq, Event::Stop(stop_event));
            }
            best_per_stop.insert(origin.clone(), Connection::empty());
            for transfer in self.index.transfers_from(origin) {
                if origins.contains(transfer.to_stop_id.as_str()) {
                    continue;
                }
                push(
                    &mut heap,
                    &mut next_seq,
                    Event::Transfer(TransferEvent::new(transfer, query.start_time, Connection::empty())),
                );
            }
        }

        let best_reachable_destination = |best_per_stop: &BestPerStop| {
            query
                .destinations
                .iter()
                .filter_map(|d| best_per_stop.get(d))
                .max_by_key(|conn| conn.quality(self.index))
                .cloned()
        };

        // A destination already reachable at seed time (e.g. an origin that is also a
        // destination) must be reported even if the queue never produces an event.
        if let Some(best) = best_reachable_destination(&best_per_stop) {
            return Some(best);
        }

        while let Some(QueueItem { time, event, .. }) = heap.pop() {
            if time > previous_time {
                previous_time = time;

                if let Some(best) = best_reachable_destination(&best_per_stop) {
                    return Some(best);
                }

                if previous_time > horizon {
                    return None;
                }
            }

            for follow_up in event.step(&mut best_per_stop, &mut best_per_trip, self.index) {
                push(&mut heap, &mut next_seq, follow_up);
            }
        }

        // The heap emptied without ever observing a strictly later tick after the last
        // destination update; give the final state one last look before giving up.
        best_reachable_destination(&best_per_stop)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schedule::{
        CalendarRecord, PickupDropoffType, RouteType, ScheduleIndex, ScheduleIndexBuilder,
        Stop, StopKind, StopTime,
    };
    use crate::time::{ServiceDay, Time};

    fn stop(id: &str) -> Stop {
        Stop {
            stop_id: id.to_owned(),
            stop_name: None,
            kind: StopKind::Platform,
            parent_station: None,
            transfer_node_id: None,
        }
    }

    fn monday_calendar(service_id: &str) -> CalendarRecord {
        CalendarRecord {
            service_id: service_id.to_owned(),
            weekday_active: [true, false, false, false, false, false, false],
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2024, 11, 30).unwrap(),
        }
    }

    fn add_trip(
        builder: &mut ScheduleIndexBuilder,
        trip_id: &str,
        route_id: &str,
        service_id: &str,
        stops: &[(&str, u32, Time, Time)],
    ) {
        builder
            .add_route(route_id.to_owned(), Some(route_id.to_owned()), None, RouteType::Bus)
            .unwrap();
        builder
            .add_trip(trip_id.to_owned(), route_id.to_owned(), service_id.to_owned(), None)
            .unwrap();
        for &(stop_id, seq, arrival, departure) in stops {
            builder
                .add_stop_time(StopTime {
                    trip_id: trip_id.to_owned(),
                    stop_sequence: seq,
                    arrival,
                    departure,
                    stop_id: stop_id.to_owned(),
                    pickup_policy: PickupDropoffType::Regular,
                    dropoff_policy: PickupDropoffType::Regular,
                })
                .unwrap();
        }
    }

    fn query(origins: &[&str], destinations: &[&str], start_time: Instant) -> Query {
        Query {
            origins: origins.iter().map(|s| s.to_string()).collect(),
            destinations: destinations.iter().map(|s| s.to_string()).collect(),
            start_time,
            max_search_time: Duration::seconds(24 * 60 * 60),
        }
    }

    fn monday_9am() -> Instant {
        Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(9, 0, 0))
    }

    #[test]
    fn s1_trivial_same_origin_and_destination() {
        let mut builder = ScheduleIndexBuilder::new(crate::schedule::TransferMode::None, Duration::seconds(0));
        builder.add_stop(stop("A")).unwrap();
        let index = builder.build().unwrap();

        let engine = SearchEngine::new(&index);
        let result = engine.run(&query(&["A"], &["A"], monday_9am())).unwrap();
        assert_eq!(result, Connection::empty());
        assert_eq!(result.first_departure(&index), None);
    }

    #[test]
    fn s2_no_calendar_means_no_connection() {
        let mut builder = ScheduleIndexBuilder::new(crate::schedule::TransferMode::None, Duration::seconds(0));
        builder.add_stop(stop("X")).unwrap();
        builder.add_stop(stop("Y")).unwrap();
        add_trip(
            &mut builder,
            "T1",
            "R1",
            "WEEKDAY",
            &[
                ("X", 1, Time::from_hms(23, 45, 0), Time::from_hms(23, 45, 0)),
                ("Y", 2, Time::from_hms(25, 10, 0), Time::from_hms(25, 10, 0)),
            ],
        );
        // No calendar record added for "WEEKDAY" at all.
        let index = builder.build().unwrap();

        let engine = SearchEngine::new(&index);
        let result = engine.run(&query(&["X"], &["Y"], monday_9am()));
        assert_eq!(result, None);
    }

    #[test]
    fn s3_cross_midnight_trip() {
        let mut builder = ScheduleIndexBuilder::new(crate::schedule::TransferMode::None, Duration::seconds(0));
        builder.add_stop(stop("X")).unwrap();
        builder.add_stop(stop("Y")).unwrap();
        add_trip(
            &mut builder,
            "T1",
            "R1",
            "WEEKDAY",
            &[
                ("X", 1, Time::from_hms(23, 45, 0), Time::from_hms(23, 45, 0)),
                ("Y", 2, Time::from_hms(25, 10, 0), Time::from_hms(25, 10, 0)),
            ],
        );
        builder.add_calendar(monday_calendar("WEEKDAY")).unwrap();
        let index = builder.build().unwrap();

        let start = Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(23, 0, 0));
        let engine = SearchEngine::new(&index);
        let result = engine.run(&query(&["X"], &["Y"], start)).unwrap();

        assert_eq!(result.transfer_count(), 0);
        assert_eq!(
            result.first_departure(&index),
            Some(Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(23, 45, 0)))
        );
        assert_eq!(
            result.last_arrival(&index),
            Some(Instant::new(ServiceDay::from_ymd(2024, 11, 12), Time::from_hms(1, 10, 0)))
        );
    }

    fn transfer_scenario_index(transfer_mode: crate::schedule::TransferMode) -> ScheduleIndex {
        let mut builder = ScheduleIndexBuilder::new(transfer_mode, Duration::seconds(180));
        let mut p = stop("P");
        p.transfer_node_id = Some("NODE".to_owned());
        let mut p2 = stop("P2");
        p2.transfer_node_id = Some("NODE".to_owned());
        builder.add_stop(stop("A")).unwrap();
        builder.add_stop(p).unwrap();
        builder.add_stop(p2).unwrap();
        builder.add_stop(stop("B")).unwrap();
        add_trip(
            &mut builder,
            "T1",
            "R1",
            "WEEKDAY",
            &[
                ("A", 1, Time::from_hms(9, 0, 0), Time::from_hms(9, 0, 0)),
                ("P", 2, Time::from_hms(9, 30, 0), Time::from_hms(9, 30, 0)),
            ],
        );
        add_trip(
            &mut builder,
            "T2",
            "R2",
            "WEEKDAY",
            &[
                ("P2", 1, Time::from_hms(9, 35, 0), Time::from_hms(9, 35, 0)),
                ("B", 2, Time::from_hms(10, 0, 0), Time::from_hms(10, 0, 0)),
            ],
        );
        builder.add_calendar(monday_calendar("WEEKDAY")).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn s4_transfers_disabled_means_no_connection() {
        let index = transfer_scenario_index(crate::schedule::TransferMode::None);
        let start = Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(8, 0, 0));
        let engine = SearchEngine::new(&index);
        let result = engine.run(&query(&["A"], &["B"], start));
        assert_eq!(result, None);
    }

    #[test]
    fn s5_transfer_enabled_joins_the_two_trips() {
        let index = transfer_scenario_index(crate::schedule::TransferMode::ByNodeId);
        let start = Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(8, 0, 0));
        let engine = SearchEngine::new(&index);
        let result = engine.run(&query(&["A"], &["B"], start)).unwrap();

        assert_eq!(result.transfer_count(), 1);
        assert_eq!(
            result.last_arrival(&index),
            Some(Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(10, 0, 0)))
        );
    }

    #[test]
    fn s6_horizon_excludes_a_25_hour_journey() {
        let mut builder = ScheduleIndexBuilder::new(crate::schedule::TransferMode::None, Duration::seconds(0));
        builder.add_stop(stop("X")).unwrap();
        builder.add_stop(stop("Y")).unwrap();
        add_trip(
            &mut builder,
            "T1",
            "R1",
            "WEEKDAY",
            &[
                ("X", 1, Time::from_hms(9, 0, 0), Time::from_hms(9, 0, 0)),
                ("Y", 2, Time::from_hms(34, 0, 0), Time::from_hms(34, 0, 0)),
            ],
        );
        builder.add_calendar(monday_calendar("WEEKDAY")).unwrap();
        let index = builder.build().unwrap();

        let start = Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(9, 0, 0));
        let engine = SearchEngine::new(&index);
        let result = engine.run(&Query {
            origins: vec!["X".to_owned()],
            destinations: vec!["Y".to_owned()].into_iter().collect(),
            start_time: start,
            max_search_time: Duration::seconds(24 * 60 * 60),
        });
        assert_eq!(result, None);
    }

    #[test]
    fn empty_origin_set_returns_no_connection() {
        let mut builder = ScheduleIndexBuilder::new(crate::schedule::TransferMode::None, Duration::seconds(0));
        builder.add_stop(stop("A")).unwrap();
        let index = builder.build().unwrap();
        let engine = SearchEngine::new(&index);
        let result = engine.run(&query(&[], &["A"], monday_9am()));
        assert_eq!(result, None);
    }

    #[test]
    fn empty_destination_set_returns_no_connection() {
        let mut builder = ScheduleIndexBuilder::new(crate::schedule::TransferMode::None, Duration::seconds(0));
        builder.add_stop(stop("A")).unwrap();
        let index = builder.build().unwrap();
        let engine = SearchEngine::new(&index);
        let result = engine.run(&query(&["A"], &[], monday_9am()));
        assert_eq!(result, None);
    }

    #[test]
    fn returned_connection_never_departs_before_start_time() {
        let index = transfer_scenario_index(crate::schedule::TransferMode::ByNodeId);
        let start = Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(8, 0, 0));
        let engine = SearchEngine::new(&index);
        let result = engine.run(&query(&["A"], &["B"], start)).unwrap();
        assert!(result.first_departure(&index).unwrap() >= start);
    }
}
