use std::fmt;

use crate::schedule::{RouteId, ServiceId, StopId, TripId};

/// A malformed-schedule error, detected while building a `ScheduleIndex`. The index is
/// never constructed when this is returned; queries never see it.
#[derive(Debug)]
pub enum ScheduleError {
    DuplicateStop(StopId),
    DuplicateRoute(RouteId),
    DuplicateTrip(TripId),
    DuplicateCalendar(ServiceId),
    UnknownEnumValue { field: &'static str, value: i64 },
    EmptyRouteName(RouteId),
    UnparsableTime { context: String, value: String },
    UnparsableDate { context: String, value: String },
    ReferencesUnknownStop { trip_id: TripId, stop_id: StopId },
    ReferencesUnknownRoute { trip_id: TripId, route_id: RouteId },
}

impl std::error::Error for ScheduleError {}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::DuplicateStop(id) => write!(f, "duplicate stop_id {:?}", id),
            ScheduleError::DuplicateRoute(id) => write!(f, "duplicate route_id {:?}", id),
            ScheduleError::DuplicateTrip(id) => write!(f, "duplicate trip_id {:?}", id),
            ScheduleError::DuplicateCalendar(id) => write!(f, "duplicate service_id {:?} in calendar.txt", id),
            ScheduleError::UnknownEnumValue { field, value } => {
                write!(f, "{} has out-of-range value {}", field, value)
            }
            ScheduleError::EmptyRouteName(id) => write!(
                f,
                "route {:?} has both route_short_name and route_long_name empty",
                id
            ),
            ScheduleError::UnparsableTime { context, value } => {
                write!(f, "{}: couldn't parse time {:?}", context, value)
            }
            ScheduleError::UnparsableDate { context, value } => {
                write!(f, "{}: couldn't parse date {:?}", context, value)
            }
            ScheduleError::ReferencesUnknownStop { trip_id, stop_id } => write!(
                f,
                "trip {:?} has a stop_time referencing unknown stop {:?}",
                trip_id, stop_id
            ),
            ScheduleError::ReferencesUnknownRoute { trip_id, route_id } => write!(
                f,
                "trip {:?} references unknown route {:?}",
                trip_id, route_id
            ),
        }
    }
}
