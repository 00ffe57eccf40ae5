//! Loads a GTFS feed from disk into a `search_core::schedule::ScheduleIndexBuilder`.
//! Grounded in `src/gtfs/db.rs`'s `load_data`: open each file with `csv::Reader`,
//! deserialize row by row, `eprintln!` and skip rows that don't parse rather than
//! aborting the whole load.

mod records;

use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use search_core::schedule::{
    CalendarRecord, PickupDropoffType, RouteType, ScheduleIndex, ScheduleIndexBuilder, Stop,
    StopKind, StopTime, Transfer, TransferKind, TransferMode,
};
use search_core::time::{Duration, Time};

use crate::config::Config;

use records::{CalendarDateRow, CalendarRow, RouteRow, StopTimeRow, TransferRow, TripRow};

pub fn load_data(config: &Config) -> Result<ScheduleIndex, Box<dyn Error>> {
    let dir = Path::new(&config.dataset_path);
    let mut builder = ScheduleIndexBuilder::new(config.transfer_mode, config.min_transfer_time);

    load_stops(dir, &config.transfer_node_id_column, &mut builder)?;
    load_routes(dir, &mut builder)?;
    load_trips(dir, &mut builder)?;
    load_stop_times(dir, &mut builder)?;
    load_calendar(dir, &mut builder)?;
    load_calendar_dates(dir, &mut builder)?;
    if config.transfer_mode == TransferMode::ByTransfersTxt {
        load_transfers(dir, &mut builder)?;
    }

    Ok(builder.build()?)
}

fn open_csv(dir: &Path, filename: &str) -> Result<csv::Reader<std::fs::File>, csv::Error> {
    let path: PathBuf = dir.join(filename);
    eprintln!("Opening {}", path.display());
    csv::Reader::from_path(path)
}

/// `stops.txt` is read by hand rather than via `#[derive(Deserialize)]` because the
/// transfer-node column name is configurable (`TRANSFER_NODE_ID`), not a fixed GTFS
/// field; same header-index-lookup idiom as `gtfs::db::load_colors`.
fn load_stops(
    dir: &Path,
    transfer_node_id_column: &str,
    builder: &mut ScheduleIndexBuilder,
) -> Result<(), Box<dyn Error>> {
    let mut rdr = open_csv(dir, "stops.txt")?;
    let headers = rdr.headers()?.clone();
    let idx = |name: &str| headers.iter().position(|h| h == name);
    let stop_id_idx = idx("stop_id").ok_or("stops.txt missing stop_id column")?;
    let stop_name_idx = idx("stop_name");
    let location_type_idx = idx("location_type");
    let parent_station_idx = idx("parent_station");
    let transfer_node_idx = idx(transfer_node_id_column);

    let mut count = 0;
    for result in rdr.records() {
        let record = result?;
        let stop_id = record.get(stop_id_idx).unwrap_or_default().to_owned();
        let stop_name = stop_name_idx
            .and_then(|i| record.get(i))
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let location_type: u8 = location_type_idx
            .and_then(|i| record.get(i))
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .transpose()?
            .unwrap_or(0);
        let parent_station = parent_station_idx
            .and_then(|i| record.get(i))
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let transfer_node_id = transfer_node_idx
            .and_then(|i| record.get(i))
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        match StopKind::from_location_type(location_type) {
            Ok(kind) => {
                builder.add_stop(Stop {
                    stop_id,
                    stop_name,
                    kind,
                    parent_station,
                    transfer_node_id,
                })?;
                count += 1;
            }
            Err(err) => eprintln!("Error parsing stop {:?} - skipped : {}", stop_id, err),
        }
    }
    eprintln!("{} stops loaded", count);
    Ok(())
}

fn load_routes(dir: &Path, builder: &mut ScheduleIndexBuilder) -> Result<(), Box<dyn Error>> {
    let mut rdr = open_csv(dir, "routes.txt")?;
    for result in rdr.deserialize() {
        let route: RouteRow = result?;
        let route_type = RouteType::from_gtfs_code(route.route_type)?;
        builder.add_route(
            route.route_id,
            route.route_short_name,
            route.route_long_name,
            route_type,
        )?;
    }
    Ok(())
}

fn load_trips(dir: &Path, builder: &mut ScheduleIndexBuilder) -> Result<(), Box<dyn Error>> {
    let mut rdr = open_csv(dir, "trips.txt")?;
    for result in rdr.deserialize() {
        let trip: TripRow = result?;
        builder.add_trip(trip.trip_id, trip.route_id, trip.service_id, trip.trip_short_name)?;
    }
    Ok(())
}

fn load_stop_times(dir: &Path, builder: &mut ScheduleIndexBuilder) -> Result<(), Box<dyn Error>> {
    let mut rdr = open_csv(dir, "stop_times.txt")?;
    let mut skipped = 0;
    for result in rdr.deserialize::<StopTimeRow>() {
        match result {
            Ok(row) => match parse_stop_time(row) {
                Ok(stop_time) => {
                    if let Err(err) = builder.add_stop_time(stop_time) {
                        eprintln!("Error adding stop time : {}", err);
                        skipped += 1;
                    }
                }
                Err(err) => {
                    eprintln!("Error parsing stop time : {}", err);
                    skipped += 1;
                }
            },
            Err(err) => {
                eprintln!("Error parsing stop time : {}", err);
                skipped += 1;
            }
        }
    }
    if skipped != 0 {
        eprintln!("{} stop_times rows skipped", skipped);
    }
    Ok(())
}

fn parse_stop_time(row: StopTimeRow) -> Result<StopTime, Box<dyn Error>> {
    let arrival: Time = row
        .arrival_time
        .parse()
        .map_err(|err| format!("arrival_time {:?}: {}", row.arrival_time, err))?;
    let departure: Time = row
        .departure_time
        .parse()
        .map_err(|err| format!("departure_time {:?}: {}", row.departure_time, err))?;
    Ok(StopTime {
        trip_id: row.trip_id,
        stop_sequence: row.stop_sequence,
        arrival,
        departure,
        stop_id: row.stop_id,
        pickup_policy: PickupDropoffType::from_gtfs_code(row.pickup_type)?,
        dropoff_policy: PickupDropoffType::from_gtfs_code(row.drop_off_type)?,
    })
}

/// Missing `calendar.txt` is legal (spec §7.2): no rows are added, `runs_on_day`
/// simply returns false for every service id and the search naturally finds nothing.
fn load_calendar(dir: &Path, builder: &mut ScheduleIndexBuilder) -> Result<(), Box<dyn Error>> {
    if !dir.join("calendar.txt").exists() {
        eprintln!("calendar.txt not present, no weekly service patterns loaded");
        return Ok(());
    }
    let mut rdr = open_csv(dir, "calendar.txt")?;
    for result in rdr.deserialize() {
        let row: CalendarRow = result?;
        let weekday_active = [
            row.monday > 0,
            row.tuesday > 0,
            row.wednesday > 0,
            row.thursday > 0,
            row.friday > 0,
            row.saturday > 0,
            row.sunday > 0,
        ];
        let start_date = parse_gtfs_date(&row.start_date)?;
        let end_date = parse_gtfs_date(&row.end_date)?;
        builder.add_calendar(CalendarRecord {
            service_id: row.service_id,
            weekday_active,
            start_date,
            end_date,
        })?;
    }
    Ok(())
}

fn load_calendar_dates(dir: &Path, builder: &mut ScheduleIndexBuilder) -> Result<(), Box<dyn Error>> {
    if !dir.join("calendar_dates.txt").exists() {
        return Ok(());
    }
    let mut rdr = open_csv(dir, "calendar_dates.txt")?;
    for result in rdr.deserialize() {
        let row: CalendarDateRow = result?;
        let date = parse_gtfs_date(&row.date)?;
        // exception_type 1 = service added, 2 = service removed.
        builder.add_calendar_exception(row.service_id, date, row.exception_type == 1);
    }
    Ok(())
}

/// Only read in `by_transfers_txt` mode. Rows carrying `from_trip_id`/`to_trip_id`/
/// `from_route_id`/`to_route_id` are a non-standard (VBB) extension this spec doesn't
/// support and are discarded at load, per spec §4.1.
fn load_transfers(dir: &Path, builder: &mut ScheduleIndexBuilder) -> Result<(), Box<dyn Error>> {
    let mut rdr = open_csv(dir, "transfers.txt")?;
    let mut discarded = 0;
    for result in rdr.deserialize() {
        let row: TransferRow = result?;
        if row.from_trip_id.is_some()
            || row.to_trip_id.is_some()
            || row.from_route_id.is_some()
            || row.to_route_id.is_some()
        {
            discarded += 1;
            continue;
        }
        if row.to_stop_id == row.from_stop_id {
            continue;
        }
        builder.add_transfer(Transfer {
            from_stop_id: row.from_stop_id,
            to_stop_id: row.to_stop_id,
            kind: TransferKind::from_gtfs_code(row.transfer_type)?,
            transfer_time: Duration::seconds(row.min_transfer_time.unwrap_or(0)),
        });
    }
    if discarded != 0 {
        eprintln!("{} transfers.txt rows discarded (trip/route-scoped transfer)", discarded);
    }
    Ok(())
}

fn parse_gtfs_date(s: &str) -> Result<NaiveDate, Box<dyn Error>> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|err| format!("date {:?}: {}", s, err).into())
}

#[cfg(test)]
mod test {
    use super::*;
    use search_core::engine::{Query, SearchEngine};
    use search_core::time::{Instant, ServiceDay};
    use std::fs;
    use std::sync::atomic::{AtomicU32, Ordering};

    static FIXTURE_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn write_fixture(files: &[(&str, &str)]) -> PathBuf {
        let n = FIXTURE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("connection-search-loader-test-{}-{}", std::process::id(), n));
        fs::create_dir_all(&dir).unwrap();
        for (name, contents) in files {
            fs::write(dir.join(name), contents).unwrap();
        }
        dir
    }

    const STOPS: &str = "stop_id,stop_name,location_type,parent_station,asw_node_id\n\
A,Stop A,0,,\n\
P,Platform P,0,,NODE\n\
P2,Platform P2,0,,NODE\n\
B,Stop B,0,,\n";

    const ROUTES: &str = "route_id,route_short_name,route_long_name,route_type\n\
R1,1,,3\n\
R2,2,,3\n";

    const TRIPS: &str = "trip_id,route_id,service_id,trip_short_name\n\
T1,R1,WEEKDAY,\n\
T2,R2,WEEKDAY,\n";

    const STOP_TIMES: &str = "trip_id,stop_sequence,arrival_time,departure_time,stop_id,pickup_type,drop_off_type\n\
T1,1,09:00:00,09:00:00,A,0,0\n\
T1,2,09:30:00,09:30:00,P,0,0\n\
T2,1,09:35:00,09:35:00,P2,0,0\n\
T2,2,10:00:00,10:00:00,B,0,0\n";

    const CALENDAR: &str = "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
WEEKDAY,1,1,1,1,1,0,0,20241101,20241130\n";

    fn base_config(dataset_path: PathBuf) -> Config {
        Config {
            dataset_path: dataset_path.to_str().unwrap().to_owned(),
            max_search_time: Duration::seconds(24 * 60 * 60),
            transfer_mode: TransferMode::ByNodeId,
            transfer_node_id_column: "asw_node_id".to_owned(),
            min_transfer_time: Duration::seconds(180),
            profile: None,
        }
    }

    #[test]
    fn load_data_builds_an_index_a_search_can_run_against() {
        let dir = write_fixture(&[
            ("stops.txt", STOPS),
            ("routes.txt", ROUTES),
            ("trips.txt", TRIPS),
            ("stop_times.txt", STOP_TIMES),
            ("calendar.txt", CALENDAR),
        ]);

        let config = base_config(dir);
        let index = load_data(&config).unwrap();

        assert!(index.get_stop("A").is_ok());
        assert!(index.get_stop("B").is_ok());
        assert_eq!(index.stop_times_on_trip("T1").len(), 2);

        let start = Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(8, 0, 0));
        let engine = SearchEngine::new(&index);
        let result = engine
            .run(&Query {
                origins: vec!["A".to_owned()],
                destinations: vec!["B".to_owned()].into_iter().collect(),
                start_time: start,
                max_search_time: config.max_search_time,
            })
            .expect("A to B connection via the shared NODE transfer point");
        assert_eq!(result.transfer_count(), 1);
    }

    #[test]
    fn load_data_tolerates_a_missing_calendar_file() {
        let dir = write_fixture(&[
            ("stops.txt", STOPS),
            ("routes.txt", ROUTES),
            ("trips.txt", TRIPS),
            ("stop_times.txt", STOP_TIMES),
        ]);

        let config = base_config(dir);
        let index = load_data(&config).unwrap();

        // No calendar.txt and no calendar_dates.txt means the WEEKDAY service never
        // runs, so the search naturally finds nothing rather than erroring.
        let start = Instant::new(ServiceDay::from_ymd(2024, 11, 11), Time::from_hms(8, 0, 0));
        let engine = SearchEngine::new(&index);
        let result = engine.run(&Query {
            origins: vec!["A".to_owned()],
            destinations: vec!["B".to_owned()].into_iter().collect(),
            start_time: start,
            max_search_time: config.max_search_time,
        });
        assert_eq!(result, None);
    }

    #[test]
    fn load_data_skips_malformed_stop_time_rows_instead_of_aborting() {
        let bad_stop_times = "trip_id,stop_sequence,arrival_time,departure_time,stop_id,pickup_type,drop_off_type\n\
T1,1,not-a-time,09:00:00,A,0,0\n\
T1,2,09:30:00,09:30:00,P,0,0\n";

        let dir = write_fixture(&[
            ("stops.txt", STOPS),
            ("routes.txt", ROUTES),
            ("trips.txt", TRIPS),
            ("stop_times.txt", bad_stop_times),
            ("calendar.txt", CALENDAR),
        ]);

        let config = base_config(dir);
        let index = load_data(&config).unwrap();

        // The malformed row is skipped; the well-formed one still loads.
        assert_eq!(index.stop_times_on_trip("T1").len(), 1);
    }
}
