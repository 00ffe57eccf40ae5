//! A minimal CLI around the core query contract (spec §6): load a GTFS feed, run one
//! earliest-arrival query, print the resulting connection. No stop-name trie, no
//! prompt loop, no web server — those are out-of-scope external collaborators;
//! grounded in `src/bin/search.rs`'s shape, trimmed to just the core contract.

use std::collections::HashSet;
use std::error::Error;

use chrono::NaiveDateTime;

use connection_search::config::Config;
use connection_search::loader;
use search_core::connection::{Connection, Segment};
use search_core::engine::{Query, SearchEngine};
use search_core::schedule::ScheduleIndex;
use search_core::time::{Instant, ServiceDay, Time};

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (origins, destinations, start_time) = match args.as_slice() {
        [origins, destinations, start_time] => (
            origins.split(',').map(str::to_owned).collect::<Vec<_>>(),
            destinations.split(',').map(str::to_owned).collect::<HashSet<_>>(),
            parse_start_time(start_time)?,
        ),
        _ => {
            eprintln!(
                "usage: connection_search <origin_stop_ids> <destination_stop_ids> <start_time YYYY-MM-DDTHH:MM:SS>"
            );
            std::process::exit(2);
        }
    };

    let config = Config::from_env();
    let index = loader::load_data(&config)?;

    let query = Query {
        origins,
        destinations,
        start_time,
        max_search_time: config.max_search_time,
    };

    let engine = SearchEngine::new(&index);
    match engine.run(&query) {
        Some(connection) => print_connection(&connection, &index),
        None => println!("no connection found"),
    }
    Ok(())
}

fn parse_start_time(s: &str) -> Result<Instant, Box<dyn Error>> {
    let parsed = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")?;
    let service_day = ServiceDay::from_naive_date(parsed.date());
    use chrono::Timelike;
    let time = Time::from_hms(parsed.hour(), parsed.minute(), parsed.second());
    Ok(Instant::new(service_day, time))
}

fn print_connection(connection: &Connection, index: &ScheduleIndex) {
    if connection.segments().is_empty() {
        println!("origin and destination are the same");
        return;
    }
    for segment in connection.segments() {
        match segment {
            Segment::Trip(seg) => {
                let start = index.stop_time(&seg.start_stoptime);
                let end = index.stop_time(&seg.end_stoptime);
                println!(
                    "ride {} from {} ({}) to {} ({})",
                    seg.start_stoptime.0,
                    start.stop_id,
                    Instant::new(seg.service_day, start.departure),
                    end.stop_id,
                    Instant::new(seg.service_day, end.arrival),
                );
            }
            Segment::Transfer(seg) => {
                println!(
                    "transfer from {} to {} ({} -> {})",
                    seg.transfer.from_stop_id, seg.transfer.to_stop_id, seg.start_departure, seg.end_arrival,
                );
            }
        }
    }
    println!(
        "first departure {}",
        connection
            .first_departure(index)
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_owned())
    );
    println!(
        "last arrival {}",
        connection
            .last_arrival(index)
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_owned())
    );
    println!("transfers {}", connection.transfer_count());
}
