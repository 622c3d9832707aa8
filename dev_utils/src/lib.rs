use raptor::network::{StopIndex, Timestamp, Transfer};
use raptor::{utils, Network, NetworkBuilder, TripTimes};

// Common example data for the demos and benchmarks.

pub const GRID_SIZE: usize = 16;

const FIRST_DEPARTURE: Timestamp = 5 * 3600;
const LAST_DEPARTURE: Timestamp = 23 * 3600;
const DWELL_TIME: Timestamp = 30;

pub fn get_example_transfer_time() -> Timestamp {
    3 * 60 // 3 minutes transfer time.
}

pub fn get_example_start_time() -> Timestamp {
    utils::parse_time("08:30:00").unwrap()
}

pub fn get_example_seed() -> u64 {
    7
}

fn stop_name(row: usize, col: usize) -> String {
    format!("Stop {row}-{col}")
}

// Every trip of a line takes the same hop times, trips leave every `headway` seconds.
fn line_trips(rng: &mut fastrand::Rng, first_trip_id: u32, hops: &[Timestamp]) -> Vec<TripTimes> {
    let headway = rng.i32(6..=15) * 60;
    let offset = rng.i32(0..headway);
    (0..)
        .map(|i| FIRST_DEPARTURE + offset + i * headway)
        .take_while(|&start| start <= LAST_DEPARTURE)
        .enumerate()
        .map(|(i, start)| {
            let mut arrivals = Vec::with_capacity(hops.len() + 1);
            let mut departures = Vec::with_capacity(hops.len() + 1);
            let mut time = start;
            arrivals.push(time);
            departures.push(time);
            for hop in hops {
                time += hop;
                arrivals.push(time);
                time += DWELL_TIME;
                departures.push(time);
            }
            TripTimes::new(first_trip_id + i as u32, arrivals, departures)
        })
        .collect()
}

/// A `size` x `size` grid of stops. Every row and column has a line in each direction, and
/// diagonal neighbours are connected by a short walk.
pub fn build_grid_network(size: usize, seed: u64) -> Network<TripTimes> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut builder = NetworkBuilder::new(get_example_transfer_time());
    let grid: Vec<Vec<StopIndex>> =
        (0..size).map(|row| (0..size).map(|col| builder.add_stop(&stop_name(row, col))).collect()).collect();

    let mut lines: Vec<(String, Vec<StopIndex>)> = Vec::new();
    for i in 0..size {
        let row: Vec<StopIndex> = grid[i].clone();
        let col: Vec<StopIndex> = grid.iter().map(|stops| stops[i]).collect();
        lines.push((format!("H{i}"), row.iter().rev().copied().collect()));
        lines.push((format!("H{i}"), row));
        lines.push((format!("V{i}"), col.iter().rev().copied().collect()));
        lines.push((format!("V{i}"), col));
    }

    let mut next_trip_id = 1;
    for (line, stops) in lines {
        let hops: Vec<Timestamp> = (1..stops.len()).map(|_| rng.i32(2..=5) * 60).collect();
        let trips = line_trips(&mut rng, next_trip_id, &hops);
        next_trip_id += trips.len() as u32;
        builder.add_route(&line, stops, trips).unwrap();
    }

    for row in 0..size.saturating_sub(1) {
        for col in 0..size.saturating_sub(1) {
            let distance = 150.0 + rng.f64() * 250.0;
            builder.add_transfer(grid[row][col], Transfer::walk(grid[row + 1][col + 1], distance)).unwrap();
            builder.add_transfer(grid[row + 1][col + 1], Transfer::walk(grid[row][col], distance)).unwrap();
            builder.add_transfer(grid[row][col + 1], Transfer::walk(grid[row + 1][col], distance)).unwrap();
            builder.add_transfer(grid[row + 1][col], Transfer::walk(grid[row][col + 1], distance)).unwrap();
        }
    }
    builder.build()
}

pub fn get_example_start_stop_idx(network: &Network<TripTimes>) -> StopIndex {
    network.get_stop_idx_from_name(&stop_name(0, 0)).unwrap()
}

pub fn get_example_end_stop_idx(network: &Network<TripTimes>) -> StopIndex {
    network.get_stop_idx_from_name(&stop_name(GRID_SIZE - 1, GRID_SIZE - 1)).unwrap()
}

pub fn get_example_scenario() -> (Network<TripTimes>, StopIndex, Timestamp, StopIndex) {
    let network = build_grid_network(GRID_SIZE, get_example_seed());
    let start = get_example_start_stop_idx(&network);
    let start_time = get_example_start_time();
    let end = get_example_end_stop_idx(&network);
    (network, start, start_time, end)
}
