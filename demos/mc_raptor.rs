use raptor::{AccessEgress, RaptorRequest, RaptorService, SearchData};

use dev_utils::get_example_scenario;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let (network, start, start_time, end) = get_example_scenario();
    network.print_stats();

    // Walking to the origin takes five minutes, the search window is resolved by the heuristics.
    let request = RaptorRequest::builder()
        .earliest_departure_time(start_time)
        .add_access_path(AccessEgress::walk(start, 300))
        .add_egress_path(AccessEgress::free(end))
        .build()?;
    let data = SearchData::walking(&network)?;
    let response = RaptorService::default().route(&data, &request)?;

    println!("Search window: {} minutes.", response.search_window.num_minutes());
    if response.is_empty() {
        println!("No journey found.");
    }
    for path in &response.paths {
        println!("{path}");
        println!("{}", path.describe(&network));
    }

    Ok(())
}
