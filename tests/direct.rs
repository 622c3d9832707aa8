use raptor::network::{StopIndex, Timestamp};
use raptor::request::CostParams;
use raptor::{
    AccessEgress, DirectTransitRequest, Network, NetworkBuilder, Profile, RaptorError, RaptorPath, RaptorRequest,
    RaptorService, RelaxFunction, RelaxedLimitedTransferRequest, SearchData, TripTimes,
};

/// Routes between two stops, each given as a list of (departure, arrival) trips.
fn parallel_routes(routes: &[(&str, &[(Timestamp, Timestamp)])]) -> (Network<TripTimes>, StopIndex, StopIndex) {
    let mut builder = NetworkBuilder::new(60);
    let (from, to) = (builder.add_stop("From"), builder.add_stop("To"));
    let mut trip_id = 0;
    for (line, trips) in routes {
        let trips = trips
            .iter()
            .map(|&(departure, arrival)| {
                trip_id += 1;
                TripTimes::from_times(trip_id, &[departure, arrival])
            })
            .collect();
        builder.add_route(line, vec![from, to], trips).unwrap();
    }
    (builder.build(), from, to)
}

fn summary(paths: &[RaptorPath]) -> Vec<(Timestamp, Timestamp, i32)> {
    let mut summary: Vec<_> = paths.iter().map(|path| (path.start_time, path.end_time, path.c1)).collect();
    summary.sort_unstable();
    summary
}

fn find(network: &Network<TripTimes>, request: &DirectTransitRequest) -> Vec<RaptorPath> {
    let data = SearchData::walking(network).unwrap();
    RaptorService::default().find_all_direct_transit(&data, request).unwrap()
}

#[test]
fn paths_within_the_relaxed_cost_are_kept() {
    let (network, from, to) =
        parallel_routes(&[("R1", &[(120, 220)]), ("R2", &[(120, 539)]), ("R3", &[(120, 540)])]);
    let request = DirectTransitRequest::builder()
        .earliest_departure_time(0)
        .search_window_in_seconds(600)
        .relax_c1(RelaxFunction::new(2.0, 120).unwrap())
        .add_access_paths([AccessEgress::walk(from, 30)])
        .add_egress_paths([AccessEgress::walk(to, 20)])
        .cost_params(CostParams { board_cost: 0, ..CostParams::default() })
        .build()
        .unwrap();

    // R1 costs 200, so anything above 2 * 200 + 120 is dropped.
    assert_eq!(summary(&find(&network, &request)), vec![(90, 240, 200), (90, 559, 519)]);
}

#[test]
fn every_trip_inside_the_search_window_is_returned() {
    let (network, from, to) = parallel_routes(&[("R1", &[(120, 240), (180, 300), (240, 360)])]);
    let request = DirectTransitRequest::builder()
        .earliest_departure_time(0)
        .search_window_in_seconds(180)
        .add_access_paths([AccessEgress::walk(from, 30)])
        .add_egress_paths([AccessEgress::walk(to, 20)])
        .build()
        .unwrap();

    let paths = find(&network, &request);

    assert_eq!(summary(&paths), vec![(90, 260, 820), (150, 320, 820)]);
    assert!(paths.iter().all(|path| path.number_of_transfers == 0));
}

fn full_day_request(from: StopIndex, to: StopIndex) -> DirectTransitRequest {
    DirectTransitRequest::builder()
        .earliest_departure_time(0)
        .search_window_in_seconds(24 * 3600)
        .relax_c1(RelaxFunction::new(2.0, 0).unwrap())
        .add_access_paths([AccessEgress::free(from)])
        .add_egress_paths([AccessEgress::free(to)])
        .build()
        .unwrap()
}

#[test]
fn slow_trips_survive_when_they_leave_earlier_or_arrive_later() {
    let (network, from, to) =
        parallel_routes(&[("FAST", &[(3600, 4200)]), ("SLOW", &[(300, 3900), (3900, 7500)])]);

    let paths = find(&network, &full_day_request(from, to));

    assert_eq!(summary(&paths), vec![(300, 3900, 4200), (3600, 4200, 1200), (3900, 7500, 4200)]);
}

#[test]
fn slow_trips_over_the_relaxed_cost_are_dropped() {
    let (network, from, to) = parallel_routes(&[
        ("FAST", &[(3600, 4200)]),
        ("SLOWER", &[(3600, 5340)]),
        ("SLOWEST", &[(3600, 5400)]),
    ]);

    let paths = find(&network, &full_day_request(from, to));

    assert_eq!(summary(&paths), vec![(3600, 4200, 1200), (3600, 5340, 2340)]);
}

#[test]
fn cheapest_access_and_egress_is_used_per_route() {
    let mut builder = NetworkBuilder::new(60);
    let (a, b, c, d) = (builder.add_stop("A"), builder.add_stop("B"), builder.add_stop("C"), builder.add_stop("D"));
    builder.add_route("R1", vec![a, b, c, d], vec![TripTimes::from_times(1, &[100, 200, 300, 400])]).unwrap();
    let network = builder.build();
    let request = DirectTransitRequest::builder()
        .earliest_departure_time(0)
        .search_window_in_seconds(600)
        .add_access_paths([AccessEgress::walk(a, 10), AccessEgress::walk(b, 10)])
        .add_egress_paths([AccessEgress::walk(c, 10), AccessEgress::walk(d, 10)])
        .build()
        .unwrap();

    let paths = find(&network, &request);

    // Board at B and leave at C, riding one stop.
    assert_eq!(summary(&paths), vec![(190, 310, 740)]);
}

#[test]
fn direct_search_rejects_unknown_stops() {
    let (network, from, _) = parallel_routes(&[("R1", &[(120, 240)])]);
    let request = DirectTransitRequest::builder()
        .earliest_departure_time(0)
        .add_access_paths([AccessEgress::free(from)])
        .add_egress_paths([AccessEgress::free(7)])
        .build()
        .unwrap();
    let data = SearchData::walking(&network).unwrap();

    let err = RaptorService::default().find_all_direct_transit(&data, &request).unwrap_err();

    assert!(matches!(err, RaptorError::UnknownStop(7)));
}

#[test]
fn relaxed_limited_transfer_adds_single_ride_paths_to_the_multi_criteria_result() {
    let mut builder = NetworkBuilder::new(60);
    let (b, c, d) = (builder.add_stop("B"), builder.add_stop("C"), builder.add_stop("D"));
    builder.add_route("R1", vec![b, d], vec![TripTimes::from_times(1, &[120, 240])]).unwrap();
    builder.add_route("R2", vec![b, c, d], vec![TripTimes::from_times(2, &[60, 180, 300])]).unwrap();
    let network = builder.build();
    let data = SearchData::walking(&network).unwrap();
    let request = || {
        RaptorRequest::builder()
            .profile(Profile::MultiCriteria)
            .earliest_departure_time(0)
            .search_window_in_seconds(600)
            .add_access_path(AccessEgress::walk(b, 30))
            .add_egress_path(AccessEgress::walk(d, 20))
    };
    let service = RaptorService::default();

    let response = service.route(&data, &request().build().unwrap()).unwrap();
    assert_eq!(summary(&response.paths), vec![(90, 260, 820)]);

    let relaxed = request().relaxed_limited_transfer(RelaxedLimitedTransferRequest::enabled()).build().unwrap();
    let response = service.route(&data, &relaxed).unwrap();
    // R1 found by both searches is returned once.
    assert_eq!(summary(&response.paths), vec![(30, 320, 940), (90, 260, 820)]);
}
