mod common;

use common::{three_stop_line, two_lines_and_an_express, A, B, C};
use raptor::heuristic::HeuristicsToRun;
use raptor::journey::PathLeg;
use raptor::request::{CostParams, Optimization};
use raptor::{
    mc_raptor_query, AccessEgress, NetworkBuilder, OnBoardAccess, Profile, RaptorError, RaptorRequest, RaptorService,
    SearchData, TripTimes, ViaLocation,
};

fn mc_request() -> raptor::request::RaptorRequestBuilder {
    RaptorRequest::builder()
        .profile(Profile::MultiCriteria)
        .add_access_path(AccessEgress::free(A))
        .add_egress_path(AccessEgress::free(C))
}

#[test]
fn pareto_front_over_arrival_transfers_and_cost() {
    let network = two_lines_and_an_express(&[900, 2400]);
    let data = SearchData::walking(&network).unwrap();
    let request = mc_request().earliest_departure_time(0).search_window_in_seconds(0).build().unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    let summary: Vec<_> =
        response.paths.iter().map(|p| (p.end_time, p.number_of_transfers, p.c1)).collect();
    // Two boardings, 20 minutes riding and 5 minutes waiting at B, against one boarding and 25 minutes riding.
    assert_eq!(summary, vec![(2100, 1, 2700), (2400, 0, 2100)]);
    assert_eq!(response.heuristics, HeuristicsToRun::NONE);
}

#[test]
fn search_window_is_derived_from_the_forward_heuristic() {
    let network = two_lines_and_an_express(&[900, 2400]);
    let data = SearchData::walking(&network).unwrap();
    let request = mc_request().earliest_departure_time(0).build().unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    // The heuristic ignores transfer slack and reaches C 1830s after the start. 40 minutes plus
    // half of that, rounded up to whole 10 minutes.
    assert_eq!(response.heuristics, HeuristicsToRun::FORWARD);
    assert_eq!(response.search_window, chrono::Duration::minutes(60));
    assert_eq!(response.stats.iterations, 60);
    assert_eq!(response.paths.len(), 2);
}

#[test]
fn destination_pruning_keeps_optimal_paths() {
    let network = two_lines_and_an_express(&[900, 2400]);
    let data = SearchData::walking(&network).unwrap();
    let request = mc_request()
        .earliest_departure_time(0)
        .latest_arrival_time(3000)
        .search_window_in_seconds(0)
        .add_optimization(Optimization::ParetoCheckAgainstDestination)
        .build()
        .unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    assert_eq!(response.heuristics, HeuristicsToRun::REVERSE);
    let ends: Vec<_> = response.paths.iter().map(|p| p.end_time).collect();
    assert_eq!(ends, vec![2100, 2400]);
}

#[test]
fn on_board_access_continues_the_current_trip() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let request = RaptorRequest::builder()
        .earliest_departure_time(1200)
        .search_window_in_seconds(0)
        .add_on_board_access(OnBoardAccess { route: 0, trip: 0, stop_pos: 1, stop: B, c1: 0 })
        .add_egress_path(AccessEgress::free(C))
        .build()
        .unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    assert_eq!(response.paths.len(), 1);
    let path = &response.paths[0];
    assert!(matches!(path.legs[0], PathLeg::OnBoardAccess { stop: B, time: 1200, .. }));
    assert_eq!((path.start_time, path.end_time), (1200, 1800));
    assert_eq!(path.number_of_transfers, 0);
    // The boarding is charged although the traveller is already on board.
    assert_eq!(path.c1, 600 + 600);
}

#[test]
fn on_board_access_must_match_the_trip() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let request = RaptorRequest::builder()
        .earliest_departure_time(1200)
        .add_on_board_access(OnBoardAccess { route: 0, trip: 0, stop_pos: 1, stop: A, c1: 0 })
        .add_egress_path(AccessEgress::free(C))
        .build()
        .unwrap();

    let error = RaptorService::default().route(&data, &request).unwrap_err();

    assert!(matches!(error, RaptorError::InvalidOnBoardAccess { route: 0, trip: 0, stop_pos: 1 }));
}

#[test]
fn pass_through_forces_the_route_via_the_location() {
    let network = two_lines_and_an_express(&[700, 1300]);
    let data = SearchData::walking(&network).unwrap();
    let request = mc_request()
        .earliest_departure_time(0)
        .search_window_in_seconds(0)
        .add_via_location(ViaLocation::pass_through("B", vec![B]))
        .build()
        .unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    assert_eq!(response.paths.len(), 1);
    let path = &response.paths[0];
    assert_eq!(path.end_time, 2100);
    let lines: Vec<_> = path.transit_legs().map(|leg| leg.line.to_string()).collect();
    assert_eq!(lines, vec!["L1", "L2"]);
}

#[test]
fn without_pass_through_the_express_wins() {
    let network = two_lines_and_an_express(&[700, 1300]);
    let paths = mc_raptor_query(&network, A, 0, C).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].transit_legs().count(), 1);
}

#[test]
fn pass_through_needs_multi_criteria() {
    let network = two_lines_and_an_express(&[700, 1300]);
    let data = SearchData::walking(&network).unwrap();
    let request = mc_request()
        .profile(Profile::Standard)
        .earliest_departure_time(0)
        .add_via_location(ViaLocation::pass_through("B", vec![B]))
        .build()
        .unwrap();

    let error = RaptorService::default().route(&data, &request).unwrap_err();

    assert!(matches!(error, RaptorError::Unsupported(_)));
}

#[test]
fn stop_transfer_cost_is_charged_where_vehicles_are_changed() {
    // R1 runs B -> C 0:10-0:14, R2 runs C -> D 0:18-0:20.
    let mut builder = NetworkBuilder::new(60);
    let (b, c, d) = (builder.add_stop("B"), builder.add_stop("C"), builder.add_stop("D"));
    builder.add_route("R1", vec![b, c], vec![TripTimes::from_times(1, &[600, 840])]).unwrap();
    builder.add_route("R2", vec![c, d], vec![TripTimes::from_times(2, &[1080, 1200])]).unwrap();
    let network = builder.build();
    let data = SearchData::walking(&network).unwrap();
    let cost = CostParams { board_cost: 0, ..CostParams::default() }.with_stop_transfer_cost(vec![0, 50, 600]);
    let request = RaptorRequest::builder()
        .earliest_departure_time(0)
        .latest_arrival_time(1800)
        .search_window_in_seconds(0)
        .add_access_path(AccessEgress::free(b))
        .add_egress_paths([AccessEgress::walk(c, 300), AccessEgress::walk(d, 20)])
        .cost_params(cost)
        .build()
        .unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    let summary: Vec<_> = response.paths.iter().map(|p| (p.end_time, p.number_of_transfers, p.c1)).collect();
    // Walking from C costs 600 and C is not charged when leaving the network there. Changing at C
    // costs 50 twice, the 600 charged on alighting at D is taken back by the egress.
    assert_eq!(summary, vec![(1140, 0, 840), (1220, 1, 740)]);
}
