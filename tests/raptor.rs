mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use common::{three_stop_line, two_lines_and_an_express, A, B, C};
use raptor::journey::PathLeg;
use raptor::{
    raptor_query, AccessEgress, JourneyError, Profile, RaptorError, RaptorRequest, RaptorService, SearchBudget,
    SearchData, ViaLocation,
};

fn standard_request() -> raptor::request::RaptorRequestBuilder {
    RaptorRequest::builder()
        .profile(Profile::Standard)
        .add_access_path(AccessEgress::free(A))
        .add_egress_path(AccessEgress::free(C))
}

#[test]
fn one_round_on_a_single_line() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let request = standard_request().earliest_departure_time(0).max_number_of_transfers(0).build().unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    assert_eq!(response.paths.len(), 1);
    let path = &response.paths[0];
    assert_eq!(path.duration(), 20 * 60);
    assert_eq!(path.number_of_transfers, 0);
    assert_eq!(path.legs.len(), 3);
    let transit = path.transit_legs().next().unwrap();
    assert_eq!((transit.board_stop, transit.alight_stop), (A, C));
    assert_eq!(path.start_time, 600);
    assert_eq!(response.stats.iterations, 1);
}

#[test]
fn faster_journeys_with_more_transfers_are_kept() {
    let network = two_lines_and_an_express(&[900, 2400]);
    let data = SearchData::walking(&network).unwrap();
    let request = standard_request().earliest_departure_time(0).build().unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    let summary: Vec<_> =
        response.paths.iter().map(|p| (p.start_time, p.end_time, p.number_of_transfers)).collect();
    // L1 then the second L2 trip, the first one leaves before the transfer time has passed.
    assert_eq!(summary, vec![(600, 2100, 1), (900, 2400, 0)]);
}

#[test]
fn additional_transfers_limit_rounds_after_the_destination_is_reached() {
    let network = two_lines_and_an_express(&[900, 2400]);
    let data = SearchData::walking(&network).unwrap();
    let summary = |additional: u8| {
        let request =
            standard_request().earliest_departure_time(0).number_of_additional_transfers(additional).build().unwrap();
        let response = RaptorService::default().route(&data, &request).unwrap();
        response.paths.iter().map(|p| (p.start_time, p.end_time, p.number_of_transfers)).collect::<Vec<_>>()
    };

    // The express reaches C in the first round, so round two only runs with one extra transfer.
    assert_eq!(summary(0), vec![(900, 2400, 0)]);
    assert_eq!(summary(1), vec![(600, 2100, 1), (900, 2400, 0)]);
}

#[test]
fn dominated_journeys_are_dropped() {
    // The express leaves later, arrives earlier and needs no transfer.
    let network = two_lines_and_an_express(&[700, 1300]);
    let data = SearchData::walking(&network).unwrap();
    let request = standard_request().earliest_departure_time(0).build().unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    assert_eq!(response.paths.len(), 1);
    assert_eq!(response.paths[0].end_time, 1300);
    assert_eq!(response.paths[0].number_of_transfers, 0);
}

#[test]
fn departure_is_derived_from_the_latest_arrival() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let request = standard_request().latest_arrival_time(2200).search_window_in_seconds(0).build().unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    // The reverse heuristic finds a 1600s journey, the search starts 1600s before the arrival.
    assert_eq!(response.earliest_departure_time, Some(600));
    assert_eq!(response.paths.len(), 1);
    assert_eq!((response.paths[0].start_time, response.paths[0].end_time), (600, 1800));
}

#[test]
fn unreachable_latest_arrival_gives_an_empty_response() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let request = standard_request().latest_arrival_time(1000).build().unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    assert!(response.is_empty());
    assert_eq!(response.earliest_departure_time, None);
}

#[test]
fn arrivals_after_the_latest_arrival_are_rejected() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let request = standard_request().earliest_departure_time(700).latest_arrival_time(2300).build().unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    // The only trip after 0:11:40 arrives at 0:40.
    assert!(response.is_empty());
}

#[test]
fn on_board_access_needs_multi_criteria() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let request = RaptorRequest::builder()
        .profile(Profile::Standard)
        .earliest_departure_time(1200)
        .add_on_board_access(raptor::OnBoardAccess { route: 0, trip: 0, stop_pos: 1, stop: B, c1: 0 })
        .add_egress_path(AccessEgress::free(C))
        .build()
        .unwrap();

    let error = RaptorService::default().route(&data, &request).unwrap_err();

    assert!(matches!(error, RaptorError::Unsupported(_)));
    assert_eq!(error.to_string(), "unsupported for this configuration: on-board access");
}

#[test]
fn cancelled_search_stops() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let budget = SearchBudget { cancel: Some(Arc::new(AtomicBool::new(true))), ..SearchBudget::default() };
    let request = standard_request().earliest_departure_time(0).budget(budget).build().unwrap();

    let error = RaptorService::default().route(&data, &request).unwrap_err();

    assert!(matches!(error, RaptorError::Cancelled));
}

#[test]
fn expired_search_times_out() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let budget = SearchBudget { timeout: Some(Duration::ZERO), ..SearchBudget::default() };
    let request = standard_request().earliest_departure_time(0).budget(budget).build().unwrap();

    let error = RaptorService::default().route(&data, &request).unwrap_err();

    assert!(matches!(error, RaptorError::SearchTimeout));
}

#[test]
fn iteration_limit_stops_the_range_search() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let budget = SearchBudget { max_iterations: Some(2), ..SearchBudget::default() };
    let request = standard_request()
        .earliest_departure_time(0)
        .search_window_in_seconds(600)
        .budget(budget)
        .build()
        .unwrap();

    let error = RaptorService::default().route(&data, &request).unwrap_err();

    assert!(matches!(error, RaptorError::IterationLimit(2)));
}

#[test]
fn range_search_runs_one_iteration_per_minute() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let request = standard_request().earliest_departure_time(0).search_window_in_seconds(1200).build().unwrap();

    let response = RaptorService::default().route(&data, &request).unwrap();

    assert_eq!(response.stats.iterations, 20);
    assert_eq!(response.search_window, chrono::Duration::minutes(20));
    // The 0:20 departure is found first and kept, it leaves later than the 0:10 one.
    let starts: Vec<_> = response.paths.iter().map(|p| p.start_time).collect();
    assert_eq!(starts, vec![600, 1200]);
}

#[test]
fn query_returns_the_earliest_arrival() {
    let network = three_stop_line();
    let journey = raptor_query(&network, A, 0, C).unwrap();
    assert_eq!(journey.end_time, 1800);
    assert!(matches!(journey.legs.first(), Some(PathLeg::Access { .. })));

    let result = raptor_query(&network, C, 0, A);
    assert!(matches!(result, Err(JourneyError::NoJourneyFound)));
}

#[test]
fn stops_outside_the_network_are_rejected() {
    let network = three_stop_line();
    let data = SearchData::walking(&network).unwrap();
    let service = RaptorService::default();

    let access = standard_request().earliest_departure_time(0).add_access_path(AccessEgress::free(99));
    let error = service.route(&data, &access.build().unwrap()).unwrap_err();
    assert!(matches!(error, RaptorError::UnknownStop(99)));
    assert_eq!(error.to_string(), "Unknown stop 99.");

    let egress = standard_request().earliest_departure_time(0).add_egress_path(AccessEgress::walk(3, 60));
    assert!(matches!(service.route(&data, &egress.build().unwrap()), Err(RaptorError::UnknownStop(3))));

    let via = RaptorRequest::builder()
        .earliest_departure_time(0)
        .add_access_path(AccessEgress::free(A))
        .add_egress_path(AccessEgress::free(C))
        .add_via_location(ViaLocation::visit("Nowhere", vec![B, 12]));
    assert!(matches!(service.route(&data, &via.build().unwrap()), Err(RaptorError::UnknownStop(12))));
}
