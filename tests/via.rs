mod common;

use common::{two_lines_and_an_express, A, B, C};
use raptor::request::RequestError;
use raptor::{AccessEgress, Profile, RaptorRequest, RaptorResponse, RaptorService, SearchData, ViaLocation};

fn route_via(via: ViaLocation) -> RaptorResponse {
    // Without a via location the express, arriving at 0:21:40, would be the only journey.
    let network = two_lines_and_an_express(&[700, 1300]);
    let data = SearchData::walking(&network).unwrap();
    let request = RaptorRequest::builder()
        .profile(Profile::Standard)
        .earliest_departure_time(0)
        .search_window_in_seconds(0)
        .add_access_path(AccessEgress::free(A))
        .add_egress_path(AccessEgress::free(C))
        .add_via_location(via)
        .build()
        .unwrap();
    RaptorService::default().route(&data, &request).unwrap()
}

#[test]
fn visit_routes_the_journey_through_the_location() {
    let response = route_via(ViaLocation::visit("B", vec![B]));

    assert_eq!(response.paths.len(), 1);
    let path = &response.paths[0];
    assert_eq!((path.start_time, path.end_time), (600, 2100));
    assert_eq!(path.number_of_transfers, 1);
    let lines: Vec<_> = path.transit_legs().map(|leg| leg.line.to_string()).collect();
    assert_eq!(lines, vec!["L1", "L2"]);
}

#[test]
fn short_minimum_wait_still_makes_the_connection() {
    let response = route_via(ViaLocation::visit_with_wait("B", 240, vec![B]));

    assert_eq!(response.paths.len(), 1);
    assert_eq!(response.paths[0].end_time, 2100);
}

#[test]
fn long_minimum_wait_misses_the_last_connection() {
    let response = route_via(ViaLocation::visit_with_wait("B", 600, vec![B]));
    assert!(response.is_empty());
}

#[test]
fn via_location_needs_stops() {
    let result = RaptorRequest::builder()
        .earliest_departure_time(0)
        .add_access_path(AccessEgress::free(A))
        .add_egress_path(AccessEgress::free(C))
        .add_via_location(ViaLocation::visit("nowhere", Vec::new()))
        .build();
    assert!(matches!(result, Err(RequestError::ViaLocationWithoutStops(_))));
}
