#![allow(dead_code)]

use raptor::network::{StopIndex, Timestamp};
use raptor::{Network, NetworkBuilder, TripTimes};

pub const A: StopIndex = 0;
pub const B: StopIndex = 1;
pub const C: StopIndex = 2;

/// A single line A -> B -> C, ten minutes between stops. Trips leave A at 0:10 and 0:20.
pub fn three_stop_line() -> Network<TripTimes> {
    let mut builder = NetworkBuilder::new(60);
    let stops = vec![builder.add_stop("A"), builder.add_stop("B"), builder.add_stop("C")];
    let trips = vec![TripTimes::from_times(1, &[600, 1200, 1800]), TripTimes::from_times(2, &[1200, 1800, 2400])];
    builder.add_route("L1", stops, trips).unwrap();
    builder.build()
}

/// L1 runs A -> B, L2 runs B -> C and L3 runs A -> C without stopping at B.
///
/// L1 arrives at B at 0:20, L2 leaves B at 0:20:30 and 0:25. With the one minute transfer
/// time only the 0:25 trip can be reached without a constrained transfer.
pub fn two_lines_and_an_express(express: &[Timestamp]) -> Network<TripTimes> {
    let mut builder = NetworkBuilder::new(60);
    let (a, b, c) = (builder.add_stop("A"), builder.add_stop("B"), builder.add_stop("C"));
    builder.add_route("L1", vec![a, b], vec![TripTimes::from_times(11, &[600, 1200])]).unwrap();
    builder
        .add_route(
            "L2",
            vec![b, c],
            vec![TripTimes::from_times(21, &[1230, 1830]), TripTimes::from_times(22, &[1500, 2100])],
        )
        .unwrap();
    builder.add_route("L3", vec![a, c], vec![TripTimes::from_times(31, express)]).unwrap();
    builder.build()
}
