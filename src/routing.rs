//! Delivery route planning for a single vehicle.
//!
//! Stops are visited in priority tiers, highest priority first. Inside a tier
//! the planner walks greedy nearest-neighbour from wherever the vehicle is,
//! breaking distance ties on the lower task id. Stops without coordinates
//! cannot be placed on the map; they close their tier in id order.

use std::cmp::Reverse;
use std::collections::BTreeMap;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        Some(Self::new(lat?, lng?))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Stop {
    pub id: u64,
    pub priority: i64,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    /// Stop ids in visiting order.
    pub order: Vec<u64>,
    /// Great-circle length of the located legs.
    pub distance_km: f64,
}

/// Great-circle distance between two points.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

pub fn plan_route(start: Option<GeoPoint>, stops: &[Stop]) -> RoutePlan {
    let mut tiers: BTreeMap<Reverse<i64>, Vec<Stop>> = BTreeMap::new();
    for stop in stops {
        tiers.entry(Reverse(stop.priority)).or_default().push(*stop);
    }

    let mut order = Vec::with_capacity(stops.len());
    let mut distance_km = 0.0;
    let mut cursor = start;

    for (_, tier) in tiers {
        let (mut located, mut unlocated): (Vec<Stop>, Vec<Stop>) =
            tier.into_iter().partition(|stop| stop.location.is_some());
        located.sort_by_key(|stop| stop.id);
        unlocated.sort_by_key(|stop| stop.id);

        while !located.is_empty() {
            let next = match cursor {
                // Candidates are sorted by id, so the first minimum wins ties.
                Some(from) => located
                    .iter()
                    .enumerate()
                    .filter_map(|(i, stop)| stop.location.map(|to| (i, haversine_km(from, to))))
                    .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                        Some((_, best_d)) if best_d <= d => best,
                        _ => Some((i, d)),
                    })
                    .map_or(0, |(i, _)| i),
                None => 0,
            };
            let stop = located.remove(next);
            if let (Some(from), Some(to)) = (cursor, stop.location) {
                distance_km += haversine_km(from, to);
            }
            cursor = stop.location;
            order.push(stop.id);
        }

        order.extend(unlocated.iter().map(|stop| stop.id));
    }

    RoutePlan { order, distance_km }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: u64, priority: i64, lat: f64, lng: f64) -> Stop {
        Stop {
            id,
            priority,
            location: Some(GeoPoint::new(lat, lng)),
        }
    }

    #[test]
    fn test_haversine_one_degree_on_equator() {
        let d = haversine_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((d - 111.195).abs() < 0.01, "got {d}");
        assert_eq!(haversine_km(GeoPoint::new(38.7, -9.1), GeoPoint::new(38.7, -9.1)), 0.0);
    }

    #[test]
    fn test_nearest_neighbour_within_a_tier() {
        let stops = [
            stop(1, 0, 0.0, 3.0),
            stop(2, 0, 0.0, 1.0),
            stop(3, 0, 0.0, 2.0),
        ];
        let plan = plan_route(Some(GeoPoint::new(0.0, 0.0)), &stops);
        assert_eq!(plan.order, vec![2, 3, 1]);

        let expected = haversine_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 3.0));
        assert!((plan.distance_km - expected).abs() < 1e-6);
    }

    #[test]
    fn test_higher_priority_goes_first_even_when_far() {
        let stops = [stop(1, 0, 0.0, 0.1), stop(2, 5, 0.0, 4.0), stop(3, 0, 0.0, 0.2)];
        let plan = plan_route(Some(GeoPoint::new(0.0, 0.0)), &stops);
        // After the urgent stop the vehicle is far east, so 3 is now nearer.
        assert_eq!(plan.order, vec![2, 3, 1]);
    }

    #[test]
    fn test_ties_and_unlocated_stops() {
        let stops = [
            Stop { id: 9, priority: 0, location: None },
            stop(4, 0, 0.0, -1.0),
            stop(3, 0, 0.0, 1.0),
            Stop { id: 2, priority: 0, location: None },
        ];
        let plan = plan_route(Some(GeoPoint::new(0.0, 0.0)), &stops);
        assert_eq!(plan.order, vec![3, 4, 2, 9]);
    }

    #[test]
    fn test_unknown_start_begins_with_lowest_id() {
        let stops = [stop(7, 0, 0.0, 1.0), stop(5, 0, 0.0, 10.0)];
        let plan = plan_route(None, &stops);
        assert_eq!(plan.order, vec![5, 7]);
    }
}
