//! Pure geometry: great-circle distance and ray-casting containment.

use crate::types::LatLon;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance between two lat/lon points in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lon / 2.0).sin().powi(2);
    // Clamp guards against a > 1 from rounding on near-antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Distance between two points in kilometers.
pub fn distance_km(a: LatLon, b: LatLon) -> f64 {
    haversine_km(a.lat, a.lon, b.lat, b.lon)
}

/// Even-odd ray-casting test with lat as the x axis and lon as the y axis.
///
/// Edges are half-open in lon (`lon_i > lon` differs from `lon_j > lon`), so a
/// horizontal edge never counts as a crossing and a vertex shared by two edges
/// is counted once. For a point exactly on an edge the result follows from
/// the strict `lat < x_cross` comparison: points on the max-lat side of an
/// edge are outside, points on the min-lat side are inside. The rule is
/// deterministic and independent of which vertex the ring starts at.
pub fn point_in_polygon(lat: f64, lon: f64, ring: &[LatLon]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lat, ring[i].lon);
        let (xj, yj) = (ring[j].lat, ring[j].lon);
        if (yi > lon) != (yj > lon) {
            let x_cross = (xj - xi) * (lon - yi) / (yj - yi) + xi;
            if lat < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Union semantics: inside if any ring contains the point.
pub fn point_in_any(lat: f64, lon: f64, rings: &[Vec<LatLon>]) -> bool {
    rings.iter().any(|ring| point_in_polygon(lat, lon, ring))
}

/// Point at `distance_km` from `origin` along initial `bearing_deg`
/// (clockwise from north) on a sphere.
pub fn destination_point(origin: LatLon, bearing_deg: f64, distance_km: f64) -> LatLon {
    let delta = distance_km / EARTH_RADIUS_KM;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.lat.to_radians();
    let lambda1 = origin.lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    LatLon {
        lat: phi2.to_degrees(),
        // Normalize to [-180, 180)
        lon: (lambda2.to_degrees() + 540.0) % 360.0 - 180.0,
    }
}
