//! Coordinate helpers: geohash encoding and a planar distance for ranking.

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Precision used for disaster ids and neighbourhood lookups (~39 km cells).
pub const DISASTER_GEOHASH_PRECISION: usize = 4;

pub fn geohash(latitude: f64, longitude: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let mut bits = 0u8;
    let mut idx = 0usize;

    while hash.len() < precision {
        let (range, value) = if even {
            (&mut lon_range, longitude)
        } else {
            (&mut lat_range, latitude)
        };
        let mid = (range.0 + range.1) / 2.0;
        idx <<= 1;
        if value >= mid {
            idx |= 1;
            range.0 = mid;
        } else {
            range.1 = mid;
        }
        even = !even;

        bits += 1;
        if bits == 5 {
            hash.push(BASE32[idx] as char);
            bits = 0;
            idx = 0;
        }
    }
    hash
}

/// Euclidean distance in degrees. Only meaningful for ordering nearby points.
pub fn planar_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}
