//! Geodesy helpers: GEOREF grid references and great-circle distance/bearing.

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// GEOREF letters (I and O are not used).
const GEOREF_LETTERS: &[u8; 24] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Distance and initial bearing between two positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceBearing {
    pub km: f64,
    pub bearing_deg: f64,
}

/// Formats a position as a GEOREF reference with one-minute precision,
/// e.g. `NGAA0000` for 0°N 0°E.
pub fn georef(lat: f64, lon: f64) -> Option<String> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }

    let lon_min = (((lon + 180.0) * 60.0).floor() as u32).min(360 * 60 - 1);
    let lat_min = (((lat + 90.0) * 60.0).floor() as u32).min(180 * 60 - 1);

    let letter = |i: u32| GEOREF_LETTERS[i as usize] as char;
    let mut out = String::with_capacity(8);
    out.push(letter(lon_min / (15 * 60)));
    out.push(letter(lat_min / (15 * 60)));
    out.push(letter((lon_min / 60) % 15));
    out.push(letter((lat_min / 60) % 15));
    out.push_str(&format!("{:02}{:02}", lon_min % 60, lat_min % 60));
    Some(out)
}

/// Great-circle distance (haversine, spherical Earth) and initial bearing
/// from `from` to `to`, both given as `(lat, lon)` in degrees.
pub fn distance_bearing(from: (f64, f64), to: (f64, f64)) -> DistanceBearing {
    let (phi1, lambda1) = (from.0.to_radians(), from.1.to_radians());
    let (phi2, lambda2) = (to.0.to_radians(), to.1.to_radians());
    let d_phi = phi2 - phi1;
    let d_lambda = lambda2 - lambda1;

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let km = 2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt());

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    let bearing_deg = (y.atan2(x).to_degrees() + 360.0) % 360.0;

    DistanceBearing { km, bearing_deg }
}

/// Rounds to one decimal, the precision distances and bearings are shown in.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
