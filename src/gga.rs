//! Pure NMEA-0183 `$GPGGA` sentence construction.

use chrono::{DateTime, Timelike, Utc};

use crate::error::NtripClientError;

/// Builds a `$GPGGA` sentence for `(latitude, longitude)` stamped with
/// `now`. Fails with [`NtripClientError::InvalidCoordinate`] when
/// `|latitude| > 90` or `|longitude| > 180`.
///
/// Fix quality is hardcoded to `1` (GPS fix), satellites-in-use to `10`,
/// HDOP to `1.0`, and altitude/geoid separation to `0.0 M` — this builder
/// reports the rover's *position*, not a real fix quality, so those fields
/// are fixed rather than plumbed through.
pub fn build_gpgga(
    latitude: f64,
    longitude: f64,
    now: DateTime<Utc>,
) -> Result<Vec<u8>, NtripClientError> {
    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return Err(NtripClientError::InvalidCoordinate(latitude, longitude));
    }

    let lat_hemisphere = if latitude >= 0.0 { 'N' } else { 'S' };
    let lon_hemisphere = if longitude >= 0.0 { 'E' } else { 'W' };

    let lat_abs = latitude.abs();
    let lon_abs = longitude.abs();

    let lat_deg = lat_abs as u32;
    let lat_min = (lat_abs - f64::from(lat_deg)) * 60.0;

    let lon_deg = lon_abs as u32;
    let lon_min = (lon_abs - f64::from(lon_deg)) * 60.0;

    let secs_with_frac = f64::from(now.second()) + f64::from(now.nanosecond()) / 1_000_000_000.0;

    let body = format!(
        "GPGGA,{:02}{:02}{:05.2},{:02}{:07.4},{},{:03}{:07.4},{},1,10,1.0,0.0,M,0.0,M,,",
        now.hour(),
        now.minute(),
        secs_with_frac,
        lat_deg,
        lat_min,
        lat_hemisphere,
        lon_deg,
        lon_min,
        lon_hemisphere,
    );

    let checksum = checksum_of(body.as_bytes());

    Ok(format!("${body}*{checksum:02X}\r\n").into_bytes())
}

/// 8-bit XOR of every byte in `body` (the bytes strictly between `$` and `*`
/// in the final sentence).
fn checksum_of(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2026, 7, 28, h, m, s).unwrap()
    }

    #[test]
    fn golden_vector_from_spec() {
        let sentence = build_gpgga(22.547, 114.086, utc(12, 34, 56)).unwrap();
        let text = String::from_utf8(sentence).unwrap();
        assert!(text.starts_with(
            "$GPGGA,123456.00,2232.8200,N,11405.1600,E,1,10,1.0,0.0,M,0.0,M,,*"
        ));
        assert!(text.ends_with("\r\n"));
    }

    #[test]
    fn checksum_is_xor_of_body_between_dollar_and_star() {
        let sentence = build_gpgga(22.547, 114.086, utc(12, 34, 56)).unwrap();
        let text = String::from_utf8(sentence).unwrap();
        let body = &text[1..text.find('*').unwrap()];
        let expected = checksum_of(body.as_bytes());
        let reported = &text[text.find('*').unwrap() + 1..text.find('*').unwrap() + 3];
        assert_eq!(reported, format!("{expected:02X}"));
    }

    #[test]
    fn southern_western_hemisphere() {
        let sentence = build_gpgga(-33.87, -151.2, utc(0, 0, 0)).unwrap();
        let text = String::from_utf8(sentence).unwrap();
        assert!(text.contains(",S,"));
        assert!(text.contains(",W,"));
    }

    #[test]
    fn out_of_range_latitude_is_rejected() {
        let err = build_gpgga(91.0, 0.0, utc(0, 0, 0)).unwrap_err();
        assert!(matches!(err, NtripClientError::InvalidCoordinate(_, _)));
    }

    #[test]
    fn out_of_range_longitude_is_rejected() {
        let err = build_gpgga(0.0, 181.0, utc(0, 0, 0)).unwrap_err();
        assert!(matches!(err, NtripClientError::InvalidCoordinate(_, _)));
    }

    #[test]
    fn terminator_is_crlf() {
        let sentence = build_gpgga(0.0, 0.0001, utc(1, 2, 3)).unwrap();
        assert_eq!(&sentence[sentence.len() - 2..], b"\r\n");
    }
}
