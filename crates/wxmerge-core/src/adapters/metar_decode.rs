//! Raw METAR decoding shared by the aviation-report adapters.
//!
//! Only the groups that map onto canonical fields are decoded. Unknown
//! groups are skipped and missing-data groups (`/////KT`, `////`, `//`)
//! decode to `None`.

use crate::domain::{CloudCover, Field, SnapshotBuilder};
use crate::parsing::parse_fraction;
use crate::units;

/// Visibility reported as `CAVOK` or `9999`: 10 km or more.
const TEN_KM_METERS: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedWind {
    /// `None` for variable (`VRB`) direction.
    pub direction_deg: Option<f64>,
    pub speed_kt: f64,
    pub gust_kt: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudLayer {
    pub cover: CloudCover,
    pub base_ft: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMetar {
    pub station: Option<String>,
    /// `DDHHMMZ` token, resolved against the fetch date by the caller.
    pub day_time: Option<String>,
    pub wind: Option<DecodedWind>,
    pub visibility_sm: Option<f64>,
    pub clouds: Vec<CloudLayer>,
    pub cavok: bool,
    pub temperature_c: Option<f64>,
    pub dewpoint_c: Option<f64>,
    pub altimeter_inhg: Option<f64>,
    pub precip_1h_in: Option<f64>,
}

impl DecodedMetar {
    /// Lowest broken, overcast, or vertical-visibility base.
    pub fn ceiling_ft(&self) -> Option<f64> {
        self.clouds
            .iter()
            .filter(|layer| layer.cover.forms_ceiling())
            .filter_map(|layer| layer.base_ft)
            .min_by(f64::total_cmp)
    }

    /// Most significant coverage across all layers.
    pub fn cloud_cover(&self) -> Option<CloudCover> {
        let reported = self.clouds.iter().map(|layer| layer.cover).max();
        match reported {
            Some(cover) => Some(cover),
            None if self.cavok => Some(CloudCover::Clr),
            None => None,
        }
    }

    /// True when the report states clear skies, so an absent ceiling is a
    /// real observation rather than missing data.
    pub fn sky_clear(&self) -> bool {
        matches!(self.cloud_cover(), Some(CloudCover::Skc | CloudCover::Clr))
    }

    /// Fills every field the builder does not already hold.
    pub fn fill(&self, builder: &mut SnapshotBuilder) {
        builder
            .fill(Field::Temperature, self.temperature_c)
            .fill(Field::Dewpoint, self.dewpoint_c)
            .fill(Field::Pressure, self.altimeter_inhg)
            .fill(Field::Precipitation, self.precip_1h_in)
            .fill(Field::Visibility, self.visibility_sm)
            .fill(Field::Ceiling, self.ceiling_ft());
        if !builder.is_set(Field::CloudCover) {
            builder.cloud_cover(self.cloud_cover());
        }
        if let Some(wind) = self.wind {
            builder
                .fill(Field::WindSpeed, Some(wind.speed_kt))
                .fill(Field::WindDirection, wind.direction_deg)
                .fill(Field::WindGust, wind.gust_kt);
        }
        builder.derive_humidity();
    }
}

/// Decodes a raw METAR or SPECI report.
pub fn decode(raw: &str) -> DecodedMetar {
    let mut decoded = DecodedMetar::default();
    let (body, remarks) = match raw.find(" RMK") {
        Some(position) => (&raw[..position], Some(&raw[position + 4..])),
        None => (raw, None),
    };

    let tokens = body
        .split_whitespace()
        .map(|token| token.trim_end_matches('='))
        .collect::<Vec<_>>();
    let mut index = 0;

    while index < tokens.len() {
        let token = tokens[index];
        index += 1;
        if !token.is_ascii() {
            continue;
        }

        if matches!(token, "METAR" | "SPECI" | "AUTO" | "COR" | "NIL") {
            continue;
        }
        if decoded.station.is_none() && decoded.day_time.is_none() && is_station(token) {
            decoded.station = Some(token.to_owned());
            continue;
        }
        if decoded.day_time.is_none() && is_day_time(token) {
            decoded.day_time = Some(token.to_owned());
            continue;
        }
        if let Some(wind) = decode_wind(token) {
            decoded.wind = wind;
            continue;
        }
        if token == "CAVOK" {
            decoded.cavok = true;
            decoded.visibility_sm = Some(units::meters_to_statute_miles(TEN_KM_METERS));
            continue;
        }
        if decoded.visibility_sm.is_none() {
            // Mixed numbers arrive split: "1 1/2SM".
            if token.len() == 1 && token.bytes().all(|byte| byte.is_ascii_digit()) {
                if let Some(next) = tokens.get(index).filter(|next| next.ends_with("SM")) {
                    if let Some(visibility) = decode_visibility_sm(&format!("{token} {next}")) {
                        decoded.visibility_sm = Some(visibility);
                        index += 1;
                        continue;
                    }
                }
            }
            if let Some(visibility) = decode_visibility(token) {
                decoded.visibility_sm = visibility;
                continue;
            }
        }
        if let Some(layer) = decode_cloud(token) {
            if let Some(layer) = layer {
                decoded.clouds.push(layer);
            }
            continue;
        }
        if let Some((temperature, dewpoint)) = decode_temperature(token) {
            decoded.temperature_c = temperature;
            decoded.dewpoint_c = dewpoint;
            continue;
        }
        if let Some(altimeter) = decode_altimeter(token) {
            decoded.altimeter_inhg = Some(altimeter);
        }
    }

    if let Some(remarks) = remarks {
        decode_remarks(remarks, &mut decoded);
    }
    decoded
}

fn is_station(token: &str) -> bool {
    token.len() == 4
        && token.bytes().all(|byte| byte.is_ascii_alphanumeric())
        && token.as_bytes()[0].is_ascii_alphabetic()
        && token != "AUTO"
}

fn is_day_time(token: &str) -> bool {
    token.len() == 7
        && token.ends_with('Z')
        && token[..6].bytes().all(|byte| byte.is_ascii_digit())
}

fn digits(text: &str) -> Option<f64> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>().ok()
}

/// `Some(None)` for a recognised but missing wind group.
fn decode_wind(token: &str) -> Option<Option<DecodedWind>> {
    let (body, to_knots): (&str, fn(f64) -> f64) = if let Some(body) = token.strip_suffix("KT") {
        (body, |value| value)
    } else if let Some(body) = token.strip_suffix("MPS") {
        (body, units::mps_to_knots)
    } else if let Some(body) = token.strip_suffix("KMH") {
        (body, units::kmh_to_knots)
    } else {
        return None;
    };
    if body.len() < 5 {
        return None;
    }

    let (direction, rest) = body.split_at(3);
    if rest.bytes().all(|byte| byte == b'/') || direction == "///" && rest.starts_with('/') {
        return Some(None);
    }
    let direction_deg = match direction {
        "VRB" => None,
        "///" => None,
        digits_text => Some(digits(digits_text)?),
    };
    let (speed, gust) = match rest.split_once('G') {
        Some((speed, gust)) => (speed, Some(gust)),
        None => (rest, None),
    };
    let Some(speed) = digits(speed) else {
        return Some(None);
    };

    Some(Some(DecodedWind {
        direction_deg,
        speed_kt: to_knots(speed),
        gust_kt: gust.and_then(digits).map(to_knots),
    }))
}

fn decode_visibility_sm(token: &str) -> Option<f64> {
    let value = token.strip_suffix("SM")?;
    let value = value
        .strip_prefix('P')
        .or_else(|| value.strip_prefix('M'))
        .unwrap_or(value);
    parse_fraction(value)
}

/// `Some(None)` for a recognised but missing visibility group.
fn decode_visibility(token: &str) -> Option<Option<f64>> {
    if token.ends_with("SM") {
        if token.trim_end_matches("SM").bytes().all(|byte| byte == b'/') {
            return Some(None);
        }
        return decode_visibility_sm(token).map(Some);
    }
    if token.len() == 4 {
        if token == "////" {
            return Some(None);
        }
        let meters = digits(token)?;
        let meters = if meters >= 9_999.0 { TEN_KM_METERS } else { meters };
        return Some(Some(units::meters_to_statute_miles(meters)));
    }
    None
}

/// `Some(None)` for recognised groups that carry no usable layer.
fn decode_cloud(token: &str) -> Option<Option<CloudLayer>> {
    if matches!(token, "SKC" | "CLR" | "NSC" | "NCD") {
        let cover = CloudCover::parse(token)?;
        return Some(Some(CloudLayer {
            cover,
            base_ft: None,
        }));
    }
    let (cover, rest) = if let Some(rest) = token.strip_prefix("VV") {
        (CloudCover::Vv, rest)
    } else if token.len() >= 6 {
        let (prefix, rest) = token.split_at(3);
        (CloudCover::parse(prefix)?, rest)
    } else {
        return None;
    };
    if !matches!(
        cover,
        CloudCover::Few | CloudCover::Sct | CloudCover::Bkn | CloudCover::Ovc | CloudCover::Vv
    ) {
        return None;
    }
    let height = rest.get(..3)?;
    let suffix = &rest[3..];
    if !matches!(suffix, "" | "CB" | "TCU" | "///") {
        return None;
    }
    if height == "///" {
        return Some(Some(CloudLayer {
            cover,
            base_ft: None,
        }));
    }
    let hundreds = digits(height)?;
    Some(Some(CloudLayer {
        cover,
        base_ft: Some(hundreds * 100.0),
    }))
}

fn decode_signed_temperature(text: &str) -> Option<Option<f64>> {
    if text.is_empty() || text.bytes().all(|byte| byte == b'/') {
        return Some(None);
    }
    let (sign, magnitude) = match text.strip_prefix('M') {
        Some(magnitude) => (-1.0, magnitude),
        None => (1.0, text),
    };
    if magnitude.len() != 2 {
        return None;
    }
    Some(Some(sign * digits(magnitude)?))
}

fn decode_temperature(token: &str) -> Option<(Option<f64>, Option<f64>)> {
    if token.ends_with("SM") {
        return None;
    }
    let (temperature, dewpoint) = token.split_once('/')?;
    if temperature.is_empty() && dewpoint.is_empty() {
        return None;
    }
    Some((
        decode_signed_temperature(temperature)?,
        decode_signed_temperature(dewpoint)?,
    ))
}

fn decode_altimeter(token: &str) -> Option<f64> {
    if token.len() != 5 {
        return None;
    }
    let (prefix, value) = token.split_at(1);
    let value = digits(value)?;
    match prefix {
        "A" => Some(value / 100.0),
        "Q" => Some(units::hpa_to_inhg(value)),
        _ => None,
    }
}

fn decode_remarks(remarks: &str, decoded: &mut DecodedMetar) {
    for token in remarks.split_whitespace() {
        let token = token.trim_end_matches('=');
        if !token.is_ascii() {
            continue;
        }
        if token.len() == 5 {
            if let Some(hundredths) = token.strip_prefix('P').and_then(digits) {
                decoded.precip_1h_in = Some(hundredths / 100.0);
                continue;
            }
        }
        if token.len() == 9 && token.starts_with('T') {
            if let (Some(temperature), Some(dewpoint)) =
                (tenths(&token[1..5]), tenths(&token[5..9]))
            {
                decoded.temperature_c = Some(temperature);
                decoded.dewpoint_c = Some(dewpoint);
            }
        }
    }
}

/// `Tsnnn` remark component: sign flag then tenths of a degree.
fn tenths(group: &str) -> Option<f64> {
    let (sign, value) = group.split_at(1);
    let value = digits(value)? / 10.0;
    match sign {
        "0" => Some(value),
        "1" => Some(-value),
        _ => None,
    }
}
