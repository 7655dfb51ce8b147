//! Typed claim conversion
//!
//! Turns a raw entity record into normalized [`Claim`]s. The dispatch
//! table covers the value types the table UI can render; anything else is
//! preserved verbatim as [`ClaimValue::Unknown`] so nothing is lost
//! silently. Snaks without a value slot ("no value" / "unknown value")
//! are skipped, and a property left with zero convertible values is
//! dropped entirely — a claim never carries an empty value list.

use crate::records::{EntityRecord, RawDataValue};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tablegraph_model::{Claim, ClaimValue, EntityId, PropertyId};
use tracing::debug;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Parse every claim on a record into the typed model.
pub fn parse_claims(id: &EntityId, record: &EntityRecord, now: DateTime<Utc>) -> Vec<Claim> {
    let mut out = Vec::with_capacity(record.claims.len());
    for (property, raw_claims) in &record.claims {
        let Ok(property) = property.parse::<PropertyId>() else {
            debug!(entity = %id, %property, "claim under a non-property key, skipped");
            continue;
        };

        let values: Vec<ClaimValue> = raw_claims
            .iter()
            .filter_map(|claim| claim.mainsnak.datavalue.as_ref())
            .map(convert_value)
            .collect();

        if values.is_empty() {
            continue;
        }
        out.push(Claim {
            entity: id.clone(),
            property,
            values,
            cached_at: now,
        });
    }
    out
}

#[derive(Deserialize)]
struct EntityRefPayload {
    id: String,
}

#[derive(Deserialize)]
struct MonolingualPayload {
    text: String,
}

#[derive(Deserialize)]
struct TimePayload {
    time: String,
    precision: u8,
}

#[derive(Deserialize)]
struct QuantityPayload {
    amount: String,
}

#[derive(Deserialize)]
struct CoordinatePayload {
    latitude: f64,
    longitude: f64,
}

fn convert_value(raw: &RawDataValue) -> ClaimValue {
    let payload = raw.value.clone();
    match raw.kind.as_str() {
        "wikibase-entityid" => {
            match serde_json::from_value::<EntityRefPayload>(payload)
                .ok()
                .and_then(|p| p.id.parse::<EntityId>().ok())
            {
                Some(id) => {
                    let display = id.to_string();
                    ClaimValue::EntityRef { id, display }
                }
                // References to lexemes etc. fall outside the entity id space.
                None => unknown(raw),
            }
        }
        "string" => match payload.as_str() {
            Some(text) => ClaimValue::Text(text.to_string()),
            None => unknown(raw),
        },
        "monolingualtext" => match serde_json::from_value::<MonolingualPayload>(payload) {
            Ok(p) => ClaimValue::Text(p.text),
            Err(_) => unknown(raw),
        },
        "time" => match serde_json::from_value::<TimePayload>(payload) {
            Ok(p) => {
                let rendered = format_time(&p.time, p.precision).unwrap_or_else(|| p.time.clone());
                ClaimValue::Time(rendered)
            }
            Err(_) => unknown(raw),
        },
        "quantity" => match serde_json::from_value::<QuantityPayload>(payload) {
            Ok(p) => ClaimValue::Quantity(format_amount(&p.amount)),
            Err(_) => unknown(raw),
        },
        "globecoordinate" => match serde_json::from_value::<CoordinatePayload>(payload) {
            Ok(p) => ClaimValue::Coordinate(format_coordinate(p.latitude, p.longitude)),
            Err(_) => unknown(raw),
        },
        _ => unknown(raw),
    }
}

fn unknown(raw: &RawDataValue) -> ClaimValue {
    ClaimValue::Unknown(json!({"type": raw.kind, "value": raw.value}).to_string())
}

/// Format a graph timestamp (`+1969-07-20T00:00:00Z`) by precision:
/// 9 = year, 10 = year-month, 11 = full date. Negative years render as
/// BCE. Returns `None` for precisions or shapes this renderer does not
/// cover; the caller falls back to the raw timestamp.
pub fn format_time(time: &str, precision: u8) -> Option<String> {
    let (bce, rest) = match time.as_bytes().first()? {
        b'-' => (true, &time[1..]),
        b'+' => (false, &time[1..]),
        _ => (false, time),
    };
    let date = rest.split('T').next()?;
    let mut parts = date.splitn(3, '-');
    let year: u32 = parts.next()?.parse().ok()?;
    let month: usize = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;

    let year_text = if bce {
        format!("{year} BCE")
    } else {
        year.to_string()
    };
    match precision {
        9 => Some(year_text),
        10 => {
            let month = MONTHS.get(month.checked_sub(1)?)?;
            Some(format!("{month} {year_text}"))
        }
        11 => {
            let month = MONTHS.get(month.checked_sub(1)?)?;
            (day >= 1).then(|| format!("{day} {month} {year_text}"))
        }
        _ => None,
    }
}

/// Render a quantity amount with digit grouping, discarding the unit and
/// any leading `+`. Inputs that are not plain decimal numbers are passed
/// through untouched.
pub fn format_amount(amount: &str) -> String {
    let trimmed = amount.strip_prefix('+').unwrap_or(amount);
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.to_string();
    }

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, b) in int_part.bytes().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(b as char);
    }
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// `"48.8566N, 2.3522E"` — four decimal places, hemisphere letters.
pub fn format_coordinate(latitude: f64, longitude: f64) -> String {
    let ns = if latitude < 0.0 { 'S' } else { 'N' };
    let ew = if longitude < 0.0 { 'W' } else { 'E' };
    format!(
        "{:.4}{}, {:.4}{}",
        latitude.abs(),
        ns,
        longitude.abs(),
        ew
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> EntityRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn full_date_month_and_year_precisions() {
        let time = "+1969-07-20T00:00:00Z";
        assert_eq!(format_time(time, 11).unwrap(), "20 July 1969");
        assert_eq!(format_time(time, 10).unwrap(), "July 1969");
        assert_eq!(format_time(time, 9).unwrap(), "1969");
    }

    #[test]
    fn bce_years_drop_leading_zeros() {
        assert_eq!(format_time("-0044-03-15T00:00:00Z", 9).unwrap(), "44 BCE");
        assert_eq!(
            format_time("-0044-03-15T00:00:00Z", 11).unwrap(),
            "15 March 44 BCE"
        );
    }

    #[test]
    fn unsupported_precision_falls_back() {
        // Century precision: renderer declines, caller keeps the raw string.
        assert_eq!(format_time("+1900-00-00T00:00:00Z", 7), None);
        assert_eq!(format_time("+1969-00-00T00:00:00Z", 10), None);
    }

    #[test]
    fn quantities_group_digits_and_drop_the_sign_prefix() {
        assert_eq!(format_amount("+1234567"), "1,234,567");
        assert_eq!(format_amount("+2161000.5"), "2,161,000.5");
        assert_eq!(format_amount("-9800"), "-9,800");
        assert_eq!(format_amount("+12"), "12");
        assert_eq!(format_amount("not-a-number"), "not-a-number");
    }

    #[test]
    fn coordinates_render_with_hemisphere_letters() {
        assert_eq!(format_coordinate(48.8566, 2.3522), "48.8566N, 2.3522E");
        assert_eq!(format_coordinate(-33.8688, -70.6693), "33.8688S, 70.6693W");
    }

    #[test]
    fn parses_each_supported_value_type() {
        let record = record(
            r#"{
            "id": "Q90",
            "claims": {
                "P31": [{"mainsnak": {"snaktype": "value", "datavalue":
                    {"type": "wikibase-entityid", "value": {"id": "Q515"}}}}],
                "P1448": [{"mainsnak": {"snaktype": "value", "datavalue":
                    {"type": "monolingualtext", "value": {"text": "Ville de Paris", "language": "fr"}}}}],
                "P571": [{"mainsnak": {"snaktype": "value", "datavalue":
                    {"type": "time", "value": {"time": "+1969-07-20T00:00:00Z", "precision": 11}}}}],
                "P1082": [{"mainsnak": {"snaktype": "value", "datavalue":
                    {"type": "quantity", "value": {"amount": "+2161000", "unit": "1"}}}}],
                "P625": [{"mainsnak": {"snaktype": "value", "datavalue":
                    {"type": "globecoordinate", "value": {"latitude": 48.8566, "longitude": 2.3522}}}}]
            }
        }"#,
        );
        let id: EntityId = "Q90".parse().unwrap();

        let claims = parse_claims(&id, &record, Utc::now());
        assert_eq!(claims.len(), 5);

        let value_for = |pid: &str| {
            let pid: PropertyId = pid.parse().unwrap();
            claims
                .iter()
                .find(|c| c.property == pid)
                .map(|c| c.values[0].clone())
                .unwrap()
        };
        assert_eq!(
            value_for("P31"),
            ClaimValue::EntityRef {
                id: "Q515".parse().unwrap(),
                display: "Q515".into()
            }
        );
        assert_eq!(value_for("P1448"), ClaimValue::Text("Ville de Paris".into()));
        assert_eq!(value_for("P571"), ClaimValue::Time("20 July 1969".into()));
        assert_eq!(value_for("P1082"), ClaimValue::Quantity("2,161,000".into()));
        assert_eq!(
            value_for("P625"),
            ClaimValue::Coordinate("48.8566N, 2.3522E".into())
        );
    }

    #[test]
    fn valueless_snaks_are_skipped_and_empty_properties_dropped() {
        let record = record(
            r#"{
            "id": "Q90",
            "claims": {
                "P570": [{"mainsnak": {"snaktype": "novalue"}}],
                "P31": [
                    {"mainsnak": {"snaktype": "somevalue"}},
                    {"mainsnak": {"snaktype": "value", "datavalue":
                        {"type": "wikibase-entityid", "value": {"id": "Q515"}}}}
                ]
            }
        }"#,
        );
        let id: EntityId = "Q90".parse().unwrap();

        let claims = parse_claims(&id, &record, Utc::now());
        // P570 had only a valueless snak and must not appear at all.
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].property, "P31".parse().unwrap());
        assert_eq!(claims[0].values.len(), 1);
        assert!(claims.iter().all(|c| !c.values.is_empty()));
    }

    #[test]
    fn multi_valued_properties_keep_every_value() {
        let record = record(
            r#"{
            "id": "Q90",
            "claims": {
                "P47": [
                    {"mainsnak": {"snaktype": "value", "datavalue":
                        {"type": "wikibase-entityid", "value": {"id": "Q240"}}}},
                    {"mainsnak": {"snaktype": "value", "datavalue":
                        {"type": "wikibase-entityid", "value": {"id": "Q256"}}}}
                ]
            }
        }"#,
        );
        let id: EntityId = "Q90".parse().unwrap();

        let claims = parse_claims(&id, &record, Utc::now());
        assert_eq!(claims[0].values.len(), 2);
    }

    #[test]
    fn unrecognized_value_types_are_preserved_verbatim() {
        let record = record(
            r#"{
            "id": "Q90",
            "claims": {
                "P898": [{"mainsnak": {"snaktype": "value", "datavalue":
                    {"type": "musical-notation", "value": "\\relative c'"}}}]
            }
        }"#,
        );
        let id: EntityId = "Q90".parse().unwrap();

        let claims = parse_claims(&id, &record, Utc::now());
        let ClaimValue::Unknown(raw) = &claims[0].values[0] else {
            panic!("expected an unknown value");
        };
        assert!(raw.contains("musical-notation"));
        assert!(raw.contains("relative"));
    }

    #[test]
    fn entity_refs_outside_the_item_space_become_unknown() {
        let record = record(
            r#"{
            "id": "Q90",
            "claims": {
                "P5831": [{"mainsnak": {"snaktype": "value", "datavalue":
                    {"type": "wikibase-entityid", "value": {"id": "L301993"}}}}]
            }
        }"#,
        );
        let id: EntityId = "Q90".parse().unwrap();

        let claims = parse_claims(&id, &record, Utc::now());
        assert!(matches!(claims[0].values[0], ClaimValue::Unknown(_)));
    }
}
