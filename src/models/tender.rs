use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published procurement notice, normalized from either feed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderRecord {
    /// Registration number assigned by the procurement portal.
    pub id: String,
    pub title: String,
    /// `0.0` when the notice did not state a price or it could not be parsed.
    pub price: f64,
    pub region: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl TenderRecord {
    pub fn has_known_price(&self) -> bool {
        self.price > 0.0
    }
}

/// Parse a price as printed by the portal ("1 234 567,89", "900000.00 ₽").
/// Anything unparsable or negative normalizes to `0.0`.
pub fn parse_price(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    // Keep only the last separator as the decimal point
    let normalized = match cleaned.rfind('.') {
        Some(pos) => {
            let (int_part, frac_part) = cleaned.split_at(pos);
            format!("{}{}", int_part.replace('.', ""), frac_part)
        }
        None => cleaned,
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_portal_price_formats() {
        assert_eq!(parse_price("900000"), 900_000.0);
        assert_eq!(parse_price("1 234 567,89"), 1_234_567.89);
        assert_eq!(parse_price("1\u{a0}500\u{a0}000,00 ₽"), 1_500_000.0);
        assert_eq!(parse_price("900000.00"), 900_000.0);
    }

    #[test]
    fn unparsable_price_is_unknown() {
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("не указана"), 0.0);
        assert_eq!(parse_price("."), 0.0);
    }
}
