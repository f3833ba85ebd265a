//! Heuristic extraction of expense fields from recognised receipt text.
//!
//! The recognition engine hands back free text; these rules guess an amount,
//! a date, a vendor and a category so the form can be pre-filled. Nothing
//! here is authoritative: every field is optional and the user confirms it.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:₹|Rs\.?|USD|\$|EUR|€)\s*([0-9,]+\.?\d*)").expect("amount pattern")
});

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})").expect("date pattern"));

/// Keyword table for category suggestions, checked in order.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Travel", &["taxi", "uber", "transport"]),
    ("Meals", &["restaurant", "food", "meal"]),
    ("Accommodation", &["hotel", "accommodation"]),
    ("Office Supplies", &["office", "supplies"]),
];

/// Fields guessed from one receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptScan {
    pub raw_text: String,
    pub amount: Option<f64>,
    /// Date as printed on the receipt; day/month order is ambiguous so it is not parsed.
    pub date: Option<String>,
    pub vendor: Option<String>,
    pub category: Option<String>,
}

pub fn parse_receipt_text(text: &str) -> ReceiptScan {
    let amount = AMOUNT_RE
        .captures(text)
        .and_then(|c| c[1].replace(',', "").parse::<f64>().ok());

    let date = DATE_RE.captures(text).map(|c| c[1].to_string());

    let vendor = text
        .lines()
        .map(str::trim)
        .find(|line| line.chars().count() > 2)
        .map(str::to_string);

    ReceiptScan {
        raw_text: text.to_string(),
        amount,
        date,
        vendor,
        category: suggest_category(text).map(str::to_string),
    }
}

/// Suggest a category from keywords in the receipt text.
pub fn suggest_category(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAXI_RECEIPT: &str = "City Cabs Ltd\n\
        Taxi fare receipt\n\
        Date: 14/03/2025\n\
        Total: Rs. 1,250.50\n";

    #[test]
    fn extracts_all_fields() {
        let scan = parse_receipt_text(TAXI_RECEIPT);
        assert_eq!(scan.amount, Some(1250.50));
        assert_eq!(scan.date.as_deref(), Some("14/03/2025"));
        assert_eq!(scan.vendor.as_deref(), Some("City Cabs Ltd"));
        assert_eq!(scan.category.as_deref(), Some("Travel"));
        assert_eq!(scan.raw_text, TAXI_RECEIPT);
    }

    #[test]
    fn dollar_and_euro_markers() {
        assert_eq!(parse_receipt_text("TOTAL $ 42.10").amount, Some(42.10));
        assert_eq!(parse_receipt_text("Summe €7").amount, Some(7.0));
        assert_eq!(parse_receipt_text("usd 1,000").amount, Some(1000.0));
    }

    #[test]
    fn vendor_skips_short_lines() {
        let scan = parse_receipt_text("\n  \nab\nGrand Hotel\n");
        assert_eq!(scan.vendor.as_deref(), Some("Grand Hotel"));
        assert_eq!(scan.category.as_deref(), Some("Accommodation"));
    }

    #[test]
    fn category_order_prefers_travel() {
        assert_eq!(suggest_category("Uber eats food"), Some("Travel"));
        assert_eq!(suggest_category("Corner Restaurant"), Some("Meals"));
        assert_eq!(suggest_category("Stationery: office paper"), Some("Office Supplies"));
        assert_eq!(suggest_category("misc"), None);
    }

    #[test]
    fn empty_text() {
        let scan = parse_receipt_text("");
        assert_eq!(scan, ReceiptScan::default());
    }
}
