use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

pub fn fmt_money(d: &Decimal) -> String {
    d.round_dp(2).to_string()
}

/// Truncates toward zero at whole cents.
pub fn floor_cents(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

pub fn month_start(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// First day of the month after `d`'s month.
pub fn next_month_start(d: NaiveDate) -> NaiveDate {
    let start = month_start(d);
    start.checked_add_months(Months::new(1)).unwrap_or(start)
}

pub fn iso(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn parse_iso(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Parses `YYYY-MM` or any `YYYY-MM-DD` into the first day of that month.
pub fn parse_month(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    parse_iso(s)
        .or_else(|| parse_iso(&format!("{s}-01")))
        .map(month_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn month_helpers_normalize_and_roll_over_years() {
        let d = NaiveDate::from_ymd_opt(2025, 12, 17).unwrap();
        assert_eq!(month_start(d), NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(next_month_start(d), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(parse_month("2025-03"), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_month("2025-03-19"), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_month("March"), None);
    }

    #[test]
    fn cents_are_truncated_and_formatted() {
        let x = Decimal::from_str("14.999").unwrap();
        assert_eq!(floor_cents(x), Decimal::from_str("14.99").unwrap());
        assert_eq!(floor_cents(Decimal::from_str("-2.555").unwrap()), Decimal::from_str("-2.55").unwrap());
        assert_eq!(fmt_money(&Decimal::from_str("3.14159").unwrap()), "3.14");
    }
}
