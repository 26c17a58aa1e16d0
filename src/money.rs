// ==========================================
// Currency Formatting & Parsing
// ==========================================

/// Formats an amount as a Dutch-style euro string: `€ 1234,56`.
/// Always two fraction digits, comma as decimal separator.
pub fn format_eur(amount: f64) -> String {
    format!("€ {:.2}", amount).replace('.', ",")
}

/// Parses a display string back to a decimal amount.
/// Strips the euro symbol and whitespace, converts comma to period.
/// Malformed input degrades to 0.0; this never fails.
pub fn parse_eur(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '€' && !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    decimal_or_zero(&cleaned)
}

/// The fallback policy for numeric form input: anything that does not
/// parse as a decimal counts as zero. `parse_eur` funnels every
/// quantity, price and amount field through this.
pub fn decimal_or_zero(input: &str) -> f64 {
    input.trim().parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_comma_and_symbol() {
        assert_eq!(format_eur(0.0), "€ 0,00");
        assert_eq!(format_eur(100.0), "€ 100,00");
        assert_eq!(format_eur(121.0), "€ 121,00");
        assert_eq!(format_eur(1234.5), "€ 1234,50");
    }

    #[test]
    fn rounds_to_two_digits() {
        assert_eq!(format_eur(21.005), "€ 21,00");
        assert_eq!(format_eur(0.555), "€ 0,56");
    }

    #[test]
    fn parses_formatted_output() {
        assert_eq!(parse_eur("€ 100,00"), 100.0);
        assert_eq!(parse_eur("€ 1234,56"), 1234.56);
        assert_eq!(parse_eur("  121,00 "), 121.0);
    }

    #[test]
    fn malformed_input_degrades_to_zero() {
        assert_eq!(parse_eur(""), 0.0);
        assert_eq!(parse_eur("abc"), 0.0);
        assert_eq!(parse_eur("€ twaalf"), 0.0);
        assert_eq!(decimal_or_zero("12,5"), 0.0);
        assert_eq!(decimal_or_zero("12.5"), 12.5);
        assert_eq!(decimal_or_zero(" 3 "), 3.0);
    }
}
