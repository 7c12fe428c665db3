//! Разбор и форматирование цен.
//!
//! Marketplace pages render prices in many shapes: "1 234 ₽", "1 234,56 ₽",
//! "3456 р/шт", non-breaking spaces, dot or comma thousand separators.
//! Everything funnels into minor units (kopecks) here.

/// Parse a price string into minor units. `None` when the text carries no
/// recognizable number ("нет в наличии", "цена по запросу", empty).
pub fn parse_to_minor(price_text: &str) -> Option<i64> {
    if price_text.trim().is_empty() {
        return None;
    }

    // Currency symbols and common suffixes
    let mut cleaned = price_text.to_lowercase();
    for pattern in ["₽", "руб", "р/шт", "/шт", "р.", "от", "до"] {
        cleaned = cleaned.replace(pattern, "");
    }

    // All whitespace, including NBSP (U+00A0)
    let mut cleaned: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    // "1234,56" - comma as decimal separator; "1,234,567" - thousand separator
    if cleaned.contains(',') && !cleaned.contains('.') {
        let parts: Vec<&str> = cleaned.split(',').collect();
        if parts.len() == 2 && parts[1].len() <= 2 {
            cleaned = cleaned.replace(',', ".");
        } else {
            cleaned = cleaned.replace(',', "");
        }
    }

    // "1.234.567" - dot as thousand separator
    if cleaned.matches('.').count() > 1 {
        cleaned = cleaned.replace('.', "");
    }

    if let Ok(value) = cleaned.parse::<f64>() {
        return Some((value * 100.0).round() as i64);
    }

    // Last resort: strip everything but digits and treat as whole rubles
    let digits: String = cleaned.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(|rubles| rubles * 100)
}

/// Человекочитаемая цена для сообщений.
pub fn format_price(price_minor: Option<i64>, currency: &str) -> String {
    let Some(minor) = price_minor else {
        return "Цена неизвестна".to_string();
    };

    let price = minor as f64 / 100.0;
    match currency {
        // Russian convention: whole rubles, NBSP thousand separator
        "RUB" => format!("{} ₽", group_thousands(price.round() as i64)),
        "USD" => format!("${:.2}", price),
        "EUR" => format!("€{:.2}", price),
        _ => format!("{:.2} {}", price, currency),
    }
}

fn group_thousands(value: i64) -> String {
    let negative = value < 0;
    let digits = value.abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('\u{a0}');
        }
        out.push(c);
    }
    if negative {
        format!("-{}", out)
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_prices() {
        let cases: &[(&str, i64)] = &[
            ("1 234 ₽", 123400),
            ("1234₽", 123400),
            ("1 234,56 ₽", 123456),
            ("1234,56", 123456),
            ("1 234.56", 123456),
            ("3456 р/шт", 345600),
            ("3456 руб", 345600),
            ("3456 р.", 345600),
            ("от 1 500 ₽", 150000),
            ("999", 99900),
            ("1 234 567 ₽", 123456700),
            ("1,234,567", 123456700),
            ("  2500  ", 250000),
            ("0", 0),
            ("99,99 ₽", 9999),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_to_minor(input), Some(*expected), "input: {:?}", input);
        }
    }

    #[test]
    fn test_parse_invalid_prices() {
        for input in ["", "   ", "нет в наличии", "цена по запросу"] {
            assert_eq!(parse_to_minor(input), None, "input: {:?}", input);
        }
    }

    #[test]
    fn test_parse_non_breaking_space() {
        assert_eq!(parse_to_minor("1\u{a0}234\u{a0}₽"), Some(123400));
    }

    #[test]
    fn test_parse_multiple_spaces() {
        assert_eq!(parse_to_minor("1   234   567 ₽"), Some(123456700));
    }

    #[test]
    fn test_parse_dot_thousand_separator() {
        assert_eq!(parse_to_minor("1.234.567"), Some(123456700));
    }

    #[test]
    fn test_format_rubles() {
        assert_eq!(format_price(Some(123400), "RUB"), "1\u{a0}234 ₽");
        assert_eq!(format_price(Some(99900), "RUB"), "999 ₽");
    }

    #[test]
    fn test_format_unknown() {
        assert_eq!(format_price(None, "RUB"), "Цена неизвестна");
    }

    #[test]
    fn test_format_other_currencies() {
        assert_eq!(format_price(Some(123456), "USD"), "$1234.56");
        assert_eq!(format_price(Some(123456), "EUR"), "€1234.56");
        assert_eq!(format_price(Some(123456), "GBP"), "1234.56 GBP");
    }
}
