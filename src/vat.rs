//! VAT numbers
//!
//! Routing of VAT number checks to the service responsible for a country, number normalisation
//! and the UK checksum, which is computed locally.

use serde::{Deserialize, Serialize};

/// Member states checked through VIES, by VIES country code.
pub const EU_COUNTRIES: [&str; 27] = [
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "EL", "ES", "FI", "FR", "HR", "HU", "IE",
    "IT", "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK",
];

/// Which service validates VAT numbers of a country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VatRegion {
    /// EU VIES SOAP service.
    Vies,

    /// UK numbers, validated with the HMRC checksum.
    Hmrc,

    /// Any other country, looked up through VATComply.
    VatComply,
}

impl VatRegion {
    pub fn for_country(country: &str) -> Self {
        let country = vies_country_code(country);

        if country == "GB" || country == "XI" {
            Self::Hmrc
        } else if EU_COUNTRIES.contains(&country.as_str()) {
            Self::Vies
        } else {
            Self::VatComply
        }
    }
}

/// Country code as VIES expects it; Greece is `EL` there.
pub fn vies_country_code(country: &str) -> String {
    let country = country.trim().to_ascii_uppercase();

    if country == "GR" { "EL".to_string() } else { country }
}

/// Strip separators, upper-case and drop a leading country prefix.
pub fn normalise_vat_number(country: &str, number: &str) -> String {
    let cleaned: String = number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase();

    let country = vies_country_code(country);

    let stripped = cleaned.strip_prefix(country.as_str()).or_else(|| {
        (country == "EL")
            .then(|| cleaned.strip_prefix("GR"))
            .flatten()
    });

    stripped.map_or_else(|| cleaned.clone(), str::to_string)
}

/// Validate a UK VAT number with the HMRC modulus 97 checksum.
///
/// Accepts nine digit numbers, twelve digit branch numbers and the `GD`/`HA` government and
/// health authority forms.
pub fn hmrc_checksum_valid(number: &str) -> bool {
    let number = normalise_vat_number("GB", number);

    if let Some(rest) = number.strip_prefix("GD") {
        return three_digits(rest).is_some_and(|value| value < 500);
    }

    if let Some(rest) = number.strip_prefix("HA") {
        return three_digits(rest).is_some_and(|value| value >= 500);
    }

    if !number.chars().all(|c| c.is_ascii_digit()) || !matches!(number.len(), 9 | 12) {
        return false;
    }

    let digits: Vec<u32> = number.chars().filter_map(|c| c.to_digit(10)).collect();
    let Some((body, check)) = digits.get(..9).map(|nine| nine.split_at(7)) else {
        return false;
    };

    let weighted: u32 = body
        .iter()
        .zip((2..=8).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();

    let check = check.iter().fold(0, |acc, digit| acc * 10 + digit);
    let total = weighted + check;

    total % 97 == 0 || (total + 55) % 97 == 0
}

fn three_digits(value: &str) -> Option<u32> {
    (value.len() == 3 && value.chars().all(|c| c.is_ascii_digit()))
        .then(|| value.parse().ok())
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countries_route_to_their_service() {
        assert_eq!(VatRegion::for_country("de"), VatRegion::Vies);
        assert_eq!(VatRegion::for_country("GR"), VatRegion::Vies);
        assert_eq!(VatRegion::for_country("GB"), VatRegion::Hmrc);
        assert_eq!(VatRegion::for_country("CH"), VatRegion::VatComply);
    }

    #[test]
    fn prefixes_and_separators_are_removed() {
        assert_eq!(normalise_vat_number("AT", "atu 123.456-78"), "U12345678");
        assert_eq!(normalise_vat_number("GR", "EL123456789"), "123456789");
    }

    #[test]
    fn hmrc_checksum_accepts_valid_numbers() {
        assert!(hmrc_checksum_valid("GB 980 7806 84"));
        assert!(hmrc_checksum_valid("434031494"));
        assert!(hmrc_checksum_valid("980780684001"));
        assert!(hmrc_checksum_valid("GD100"));
        assert!(hmrc_checksum_valid("HA600"));
    }

    #[test]
    fn hmrc_checksum_rejects_invalid_numbers() {
        assert!(!hmrc_checksum_valid("980780685"));
        assert!(!hmrc_checksum_valid("12345"));
        assert!(!hmrc_checksum_valid("GD600"));
        assert!(!hmrc_checksum_valid("HA100"));
    }
}
