//! Taxes
//!
//! Tax categories are configured as one line per country, the first token being the country
//! code (or `default`) followed by `CATEGORY:PERCENT` pairs:
//!
//! ```text
//! default A:19 B:7 C:0
//! AT A:20 B:10 C:0
//! ```

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::pricing::round_price;

/// Key of the row used when a country has no row of its own.
pub const DEFAULT_COUNTRY: &str = "default";

/// Errors raised while parsing tax categories.
#[derive(Debug, Error, PartialEq)]
pub enum TaxCategoriesError {
    /// A category token is not of the form `CATEGORY:PERCENT`.
    #[error("invalid tax category token `{0}` on line {1}")]
    InvalidToken(String, usize),

    /// The percentage could not be parsed or is negative.
    #[error("invalid tax percentage `{0}` on line {1}")]
    InvalidPercentage(String, usize),
}

/// Tax rates keyed by country and category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxCategories {
    source: String,
    rates: FxHashMap<String, FxHashMap<String, Decimal>>,
}

impl TaxCategories {
    /// Parse the line based configuration format.
    ///
    /// # Errors
    ///
    /// Returns a [`TaxCategoriesError`] naming the offending token and line.
    pub fn parse(source: &str) -> Result<Self, TaxCategoriesError> {
        let mut rates: FxHashMap<String, FxHashMap<String, Decimal>> = FxHashMap::default();

        for (index, line) in source.lines().enumerate() {
            let line_number = index + 1;
            let mut tokens = line.split_whitespace();

            let Some(country) = tokens.next() else {
                continue;
            };

            let country = normalise_country(country);
            let row = rates.entry(country).or_default();

            for token in tokens {
                let (category, percent) = token
                    .split_once(':')
                    .ok_or_else(|| TaxCategoriesError::InvalidToken(token.to_string(), line_number))?;

                let percent: Decimal = percent.parse().map_err(|_parse_error| {
                    TaxCategoriesError::InvalidPercentage(percent.to_string(), line_number)
                })?;

                if percent.is_sign_negative() {
                    return Err(TaxCategoriesError::InvalidPercentage(
                        percent.to_string(),
                        line_number,
                    ));
                }

                row.insert(category.to_ascii_uppercase(), percent / Decimal::ONE_HUNDRED);
            }
        }

        Ok(Self {
            source: source.to_string(),
            rates,
        })
    }

    /// Whether no category is configured at all.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Tax rate as a fraction (0.19 for 19%) for a category, falling back to the default row.
    pub fn rate_for(&self, country: Option<&str>, category: &str) -> Option<Decimal> {
        let category = category.to_ascii_uppercase();

        country
            .and_then(|country| self.rates.get(&normalise_country(country)))
            .and_then(|row| row.get(&category))
            .or_else(|| {
                self.rates
                    .get(DEFAULT_COUNTRY)
                    .and_then(|row| row.get(&category))
            })
            .copied()
    }
}

fn normalise_country(country: &str) -> String {
    if country.eq_ignore_ascii_case(DEFAULT_COUNTRY) {
        DEFAULT_COUNTRY.to_string()
    } else {
        country.to_ascii_uppercase()
    }
}

impl Serialize for TaxCategories {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for TaxCategories {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;

        Self::parse(&source).map_err(serde::de::Error::custom)
    }
}

/// Net, gross and tax amounts of one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxedPrice {
    pub net: Decimal,
    pub gross: Decimal,
    pub tax: Decimal,

    /// Rate as a fraction.
    pub rate: Decimal,
}

impl TaxedPrice {
    /// A price without any tax.
    pub fn untaxed(price: Decimal) -> Self {
        Self {
            net: price,
            gross: price,
            tax: Decimal::ZERO,
            rate: Decimal::ZERO,
        }
    }
}

/// Split a configured price into net, gross and tax.
///
/// When `price_is_net` the tax is added on top, otherwise the tax is contained in the price.
pub fn apply_tax(price: Decimal, rate: Decimal, price_is_net: bool) -> TaxedPrice {
    if price_is_net {
        let tax = round_price(Percentage::from(rate) * price);

        TaxedPrice {
            net: price,
            gross: price + tax,
            tax,
            rate,
        }
    } else {
        let net = round_price(price / (Decimal::ONE + rate));

        TaxedPrice {
            net,
            gross: price,
            tax: price - net,
            rate,
        }
    }
}
