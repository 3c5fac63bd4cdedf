//! Cart Settings

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{rebooking::RebookingPolicy, taxes::TaxCategories};

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The YAML document could not be parsed.
    #[error("invalid settings document")]
    Yaml(#[from] serde_norway::Error),

    /// A value is out of its allowed range.
    #[error("invalid setting `{0}`: {1}")]
    Invalid(&'static str, String),
}

/// Tax related settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxSettings {
    /// Whether taxes are calculated at all.
    pub enabled: bool,

    /// Whether configured item prices are net prices (tax added on top).
    pub item_price_is_net: bool,

    /// Category used for items that carry none.
    pub default_category: Option<String>,

    /// Rates per country and category.
    pub categories: TaxCategories,
}

/// Every business knob of the cart, checkout and ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartSettings {
    /// Maximum number of regular items in one cart.
    pub max_items: usize,

    /// Minutes a cart lives after the last item was added.
    pub expiration_minutes: i64,

    /// ISO currency code of every price.
    pub currency: String,

    /// Fee added once per cart; zero disables the fee.
    pub booking_fee: Decimal,

    /// Only charge the booking fee for a user's first successful checkout.
    pub booking_fee_only_once: bool,

    /// Reject items whose cost center differs from the ones already in the cart.
    pub same_cost_center_required: bool,

    pub taxes: TaxSettings,

    pub rebooking: RebookingPolicy,

    /// Fee retained when a purchase is cancelled.
    pub cancellation_fee: Decimal,

    /// Prorate cancellation credits by the consumed part of the service period.
    pub calculate_consumption: bool,

    /// Users have to accept the terms and conditions at checkout.
    pub accept_terms: bool,

    pub terms_text: String,

    /// Items carrying an installment plan may be paid in installments.
    pub installments_enabled: bool,

    /// Prefix of locally issued invoice numbers.
    pub invoice_prefix: String,

    /// Checkout step names, in wizard order.
    pub checkout_steps: Vec<String>,

    /// Account reference handed to the payment gateway.
    pub payment_account: String,

    /// Page the gateway sends users to after a successful payment.
    pub success_url: String,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            max_items: 10,
            expiration_minutes: 15,
            currency: "EUR".to_string(),
            booking_fee: Decimal::ZERO,
            booking_fee_only_once: false,
            same_cost_center_required: false,
            taxes: TaxSettings::default(),
            rebooking: RebookingPolicy::default(),
            cancellation_fee: Decimal::ZERO,
            calculate_consumption: false,
            accept_terms: false,
            terms_text: String::new(),
            installments_enabled: false,
            invoice_prefix: "INV-".to_string(),
            checkout_steps: vec![
                "addresses".to_string(),
                "vatnrchecker".to_string(),
                "termsandconditions".to_string(),
                "credits".to_string(),
            ],
            payment_account: String::new(),
            success_url: "/shoppingcart/checkout/success".to_string(),
        }
    }
}

impl CartSettings {
    /// Load settings from a YAML document; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when the document is malformed or a value is out of range.
    pub fn from_yaml(source: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_norway::from_str(source)?;

        settings.validate()?;

        Ok(settings)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_items == 0 {
            return Err(SettingsError::Invalid("max_items", "must be at least 1".into()));
        }

        if self.expiration_minutes <= 0 {
            return Err(SettingsError::Invalid(
                "expiration_minutes",
                "must be positive".into(),
            ));
        }

        if self.booking_fee.is_sign_negative() {
            return Err(SettingsError::Invalid("booking_fee", "must not be negative".into()));
        }

        if self.cancellation_fee.is_sign_negative() {
            return Err(SettingsError::Invalid(
                "cancellation_fee",
                "must not be negative".into(),
            ));
        }

        Ok(())
    }
}
