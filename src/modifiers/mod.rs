//! Price Modifiers
//!
//! An ordered chain of transforms over [`CartData`]. Every modifier owns a set of fields and
//! recomputes them from base values, so running the pipeline any number of times over the same
//! record yields the same result.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{data::CartData, settings::CartSettings};

pub mod checkout;
pub mod credits;
pub mod installments;
pub mod standard;
pub mod taxes;
pub mod terms;

pub use checkout::CheckoutModifier;
pub use credits::CreditsModifier;
pub use installments::InstallmentsModifier;
pub use standard::StandardModifier;
pub use taxes::TaxesModifier;
pub use terms::TermsModifier;

/// Everything a modifier may read besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct ModifierContext<'a> {
    pub settings: &'a CartSettings,
    pub now: Timestamp,

    /// Credit balance of the cart owner.
    pub credit_balance: Decimal,

    /// Country of the selected billing address.
    pub country: Option<&'a str>,

    /// Set only when the checkout is being prepared under this identifier.
    pub checkout_identifier: Option<u64>,
}

impl<'a> ModifierContext<'a> {
    pub fn new(settings: &'a CartSettings, now: Timestamp) -> Self {
        Self {
            settings,
            now,
            credit_balance: Decimal::ZERO,
            country: None,
            checkout_identifier: None,
        }
    }

    #[must_use]
    pub fn with_credit_balance(mut self, balance: Decimal) -> Self {
        self.credit_balance = balance;
        self
    }

    #[must_use]
    pub fn with_country(mut self, country: Option<&'a str>) -> Self {
        self.country = country;
        self
    }

    #[must_use]
    pub fn with_checkout_identifier(mut self, identifier: u64) -> Self {
        self.checkout_identifier = Some(identifier);
        self
    }
}

/// One step of the price computation.
pub trait PriceModifier: Send + Sync {
    /// Position in the pipeline; lower ids run first.
    fn id(&self) -> u16;

    fn name(&self) -> &'static str;

    /// Transform the record in place.
    fn apply(&self, data: &mut CartData, context: &ModifierContext<'_>);
}

/// Modifiers sorted by id.
pub struct Pipeline {
    modifiers: Vec<Box<dyn PriceModifier>>,
}

impl Pipeline {
    /// Build a pipeline from any set of modifiers.
    pub fn new(mut modifiers: Vec<Box<dyn PriceModifier>>) -> Self {
        modifiers.sort_by_key(|modifier| modifier.id());

        Self { modifiers }
    }

    /// Standard, credits, taxes, installments, terms and checkout, in that order.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(CheckoutModifier),
            Box::new(TermsModifier),
            Box::new(InstallmentsModifier),
            Box::new(TaxesModifier),
            Box::new(CreditsModifier),
            Box::new(StandardModifier),
        ])
    }

    /// Modifier names in application order.
    pub fn names(&self) -> Vec<&'static str> {
        self.modifiers.iter().map(|modifier| modifier.name()).collect()
    }

    /// Run every modifier over the record.
    pub fn apply(&self, data: &mut CartData, context: &ModifierContext<'_>) {
        for modifier in &self.modifiers {
            modifier.apply(data, context);
        }
    }
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{
        cart::CartSnapshot,
        items::CartItem,
        pricing::{InstallmentPayment, InstallmentPlan},
        taxes::TaxCategories,
    };

    use super::*;

    fn settings() -> CartSettings {
        let mut settings = CartSettings::default();
        settings.taxes.enabled = true;
        settings.taxes.item_price_is_net = true;
        settings.taxes.default_category = Some("A".to_string());
        settings.taxes.categories =
            TaxCategories::parse("default A:19 B:7").unwrap_or_default();
        settings.installments_enabled = true;
        settings.accept_terms = true;
        settings.terms_text = "Be nice".to_string();
        settings
    }

    fn snapshot() -> CartSnapshot {
        let mut snapshot = CartSnapshot::new();
        snapshot.use_credit = Some(true);
        snapshot.insert(CartItem::booking_fee(dec!(2), "EUR"));
        snapshot.insert(CartItem::new("mod_booking", "option", 1, "A", dec!(100), "EUR"));

        let mut installment = CartItem::new("mod_booking", "option", 2, "B", dec!(60), "EUR");
        installment.tax_category = Some("B".to_string());
        installment.installment = Some(InstallmentPlan {
            down_payment: dec!(20),
            payments: vec![InstallmentPayment {
                due: Timestamp::UNIX_EPOCH,
                amount: dec!(40),
                paid_at: None,
            }],
        });
        snapshot.insert(installment);

        snapshot
    }

    #[test]
    fn standard_pipeline_is_sorted_by_id() {
        assert_eq!(
            Pipeline::standard().names(),
            vec![
                "standard",
                "credits",
                "taxes",
                "installments",
                "termsandconditions",
                "checkout"
            ]
        );
    }

    #[test]
    fn applying_twice_equals_applying_once() {
        let settings = settings();
        let context = ModifierContext::new(&settings, Timestamp::UNIX_EPOCH)
            .with_credit_balance(dec!(25))
            .with_country(Some("DE"));
        let pipeline = Pipeline::standard();

        let mut once = CartData::from_snapshot(7, &snapshot(), &settings, Timestamp::UNIX_EPOCH);
        pipeline.apply(&mut once, &context);

        let mut twice = once.clone();
        pipeline.apply(&mut twice, &context);

        assert_eq!(once, twice);
        assert_eq!(once.count, 2);
        // fee 2.38, A 119.00, B a third of 64.20
        assert_eq!(once.initial_total, dec!(142.78));
        assert_eq!(once.tax, Some(dec!(20.78)));
        assert_eq!(once.price_net, Some(dec!(122.00)));
        assert_eq!(once.deductible, dec!(25));
        assert_eq!(once.price, dec!(117.78));
        assert_eq!(once.terms.as_deref(), Some("Be nice"));
    }

    #[test]
    fn checkout_identifier_is_only_set_when_preparing() {
        let settings = CartSettings::default();
        let mut data = CartData::from_snapshot(7, &snapshot(), &settings, Timestamp::UNIX_EPOCH);

        Pipeline::standard().apply(&mut data, &ModifierContext::new(&settings, Timestamp::UNIX_EPOCH));
        assert_eq!(data.identifier, None);

        let context =
            ModifierContext::new(&settings, Timestamp::UNIX_EPOCH).with_checkout_identifier(12345);
        Pipeline::standard().apply(&mut data, &context);
        assert_eq!(data.identifier, Some(12345));
    }
}
