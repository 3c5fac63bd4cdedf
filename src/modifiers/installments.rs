//! Installments modifier: items paid in installments only charge their down payment now.

use rust_decimal::Decimal;

use crate::{data::CartData, pricing::round_price};

use super::{ModifierContext, PriceModifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallmentsModifier;

impl PriceModifier for InstallmentsModifier {
    fn id(&self) -> u16 {
        40
    }

    fn name(&self) -> &'static str {
        "installments"
    }

    fn apply(&self, data: &mut CartData, context: &ModifierContext<'_>) {
        for line in &mut data.items {
            line.installment_open = None;

            let Some(plan) = &line.item.installment else {
                continue;
            };

            if !context.settings.installments_enabled || line.base_price <= Decimal::ZERO {
                continue;
            }

            let full = line.price_gross.unwrap_or(line.base_price);
            let due_now = round_price(full * plan.down_payment / line.base_price)
                .clamp(Decimal::ZERO, full);

            line.price = due_now;
            line.installment_open = Some(full - due_now);
        }

        data.recompute_totals();
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal_macros::dec;

    use crate::{
        cart::CartSnapshot,
        items::CartItem,
        pricing::{InstallmentPayment, InstallmentPlan},
        settings::CartSettings,
    };

    use super::*;

    fn data(settings: &CartSettings) -> CartData {
        let mut snapshot = CartSnapshot::new();
        let mut item = CartItem::new("mod_booking", "option", 1, "A", dec!(90), "EUR");
        item.installment = Some(InstallmentPlan {
            down_payment: dec!(30),
            payments: vec![InstallmentPayment {
                due: Timestamp::UNIX_EPOCH,
                amount: dec!(60),
                paid_at: None,
            }],
        });
        snapshot.insert(item);

        CartData::from_snapshot(1, &snapshot, settings, Timestamp::UNIX_EPOCH)
    }

    #[test]
    fn only_down_payment_is_due() {
        let mut settings = CartSettings::default();
        settings.installments_enabled = true;

        let mut data = data(&settings);
        let context = ModifierContext::new(&settings, Timestamp::UNIX_EPOCH);
        InstallmentsModifier.apply(&mut data, &context);
        InstallmentsModifier.apply(&mut data, &context);

        assert_eq!(data.price, dec!(30));
        assert_eq!(
            data.items.first().and_then(|line| line.installment_open),
            Some(dec!(60))
        );
    }

    #[test]
    fn plans_are_ignored_when_installments_are_disabled() {
        let settings = CartSettings::default();
        let mut data = data(&settings);

        InstallmentsModifier.apply(&mut data, &ModifierContext::new(&settings, Timestamp::UNIX_EPOCH));

        assert_eq!(data.price, dec!(90));
    }
}
