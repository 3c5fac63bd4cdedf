//! Taxes modifier: per line net, gross and tax from the configured categories.

use crate::{data::CartData, items::REBOOKING_CREDIT_AREA, taxes::apply_tax};

use super::{ModifierContext, PriceModifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct TaxesModifier;

impl PriceModifier for TaxesModifier {
    fn id(&self) -> u16 {
        30
    }

    fn name(&self) -> &'static str {
        "taxes"
    }

    fn apply(&self, data: &mut CartData, context: &ModifierContext<'_>) {
        let taxes = &context.settings.taxes;

        data.tax_enabled = taxes.enabled;
        data.country = context.country.map(str::to_string);

        for line in &mut data.items {
            line.price = line.base_price;
            line.price_net = None;
            line.price_gross = None;
            line.tax = None;
            line.tax_percentage = None;

            // Credits reduce what is owed, they are not sold.
            if !taxes.enabled || line.item.area == REBOOKING_CREDIT_AREA {
                continue;
            }

            let Some(category) = line
                .item
                .tax_category
                .as_deref()
                .or(taxes.default_category.as_deref())
            else {
                continue;
            };

            let Some(rate) = taxes.categories.rate_for(context.country, category) else {
                continue;
            };

            let taxed = apply_tax(line.base_price, rate, taxes.item_price_is_net);

            line.price = taxed.gross;
            line.price_net = Some(taxed.net);
            line.price_gross = Some(taxed.gross);
            line.tax = Some(taxed.tax);
            line.tax_percentage = Some(taxed.rate);
        }

        data.recompute_totals();
    }
}
