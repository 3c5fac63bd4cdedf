//! Standard modifier: item count and raw totals from the live items.

use crate::data::CartData;

use super::{ModifierContext, PriceModifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardModifier;

impl PriceModifier for StandardModifier {
    fn id(&self) -> u16 {
        10
    }

    fn name(&self) -> &'static str {
        "standard"
    }

    fn apply(&self, data: &mut CartData, _context: &ModifierContext<'_>) {
        for line in &mut data.items {
            line.base_price = line.item.price;
            line.price = line.item.price;
            line.price_net = None;
            line.price_gross = None;
            line.tax = None;
            line.tax_percentage = None;
            line.installment_open = None;
        }

        data.recompute_totals();
    }
}
