//! Checkout modifier: stamps the identifier a checkout is prepared under.

use crate::data::CartData;

use super::{ModifierContext, PriceModifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutModifier;

impl PriceModifier for CheckoutModifier {
    fn id(&self) -> u16 {
        60
    }

    fn name(&self) -> &'static str {
        "checkout"
    }

    fn apply(&self, data: &mut CartData, context: &ModifierContext<'_>) {
        if let Some(identifier) = context.checkout_identifier {
            data.identifier = Some(identifier);
        }
    }
}
