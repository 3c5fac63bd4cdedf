//! Credits modifier: attaches the credit balance and deducts what the user chose to use.

use crate::data::CartData;

use super::{ModifierContext, PriceModifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct CreditsModifier;

impl PriceModifier for CreditsModifier {
    fn id(&self) -> u16 {
        20
    }

    fn name(&self) -> &'static str {
        "credits"
    }

    fn apply(&self, data: &mut CartData, context: &ModifierContext<'_>) {
        data.credit = context.credit_balance;
        data.apply_credit();
    }
}
