//! Terms and conditions modifier.

use crate::data::CartData;

use super::{ModifierContext, PriceModifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct TermsModifier;

impl PriceModifier for TermsModifier {
    fn id(&self) -> u16 {
        50
    }

    fn name(&self) -> &'static str {
        "termsandconditions"
    }

    fn apply(&self, data: &mut CartData, context: &ModifierContext<'_>) {
        data.terms = context
            .settings
            .accept_terms
            .then(|| context.settings.terms_text.clone());
    }
}
