//! Terms and conditions acceptance.

use async_trait::async_trait;
use serde_json::{Value, json};
use shopcart::{data::CartData, settings::CartSettings};

use crate::checkout::{CheckoutError, StepData, StepInput, StepKind, StepState};

use super::{CheckoutStep, StepContext, StepIcon};

#[derive(Debug, Clone, Copy, Default)]
pub struct TermsStep;

#[async_trait]
impl CheckoutStep for TermsStep {
    fn kind(&self) -> StepKind {
        StepKind::TermsAndConditions
    }

    fn icon(&self) -> StepIcon {
        StepIcon {
            name: "fa-file-signature",
            label: "Terms and conditions",
        }
    }

    fn is_active(&self, settings: &CartSettings) -> bool {
        settings.accept_terms
    }

    fn is_mandatory(&self, _settings: &CartSettings) -> bool {
        true
    }

    async fn render_body(
        &self,
        step: &StepContext<'_>,
        data: &CartData,
        state: Option<&StepState>,
    ) -> Result<Value, CheckoutError> {
        let accepted = matches!(
            state.map(|state| &state.data),
            Some(StepData::TermsAndConditions { accepted: true })
        );

        Ok(json!({
            "terms": data.terms.as_deref().unwrap_or(&step.context.settings.terms_text),
            "accepted": accepted,
        }))
    }

    async fn check_status(
        &self,
        _step: &StepContext<'_>,
        previous: Option<&StepState>,
        changed: &[StepInput],
    ) -> Result<StepState, CheckoutError> {
        let mut accepted = matches!(
            previous.map(|state| &state.data),
            Some(StepData::TermsAndConditions { accepted: true })
        );

        for input in changed {
            if let StepInput::AcceptTerms { accepted: value } = input {
                accepted = *value;
            }
        }

        Ok(StepState {
            data: StepData::TermsAndConditions { accepted },
            mandatory: true,
            valid: accepted,
        })
    }
}
