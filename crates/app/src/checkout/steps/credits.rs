//! Paying with the credit balance; shown above the stepper.

use async_trait::async_trait;
use serde_json::{Value, json};
use shopcart::{data::CartData, settings::CartSettings};

use crate::{
    cart::CartStore,
    checkout::{CheckoutError, StepData, StepInput, StepKind, StepState},
};

use super::{CheckoutStep, StepContext, StepIcon};

#[derive(Debug, Clone, Copy, Default)]
pub struct CreditsStep;

#[async_trait]
impl CheckoutStep for CreditsStep {
    fn kind(&self) -> StepKind {
        StepKind::Credits
    }

    fn icon(&self) -> StepIcon {
        StepIcon {
            name: "fa-coins",
            label: "Credits",
        }
    }

    fn is_head(&self) -> bool {
        true
    }

    fn is_mandatory(&self, _settings: &CartSettings) -> bool {
        false
    }

    async fn render_body(
        &self,
        _step: &StepContext<'_>,
        data: &CartData,
        _state: Option<&StepState>,
    ) -> Result<Value, CheckoutError> {
        Ok(json!({
            "credit": data.credit,
            "use_credit": data.use_credit,
            "deductible": data.deductible,
            "remaining_credit": data.remaining_credit,
            "price": data.price,
        }))
    }

    async fn check_status(
        &self,
        step: &StepContext<'_>,
        previous: Option<&StepState>,
        changed: &[StepInput],
    ) -> Result<StepState, CheckoutError> {
        let mut use_credit = matches!(
            previous.map(|state| &state.data),
            Some(StepData::Credits { use_credit: true })
        );

        for input in changed {
            if let StepInput::UseCredit { use_credit: value } = input {
                CartStore::new(step.context, step.userid)
                    .set_use_credit(*value)
                    .await?;
                use_credit = *value;
            }
        }

        Ok(StepState {
            data: StepData::Credits { use_credit },
            mandatory: false,
            valid: true,
        })
    }
}
