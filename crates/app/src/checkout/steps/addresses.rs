//! Billing address selection.

use async_trait::async_trait;
use serde_json::{Value, json};
use shopcart::{data::CartData, settings::CartSettings};

use crate::checkout::{CheckoutError, StepData, StepInput, StepKind, StepState};

use super::{CheckoutStep, StepContext, StepIcon};

#[derive(Debug, Clone, Copy, Default)]
pub struct AddressesStep;

#[async_trait]
impl CheckoutStep for AddressesStep {
    fn kind(&self) -> StepKind {
        StepKind::Addresses
    }

    fn icon(&self) -> StepIcon {
        StepIcon {
            name: "fa-address-book",
            label: "Address",
        }
    }

    fn is_mandatory(&self, _settings: &CartSettings) -> bool {
        true
    }

    async fn render_body(
        &self,
        step: &StepContext<'_>,
        _data: &CartData,
        state: Option<&StepState>,
    ) -> Result<Value, CheckoutError> {
        let addresses = step.context.addresses.list_for_user(step.userid).await?;

        let selected = match state.map(|state| &state.data) {
            Some(StepData::Addresses { billing, .. }) => *billing,
            _ => None,
        };

        Ok(json!({
            "addresses": addresses,
            "selected": selected,
        }))
    }

    async fn check_status(
        &self,
        step: &StepContext<'_>,
        previous: Option<&StepState>,
        changed: &[StepInput],
    ) -> Result<StepState, CheckoutError> {
        let (mut billing, mut country) = match previous.map(|state| &state.data) {
            Some(StepData::Addresses { billing, country }) => (*billing, country.clone()),
            _ => (None, None),
        };

        for input in changed {
            if let StepInput::BillingAddress { address_id } = input {
                // Someone else's address is a hard error.
                let address = step.context.addresses.get(step.userid, *address_id).await?;

                billing = Some(address.id);
                country = Some(address.country);
            }
        }

        Ok(StepState {
            valid: billing.is_some(),
            mandatory: true,
            data: StepData::Addresses { billing, country },
        })
    }
}
