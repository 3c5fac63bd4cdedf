//! Optional VAT number of a business buyer.

use async_trait::async_trait;
use serde_json::{Value, json};
use shopcart::{data::CartData, settings::CartSettings};
use tracing::info;

use crate::checkout::{CheckoutError, StepData, StepInput, StepKind, StepState};

use super::{CheckoutStep, StepContext, StepIcon};

#[derive(Debug, Clone, Copy, Default)]
pub struct VatNrCheckerStep;

#[async_trait]
impl CheckoutStep for VatNrCheckerStep {
    fn kind(&self) -> StepKind {
        StepKind::VatNrChecker
    }

    fn icon(&self) -> StepIcon {
        StepIcon {
            name: "fa-building",
            label: "VAT number",
        }
    }

    fn is_mandatory(&self, _settings: &CartSettings) -> bool {
        false
    }

    async fn render_body(
        &self,
        _step: &StepContext<'_>,
        _data: &CartData,
        state: Option<&StepState>,
    ) -> Result<Value, CheckoutError> {
        Ok(match state.map(|state| &state.data) {
            Some(StepData::VatNrChecker {
                country,
                vat_number,
                verified,
            }) => json!({
                "country": country,
                "vat_number": vat_number,
                "verified": verified,
            }),
            _ => json!({"country": null, "vat_number": null, "verified": false}),
        })
    }

    /// An empty number is fine; an entered one has to be confirmed by the VAT services.
    async fn check_status(
        &self,
        step: &StepContext<'_>,
        previous: Option<&StepState>,
        changed: &[StepInput],
    ) -> Result<StepState, CheckoutError> {
        let mut data = previous
            .map(|state| state.data.clone())
            .filter(|data| matches!(data, StepData::VatNrChecker { .. }))
            .unwrap_or_else(|| StepData::empty(StepKind::VatNrChecker));

        for input in changed {
            let StepInput::VatNumber {
                country,
                vat_number,
            } = input
            else {
                continue;
            };

            if vat_number.trim().is_empty() {
                data = StepData::empty(StepKind::VatNrChecker);
                continue;
            }

            let verified = step.context.vat.is_vatnr_valid(country, vat_number).await?;

            info!(userid = step.userid, country = %country, verified, "VAT number entered");

            data = StepData::VatNrChecker {
                country: Some(country.clone()),
                vat_number: Some(vat_number.clone()),
                verified,
            };
        }

        let valid = match &data {
            StepData::VatNrChecker {
                vat_number,
                verified,
                ..
            } => vat_number.is_none() || *verified,
            _ => false,
        };

        Ok(StepState {
            data,
            mandatory: false,
            valid,
        })
    }
}
