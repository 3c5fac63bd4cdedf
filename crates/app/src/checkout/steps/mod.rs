//! Checkout steps
//!
//! Steps are registered explicitly in [`StepRegistry`]; the settings pick and order the enabled
//! ones by name. Head steps render above the stepper on every page, body steps are the pages of
//! the wizard.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use shopcart::{data::CartData, settings::CartSettings};
use tracing::debug;

use crate::context::ShopContext;

use super::{CheckoutError, StepInput, StepKind, StepState};

mod addresses;
mod credits;
mod terms;
mod vatnrchecker;

pub use addresses::AddressesStep;
pub use credits::CreditsStep;
pub use terms::TermsStep;
pub use vatnrchecker::VatNrCheckerStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepIcon {
    pub name: &'static str,
    pub label: &'static str,
}

/// Whose checkout a step works on.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub context: &'a ShopContext,
    pub userid: u64,
}

#[async_trait]
pub trait CheckoutStep: Send + Sync {
    fn kind(&self) -> StepKind;

    fn icon(&self) -> StepIcon;

    /// Rendered outside the stepper and evaluated on every page.
    fn is_head(&self) -> bool {
        false
    }

    fn is_active(&self, _settings: &CartSettings) -> bool {
        true
    }

    fn is_mandatory(&self, settings: &CartSettings) -> bool;

    /// Template data of the step page.
    async fn render_body(
        &self,
        step: &StepContext<'_>,
        data: &CartData,
        state: Option<&StepState>,
    ) -> Result<Value, CheckoutError>;

    /// New state of the step after the user changed `changed`.
    async fn check_status(
        &self,
        step: &StepContext<'_>,
        previous: Option<&StepState>,
        changed: &[StepInput],
    ) -> Result<StepState, CheckoutError>;
}

#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: Vec<Arc<dyn CheckoutStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses, VAT number, terms and credits.
    pub fn standard() -> Self {
        Self::new()
            .with_step(Arc::new(AddressesStep))
            .with_step(Arc::new(VatNrCheckerStep))
            .with_step(Arc::new(TermsStep))
            .with_step(Arc::new(CreditsStep))
    }

    #[must_use]
    pub fn with_step(mut self, step: Arc<dyn CheckoutStep>) -> Self {
        self.steps.retain(|existing| existing.kind() != step.kind());
        self.steps.push(step);
        self
    }

    pub fn get(&self, kind: StepKind) -> Option<&Arc<dyn CheckoutStep>> {
        self.steps.iter().find(|step| step.kind() == kind)
    }

    /// Enabled steps in configured order. Unknown and inactive steps are skipped.
    pub fn active(&self, settings: &CartSettings) -> Vec<Arc<dyn CheckoutStep>> {
        settings
            .checkout_steps
            .iter()
            .filter_map(|name| {
                let step = StepKind::from_name(name).and_then(|kind| self.get(kind));

                if step.is_none() {
                    debug!(step = %name, "unknown checkout step skipped");
                }

                step
            })
            .filter(|step| step.is_active(settings))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|step| step.kind().name()))
            .finish()
    }
}
