//! Checkout manager
//!
//! Drives the checkout wizard of one user. All wizard state is one [`CheckoutSessionState`]
//! document in the checkout session cache.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use shopcart::data::CartData;
use tracing::{debug, warn};

use crate::{
    cache::{CacheNamespace, checkout_key},
    cart::{CartStore, DataOptions},
    context::ShopContext,
};

use super::{
    BodyMandatoryCount, CheckoutError, CheckoutSessionState, StepAction, StepInput, StepKind,
    StepState,
    steps::{CheckoutStep, StepContext, StepIcon},
};

/// One entry of the stepper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub kind: StepKind,
    pub icon: StepIcon,
    pub mandatory: bool,
    pub valid: bool,
    pub viewed: bool,
}

/// A rendered step; `body` is `None` when there is nothing to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedStep {
    pub kind: StepKind,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutOverview {
    pub data: CartData,
    pub steps: Vec<StepSummary>,
    pub current_step: usize,
    pub head: Vec<RenderedStep>,
    pub body: Option<RenderedStep>,
    pub checkout_validation: bool,
    pub feedback: Option<String>,
}

struct Layout {
    head: Vec<Arc<dyn CheckoutStep>>,
    body: Vec<Arc<dyn CheckoutStep>>,
}

impl Layout {
    fn all(&self) -> impl Iterator<Item = &Arc<dyn CheckoutStep>> {
        self.head.iter().chain(self.body.iter())
    }

    fn body_kinds(&self) -> Vec<StepKind> {
        self.body.iter().map(|step| step.kind()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CheckoutManager<'a> {
    context: &'a ShopContext,
    userid: u64,
}

impl<'a> CheckoutManager<'a> {
    pub fn new(context: &'a ShopContext, userid: u64) -> Self {
        Self { context, userid }
    }

    fn step_context(&self) -> StepContext<'a> {
        StepContext {
            context: self.context,
            userid: self.userid,
        }
    }

    fn layout(&self) -> Layout {
        let (head, body) = self
            .context
            .steps
            .active(&self.context.settings)
            .into_iter()
            .partition(|step| step.is_head());

        Layout { head, body }
    }

    fn count(&self, state: &mut CheckoutSessionState, layout: &Layout) -> BodyMandatoryCount {
        *state.body_mandatory_count.get_or_insert_with(|| BodyMandatoryCount {
            body_count: layout.body.len(),
            mandatory_count: layout
                .all()
                .filter(|step| step.is_mandatory(&self.context.settings))
                .count(),
        })
    }

    async fn load_state(&self) -> Result<CheckoutSessionState, CheckoutError> {
        let Some(value) = self
            .context
            .cache
            .get(CacheNamespace::CheckoutSession, &checkout_key(self.userid))
            .await?
        else {
            return Ok(CheckoutSessionState::default());
        };

        Ok(serde_json::from_value(value).unwrap_or_else(|error| {
            warn!(userid = self.userid, %error, "unreadable checkout session, starting over");
            CheckoutSessionState::default()
        }))
    }

    async fn save_state(&self, state: &CheckoutSessionState) -> Result<(), CheckoutError> {
        self.context
            .cache
            .set(
                CacheNamespace::CheckoutSession,
                &checkout_key(self.userid),
                serde_json::to_value(state)?,
            )
            .await?;

        Ok(())
    }

    /// Fill in the state of steps that were never checked.
    async fn initialise(
        &self,
        state: &mut CheckoutSessionState,
        layout: &Layout,
    ) -> Result<(), CheckoutError> {
        for step in layout.all() {
            if !state.steps.contains_key(&step.kind()) {
                let initial = step.check_status(&self.step_context(), None, &[]).await?;
                state.steps.insert(step.kind(), initial);
            }
        }

        Ok(())
    }

    async fn render(
        &self,
        step: &Arc<dyn CheckoutStep>,
        data: &CartData,
        state: &CheckoutSessionState,
    ) -> RenderedStep {
        let kind = step.kind();

        let body = match step
            .render_body(&self.step_context(), data, state.steps.get(&kind))
            .await
        {
            Ok(body) => Some(body),
            Err(error) => {
                warn!(step = kind.name(), userid = self.userid, %error, "checkout step not rendered");
                None
            }
        };

        RenderedStep { kind, body }
    }

    /// Move through the wizard and render the page.
    ///
    /// The step navigated to is marked as viewed.
    ///
    /// # Errors
    ///
    /// Returns an error when the cart or the session cannot be read or written. Rendering
    /// failures of single steps are not errors.
    pub async fn render_overview(
        &self,
        action: StepAction,
    ) -> Result<CheckoutOverview, CheckoutError> {
        let layout = self.layout();
        let mut state = self.load_state().await?;
        let count = self.count(&mut state, &layout);

        self.initialise(&mut state, &layout).await?;

        state.current_step = action.apply(state.current_step, layout.body.len());

        let current = layout.body.get(state.current_step);

        if let Some(step) = current {
            state.viewed.insert(step.kind());
        }

        let data = CartStore::new(self.context, self.userid)
            .get_data_with(&DataOptions {
                country: state.billing_country().map(str::to_string),
                checkout_identifier: None,
            })
            .await?;

        let mut head = Vec::with_capacity(layout.head.len());
        for step in &layout.head {
            head.push(self.render(step, &data, &state).await);
        }

        let body = match current {
            Some(step) => Some(self.render(step, &data, &state).await),
            None => None,
        };

        state.checkout_validation = state.validate(count, &layout.body_kinds());
        self.save_state(&state).await?;

        let steps = layout
            .all()
            .map(|step| {
                let kind = step.kind();
                let stored = state.steps.get(&kind);

                StepSummary {
                    kind,
                    icon: step.icon(),
                    mandatory: stored.is_some_and(|stored| stored.mandatory),
                    valid: stored.is_some_and(|stored| stored.valid),
                    viewed: state.viewed.contains(&kind),
                }
            })
            .collect();

        Ok(CheckoutOverview {
            data,
            steps,
            current_step: state.current_step,
            head,
            body,
            checkout_validation: state.checkout_validation,
            feedback: state.feedback,
        })
    }

    /// Apply changed inputs to a step; `None` when the step is not active.
    ///
    /// A failing check leaves the step unchanged and stores a message for the user.
    ///
    /// # Errors
    ///
    /// Returns an error when the step rejects the input (for example an address of another
    /// user) or an external service fails.
    pub async fn check_status(
        &self,
        kind: StepKind,
        changed: &[StepInput],
    ) -> Result<Option<StepState>, CheckoutError> {
        let layout = self.layout();

        let Some(step) = layout.all().find(|step| step.kind() == kind).cloned() else {
            debug!(step = kind.name(), "inactive checkout step ignored");
            return Ok(None);
        };

        let mut state = self.load_state().await?;
        let count = self.count(&mut state, &layout);

        let checked = step
            .check_status(&self.step_context(), state.steps.get(&kind), changed)
            .await;

        let checked = match checked {
            Ok(checked) => checked,
            Err(error) => {
                state.feedback = Some(error.user_message().to_string());
                self.save_state(&state).await?;
                return Err(error);
            }
        };

        state.steps.insert(kind, checked.clone());
        state.feedback = None;
        state.checkout_validation = state.validate(count, &layout.body_kinds());
        self.save_state(&state).await?;

        Ok(Some(checked))
    }

    /// Whether every mandatory step is valid and every body step was viewed.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be read.
    pub async fn is_valid(&self) -> Result<bool, CheckoutError> {
        let layout = self.layout();
        let mut state = self.load_state().await?;
        let count = self.count(&mut state, &layout);

        Ok(state.validate(count, &layout.body_kinds()))
    }

    /// Fail unless the checkout may be completed.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::StepIncomplete`] naming the first incomplete mandatory step, or
    /// [`CheckoutError::StepsNotViewed`].
    pub async fn ensure_valid(&self) -> Result<(), CheckoutError> {
        let layout = self.layout();
        let mut state = self.load_state().await?;
        let count = self.count(&mut state, &layout);

        if let Some(incomplete) = layout
            .all()
            .filter(|step| step.is_mandatory(&self.context.settings))
            .map(|step| step.kind())
            .find(|kind| !state.steps.get(kind).is_some_and(|stored| stored.valid))
        {
            return Err(CheckoutError::StepIncomplete(incomplete));
        }

        if !state.validate(count, &layout.body_kinds()) {
            return Err(CheckoutError::StepsNotViewed);
        }

        Ok(())
    }

    /// Country of the chosen billing address.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be read.
    pub async fn billing_country(&self) -> Result<Option<String>, CheckoutError> {
        Ok(self.load_state().await?.billing_country().map(str::to_string))
    }

    /// Forget the wizard state.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache fails.
    pub async fn reset(&self) -> Result<(), CheckoutError> {
        self.context
            .cache
            .delete(CacheNamespace::CheckoutSession, &checkout_key(self.userid))
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use shopcart::settings::CartSettings;
    use testresult::TestResult;

    use crate::{
        catalog::InMemoryCatalog,
        checkout::{StepData, steps::StepRegistry},
        domain::addresses::{AddressesService, models::NewAddress},
        test::helpers::{TestShop, booking_item},
    };

    use super::*;

    fn settings() -> CartSettings {
        CartSettings {
            accept_terms: true,
            terms_text: "Be nice.".to_string(),
            ..CartSettings::default()
        }
    }

    async fn shop() -> TestResult<TestShop> {
        let shop = TestShop::new(
            settings(),
            InMemoryCatalog::new().with_item(booking_item(1, "Yoga", dec!(30))),
        )?;
        CartStore::new(&shop.context, 7)
            .add_item("mod_booking", "option", 1)
            .await?;

        Ok(shop)
    }

    async fn address(shop: &TestShop, userid: u64, country: &str) -> TestResult<u64> {
        let address = AddressesService::create(
            &*shop.store,
            NewAddress {
                userid,
                name: "Ada".to_string(),
                street: "Main St 1".to_string(),
                zip: "1010".to_string(),
                city: "Vienna".to_string(),
                country: country.to_string(),
            },
        )
        .await?;

        Ok(address.id)
    }

    #[tokio::test]
    async fn every_body_step_has_to_be_viewed() -> TestResult {
        let shop = shop().await?;
        let manager = CheckoutManager::new(&shop.context, 7);
        let billing = address(&shop, 7, "AT").await?;

        manager
            .check_status(StepKind::Addresses, &[StepInput::BillingAddress { address_id: billing }])
            .await?;
        manager
            .check_status(
                StepKind::TermsAndConditions,
                &[StepInput::AcceptTerms { accepted: true }],
            )
            .await?;

        // Both mandatory steps are valid, but only two of three body steps were shown.
        let overview = manager.render_overview(StepAction::Stay).await?;
        assert!(!overview.checkout_validation);
        let overview = manager.render_overview(StepAction::Next).await?;
        assert!(!overview.checkout_validation);
        assert!(matches!(
            manager.ensure_valid().await,
            Err(CheckoutError::StepsNotViewed)
        ));

        let overview = manager.render_overview(StepAction::Next).await?;
        assert!(overview.checkout_validation);
        assert_eq!(overview.current_step, 2);
        assert!(manager.is_valid().await?);
        manager.ensure_valid().await?;

        Ok(())
    }

    #[tokio::test]
    async fn head_steps_render_on_every_page() -> TestResult {
        let shop = shop().await?;
        let overview = CheckoutManager::new(&shop.context, 7)
            .render_overview(StepAction::Stay)
            .await?;

        let head: Vec<StepKind> = overview.head.iter().map(|step| step.kind).collect();
        assert_eq!(head, vec![StepKind::Credits]);
        assert_eq!(overview.body.map(|step| step.kind), Some(StepKind::Addresses));
        assert_eq!(overview.steps.len(), 4);
        assert_eq!(overview.data.count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn foreign_addresses_are_refused_with_feedback() -> TestResult {
        let shop = shop().await?;
        let manager = CheckoutManager::new(&shop.context, 7);
        let foreign = address(&shop, 8, "DE").await?;

        assert!(matches!(
            manager
                .check_status(StepKind::Addresses, &[StepInput::BillingAddress { address_id: foreign }])
                .await,
            Err(CheckoutError::Addresses(_))
        ));

        let overview = manager.render_overview(StepAction::Stay).await?;
        assert_eq!(
            overview.feedback.as_deref(),
            Some("The selected address is not available.")
        );
        assert!(matches!(
            manager.ensure_valid().await,
            Err(CheckoutError::StepIncomplete(StepKind::Addresses))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn billing_country_is_remembered() -> TestResult {
        let shop = shop().await?;
        let manager = CheckoutManager::new(&shop.context, 7);
        let billing = address(&shop, 7, "AT").await?;

        let state = manager
            .check_status(StepKind::Addresses, &[StepInput::BillingAddress { address_id: billing }])
            .await?
            .ok_or("addresses step inactive")?;

        assert_eq!(
            state.data,
            StepData::Addresses {
                billing: Some(billing),
                country: Some("AT".to_string())
            }
        );
        assert_eq!(manager.billing_country().await?.as_deref(), Some("AT"));

        manager.reset().await?;
        assert_eq!(manager.billing_country().await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn inactive_steps_are_ignored() -> TestResult {
        let mut shop = shop().await?;
        shop.context.settings = Arc::new(CartSettings::default());

        assert_eq!(
            CheckoutManager::new(&shop.context, 7)
                .check_status(
                    StepKind::TermsAndConditions,
                    &[StepInput::AcceptTerms { accepted: true }]
                )
                .await?,
            None
        );

        Ok(())
    }

    struct BrokenStep;

    #[async_trait]
    impl CheckoutStep for BrokenStep {
        fn kind(&self) -> StepKind {
            StepKind::Credits
        }

        fn icon(&self) -> StepIcon {
            StepIcon {
                name: "fa-bug",
                label: "Broken",
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
            _data: &CartData,
            _state: Option<&StepState>,
        ) -> Result<Value, CheckoutError> {
            Err(CheckoutError::EmptyCart)
        }

        async fn check_status(
            &self,
            _step: &StepContext<'_>,
            _previous: Option<&StepState>,
            _changed: &[StepInput],
        ) -> Result<StepState, CheckoutError> {
            Ok(StepState {
                data: StepData::Credits { use_credit: false },
                mandatory: false,
                valid: true,
            })
        }
    }

    #[tokio::test]
    async fn render_failures_mean_nothing_to_render() -> TestResult {
        let mut shop = shop().await?;
        shop.context.steps = StepRegistry::standard().with_step(Arc::new(BrokenStep));

        let overview = CheckoutManager::new(&shop.context, 7)
            .render_overview(StepAction::Stay)
            .await?;

        assert_eq!(
            overview.head,
            vec![RenderedStep {
                kind: StepKind::Credits,
                body: None
            }]
        );

        Ok(())
    }
}
