//! Checkout session state
//!
//! One serialized document per user in the checkout session cache namespace. Step specific
//! fields live in [`StepData`], a tagged union, so the cache payload stays a single JSON value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The checkout steps this shop knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Addresses,
    VatNrChecker,
    TermsAndConditions,
    Credits,
}

impl StepKind {
    pub const ALL: [Self; 4] = [
        Self::Addresses,
        Self::VatNrChecker,
        Self::TermsAndConditions,
        Self::Credits,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Addresses => "addresses",
            Self::VatNrChecker => "vatnrchecker",
            Self::TermsAndConditions => "termsandconditions",
            Self::Credits => "credits",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// What a step has collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum StepData {
    Addresses {
        billing: Option<u64>,

        /// Country of the billing address; drives tax lookup.
        country: Option<String>,
    },

    VatNrChecker {
        country: Option<String>,
        vat_number: Option<String>,
        verified: bool,
    },

    TermsAndConditions { accepted: bool },

    Credits { use_credit: bool },
}

impl StepData {
    /// Data of a step nobody touched yet.
    pub fn empty(kind: StepKind) -> Self {
        match kind {
            StepKind::Addresses => Self::Addresses {
                billing: None,
                country: None,
            },
            StepKind::VatNrChecker => Self::VatNrChecker {
                country: None,
                vat_number: None,
                verified: false,
            },
            StepKind::TermsAndConditions => Self::TermsAndConditions { accepted: false },
            StepKind::Credits => Self::Credits { use_credit: false },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    pub data: StepData,
    pub mandatory: bool,
    pub valid: bool,
}

/// Input a user changed on a step page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum StepInput {
    BillingAddress { address_id: u64 },
    VatNumber { country: String, vat_number: String },
    AcceptTerms { accepted: bool },
    UseCredit { use_credit: bool },
}

/// Number of body and mandatory steps among the active ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyMandatoryCount {
    pub body_count: usize,
    pub mandatory_count: usize,
}

/// Where to move in the wizard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Next,
    Previous,

    #[default]
    Stay,
}

impl StepAction {
    /// Step index after the move, kept within `0..len`.
    pub fn apply(self, current: usize, len: usize) -> usize {
        let last = len.saturating_sub(1);

        match self {
            Self::Next => current.saturating_add(1).min(last),
            Self::Previous => current.saturating_sub(1).min(last),
            Self::Stay => current.min(last),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionState {
    pub steps: BTreeMap<StepKind, StepState>,
    pub viewed: BTreeSet<StepKind>,
    pub current_step: usize,

    /// Computed on first use and kept for the rest of the session.
    pub body_mandatory_count: Option<BodyMandatoryCount>,
    pub checkout_validation: bool,

    /// Last message shown to the user.
    pub feedback: Option<String>,
}

impl CheckoutSessionState {
    /// Whether the checkout may be completed: every mandatory step is valid and every body step
    /// was viewed.
    pub fn validate(&self, count: BodyMandatoryCount, body: &[StepKind]) -> bool {
        let valid_mandatory = self
            .steps
            .values()
            .filter(|state| state.mandatory && state.valid)
            .count();

        let viewed_body = body.iter().filter(|kind| self.viewed.contains(kind)).count();

        valid_mandatory >= count.mandatory_count && viewed_body >= count.body_count
    }

    /// Billing country chosen in the address step.
    pub fn billing_country(&self) -> Option<&str> {
        match self.steps.get(&StepKind::Addresses).map(|state| &state.data) {
            Some(StepData::Addresses { country, .. }) => country.as_deref(),
            _ => None,
        }
    }
}
