//! Checkout
//!
//! The checkout wizard ([`CheckoutManager`]) and the step from a validated cart to pending
//! history rows ([`CheckoutService`]).

mod errors;
mod manager;
mod service;
mod state;
pub mod steps;

pub use errors::CheckoutError;
pub use manager::{CheckoutManager, CheckoutOverview, RenderedStep, StepSummary};
pub use service::{CheckoutService, PreparedCheckout};
pub use state::{
    BodyMandatoryCount, CheckoutSessionState, StepAction, StepData, StepInput, StepKind, StepState,
};
pub use steps::{CheckoutStep, StepRegistry};
