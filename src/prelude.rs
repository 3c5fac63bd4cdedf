//! Shopcart prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::CartSnapshot,
    data::{CartData, CartLine},
    events::{DomainEvent, EventDetails, EventKind},
    invoices::next_invoice_number,
    items::{
        BOOKING_FEE_AREA, CartItem, INSTALLMENT_AREA, LOCAL_COMPONENT, REBOOK_ITEM_AREA,
        REBOOKING_CREDIT_AREA, cache_key,
    },
    modifiers::{ModifierContext, Pipeline, PriceModifier},
    payments::{LedgerEntryKind, PaymentMethod, PaymentStatus, allocate_credits},
    pricing::{InstallmentPayment, InstallmentPlan, PricingError, round_price},
    rebooking::{
        RebookCandidate, RebookingDenial, RebookingPolicy, cancellation_credit,
        consumed_fraction, rebooking_credit,
    },
    reservation::{cart_diverges, different_cart_with_same_identifier},
    settings::{CartSettings, SettingsError},
    status::CartStatus,
    taxes::{TaxCategories, TaxedPrice, apply_tax},
    vat::{VatRegion, hmrc_checksum_valid, normalise_vat_number},
};
