//! Items

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::InstallmentPlan;

/// Component name owning every locally generated pseudo item.
pub const LOCAL_COMPONENT: &str = "local_shopping_cart";

/// Area of the booking fee line.
pub const BOOKING_FEE_AREA: &str = "bookingfee";

/// Area of the rebooking credit line.
pub const REBOOKING_CREDIT_AREA: &str = "rebookingcredit";

/// Area of a marker for a previous purchase that is being rebooked.
pub const REBOOK_ITEM_AREA: &str = "rebookitem";

/// Area of a line paying an open installment of a previous purchase.
pub const INSTALLMENT_AREA: &str = "installment";

/// Builds the key identifying an item inside a cart.
pub fn cache_key(component: &str, area: &str, item_id: u64) -> String {
    format!("{component}-{area}-{item_id}")
}

/// Whether the given component/area pair is one of the locally generated pseudo items.
pub fn is_pseudo_item(component: &str, area: &str) -> bool {
    component == LOCAL_COMPONENT
        && matches!(
            area,
            BOOKING_FEE_AREA | REBOOKING_CREDIT_AREA | REBOOK_ITEM_AREA | INSTALLMENT_AREA
        )
}

/// A purchasable line held in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub item_id: u64,
    pub item_name: String,
    pub price: Decimal,
    pub currency: String,
    pub component: String,
    pub area: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cancel_until: Option<Timestamp>,
    #[serde(default)]
    pub service_period_start: Option<Timestamp>,
    #[serde(default)]
    pub service_period_end: Option<Timestamp>,
    #[serde(default)]
    pub tax_category: Option<String>,
    #[serde(default)]
    pub installment: Option<InstallmentPlan>,
    #[serde(default)]
    pub cost_center: Option<String>,

    /// Discount already deducted from `price` by the catalog, kept for reporting.
    #[serde(default)]
    pub discount: Decimal,

    /// Users cannot remove this line themselves.
    #[serde(default)]
    pub no_delete: bool,

    /// Amount a rebook marker would refund; unused for other items.
    #[serde(default)]
    pub refundable: Decimal,
}

impl CartItem {
    /// Creates an item with the mandatory fields; everything else starts empty.
    pub fn new(
        component: impl Into<String>,
        area: impl Into<String>,
        item_id: u64,
        item_name: impl Into<String>,
        price: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            item_id,
            item_name: item_name.into(),
            price,
            currency: currency.into(),
            component: component.into(),
            area: area.into(),
            description: String::new(),
            cancel_until: None,
            service_period_start: None,
            service_period_end: None,
            tax_category: None,
            installment: None,
            cost_center: None,
            discount: Decimal::ZERO,
            no_delete: false,
            refundable: Decimal::ZERO,
        }
    }

    /// Zero priced placeholder returned alongside a rejected add.
    pub fn stub(component: &str, area: &str, item_id: u64, currency: &str) -> Self {
        Self::new(component, area, item_id, "", Decimal::ZERO, currency)
    }

    /// Booking fee line.
    pub fn booking_fee(amount: Decimal, currency: &str) -> Self {
        let mut item = Self::new(
            LOCAL_COMPONENT,
            BOOKING_FEE_AREA,
            0,
            "Booking fee",
            amount,
            currency,
        );
        item.no_delete = true;
        item
    }

    /// Rebooking credit line; `amount` is the (positive) credit granted.
    pub fn rebooking_credit(amount: Decimal, currency: &str) -> Self {
        let mut item = Self::new(
            LOCAL_COMPONENT,
            REBOOKING_CREDIT_AREA,
            0,
            "Rebooking credit",
            -amount,
            currency,
        );
        item.no_delete = true;
        item
    }

    /// Key identifying this item inside a cart.
    pub fn cache_key(&self) -> String {
        cache_key(&self.component, &self.area, self.item_id)
    }

    /// Whether this is a locally generated pseudo item.
    pub fn is_pseudo(&self) -> bool {
        is_pseudo_item(&self.component, &self.area)
    }

    /// Whether this is one of the lines maintained by the cart itself (fee or credit).
    pub fn is_fee_or_credit(&self) -> bool {
        self.component == LOCAL_COMPONENT
            && matches!(self.area.as_str(), BOOKING_FEE_AREA | REBOOKING_CREDIT_AREA)
    }

    /// Whether this item is a rebook marker.
    pub fn is_rebook_marker(&self) -> bool {
        self.component == LOCAL_COMPONENT && self.area == REBOOK_ITEM_AREA
    }
}
