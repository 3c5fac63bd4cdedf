//! Cart Data
//!
//! The display-ready projection of a cart. A base record is built from a [`CartSnapshot`] and
//! the price modifiers then fill in totals, taxes, credits and checkout fields.

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{cart::CartSnapshot, items::CartItem, pricing::round_price, settings::CartSettings};

/// Fields that change between two projections of the same cart and are ignored when
/// comparing a projection with a stored one.
pub const VOLATILE_FIELDS: [&str; 4] = ["now_date", "checkbox_id", "history_items", "stored"];

/// One item of the projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,

    /// Price as configured, before taxes and installments.
    pub base_price: Decimal,

    /// Price displayed and charged now.
    pub price: Decimal,

    #[serde(default)]
    pub price_net: Option<Decimal>,

    #[serde(default)]
    pub price_gross: Option<Decimal>,

    #[serde(default)]
    pub tax: Option<Decimal>,

    /// Tax rate as a fraction.
    #[serde(default)]
    pub tax_percentage: Option<Decimal>,

    /// Part of the price left to later installments.
    #[serde(default)]
    pub installment_open: Option<Decimal>,
}

impl CartLine {
    pub fn new(item: CartItem) -> Self {
        Self {
            base_price: item.price,
            price: item.price,
            item,
            price_net: None,
            price_gross: None,
            tax: None,
            tax_percentage: None,
            installment_open: None,
        }
    }

    pub fn item_id(&self) -> u64 {
        self.item.item_id
    }

    /// Tax contained in the price charged now.
    pub fn tax_due(&self) -> Decimal {
        match (self.tax, self.price_gross) {
            (Some(tax), Some(gross)) if !gross.is_zero() => round_price(tax * self.price / gross),
            (Some(tax), _) => tax,
            _ => Decimal::ZERO,
        }
    }

    /// Net part of the price charged now.
    pub fn net_due(&self) -> Decimal {
        self.price - self.tax_due()
    }
}

/// Display-ready cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartData {
    pub userid: u64,
    pub currency: String,
    pub max_items: usize,
    pub items: Vec<CartLine>,

    /// Number of regular items.
    pub count: usize,

    /// Total of all lines before credits are deducted.
    pub initial_total: Decimal,

    /// Amount left to pay.
    pub price: Decimal,

    #[serde(default)]
    pub price_net: Option<Decimal>,

    #[serde(default)]
    pub price_gross: Option<Decimal>,

    #[serde(default)]
    pub tax: Option<Decimal>,

    pub discount: Decimal,

    pub tax_enabled: bool,

    /// Country the taxes were computed for.
    #[serde(default)]
    pub country: Option<String>,

    /// Credit balance of the user.
    pub credit: Decimal,

    pub use_credit: bool,

    /// Credit deducted from this cart.
    pub deductible: Decimal,

    /// Credit balance left after the deduction.
    pub remaining_credit: Decimal,

    #[serde(default)]
    pub expiration: Option<Timestamp>,

    #[serde(default)]
    pub terms: Option<String>,

    #[serde(default)]
    pub identifier: Option<u64>,

    pub now_date: Timestamp,

    #[serde(default)]
    pub checkbox_id: String,

    #[serde(default)]
    pub history_items: Vec<u64>,

    #[serde(default)]
    pub stored: bool,
}

impl CartData {
    /// Base record of a cart, before any price modifier ran.
    pub fn from_snapshot(
        userid: u64,
        snapshot: &CartSnapshot,
        settings: &CartSettings,
        now: Timestamp,
    ) -> Self {
        Self {
            userid,
            currency: settings.currency.clone(),
            max_items: settings.max_items,
            items: snapshot.items().iter().cloned().map(CartLine::new).collect(),
            count: 0,
            initial_total: Decimal::ZERO,
            price: Decimal::ZERO,
            price_net: None,
            price_gross: None,
            tax: None,
            discount: Decimal::ZERO,
            tax_enabled: false,
            country: None,
            credit: Decimal::ZERO,
            use_credit: snapshot.use_credit.unwrap_or(false),
            deductible: Decimal::ZERO,
            remaining_credit: Decimal::ZERO,
            expiration: snapshot.expiration,
            terms: None,
            identifier: None,
            now_date: now,
            checkbox_id: String::new(),
            history_items: Vec::new(),
            stored: false,
        }
    }

    /// Lines for items bought from catalog providers.
    pub fn regular_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.items.iter().filter(|line| !line.item.is_pseudo())
    }

    /// Recompute every total from the current lines and deduct credit.
    ///
    /// Modifiers call this after changing line prices; it only reads line fields, so calling it
    /// repeatedly yields the same totals.
    pub fn recompute_totals(&mut self) {
        self.count = self.regular_lines().count();
        self.initial_total = round_price(self.items.iter().map(|line| line.price).sum());
        self.discount = round_price(self.items.iter().map(|line| line.item.discount).sum());

        if self.tax_enabled {
            let tax: Decimal = self.items.iter().map(CartLine::tax_due).sum();

            self.tax = Some(round_price(tax));
            self.price_net = Some(round_price(self.initial_total - tax));
            self.price_gross = Some(self.initial_total);
        } else {
            self.price_net = None;
            self.price_gross = None;
            self.tax = None;
        }

        self.apply_credit();
    }

    /// Deduct as much credit as the user chose to use and the total allows.
    pub fn apply_credit(&mut self) {
        self.deductible = if self.use_credit {
            self.credit
                .max(Decimal::ZERO)
                .min(self.initial_total.max(Decimal::ZERO))
        } else {
            Decimal::ZERO
        };

        self.price = round_price(self.initial_total - self.deductible);
        self.remaining_credit = round_price(self.credit - self.deductible);
    }

    /// Whether credit covers the whole amount.
    pub fn is_covered_by_credit(&self) -> bool {
        self.use_credit && self.initial_total > Decimal::ZERO && self.price.is_zero()
    }
}
