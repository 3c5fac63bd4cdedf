//! History Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use shopcart::{
    data::CartLine,
    items::{CartItem, INSTALLMENT_AREA, LOCAL_COMPONENT, REBOOK_ITEM_AREA, is_pseudo_item},
    payments::{PaymentMethod, PaymentStatus},
    pricing::InstallmentPlan,
};

/// History Model
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: u64,
    pub userid: u64,
    pub item_id: u64,
    pub item_name: String,
    pub price: Decimal,
    pub tax: Option<Decimal>,
    pub tax_percentage: Option<Decimal>,
    pub discount: Decimal,

    /// Credit deducted from this row's price.
    pub credits: Decimal,
    pub currency: String,
    pub component: String,
    pub area: String,
    pub identifier: u64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub service_period_start: Option<Timestamp>,
    pub service_period_end: Option<Timestamp>,
    pub cancel_until: Option<Timestamp>,
    pub use_credit: bool,
    pub cost_center: Option<String>,
    pub installments: Option<InstallmentPlan>,

    /// Purchase a rebook marker or installment line refers to.
    pub related_history_id: Option<u64>,
    pub created_by: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl HistoryRecord {
    pub fn is_pseudo(&self) -> bool {
        is_pseudo_item(&self.component, &self.area)
    }

    /// Amount actually charged for this row.
    pub fn amount_due(&self) -> Decimal {
        self.price - self.credits
    }

    /// The row as a cart item, for events and catalog calls.
    pub fn to_cart_item(&self) -> CartItem {
        let mut item = CartItem::new(
            self.component.clone(),
            self.area.clone(),
            self.item_id,
            self.item_name.clone(),
            self.price,
            self.currency.clone(),
        );
        item.service_period_start = self.service_period_start;
        item.service_period_end = self.service_period_end;
        item.cancel_until = self.cancel_until;
        item.cost_center.clone_from(&self.cost_center);
        item.installment.clone_from(&self.installments);
        item
    }
}

/// New History Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryRecord {
    pub userid: u64,
    pub item_id: u64,
    pub item_name: String,
    pub price: Decimal,
    pub tax: Option<Decimal>,
    pub tax_percentage: Option<Decimal>,
    pub discount: Decimal,
    pub credits: Decimal,
    pub currency: String,
    pub component: String,
    pub area: String,
    pub identifier: u64,
    pub payment_method: PaymentMethod,
    pub service_period_start: Option<Timestamp>,
    pub service_period_end: Option<Timestamp>,
    pub cancel_until: Option<Timestamp>,
    pub use_credit: bool,
    pub cost_center: Option<String>,
    pub installments: Option<InstallmentPlan>,
    pub related_history_id: Option<u64>,
    pub created_by: u64,
}

impl NewHistoryRecord {
    /// Pending row for one line of a prepared checkout.
    pub fn from_line(line: &CartLine, identifier: u64, userid: u64, created_by: u64) -> Self {
        let item = &line.item;
        let refers_to_purchase = item.component == LOCAL_COMPONENT
            && matches!(item.area.as_str(), REBOOK_ITEM_AREA | INSTALLMENT_AREA);

        Self {
            userid,
            item_id: item.item_id,
            item_name: item.item_name.clone(),
            price: line.price,
            tax: line.tax.map(|_| line.tax_due()),
            tax_percentage: line.tax_percentage,
            discount: item.discount,
            credits: Decimal::ZERO,
            currency: item.currency.clone(),
            component: item.component.clone(),
            area: item.area.clone(),
            identifier,
            payment_method: PaymentMethod::Online,
            service_period_start: item.service_period_start,
            service_period_end: item.service_period_end,
            cancel_until: item.cancel_until,
            use_credit: false,
            cost_center: item.cost_center.clone(),
            installments: line
                .installment_open
                .and(item.installment.clone()),
            related_history_id: refers_to_purchase.then_some(item.item_id),
            created_by,
        }
    }
}

impl NewHistoryRecord {
    /// The row as stored under `id`, still pending.
    pub(crate) fn into_record(self, id: u64, created_at: Timestamp) -> HistoryRecord {
        HistoryRecord {
            id,
            userid: self.userid,
            item_id: self.item_id,
            item_name: self.item_name,
            price: self.price,
            tax: self.tax,
            tax_percentage: self.tax_percentage,
            discount: self.discount,
            credits: self.credits,
            currency: self.currency,
            component: self.component,
            area: self.area,
            identifier: self.identifier,
            payment_method: self.payment_method,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            service_period_start: self.service_period_start,
            service_period_end: self.service_period_end,
            cancel_until: self.cancel_until,
            use_credit: self.use_credit,
            cost_center: self.cost_center,
            installments: self.installments,
            related_history_id: self.related_history_id,
            created_by: self.created_by,
            created_at,
            updated_at: created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn rebook_markers_refer_to_their_purchase() {
        let mut marker = CartItem::new(LOCAL_COMPONENT, REBOOK_ITEM_AREA, 41, "Old", dec!(0), "EUR");
        marker.refundable = dec!(20);

        let record = NewHistoryRecord::from_line(&CartLine::new(marker), 9, 2, 2);

        assert_eq!(record.related_history_id, Some(41));
        assert_eq!(record.identifier, 9);
        assert_eq!(record.payment_method, PaymentMethod::Online);
    }

    #[test]
    fn catalog_items_refer_to_nothing() {
        let item = CartItem::new("mod_booking", "option", 41, "Yoga", dec!(10), "EUR");

        let record = NewHistoryRecord::from_line(&CartLine::new(item), 9, 2, 2);

        assert_eq!(record.related_history_id, None);
        assert_eq!(record.installments, None);
        assert_eq!(record.price, dec!(10));
    }
}
