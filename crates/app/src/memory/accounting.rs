use async_trait::async_trait;
use rust_decimal::Decimal;
use shopcart::{
    items::{INSTALLMENT_AREA, REBOOK_ITEM_AREA},
    payments::PaymentStatus,
    rebooking::cancellation_credit,
};

use crate::{
    domain::{
        accounting::{
            AccountingError, AccountingService,
            models::{CancelPurchase, Cancellation, Confirmation, ConfirmPurchase, PaidBack, PayBack},
        },
        credits::{
            CreditsServiceError,
            models::{CreditReason, NewCredit},
        },
        history::{HistoryServiceError, models::HistoryRecord},
        ledger::{LedgerServiceError, models::NewLedgerRecord},
    },
    memory::{MemoryState, MemoryStore},
};

impl MemoryState {
    fn cancel_rebooked(
        &mut self,
        marker: &HistoryRecord,
        request: &ConfirmPurchase,
    ) -> Option<HistoryRecord> {
        let original = marker.related_history_id?;
        let previous = self
            .history_mut(original)
            .filter(|record| record.payment_status == PaymentStatus::Success)?;

        previous.payment_status = PaymentStatus::Canceled;
        previous.updated_at = request.confirmed_at;
        let canceled = previous.clone();

        let credit = cancellation_credit(canceled.price, request.rebooking_fee, None);

        self.insert_ledger(
            NewLedgerRecord::cancellation(
                &canceled,
                request.rebooking_fee,
                credit,
                request.confirmed_by,
                Some(format!("rebooked in {}", marker.identifier)),
            ),
            request.confirmed_at,
        );

        Some(canceled)
    }

    fn pay_installment(
        &mut self,
        line: &HistoryRecord,
        request: &ConfirmPurchase,
    ) -> Result<(), AccountingError> {
        let Some(record) = line
            .related_history_id
            .and_then(|purchase| self.history_mut(purchase))
        else {
            return Ok(());
        };

        if let Some(plan) = record.installments.as_mut() {
            if let Some(index) = plan.next_open() {
                plan.mark_paid(index, request.confirmed_at)?;
                record.updated_at = request.confirmed_at;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl AccountingService for MemoryStore {
    async fn confirm_purchase(
        &self,
        request: ConfirmPurchase,
    ) -> Result<Confirmation, AccountingError> {
        let mut state = self.state.lock().await;

        let rows: Vec<HistoryRecord> = state
            .history
            .iter()
            .filter(|record| record.identifier == request.identifier)
            .cloned()
            .collect();

        if rows.is_empty() {
            return Err(AccountingError::UnknownIdentifier(request.identifier));
        }

        let pending: Vec<u64> = rows
            .iter()
            .filter(|record| record.payment_status.is_pending())
            .map(|record| record.id)
            .collect();

        if pending.is_empty() {
            return Ok(Confirmation {
                newly_confirmed: false,
                records: rows,
                rebooked: Vec::new(),
            });
        }

        let spent: Decimal = rows
            .iter()
            .filter(|record| record.payment_status.is_pending())
            .map(|record| record.credits)
            .sum();

        let buyer = rows.first().map(|record| (record.userid, record.currency.clone()));

        if let Some((userid, _)) = &buyer {
            if state.balance(*userid) < spent {
                return Err(CreditsServiceError::InsufficientBalance.into());
            }
        }

        let mut confirmed = Vec::with_capacity(pending.len());

        for id in pending {
            let record = state.history_mut(id).ok_or(HistoryServiceError::NotFound)?;

            record.payment_status = PaymentStatus::Success;
            record.payment_method = request.method;
            record.payment_reference.clone_from(&request.reference);
            record.updated_at = request.confirmed_at;

            confirmed.push(record.clone());
        }

        let mut rebooked = Vec::new();

        for record in &confirmed {
            state.insert_ledger(
                NewLedgerRecord::purchase(record, request.account_id.clone(), request.confirmed_by),
                request.confirmed_at,
            );

            if !record.is_pseudo() {
                continue;
            }

            match record.area.as_str() {
                REBOOK_ITEM_AREA => rebooked.extend(state.cancel_rebooked(record, &request)),
                INSTALLMENT_AREA => state.pay_installment(record, &request)?,
                _ => {}
            }
        }

        if let Some((userid, currency)) = buyer.filter(|_| spent > Decimal::ZERO) {
            state.push_credit(
                NewCredit {
                    userid,
                    amount: -spent,
                    currency,
                    reason: CreditReason::Checkout,
                    identifier: Some(request.identifier),
                    created_by: request.confirmed_by,
                },
                request.confirmed_at,
            )?;
        }

        Ok(Confirmation {
            newly_confirmed: true,
            records: confirmed,
            rebooked,
        })
    }

    async fn cancel_purchase(
        &self,
        request: CancelPurchase,
    ) -> Result<Cancellation, AccountingError> {
        let now = self.now();
        let mut state = self.state.lock().await;

        let record = state
            .history_mut(request.history_id)
            .ok_or(HistoryServiceError::NotFound)?;

        if record.payment_status != PaymentStatus::Success {
            return Err(AccountingError::NotCancelable(record.payment_status));
        }

        record.payment_status = PaymentStatus::Canceled;
        record.updated_at = now;
        let canceled = record.clone();

        let ledger = state
            .insert_ledger(
                NewLedgerRecord::cancellation(
                    &canceled,
                    request.fee,
                    request.credit,
                    request.canceled_by,
                    request.annotation,
                ),
                now,
            )
            .ok_or(LedgerServiceError::AlreadyExists)?;

        let credit = if request.refund_to_balance && request.credit > Decimal::ZERO {
            Some(state.push_credit(
                NewCredit {
                    userid: canceled.userid,
                    amount: request.credit,
                    currency: canceled.currency.clone(),
                    reason: CreditReason::Cancellation,
                    identifier: Some(canceled.identifier),
                    created_by: request.canceled_by,
                },
                now,
            )?)
        } else {
            None
        };

        Ok(Cancellation {
            record: canceled,
            ledger,
            credit,
        })
    }

    async fn pay_back_credits(&self, request: PayBack) -> Result<PaidBack, AccountingError> {
        if !request.method.is_pay_back() {
            return Err(AccountingError::InvalidMethod(request.method));
        }

        let now = self.now();
        let mut state = self.state.lock().await;
        let balance = state.balance(request.userid);

        if balance <= Decimal::ZERO {
            return Err(AccountingError::NothingToPayBack);
        }

        let identifier = state.take_identifier();

        let ledger = state
            .insert_ledger(
                NewLedgerRecord::correction(
                    request.userid,
                    identifier,
                    -balance,
                    &request.currency,
                    request.method,
                    request.paid_by,
                    request.annotation,
                ),
                now,
            )
            .ok_or(LedgerServiceError::AlreadyExists)?;

        let credit = state.push_credit(
            NewCredit {
                userid: request.userid,
                amount: -balance,
                currency: request.currency,
                reason: CreditReason::PaidBack,
                identifier: Some(identifier),
                created_by: request.paid_by,
            },
            now,
        )?;

        Ok(PaidBack {
            amount: balance,
            ledger,
            credit,
        })
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal_macros::dec;
    use shopcart::{data::CartLine, items::CartItem, payments::PaymentMethod};
    use testresult::TestResult;

    use crate::domain::{
        credits::CreditsService,
        history::{HistoryService, models::NewHistoryRecord},
        ledger::LedgerService,
    };

    use super::*;

    async fn pending_checkout(store: &MemoryStore, credits: Decimal) -> TestResult<u64> {
        let identifier = store.next_identifier().await?;

        let mut first = NewHistoryRecord::from_line(
            &CartLine::new(CartItem::new("mod_booking", "option", 1, "A", dec!(30), "EUR")),
            identifier,
            4,
            4,
        );
        first.credits = credits;

        let second = NewHistoryRecord::from_line(
            &CartLine::new(CartItem::new("mod_booking", "option", 2, "B", dec!(20), "EUR")),
            identifier,
            4,
            4,
        );

        store.create_pending(vec![first, second]).await?;

        Ok(identifier)
    }

    fn confirm(identifier: u64) -> ConfirmPurchase {
        ConfirmPurchase {
            identifier,
            method: PaymentMethod::CashierCash,
            reference: None,
            account_id: None,
            rebooking_fee: Decimal::ZERO,
            confirmed_by: 9,
            confirmed_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn confirming_twice_writes_the_ledger_once() -> TestResult {
        let store = MemoryStore::new();
        let identifier = pending_checkout(&store, Decimal::ZERO).await?;

        let first = store.confirm_purchase(confirm(identifier)).await?;
        let second = store.confirm_purchase(confirm(identifier)).await?;

        assert!(first.newly_confirmed);
        assert!(!second.newly_confirmed);
        assert_eq!(HistoryService::list_for_identifier(&store, identifier).await?.len(), 2);
        assert!(LedgerService::reconcile(&store, identifier).await?.is_balanced());

        Ok(())
    }

    #[tokio::test]
    async fn spent_credit_is_taken_from_the_balance() -> TestResult {
        let store = MemoryStore::new();
        store
            .add(NewCredit {
                userid: 4,
                amount: dec!(10),
                currency: "EUR".to_string(),
                reason: CreditReason::Manual,
                identifier: None,
                created_by: 9,
            })
            .await?;

        let identifier = pending_checkout(&store, dec!(10)).await?;
        store.confirm_purchase(confirm(identifier)).await?;

        assert_eq!(store.balance(4).await?, Decimal::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn cancellation_refunds_credit_and_keeps_fee() -> TestResult {
        let store = MemoryStore::new();
        let identifier = pending_checkout(&store, Decimal::ZERO).await?;
        let confirmation = store.confirm_purchase(confirm(identifier)).await?;
        let purchase = confirmation.records.first().map(|record| record.id).ok_or("no rows")?;

        let cancellation = store
            .cancel_purchase(CancelPurchase {
                history_id: purchase,
                fee: dec!(5),
                credit: dec!(25),
                refund_to_balance: true,
                canceled_by: 9,
                annotation: None,
            })
            .await?;

        assert_eq!(cancellation.record.payment_status, PaymentStatus::Canceled);
        assert_eq!(cancellation.ledger.fee, dec!(5));
        assert_eq!(store.balance(4).await?, dec!(25));

        assert!(matches!(
            store
                .cancel_purchase(CancelPurchase {
                    history_id: purchase,
                    fee: Decimal::ZERO,
                    credit: Decimal::ZERO,
                    refund_to_balance: false,
                    canceled_by: 9,
                    annotation: None,
                })
                .await,
            Err(AccountingError::NotCancelable(PaymentStatus::Canceled))
        ));

        let paid = store
            .pay_back_credits(PayBack {
                userid: 4,
                method: PaymentMethod::CreditsPaidBackByCash,
                currency: "EUR".to_string(),
                paid_by: 9,
                annotation: None,
            })
            .await?;

        assert_eq!(paid.amount, dec!(25));
        assert_eq!(store.balance(4).await?, Decimal::ZERO);

        Ok(())
    }
}
