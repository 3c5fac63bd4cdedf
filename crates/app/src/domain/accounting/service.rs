//! Accounting service.

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use shopcart::{
    items::{INSTALLMENT_AREA, REBOOK_ITEM_AREA},
    payments::PaymentStatus,
    rebooking::cancellation_credit,
};
use sqlx::{Postgres, Transaction};
use tracing::info;

use crate::{
    database::Db,
    domain::{
        accounting::{
            errors::AccountingError,
            models::{CancelPurchase, Cancellation, Confirmation, ConfirmPurchase, PaidBack, PayBack},
        },
        credits::{
            models::{CreditReason, NewCredit},
            repository::PgCreditsRepository,
        },
        history::{models::HistoryRecord, repository::PgHistoryRepository},
        ledger::{
            LedgerServiceError,
            models::NewLedgerRecord,
            repository::PgLedgerRepository,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PgAccountingService {
    db: Db,
    history: PgHistoryRepository,
    ledger: PgLedgerRepository,
    credits: PgCreditsRepository,
}

impl PgAccountingService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            history: PgHistoryRepository::new(),
            ledger: PgLedgerRepository::new(),
            credits: PgCreditsRepository::new(),
        }
    }

    async fn cancel_rebooked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        marker: &HistoryRecord,
        fee: Decimal,
        confirmed_by: u64,
    ) -> Result<Option<HistoryRecord>, AccountingError> {
        let Some(original) = marker.related_history_id else {
            return Ok(None);
        };

        let previous = self.history.get_history_for_update(tx, original).await?;

        if previous.payment_status != PaymentStatus::Success {
            return Ok(None);
        }

        let canceled = self.history.cancel(tx, original).await?;
        let credit = cancellation_credit(previous.price, fee, None);

        self.ledger
            .insert_ledger(
                tx,
                NewLedgerRecord::cancellation(
                    &canceled,
                    fee,
                    credit,
                    confirmed_by,
                    Some(format!("rebooked in {}", marker.identifier)),
                ),
            )
            .await?;

        Ok(Some(canceled))
    }

    async fn pay_installment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        line: &HistoryRecord,
        request: &ConfirmPurchase,
    ) -> Result<(), AccountingError> {
        let Some(purchase) = line.related_history_id else {
            return Ok(());
        };

        let record = self.history.get_history_for_update(tx, purchase).await?;
        let Some(mut plan) = record.installments else {
            return Ok(());
        };

        if let Some(index) = plan.next_open() {
            plan.mark_paid(index, request.confirmed_at)?;
            self.history.update_installments(tx, purchase, &plan).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl AccountingService for PgAccountingService {
    async fn confirm_purchase(
        &self,
        request: ConfirmPurchase,
    ) -> Result<Confirmation, AccountingError> {
        let mut tx = self.db.begin().await?;

        let locked = self
            .history
            .lock_for_identifier(&mut tx, request.identifier)
            .await?;

        if locked.is_empty() {
            return Err(AccountingError::UnknownIdentifier(request.identifier));
        }

        let confirmed = self
            .history
            .confirm_pending(
                &mut tx,
                request.identifier,
                request.method,
                request.reference.as_deref(),
            )
            .await?;

        if confirmed.is_empty() {
            tx.commit().await?;

            return Ok(Confirmation {
                newly_confirmed: false,
                records: locked,
                rebooked: Vec::new(),
            });
        }

        let mut rebooked = Vec::new();
        let mut spent = Decimal::ZERO;

        for record in &confirmed {
            self.ledger
                .insert_ledger(
                    &mut tx,
                    NewLedgerRecord::purchase(
                        record,
                        request.account_id.clone(),
                        request.confirmed_by,
                    ),
                )
                .await?;

            spent += record.credits;

            if !record.is_pseudo() {
                continue;
            }

            match record.area.as_str() {
                REBOOK_ITEM_AREA => {
                    if let Some(canceled) = self
                        .cancel_rebooked(
                            &mut tx,
                            record,
                            request.rebooking_fee,
                            request.confirmed_by,
                        )
                        .await?
                    {
                        rebooked.push(canceled);
                    }
                }
                INSTALLMENT_AREA => self.pay_installment(&mut tx, record, &request).await?,
                _ => {}
            }
        }

        if let Some(first) = confirmed.first().filter(|_| spent > Decimal::ZERO) {
            self.credits.lock_user(&mut tx, first.userid).await?;
            self.credits
                .insert_credit(
                    &mut tx,
                    NewCredit {
                        userid: first.userid,
                        amount: -spent,
                        currency: first.currency.clone(),
                        reason: CreditReason::Checkout,
                        identifier: Some(request.identifier),
                        created_by: request.confirmed_by,
                    },
                )
                .await?;
        }

        tx.commit().await?;

        info!(
            identifier = request.identifier,
            rows = confirmed.len(),
            method = ?request.method,
            "confirmed purchase"
        );

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
        let mut tx = self.db.begin().await?;

        let record = self
            .history
            .get_history_for_update(&mut tx, request.history_id)
            .await?;

        if record.payment_status != PaymentStatus::Success {
            return Err(AccountingError::NotCancelable(record.payment_status));
        }

        let canceled = self.history.cancel(&mut tx, request.history_id).await?;

        let ledger = self
            .ledger
            .insert_ledger(
                &mut tx,
                NewLedgerRecord::cancellation(
                    &canceled,
                    request.fee,
                    request.credit,
                    request.canceled_by,
                    request.annotation,
                ),
            )
            .await?
            .ok_or(LedgerServiceError::AlreadyExists)?;

        let credit = if request.refund_to_balance && request.credit > Decimal::ZERO {
            self.credits.lock_user(&mut tx, canceled.userid).await?;

            Some(
                self.credits
                    .insert_credit(
                        &mut tx,
                        NewCredit {
                            userid: canceled.userid,
                            amount: request.credit,
                            currency: canceled.currency.clone(),
                            reason: CreditReason::Cancellation,
                            identifier: Some(canceled.identifier),
                            created_by: request.canceled_by,
                        },
                    )
                    .await?,
            )
        } else {
            None
        };

        tx.commit().await?;

        info!(
            history_id = canceled.id,
            identifier = canceled.identifier,
            credit = %request.credit,
            "cancelled purchase"
        );

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

        let mut tx = self.db.begin().await?;

        self.credits.lock_user(&mut tx, request.userid).await?;

        let balance = self.credits.get_balance(&mut tx, request.userid).await?;

        if balance <= Decimal::ZERO {
            return Err(AccountingError::NothingToPayBack);
        }

        let identifier = self.history.next_identifier(&mut tx).await?;

        let ledger = self
            .ledger
            .insert_ledger(
                &mut tx,
                NewLedgerRecord::correction(
                    request.userid,
                    identifier,
                    -balance,
                    &request.currency,
                    request.method,
                    request.paid_by,
                    request.annotation,
                ),
            )
            .await?
            .ok_or(LedgerServiceError::AlreadyExists)?;

        let credit = self
            .credits
            .insert_credit(
                &mut tx,
                NewCredit {
                    userid: request.userid,
                    amount: -balance,
                    currency: request.currency,
                    reason: CreditReason::PaidBack,
                    identifier: Some(identifier),
                    created_by: request.paid_by,
                },
            )
            .await?;

        tx.commit().await?;

        info!(userid = request.userid, amount = %balance, "paid back credits");

        Ok(PaidBack {
            amount: balance,
            ledger,
            credit,
        })
    }
}

#[automock]
#[async_trait]
pub trait AccountingService: Send + Sync {
    /// Move the pending rows of a checkout to success and write their ledger rows.
    ///
    /// Confirming an already confirmed checkout changes nothing and reports
    /// `newly_confirmed == false`.
    async fn confirm_purchase(
        &self,
        request: ConfirmPurchase,
    ) -> Result<Confirmation, AccountingError>;

    /// Cancel a paid row, record the reversal and optionally refund credit.
    async fn cancel_purchase(
        &self,
        request: CancelPurchase,
    ) -> Result<Cancellation, AccountingError>;

    /// Pay out a user's whole credit balance.
    async fn pay_back_credits(&self, request: PayBack) -> Result<PaidBack, AccountingError>;
}
