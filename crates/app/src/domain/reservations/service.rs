//! Reservations service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use shopcart::{data::CartData, reservation::cart_diverges};
use tracing::info;

use crate::{
    database::Db,
    domain::reservations::{
        errors::ReservationsServiceError,
        models::{NewReservation, ReservationRecord},
        repository::PgReservationsRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgReservationsService {
    db: Db,
    repository: PgReservationsRepository,
}

impl PgReservationsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgReservationsRepository::new(),
        }
    }
}

#[async_trait]
impl ReservationsService for PgReservationsService {
    async fn save_reservation(
        &self,
        reservation: NewReservation,
        now: Timestamp,
    ) -> Result<bool, ReservationsServiceError> {
        let mut tx = self.db.begin().await?;

        let saved = self
            .repository
            .save_reservation(&mut tx, reservation, now)
            .await?;

        tx.commit().await?;

        Ok(saved.is_some())
    }

    async fn get_reservation(
        &self,
        userid: u64,
    ) -> Result<Option<ReservationRecord>, ReservationsServiceError> {
        let mut tx = self.db.begin().await?;

        let reservation = self.repository.get_reservation(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(reservation)
    }

    async fn delete_reservation(&self, userid: u64) -> Result<bool, ReservationsServiceError> {
        let mut tx = self.db.begin().await?;

        let deleted = self.repository.delete_reservation(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(deleted > 0)
    }
}

#[automock]
#[async_trait]
pub trait ReservationsService: Send + Sync {
    /// Store the reservation unless the user holds one of another checkout that has not expired.
    ///
    /// Returns whether it was written.
    async fn save_reservation(
        &self,
        reservation: NewReservation,
        now: Timestamp,
    ) -> Result<bool, ReservationsServiceError>;

    async fn get_reservation(
        &self,
        userid: u64,
    ) -> Result<Option<ReservationRecord>, ReservationsServiceError>;

    async fn delete_reservation(&self, userid: u64) -> Result<bool, ReservationsServiceError>;
}

/// Whether `data` differs from what was reserved for the same checkout.
///
/// A stored reservation of the same identifier is compared field by field. Without any
/// bound reservation the cart counts as unchanged, and is stored first when `store_if_absent` is set.
/// A reservation of a different checkout always counts as a change.
///
/// # Errors
///
/// Returns an error when the reservation cannot be read or written.
pub async fn different_cart_with_same_identifier(
    reservations: &dyn ReservationsService,
    data: &CartData,
    identifier: u64,
    store_if_absent: bool,
    expires_at: Option<Timestamp>,
    now: Timestamp,
) -> Result<bool, ReservationsServiceError> {
    let reserved = reservations
        .get_reservation(data.userid)
        .await?
        .filter(|stored| stored.identifier.is_some());

    match reserved {
        Some(stored) if stored.identifier == Some(identifier) => {
            let diverged = cart_diverges(data, &stored.data)?;

            if diverged {
                info!(userid = data.userid, identifier, "cart changed since reservation");
            }

            Ok(diverged)
        }
        Some(_) => Ok(true),
        None => {
            if store_if_absent {
                reservations
                    .save_reservation(
                        NewReservation {
                            userid: data.userid,
                            identifier: Some(identifier),
                            data: serde_json::to_value(data)?,
                            expires_at,
                        },
                        now,
                    )
                    .await?;
            }

            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::{SignedDuration, Timestamp};
    use serde_json::json;
    use testresult::TestResult;

    use crate::test::TestContext;

    use super::*;

    fn reservation(identifier: Option<u64>, expires_at: Option<Timestamp>) -> NewReservation {
        NewReservation {
            userid: 7,
            identifier,
            data: json!({"userid": 7}),
            expires_at,
        }
    }

    #[tokio::test]
    async fn bound_reservations_are_not_overwritten() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::from_second(1_800_000_000)?;
        let later = now + SignedDuration::from_mins(15);

        assert!(ctx.reservations.save_reservation(reservation(None, None), now).await?);
        assert!(
            ctx.reservations
                .save_reservation(reservation(Some(3), Some(later)), now)
                .await?
        );
        assert!(
            !ctx.reservations
                .save_reservation(reservation(Some(4), Some(later)), now)
                .await?
        );

        let stored = ctx.reservations.get_reservation(7).await?.ok_or("missing")?;
        assert_eq!(stored.identifier, Some(3));

        assert!(ctx.reservations.delete_reservation(7).await?);
        assert!(ctx.reservations.get_reservation(7).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn same_identifier_does_not_replace_the_data() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::from_second(1_800_000_000)?;

        assert!(
            ctx.reservations
                .save_reservation(reservation(Some(3), None), now)
                .await?
        );

        let mut again = reservation(Some(3), None);
        again.data = json!({"userid": 7, "changed": true});
        assert!(!ctx.reservations.save_reservation(again, now).await?);

        let stored = ctx.reservations.get_reservation(7).await?.ok_or("missing")?;
        assert_eq!(stored.data, json!({"userid": 7}));

        Ok(())
    }

    #[tokio::test]
    async fn expired_reservations_are_kept_until_deleted() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::from_second(1_800_000_000)?;

        ctx.reservations
            .save_reservation(
                reservation(Some(3), Some(now - SignedDuration::from_mins(1))),
                now,
            )
            .await?;

        assert!(
            !ctx.reservations
                .save_reservation(reservation(Some(4), None), now)
                .await?
        );

        assert!(ctx.reservations.delete_reservation(7).await?);
        assert!(
            ctx.reservations
                .save_reservation(reservation(Some(4), None), now)
                .await?
        );

        Ok(())
    }
}
