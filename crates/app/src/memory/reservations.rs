use async_trait::async_trait;
use jiff::Timestamp;

use crate::{
    domain::reservations::{
        ReservationsService, ReservationsServiceError,
        models::{NewReservation, ReservationRecord},
    },
    memory::MemoryStore,
};

#[async_trait]
impl ReservationsService for MemoryStore {
    async fn save_reservation(
        &self,
        reservation: NewReservation,
        now: Timestamp,
    ) -> Result<bool, ReservationsServiceError> {
        let mut state = self.state.lock().await;

        let replaceable = state
            .reservations
            .get(&reservation.userid)
            .is_none_or(|stored| !stored.is_bound());

        if replaceable {
            state.reservations.insert(
                reservation.userid,
                ReservationRecord {
                    userid: reservation.userid,
                    identifier: reservation.identifier,
                    data: reservation.data,
                    expires_at: reservation.expires_at,
                    updated_at: now,
                },
            );
        }

        Ok(replaceable)
    }

    async fn get_reservation(
        &self,
        userid: u64,
    ) -> Result<Option<ReservationRecord>, ReservationsServiceError> {
        Ok(self.state.lock().await.reservations.get(&userid).cloned())
    }

    async fn delete_reservation(&self, userid: u64) -> Result<bool, ReservationsServiceError> {
        Ok(self.state.lock().await.reservations.remove(&userid).is_some())
    }
}
