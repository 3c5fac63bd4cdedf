//! Reservations Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, types::Json};

use crate::{
    database::{from_db_id, to_db_id},
    domain::{
        history::repository::decode_error,
        reservations::{
            errors::ReservationsServiceError,
            models::{NewReservation, ReservationRecord},
        },
    },
};

const SAVE_RESERVATION_SQL: &str = include_str!("sql/save_reservation.sql");
const GET_RESERVATION_SQL: &str = include_str!("sql/get_reservation.sql");
const DELETE_RESERVATION_SQL: &str = include_str!("sql/delete_reservation.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgReservationsRepository;

impl PgReservationsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Upsert; returns `None` when a reservation of another live checkout blocked the write.
    pub(crate) async fn save_reservation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        reservation: NewReservation,
        now: Timestamp,
    ) -> Result<Option<ReservationRecord>, ReservationsServiceError> {
        let identifier = reservation.identifier.map(to_db_id).transpose()?;

        query_as::<Postgres, ReservationRecord>(SAVE_RESERVATION_SQL)
            .bind(to_db_id(reservation.userid)?)
            .bind(identifier)
            .bind(Json(reservation.data))
            .bind(reservation.expires_at.map(SqlxTimestamp::from))
            .bind(SqlxTimestamp::from(now))
            .fetch_optional(&mut **tx)
            .await
            .map_err(ReservationsServiceError::from)
    }

    pub(crate) async fn get_reservation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<Option<ReservationRecord>, ReservationsServiceError> {
        query_as::<Postgres, ReservationRecord>(GET_RESERVATION_SQL)
            .bind(to_db_id(userid)?)
            .fetch_optional(&mut **tx)
            .await
            .map_err(ReservationsServiceError::from)
    }

    pub(crate) async fn delete_reservation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<u64, ReservationsServiceError> {
        let result = query(DELETE_RESERVATION_SQL)
            .bind(to_db_id(userid)?)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}

impl<'r> FromRow<'r, PgRow> for ReservationRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let identifier = row
            .try_get::<Option<i64>, _>("identifier")?
            .map(u64::try_from)
            .transpose()
            .map_err(|error| decode_error("identifier", error))?;

        Ok(Self {
            userid: from_db_id(row, "userid")?,
            identifier,
            data: row.try_get::<Json<serde_json::Value>, _>("data")?.0,
            expires_at: row
                .try_get::<Option<SqlxTimestamp>, _>("expires_at")?
                .map(SqlxTimestamp::to_jiff),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
