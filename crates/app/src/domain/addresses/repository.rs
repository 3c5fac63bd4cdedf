//! Addresses Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};

use crate::{
    database::{from_db_id, to_db_id},
    domain::addresses::{
        errors::AddressesServiceError,
        models::{Address, AddressUpdate, NewAddress},
    },
};

const LIST_ADDRESSES_FOR_USER_SQL: &str = include_str!("sql/list_addresses_for_user.sql");
const GET_ADDRESS_SQL: &str = include_str!("sql/get_address.sql");
const CREATE_ADDRESS_SQL: &str = include_str!("sql/create_address.sql");
const UPDATE_ADDRESS_SQL: &str = include_str!("sql/update_address.sql");
const ERASE_USER_ADDRESSES_SQL: &str = include_str!("sql/erase_user_addresses.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgAddressesRepository;

impl PgAddressesRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn list_for_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<Vec<Address>, AddressesServiceError> {
        query_as::<Postgres, Address>(LIST_ADDRESSES_FOR_USER_SQL)
            .bind(to_db_id(userid)?)
            .fetch_all(&mut **tx)
            .await
            .map_err(AddressesServiceError::from)
    }

    pub(crate) async fn get_address(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: u64,
    ) -> Result<Address, AddressesServiceError> {
        query_as::<Postgres, Address>(GET_ADDRESS_SQL)
            .bind(to_db_id(id)?)
            .fetch_one(&mut **tx)
            .await
            .map_err(AddressesServiceError::from)
    }

    pub(crate) async fn create_address(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        address: NewAddress,
    ) -> Result<Address, AddressesServiceError> {
        query_as::<Postgres, Address>(CREATE_ADDRESS_SQL)
            .bind(to_db_id(address.userid)?)
            .bind(address.name)
            .bind(address.street)
            .bind(address.zip)
            .bind(address.city)
            .bind(address.country)
            .fetch_one(&mut **tx)
            .await
            .map_err(AddressesServiceError::from)
    }

    pub(crate) async fn update_address(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: u64,
        update: AddressUpdate,
    ) -> Result<Address, AddressesServiceError> {
        query_as::<Postgres, Address>(UPDATE_ADDRESS_SQL)
            .bind(to_db_id(id)?)
            .bind(update.name)
            .bind(update.street)
            .bind(update.zip)
            .bind(update.city)
            .bind(update.country)
            .fetch_one(&mut **tx)
            .await
            .map_err(AddressesServiceError::from)
    }

    pub(crate) async fn erase_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        userid: u64,
    ) -> Result<u64, AddressesServiceError> {
        let result = query(ERASE_USER_ADDRESSES_SQL)
            .bind(to_db_id(userid)?)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}

impl<'r> FromRow<'r, PgRow> for Address {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: from_db_id(row, "id")?,
            userid: from_db_id(row, "userid")?,
            name: row.try_get("name")?,
            street: row.try_get("street")?,
            zip: row.try_get("zip")?,
            city: row.try_get("city")?,
            country: row.try_get("country")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
