//! Addresses service.

use async_trait::async_trait;
use mockall::automock;

use crate::{
    database::Db,
    domain::addresses::{
        errors::AddressesServiceError,
        models::{Address, AddressUpdate, NewAddress},
        repository::PgAddressesRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgAddressesService {
    db: Db,
    repository: PgAddressesRepository,
}

impl PgAddressesService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgAddressesRepository::new(),
        }
    }
}

#[async_trait]
impl AddressesService for PgAddressesService {
    async fn list_for_user(&self, userid: u64) -> Result<Vec<Address>, AddressesServiceError> {
        let mut tx = self.db.begin().await?;

        let addresses = self.repository.list_for_user(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(addresses)
    }

    async fn get(&self, userid: u64, id: u64) -> Result<Address, AddressesServiceError> {
        let mut tx = self.db.begin().await?;

        let address = self.repository.get_address(&mut tx, id).await?;

        tx.commit().await?;

        if address.userid != userid {
            return Err(AddressesServiceError::NotOwned(id));
        }

        Ok(address)
    }

    async fn create(&self, address: NewAddress) -> Result<Address, AddressesServiceError> {
        let mut tx = self.db.begin().await?;

        let created = self.repository.create_address(&mut tx, address).await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn update(
        &self,
        userid: u64,
        id: u64,
        update: AddressUpdate,
    ) -> Result<Address, AddressesServiceError> {
        let mut tx = self.db.begin().await?;

        let existing = self.repository.get_address(&mut tx, id).await?;

        if existing.userid != userid {
            return Err(AddressesServiceError::NotOwned(id));
        }

        let updated = self.repository.update_address(&mut tx, id, update).await?;

        tx.commit().await?;

        Ok(updated)
    }

    async fn erase_user(&self, userid: u64) -> Result<u64, AddressesServiceError> {
        let mut tx = self.db.begin().await?;

        let erased = self.repository.erase_user(&mut tx, userid).await?;

        tx.commit().await?;

        Ok(erased)
    }
}

#[automock]
#[async_trait]
pub trait AddressesService: Send + Sync {
    async fn list_for_user(&self, userid: u64) -> Result<Vec<Address>, AddressesServiceError>;

    /// Retrieve an address of `userid`; addresses of other users are refused.
    async fn get(&self, userid: u64, id: u64) -> Result<Address, AddressesServiceError>;

    async fn create(&self, address: NewAddress) -> Result<Address, AddressesServiceError>;

    async fn update(
        &self,
        userid: u64,
        id: u64,
        update: AddressUpdate,
    ) -> Result<Address, AddressesServiceError>;

    async fn erase_user(&self, userid: u64) -> Result<u64, AddressesServiceError>;
}
