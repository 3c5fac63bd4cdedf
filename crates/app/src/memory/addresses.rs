use async_trait::async_trait;

use crate::{
    domain::addresses::{
        AddressesService, AddressesServiceError,
        models::{Address, AddressUpdate, NewAddress},
    },
    memory::{MemoryState, MemoryStore},
};

#[async_trait]
impl AddressesService for MemoryStore {
    async fn list_for_user(&self, userid: u64) -> Result<Vec<Address>, AddressesServiceError> {
        Ok(self
            .state
            .lock()
            .await
            .addresses
            .iter()
            .filter(|address| address.userid == userid)
            .cloned()
            .collect())
    }

    async fn get(&self, userid: u64, id: u64) -> Result<Address, AddressesServiceError> {
        let state = self.state.lock().await;
        let address = state
            .addresses
            .iter()
            .find(|address| address.id == id)
            .ok_or(AddressesServiceError::NotFound)?;

        if address.userid != userid {
            return Err(AddressesServiceError::NotOwned(id));
        }

        Ok(address.clone())
    }

    async fn create(&self, address: NewAddress) -> Result<Address, AddressesServiceError> {
        let now = self.now();
        let mut state = self.state.lock().await;

        let created = Address {
            id: MemoryState::next_id(&state.addresses, |address| address.id),
            userid: address.userid,
            name: address.name,
            street: address.street,
            zip: address.zip,
            city: address.city,
            country: address.country.to_ascii_uppercase(),
            created_at: now,
            updated_at: now,
        };

        state.addresses.push(created.clone());

        Ok(created)
    }

    async fn update(
        &self,
        userid: u64,
        id: u64,
        update: AddressUpdate,
    ) -> Result<Address, AddressesServiceError> {
        let now = self.now();
        let mut state = self.state.lock().await;

        let address = state
            .addresses
            .iter_mut()
            .find(|address| address.id == id)
            .ok_or(AddressesServiceError::NotFound)?;

        if address.userid != userid {
            return Err(AddressesServiceError::NotOwned(id));
        }

        address.name = update.name;
        address.street = update.street;
        address.zip = update.zip;
        address.city = update.city;
        address.country = update.country.to_ascii_uppercase();
        address.updated_at = now;

        Ok(address.clone())
    }

    async fn erase_user(&self, userid: u64) -> Result<u64, AddressesServiceError> {
        let mut state = self.state.lock().await;
        let before = state.addresses.len();

        state.addresses.retain(|address| address.userid != userid);

        Ok(u64::try_from(before - state.addresses.len())?)
    }
}
