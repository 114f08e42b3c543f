use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{Listing, ListingStore, RegistryError, UpsertOutcome, UserRecord, UserRegistry};

/// In-memory registry, for development and tests.
#[derive(Default)]
pub struct MemoryUserRegistry {
    users: DashMap<String, UserRecord>,
    listings: DashMap<String, Vec<Listing>>,
}

impl MemoryUserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listings(self, owner_id: impl Into<String>, listings: Vec<Listing>) -> Self {
        self.listings.insert(owner_id.into(), listings);
        self
    }

    pub fn get(&self, open_id: &str) -> Option<UserRecord> {
        self.users.get(open_id).map(|user| user.clone())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserRegistry for MemoryUserRegistry {
    async fn upsert(&self, user: &UserRecord) -> Result<UpsertOutcome, RegistryError> {
        match self.users.entry(user.open_id.clone()) {
            Entry::Occupied(_) => Ok(UpsertOutcome::Existing),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }
}

#[async_trait]
impl ListingStore for MemoryUserRegistry {
    async fn listings_for(&self, owner_id: &str) -> Result<Vec<Listing>, RegistryError> {
        Ok(self
            .listings
            .get(owner_id)
            .map(|listings| listings.clone())
            .unwrap_or_default())
    }
}
