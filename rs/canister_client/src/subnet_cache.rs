use crate::response_authentication::Subnet;
use candid::Principal;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// An in-memory index of subnets by the canisters they host.
///
/// Every subnet stored here was read from a verified certificate. The cache
/// may be cleared at any time: a miss only costs a `read_state` round trip.
#[derive(Debug, Default)]
pub struct SubnetCache {
    subnets: RwLock<HashMap<Principal, Arc<Subnet>>>,
}

impl SubnetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The subnet whose canister ranges contain `canister_id`, if cached.
    pub fn get_by_canister(&self, canister_id: &Principal) -> Option<Arc<Subnet>> {
        self.subnets
            .read()
            .values()
            .find(|subnet| subnet.contains_canister(canister_id))
            .cloned()
    }

    pub fn get(&self, subnet_id: &Principal) -> Option<Arc<Subnet>> {
        self.subnets.read().get(subnet_id).cloned()
    }

    /// Stores `subnet`, replacing any previous entry for the same subnet id.
    pub fn insert(&self, subnet: Arc<Subnet>) {
        self.subnets.write().insert(subnet.id, subnet);
    }

    pub fn remove(&self, subnet_id: &Principal) -> Option<Arc<Subnet>> {
        self.subnets.write().remove(subnet_id)
    }

    pub fn clear(&self) {
        self.subnets.write().clear();
    }

    pub fn len(&self) -> usize {
        self.subnets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subnets.read().is_empty()
    }
}
