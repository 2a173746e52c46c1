//! Business logic services

pub mod auth;
pub mod catalog;
pub mod loans;

use std::sync::Arc;

use crate::repository::CirculationStore;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub gate: Arc<dyn auth::AuthorizationGate>,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services over the given store and gate
    pub fn new(
        store: Arc<dyn CirculationStore>,
        gate: Arc<dyn auth::AuthorizationGate>,
        policy: loans::LoanPolicy,
    ) -> Self {
        Self {
            gate,
            catalog: catalog::CatalogService::new(store.clone()),
            loans: loans::LoansService::new(store, policy),
        }
    }
}
