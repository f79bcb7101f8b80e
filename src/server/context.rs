//! Server-side context: the registry plus collaborator handles, passed
//! explicitly to every session instead of living in process-wide globals.

use std::sync::Arc;

use crate::{
    infra::contracts::{MessageStore, UserDirectory},
    server::registry::Registry,
};

pub struct ServerContext {
    pub registry: Registry,
    pub directory: Arc<dyn UserDirectory>,
    pub store: Arc<dyn MessageStore>,
}

impl ServerContext {
    pub fn new(directory: Arc<dyn UserDirectory>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            registry: Registry::new(),
            directory,
            store,
        }
    }
}
