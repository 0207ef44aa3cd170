//! Provider data structure passed to resources and data sources

use crate::api::products::ProvisioningWait;
use crate::api::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct MegaportProviderData {
    pub client: Arc<Client>,
    /// Orders are refused unless the user accepted Megaport's terms
    pub accept_purchase_terms: bool,
    pub wait: ProvisioningWait,
}

impl MegaportProviderData {
    pub fn new(client: Client, accept_purchase_terms: bool, wait: ProvisioningWait) -> Self {
        Self {
            client: Arc::new(client),
            accept_purchase_terms,
            wait,
        }
    }
}
