//! Data source implementations

pub mod cloud_port_lookup;
pub mod location;
pub mod mcrs;
pub mod mves;
pub mod partner_port;
pub mod ports;
pub mod product_list;

pub use cloud_port_lookup::CloudPortLookupDataSource;
pub use location::LocationDataSource;
pub use partner_port::PartnerPortDataSource;
pub use product_list::{ProductListDataSource, ProductListing};
