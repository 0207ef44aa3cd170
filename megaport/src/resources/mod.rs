//! Resource implementations

pub mod mcr;
pub mod port;
pub mod product;
pub mod user;
pub mod vxc;

pub use mcr::McrResource;
pub use port::PortResource;
pub use user::UserResource;
pub use vxc::VxcResource;
