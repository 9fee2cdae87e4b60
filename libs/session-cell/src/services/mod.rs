pub mod gateway;
pub mod guard;

pub use gateway::{HttpIdentityGateway, IdentityGateway};
pub use guard::SessionGuardService;
