//! User store.
//!
//! Users are owned by the store; the auth layer only reads them through
//! [`UserStore`]. Role and status are mapped onto closed enumerations here,
//! at the store boundary.

mod models;
mod repository;

pub use models::{NewUser, User, UserRow};
pub use repository::{StoreError, UserRepository, UserStore};
