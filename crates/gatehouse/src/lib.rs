//! Gatehouse: authentication and route authorization for the volunteer portal.
//!
//! The library exposes the pure decision pieces (`access`), the token and
//! credential lifecycle (`auth`), the SQLite-backed user store (`user`, `db`),
//! the config file (`settings`) and the axum surface that ties them together
//! (`api`).

pub mod access;
pub mod api;
pub mod auth;
pub mod db;
pub mod settings;
pub mod user;
