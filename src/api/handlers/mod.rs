pub mod health;
pub mod login;
pub(crate) mod principal;
pub mod sessions;
pub mod twofactor;
pub mod types;
