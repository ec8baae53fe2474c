//! Account domain - entities and repository contract

mod entity;
mod repository;

pub use entity::{Account, AccountPatch, AccountStatus, Address};
pub use repository::{AccountFilter, AccountRepository, AccountSort};

#[cfg(test)]
pub use repository::MockAccountRepository;
