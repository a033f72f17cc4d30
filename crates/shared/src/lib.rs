pub mod domain;
pub mod error;
pub mod permissions;
pub mod protocol;
