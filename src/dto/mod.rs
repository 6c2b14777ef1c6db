pub mod admin;
pub mod common;
pub mod draw;
pub mod health;
pub mod public;
pub mod validation;
