//! Data models for the bookshelf catalog.
//!
//! These models define the JSON wire format; summary and detail response
//! shapes are separate types with explicit field sets.

mod attribute;
mod book;
mod user;

pub use attribute::*;
pub use book::*;
pub use user::*;
