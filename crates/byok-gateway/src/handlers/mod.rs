//! JSON API request handlers

pub mod consent;
pub mod service;
pub mod trust_link;
pub mod world_model;

pub use consent::*;
pub use service::*;
pub use trust_link::*;
pub use world_model::*;
