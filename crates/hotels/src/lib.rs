//! Hotels domain module.
//!
//! Schema, typed projection and request inputs for the `Hotel` entity. Pure
//! mapping code: persistence and HTTP live in the infra and api crates.

pub mod hotel;

pub use hotel::{HOTEL, Hotel, HotelCreateInput, HotelUpdateInput, HotelWhereInput};
