//! The hotel booking catalog.

use hotelbook_bookings::BOOKING;
use hotelbook_core::Catalog;
use hotelbook_customers::CUSTOMER;
use hotelbook_hotels::HOTEL;
use hotelbook_rooms::ROOM;

/// Every entity, relation targets first.
pub static CATALOG: Catalog = Catalog::new(&[&HOTEL, &CUSTOMER, &ROOM, &BOOKING]);
