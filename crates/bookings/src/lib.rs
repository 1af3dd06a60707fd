//! Bookings domain module.

pub mod booking;

pub use booking::{BOOKING, Booking, BookingCreateInput, BookingUpdateInput, BookingWhereInput};
