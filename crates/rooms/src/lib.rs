//! Rooms domain module.
//!
//! A room belongs to at most one hotel and owns the bookings made against it.

pub mod room;

pub use room::{ROOM, Room, RoomCreateInput, RoomUpdateInput, RoomWhereInput};
