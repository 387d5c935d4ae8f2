pub mod slot_finder;
pub mod slotted_schedule;
pub mod time_slice;
