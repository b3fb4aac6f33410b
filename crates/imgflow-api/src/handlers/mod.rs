pub mod events;
pub mod uploads;
