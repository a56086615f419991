pub mod booking;
pub mod messaging;
pub mod scheduling;
