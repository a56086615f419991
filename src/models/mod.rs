pub mod appointment;
pub mod availability;
pub mod customer;
pub mod schedule;

pub use appointment::{Appointment, AppointmentStatus, AppointmentWithCustomer};
pub use availability::DayAvailability;
pub use customer::Customer;
pub use schedule::{DailyOverride, ShiftWindow, WorkingHoursRule};
