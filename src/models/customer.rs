use serde::{Deserialize, Serialize};

/// A customer is identified by phone number; the name follows the latest booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub phone_number: String,
    pub name: String,
}
