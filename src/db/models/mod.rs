pub mod cgm_reading;
pub mod user;

pub use cgm_reading::{CgmReading, CgmStatistics, NewCgmReading, ReadingType};
pub use user::{DietaryPreference, NewUser, User, UserId, UserUpdate};
