pub mod cgm_readings;
pub mod users;
