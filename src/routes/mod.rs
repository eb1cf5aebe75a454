pub mod audit;
pub mod auth;
pub mod bookings;
pub mod care_logs;
pub mod health;
pub mod kennels;
pub mod notifications;
pub mod overrides;
pub mod pets;
pub mod users;
