pub mod approval;
pub mod booking;
pub mod care_log;
pub mod kennel;
pub mod notification;
pub mod pet;
pub mod user;
