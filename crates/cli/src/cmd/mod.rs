pub mod doctor;
pub mod resolve;
