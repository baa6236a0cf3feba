pub mod aggregate;
pub mod booking;
pub mod upstream;
