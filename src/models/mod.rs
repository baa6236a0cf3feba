pub mod book;
pub mod user;

pub use book::{Book, BookDetail, BookUser, Owner, Review};
pub use user::SessionUser;
