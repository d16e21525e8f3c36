pub mod access;
pub mod dashboard;
pub mod replies;
pub mod tickets;
