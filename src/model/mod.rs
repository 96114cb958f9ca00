pub mod department;
pub mod employee;
pub mod leave_request;
pub mod leave_type;
pub mod notification;
pub mod role;
pub mod user;
