pub mod error;
pub mod extract;
pub mod password;
pub mod response;
pub mod validation;
