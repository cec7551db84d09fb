pub mod history;
pub mod identity;
pub mod message;
pub mod package;
