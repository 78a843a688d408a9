pub mod action;
pub mod session;
pub mod slots;
