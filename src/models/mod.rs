// src/models/mod.rs

pub mod exam;
pub mod question;
pub mod reference;
pub mod user;
