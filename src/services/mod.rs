// src/services/mod.rs

pub mod classification;
pub mod exam;
pub mod grading;
pub mod question;
