//! Domain types and DTOs
//!
//! These types define the data structures for survey reports, assessments,
//! history and chat.

pub mod assessment;
pub mod chat;
pub mod report;
