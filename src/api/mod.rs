//! API response types

pub mod response;

pub use response::{Created, DataResponse, Markdown, NoContent};
