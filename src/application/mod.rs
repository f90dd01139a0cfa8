//! Application services: rendering, conversion routing and history storage.

pub mod clock;
pub mod convert;
pub mod error;
pub mod history;
pub mod render;
pub mod store;
