//! Types shared by the pointsmap server, store and client surface.

pub mod api;
pub mod events;
pub mod models;
