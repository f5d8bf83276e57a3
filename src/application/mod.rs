//! Application Layer
//!
//! Services, DTOs and the realtime core. This layer orchestrates the flow of
//! data between the presentation and domain layers.

pub mod dto;
pub mod realtime;
pub mod services;
