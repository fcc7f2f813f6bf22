//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod enroll;
pub mod health;
pub mod verify;

pub use crate::state::AppState;
pub use enroll::{enroll_handler, EnrollResponse};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use verify::{verify_handler, VerifyResponse};
