//! Sensor Payload Validation
//!
//! Checks the two ingestion encodings (positional query parameters and a JSON
//! `sensor_values` array) and turns them into a [`feature_engine::RawReading`].

mod error;
mod validator;

pub use error::ValidationError;
pub use validator::{ValidationConfig, Validator};
