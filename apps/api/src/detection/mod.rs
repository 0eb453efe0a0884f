// Form-field classification engine.
// A scan walks a document snapshot, extracts features for each visible field,
// scores them against the field-type registry and keeps the best match per field.
// Platform quirks are data in the site override table, never code paths.

pub mod document;
pub mod engine;
pub mod features;
pub mod handlers;
pub mod labels;
pub mod models;
pub mod overrides;
pub mod registry;
pub mod scoring;
pub mod session;
