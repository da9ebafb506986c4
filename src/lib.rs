//! Workspace root crate.
//!
//! This crate has no library code of its own — it exists to host
//! workspace-level end-to-end tests in `tests/` that exercise
//! `taskflow-shared`, `taskflow-worker`, and `taskflow-api` together.
