//! Cross-crate integration tests for SolarForge. See `tests/`.
