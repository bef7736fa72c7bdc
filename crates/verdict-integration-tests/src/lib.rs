//! Cross-crate integration tests for the Verdict workspace. See `tests/`.
