//! Test-only root crate; the end-to-end suites live in `tests/`.
