// src/cache/tests/mod.rs
