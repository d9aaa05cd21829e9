// src/store/tests/mod.rs

mod redis_tests;
