// src/gate/tests/mod.rs
