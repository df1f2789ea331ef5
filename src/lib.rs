// src/lib.rs

//! Resumable thread crawler and reply flattener.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
