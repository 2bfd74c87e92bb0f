// src/pipeline/mod.rs

//! Producer side: the transfer pipeline.

pub mod transfer;

pub use transfer::{TransferPipeline, TransferReport, TransferSettings};
