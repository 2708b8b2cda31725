// Video processing pipeline: decode, detect occupancy, annotate, encode

pub mod detection;
pub mod error;
pub mod geometry;
pub mod parking;
pub mod processor;
pub mod stats;
pub mod types;
