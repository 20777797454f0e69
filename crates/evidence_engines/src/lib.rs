#![forbid(unsafe_code)]

pub mod bcs;
pub mod presentation;
pub mod ptb;
pub mod record_codec;
pub mod tx_builder;
