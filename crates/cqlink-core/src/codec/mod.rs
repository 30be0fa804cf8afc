//! Text codecs.
//!
//! - `json`: JSON with lossless big integers and embedded-JSON protection.
//! - `cq`: tag notation (`[CQ:at,qq=123]hello`) <-> typed segments.

pub mod cq;
pub mod json;
