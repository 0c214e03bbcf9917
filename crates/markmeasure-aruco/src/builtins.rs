//! Embedded built-in dictionaries.
//!
//! The source of truth lives in `markmeasure-aruco/data/*_CODES.json`. The
//! 4×4 table holds the first 50 symbols of the standard 4×4 ArUco family,
//! re-encoded row-major with black = 1.

#![allow(clippy::unreadable_literal, non_upper_case_globals)]

use crate::Dictionary;

include!(concat!(env!("OUT_DIR"), "/builtins.rs"));
