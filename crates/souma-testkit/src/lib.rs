//! # Souma Testkit
//!
//! Testing utilities for the Souma nucleus.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a nucleus over a memory store plus helpers for seeding
//!   personas, stars and planets
//! - **Generators**: proptest strategies for ids, timestamps, state codes
//!   and whole stars
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use souma_testkit::generators::{star_from_params, StarParams};
//!
//! proptest! {
//!     #[test]
//!     fn export_is_deterministic(params: StarParams) {
//!         let star = star_from_params(&params);
//!         prop_assert_eq!(star.to_string(), star.to_string());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use souma_testkit::fixtures::seeded_persona;
//! use souma_core::KeyIdentity;
//!
//! let ada = seeded_persona(1, "ada");
//! assert!(ada.is_controlled());
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_party_fixtures, seeded_persona, TestFixture};
pub use generators::{star_from_params, StarParams};
