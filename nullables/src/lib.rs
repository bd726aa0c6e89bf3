//! Nullable infrastructure for deterministic testing.
//!
//! The node reads time through the [`tws_types::Clock`] trait. Tests swap in
//! a [`NullClock`] so that accrual windows and the sanitisation interval can
//! be crossed exactly, without sleeping.

pub mod clock;

pub use clock::NullClock;
