//! # Dispatch Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Shared event types and recording helpers
//! │
//! └── integration/      # Cross-crate behaviour
//!     ├── scenarios.rs  # Delivery order, filters, error policy, timeouts, interceptors
//!     ├── concurrency.rs# Publishing and subscribing from many tasks at once
//!     ├── lifecycle.rs  # Observation stream, statistics, dispose
//!     └── runtime.rs    # The composition root end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p dispatch-tests
//!
//! # By category
//! cargo test -p dispatch-tests integration::scenarios::
//! cargo test -p dispatch-tests integration::concurrency::
//!
//! # Benchmarks
//! cargo bench -p dispatch-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fixtures;
