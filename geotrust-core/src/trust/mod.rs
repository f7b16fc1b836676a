//! Position Trust Analysis
//!
//! This module watches a continuous stream of position samples and flags
//! readings that are unlikely to be genuine device output. It keeps a
//! sliding window of recent samples per watch session and runs a fixed set
//! of named checks on every new sample.
//!
//! The analyzer only annotates. It never blocks an action; callers decide
//! enforcement (see [`crate::attendance`]).
//!
//! # Checks
//!
//! | Reason | Triggered when |
//! |--------|----------------|
//! | `ImpossibleSpeed` | distance beyond both samples' accuracy, over elapsed time, exceeds the plausible speed |
//! | `TeleportJump` | the jump, minus both samples' accuracy, is still implausible |
//! | `AccuracyImplausible` | reported accuracy is zero, negative or non-physical |
//! | `MockFlagPresent` | the platform says the position is mocked |
//! | `StaleOrFrozen` | identical fixes repeat while speed/heading report motion |
//!
//! # Example
//!
//! ```rust
//! use geotrust_core::config::AnalyzerConfig;
//! use geotrust_core::geo::{Coordinate, PositionSample};
//! use geotrust_core::trust::{PositionStreamAnalyzer, TrustReason};
//!
//! let mut analyzer = PositionStreamAnalyzer::new(AnalyzerConfig::default()).unwrap();
//!
//! let here = Coordinate::new(-6.2, 106.8167).unwrap();
//! let far = Coordinate::new(-6.209, 106.8167).unwrap();
//!
//! analyzer.ingest_sample(PositionSample::new(here, 10.0, 0)).unwrap();
//! let trust = analyzer.ingest_sample(PositionSample::new(far, 10.0, 5_000)).unwrap();
//!
//! assert!(trust.is_suspicious);
//! assert!(trust.has(TrustReason::ImpossibleSpeed));
//!
//! // A new watch session must not inherit this history
//! analyzer.reset();
//! ```

mod analyzer;
mod assessment;

pub use analyzer::PositionStreamAnalyzer;
pub use assessment::{TrustAssessment, TrustReason};
pub use crate::config::{AnalyzerConfig, TrustWeights};
