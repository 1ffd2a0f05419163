//! Contar: Line, Branch and Switch Coverage Instrumentation
//!
//! Contar (Spanish: "to count") rewrites compiled classes so that every
//! executed line, every taken jump arm and every taken switch arm bumps a
//! counter, then persists those counters in a compact binary file when the
//! process exits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        CONTAR Architecture                          │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌─────────────┐   ┌───────────┐   ┌────────────┐   │
//! │  │ ClassFile │──►│ FilterChain │──►│ Analysis  │──►│ Rewrite    │   │
//! │  │ (bytes)   │   │ (pure)      │   │ (ids)     │   │ (probes)   │   │
//! │  └───────────┘   └─────────────┘   └─────┬─────┘   └─────┬──────┘   │
//! │                                          ▼               ▼          │
//! │                                   ┌────────────┐   ┌────────────┐   │
//! │                                   │ ProjectData│◄──│ HitsArray  │   │
//! │                                   └─────┬──────┘   └────────────┘   │
//! │                                         ▼                           │
//! │                                   ┌────────────┐                    │
//! │                                   │ SaveHook ─►│ binary file        │
//! │                                   └────────────┘                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use contar::{InstrumentationConfig, Instrumenter, ProjectData};
//! use std::sync::Arc;
//!
//! let project = Arc::new(ProjectData::new());
//! let instrumenter = Instrumenter::new(Arc::clone(&project), InstrumentationConfig::default())?;
//! // garbage in, the same garbage out
//! assert_eq!(instrumenter.transform("a.B", &[1, 2, 3]), vec![1, 2, 3]);
//! # Ok::<(), contar::ContarError>(())
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Abstract class model, instruction set and class stream codec
pub mod class;
/// Instrumentation configuration
pub mod config;
/// Coverage data model
pub mod data;
/// Filter chain deciding what is tracked
pub mod filters;
/// Class instrumenter
pub mod instrument;
/// Binary coverage file format
pub mod io;
mod result;
/// Counters, reference interpreter and exit hook
pub mod runtime;

pub use class::{ClassFile, Insn, Label, MethodNode, Probe};
pub use config::{CounterStorage, InstrumentationConfig, InstrumentationConfigBuilder};
pub use data::{ClassData, HitId, JumpData, LineData, ProjectData, SwitchData};
pub use filters::{FilterChain, FilterTable};
pub use instrument::Instrumenter;
pub use io::{load, save, LoadReport, CURRENT_PROTOCOL_VERSION, MIN_PROTOCOL_VERSION};
pub use result::{ContarError, ContarResult};
pub use runtime::{HitsArray, LocalHits, SaveHook, Simulator};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::class::*;
    pub use super::config::*;
    pub use super::data::*;
    pub use super::filters::{FilterChain, FilterTable};
    pub use super::instrument::Instrumenter;
    pub use super::io::{load, save, LoadReport, CURRENT_PROTOCOL_VERSION, MIN_PROTOCOL_VERSION};
    pub use super::result::{ContarError, ContarResult};
    pub use super::runtime::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;

        #[test]
        fn test_unsupported_version_display() {
            let err = ContarError::UnsupportedVersion { version: 9 };
            assert!(err.to_string().contains('9'));
        }

        #[test]
        fn test_already_instrumented_display() {
            let err = ContarError::AlreadyInstrumented {
                class: "a.B".to_string(),
            };
            assert!(err.to_string().contains("a.B"));
        }
    }

    #[test]
    fn test_protocol_versions() {
        assert_eq!(MIN_PROTOCOL_VERSION, 3);
        assert_eq!(CURRENT_PROTOCOL_VERSION, 4);
        assert_eq!(InstrumentationConfig::default().protocol_version, CURRENT_PROTOCOL_VERSION);
    }
}
