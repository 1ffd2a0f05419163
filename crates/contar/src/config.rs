//! Instrumentation configuration
//!
//! Built in code through [`InstrumentationConfig::builder`]; the struct is
//! serde-compatible so a host can embed it in its own settings.

use crate::class::descriptor::TOKENIZED_METHOD_ID_VERSION;
use serde::{Deserialize, Serialize};

/// Where instrumented methods keep their counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CounterStorage {
    /// Increment the class-owned array directly
    #[default]
    ClassArray,
    /// Count into a per-invocation buffer, added to the class array on exit
    MethodLocal,
}

/// Instrumentation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Counter storage strategy
    pub storage: CounterStorage,
    /// Track jumps and switches in addition to lines
    pub branch_coverage: bool,
    /// Only classes whose dotted name matches one of these are instrumented
    pub include_patterns: Vec<String>,
    /// Classes whose dotted name matches one of these are skipped
    pub exclude_patterns: Vec<String>,
    /// Classes and methods carrying one of these annotations are skipped
    pub exclude_annotations: Vec<String>,
    /// Binary protocol version used when saving
    pub protocol_version: u32,
}

impl InstrumentationConfig {
    /// Create a builder for instrumentation config
    #[must_use]
    pub fn builder() -> InstrumentationConfigBuilder {
        InstrumentationConfigBuilder::default()
    }
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            storage: CounterStorage::ClassArray,
            branch_coverage: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            exclude_annotations: Vec::new(),
            protocol_version: TOKENIZED_METHOD_ID_VERSION,
        }
    }
}

/// Builder for instrumentation configuration
#[derive(Debug)]
pub struct InstrumentationConfigBuilder {
    config: InstrumentationConfig,
}

impl Default for InstrumentationConfigBuilder {
    fn default() -> Self {
        Self {
            config: InstrumentationConfig::default(),
        }
    }
}

impl InstrumentationConfigBuilder {
    /// Set the counter storage strategy
    #[must_use]
    pub fn storage(mut self, storage: CounterStorage) -> Self {
        self.config.storage = storage;
        self
    }

    /// Enable or disable branch tracking
    #[must_use]
    pub fn branch_coverage(mut self, enabled: bool) -> Self {
        self.config.branch_coverage = enabled;
        self
    }

    /// Add an include pattern
    #[must_use]
    pub fn include(mut self, pattern: &str) -> Self {
        self.config.include_patterns.push(pattern.to_string());
        self
    }

    /// Add an exclude pattern
    #[must_use]
    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.exclude_patterns.push(pattern.to_string());
        self
    }

    /// Add an annotation descriptor that excludes classes and methods
    #[must_use]
    pub fn exclude_annotation(mut self, desc: &str) -> Self {
        self.config.exclude_annotations.push(desc.to_string());
        self
    }

    /// Set the binary protocol version
    #[must_use]
    pub fn protocol_version(mut self, version: u32) -> Self {
        self.config.protocol_version = version;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> InstrumentationConfig {
        self.config
    }
}
