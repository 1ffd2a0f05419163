//! Class instrumenter
//!
//! Each class goes through three steps:
//!
//! ```text
//! raw bytes ─► ClassFile ─► FilterChain ─► analysis (ids, branch map) ─► rewrite (probes) ─► raw bytes
//!                                               │
//!                                               └─► ClassData in ProjectData
//! ```
//!
//! All ids of a class are allocated before any probe is emitted, so the hits
//! array is sized exactly once. Failures never reach the caller of
//! [`Instrumenter::transform`]: the class is returned untouched and a warning
//! is logged.

mod analysis;
mod branches;
mod rewrite;

pub use branches::{BranchArm, BranchDataContainer, BranchSite};

use crate::class::ClassFile;
use crate::config::InstrumentationConfig;
use crate::data::{lock_class, ClassData, ProjectData};
use crate::filters::{FilterChain, FilterTable, FilteredClass};
use crate::result::{ContarError, ContarResult};
use analysis::{analyze_method, MethodPlan};
use rewrite::rewrite_method;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Instruments classes into a shared [`ProjectData`]
#[derive(Debug)]
pub struct Instrumenter {
    project: Arc<ProjectData>,
    config: InstrumentationConfig,
    chain: FilterChain,
}

impl Instrumenter {
    /// Create an instrumenter with the standard filter chain
    pub fn new(project: Arc<ProjectData>, config: InstrumentationConfig) -> ContarResult<Self> {
        let chain = FilterChain::standard(&config)?;
        Ok(Self::with_chain(project, config, chain))
    }

    /// Create an instrumenter with a custom filter chain
    #[must_use]
    pub fn with_chain(project: Arc<ProjectData>, config: InstrumentationConfig, chain: FilterChain) -> Self {
        Self {
            project,
            config,
            chain,
        }
    }

    /// The project classes are registered in
    #[must_use]
    pub fn project(&self) -> &Arc<ProjectData> {
        &self.project
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &InstrumentationConfig {
        &self.config
    }

    /// Class-load callback
    ///
    /// Returns the instrumented bytes, or `bytes` unchanged when the class is
    /// excluded or cannot be instrumented.
    pub fn transform(&self, name: &str, bytes: &[u8]) -> Vec<u8> {
        match self.try_transform(name, bytes) {
            Ok(Some(instrumented)) => instrumented,
            Ok(None) => bytes.to_vec(),
            Err(e) => {
                warn!(class = %name, error = %e, "class left uninstrumented");
                bytes.to_vec()
            }
        }
    }

    /// Instrument raw class bytes; `Ok(None)` means the class is excluded
    pub fn try_transform(&self, name: &str, bytes: &[u8]) -> ContarResult<Option<Vec<u8>>> {
        let class = ClassFile::from_bytes(bytes).map_err(|e| match e {
            ContarError::Codec(inner) => ContarError::malformed(name, inner.to_string()),
            other => other,
        })?;
        if class.dotted_name() != name.replace('/', ".") {
            return Err(ContarError::malformed(
                name,
                format!("bytes describe class {}", class.dotted_name()),
            ));
        }
        match self.instrument_class(&class)? {
            Some(instrumented) => instrumented.to_bytes().map(Some),
            None => Ok(None),
        }
    }

    /// Instrument a decoded class; `Ok(None)` means the class is excluded
    pub fn instrument_class(&self, class: &ClassFile) -> ContarResult<Option<ClassFile>> {
        class.validate()?;
        let dotted = class.dotted_name();
        if class.methods.iter().all(|m| m.instructions.is_empty()) {
            trace!(class = %dotted, "no code to instrument");
            return Ok(None);
        }

        let filtered = self.chain.run(class, FilterTable::new());
        if filtered.table.is_class_skipped() {
            debug!(class = %dotted, "class excluded by filters");
            return Ok(None);
        }

        let handle = self.project.get_or_create_class_data(&dotted);
        let mut data = lock_class(&handle);
        if data.is_instrumented() {
            return Err(ContarError::AlreadyInstrumented { class: dotted });
        }

        // analysis runs on a copy so a failure leaves the registry untouched
        let mut scratch = data.clone();
        let plans = match self.analyze(&mut scratch, class, &filtered) {
            Ok(plans) => plans,
            Err(e) => {
                drop(data);
                let _ = self.project.discard_if_empty(&dotted);
                return Err(e);
            }
        };
        let size = scratch.id_count();
        *data = scratch;
        drop(data);

        let mut out = class.clone();
        out.methods = class
            .methods
            .iter()
            .zip(&filtered.code)
            .zip(&plans)
            .map(|((method, code), plan)| rewrite_method(method, code, plan, self.config.storage))
            .collect();

        debug!(
            class = %dotted,
            ids = size,
            counted = plans.iter().filter(|p| matches!(p, MethodPlan::Counted { .. })).count(),
            storage = ?self.config.storage,
            "class instrumented"
        );
        Ok(Some(out))
    }

    fn analyze(
        &self,
        data: &mut ClassData,
        class: &ClassFile,
        filtered: &FilteredClass<'_>,
    ) -> ContarResult<Vec<MethodPlan>> {
        let mut plans = Vec::with_capacity(class.methods.len());
        for (method, code) in class.methods.iter().zip(&filtered.code) {
            plans.push(analyze_method(
                data,
                &class.name,
                method,
                code,
                &filtered.table,
                self.config.branch_coverage,
            )?);
        }
        let size = data.finalize_ids();
        let _ = data.create_hits_mask(size)?;
        Ok(plans)
    }
}
