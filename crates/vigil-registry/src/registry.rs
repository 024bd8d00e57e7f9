//! # Detector Registry - Main Facade
//!
//! A name → factory table. The registry decouples *which* detectors exist
//! from *how* the dispatch engine wires them, so the detector set can be
//! configured by name and new detector types can be added without touching
//! the engine.
//!
//! ## Build Flow
//!
//! ```text
//!   build("vectordb", deps)
//!          │
//!          ▼
//!   ┌──────────────┐  not found   ┌───────────────────────┐
//!   │   lookup     │ ───────────▶ │ UnknownDetector       │
//!   └──────┬───────┘              └───────────────────────┘
//!          ▼
//!   ┌──────────────┐  gaps        ┌───────────────────────┐
//!   │ capabilities │ ───────────▶ │ MissingDependency     │
//!   │  vs deps     │              │ (lists every gap)     │
//!   └──────┬───────┘              └───────────────────────┘
//!          ▼
//!   ┌──────────────┐  rejects     ┌───────────────────────┐
//!   │   factory    │ ───────────▶ │ Construction          │
//!   └──────┬───────┘              └───────────────────────┘
//!          ▼
//!    Box<dyn Detector>
//! ```
//!
//! ## Security Notes
//!
//! - Registration is explicit and fails on duplicates; there is no
//!   process-wide implicit table that a late registration could overwrite.
//! - A factory only ever sees the collaborators it declared.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::builtin;
use crate::collaborators::{Embedder, ReferenceIndex};
use crate::detector::Detector;
use crate::models::{Capability, DetectorConfig, Dependencies, RegistryError, Result};

/// Constructor closure stored for each registered detector.
pub type DetectorFactory = Box<dyn Fn(BuildContext) -> Result<Box<dyn Detector>> + Send + Sync>;

/// The collaborators handed to a factory.
///
/// Holds exactly the capabilities the descriptor declared. Asking for one
/// that was not declared yields [`RegistryError::MissingDependency`].
pub struct BuildContext {
    name: String,
    config: Option<DetectorConfig>,
    index: Option<Arc<dyn ReferenceIndex>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl BuildContext {
    /// Registry name of the detector being built.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The detector's configuration table.
    ///
    /// # Errors
    ///
    /// [`RegistryError::MissingDependency`] if `Config` was not declared.
    pub fn config(&self) -> Result<&DetectorConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| self.missing(Capability::Config))
    }

    /// The shared reference index.
    ///
    /// # Errors
    ///
    /// [`RegistryError::MissingDependency`] if `ReferenceIndex` was not declared.
    pub fn index(&self) -> Result<Arc<dyn ReferenceIndex>> {
        self.index
            .clone()
            .ok_or_else(|| self.missing(Capability::ReferenceIndex))
    }

    /// The shared embedder.
    ///
    /// # Errors
    ///
    /// [`RegistryError::MissingDependency`] if `Embedder` was not declared.
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        self.embedder
            .clone()
            .ok_or_else(|| self.missing(Capability::Embedder))
    }

    fn missing(&self, capability: Capability) -> RegistryError {
        RegistryError::MissingDependency {
            detector: self.name.clone(),
            missing: vec![capability],
        }
    }
}

/// A registry entry: name, declared capabilities and factory.
pub struct DetectorDescriptor {
    name: String,
    capabilities: BTreeSet<Capability>,
    factory: DetectorFactory,
}

impl DetectorDescriptor {
    /// Creates a descriptor.
    pub fn new<F>(name: impl Into<String>, capabilities: &[Capability], factory: F) -> Self
    where
        F: Fn(BuildContext) -> Result<Box<dyn Detector>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            capabilities: capabilities.iter().copied().collect(),
            factory: Box::new(factory),
        }
    }

    /// Registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared capabilities.
    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Returns true if the detector declares `capability`.
    pub fn requires(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

impl fmt::Debug for DetectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorDescriptor")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// The detector registry.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vigil_registry::{
///     Capability, Dependencies, DetectorConfig, DetectorRegistry, MemoryIndex,
/// };
///
/// let registry = DetectorRegistry::with_builtins();
/// assert!(registry.contains("vectordb"));
///
/// let deps = Dependencies::new()
///     .with_config(DetectorConfig::with_threshold(0.4))
///     .with_index(Arc::new(MemoryIndex::new(5)));
/// let detector = registry.build("vectordb", &deps).unwrap();
/// assert_eq!(detector.name(), "scanner:vectordb");
/// ```
#[derive(Debug, Default)]
pub struct DetectorRegistry {
    /// Descriptors in registration order.
    detectors: Vec<DetectorDescriptor>,
}

impl DetectorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-loaded with the built-in adapters
    /// (`vectordb`, `similarity`).
    pub fn with_builtins() -> Self {
        Self {
            detectors: builtin::descriptors(),
        }
    }

    /// Registers a detector factory.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateDetector`] if `name` is taken.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        capabilities: &[Capability],
        factory: F,
    ) -> Result<()>
    where
        F: Fn(BuildContext) -> Result<Box<dyn Detector>> + Send + Sync + 'static,
    {
        self.insert(DetectorDescriptor::new(name, capabilities, factory))
    }

    /// Registers a prepared descriptor.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateDetector`] if the name is taken.
    pub fn insert(&mut self, descriptor: DetectorDescriptor) -> Result<()> {
        if self.contains(descriptor.name()) {
            return Err(RegistryError::DuplicateDetector(descriptor.name));
        }
        debug!(
            "Registered detector '{}' requiring {:?}",
            descriptor.name, descriptor.capabilities
        );
        self.detectors.push(descriptor);
        Ok(())
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.descriptor(name).is_some()
    }

    /// Looks up a descriptor.
    pub fn descriptor(&self, name: &str) -> Option<&DetectorDescriptor> {
        self.detectors.iter().find(|d| d.name == name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Number of registered detectors.
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Builds one detector.
    ///
    /// Every declared capability must be present in `deps`; only those are
    /// passed on to the factory.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownDetector`] if `name` is not registered
    /// - [`RegistryError::MissingDependency`] listing every absent collaborator
    /// - [`RegistryError::Construction`] if the factory rejects its inputs
    pub fn build(&self, name: &str, deps: &Dependencies) -> Result<Box<dyn Detector>> {
        let descriptor = self
            .descriptor(name)
            .ok_or_else(|| RegistryError::UnknownDetector(name.to_string()))?;

        let missing: Vec<Capability> = descriptor
            .capabilities
            .iter()
            .copied()
            .filter(|c| !deps.provides(*c))
            .collect();
        if !missing.is_empty() {
            return Err(RegistryError::MissingDependency {
                detector: name.to_string(),
                missing,
            });
        }

        let context = BuildContext {
            name: name.to_string(),
            config: descriptor
                .requires(Capability::Config)
                .then(|| deps.config.clone())
                .flatten(),
            index: descriptor
                .requires(Capability::ReferenceIndex)
                .then(|| deps.index.clone())
                .flatten(),
            embedder: descriptor
                .requires(Capability::Embedder)
                .then(|| deps.embedder.clone())
                .flatten(),
        };

        let detector = (descriptor.factory)(context)?;
        info!("Loaded detector '{}' as {}", name, detector.name());
        Ok(detector)
    }

    /// Builds a list of detectors in the given order.
    ///
    /// `deps_for` supplies the dependencies for each name, so every detector
    /// can get its own configuration table while sharing collaborators.
    ///
    /// # Errors
    ///
    /// Stops at the first [`RegistryError`].
    pub fn build_all<S, F>(&self, names: &[S], mut deps_for: F) -> Result<Vec<Box<dyn Detector>>>
    where
        S: AsRef<str>,
        F: FnMut(&str) -> Dependencies,
    {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.build(name, &deps_for(name))
            })
            .collect()
    }
}
