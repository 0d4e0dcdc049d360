//! Holder of the one engine a process (or a test) works with.
//!
//! Booting happens while the slot is locked, so a concurrent `get_or_boot`
//! waits and then sees the booted engine. Collaborators must therefore not
//! call back into the registry from `Node::boot`; they get the engine as an
//! argument instead.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info};

use sixsim_config::SimSettings;

use crate::collaborators::Scenario;
use crate::engine::{EngineError, SimEngine};

static GLOBAL: Lazy<EngineRegistry> = Lazy::new(EngineRegistry::new);

#[derive(Debug, Default)]
pub struct EngineRegistry {
    slot: Mutex<Option<SimEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static EngineRegistry {
        &GLOBAL
    }

    /// Returns the held engine, booting one from `settings` and `scenario`
    /// if the slot is empty. Later calls ignore their arguments.
    pub fn get_or_boot(
        &self,
        settings: SimSettings,
        scenario: &dyn Scenario,
    ) -> Result<SimEngine, EngineError> {
        self.get_or_init_with(|| SimEngine::boot(settings, scenario))
    }

    /// Like [`get_or_boot`](Self::get_or_boot) with an arbitrary constructor.
    /// A failed constructor leaves the slot empty.
    pub fn get_or_init_with(
        &self,
        init: impl FnOnce() -> Result<SimEngine, EngineError>,
    ) -> Result<SimEngine, EngineError> {
        let mut slot = self.slot.lock();
        if let Some(engine) = slot.as_ref() {
            debug!("returning existing engine");
            return Ok(engine.clone());
        }
        let engine = init()?;
        *slot = Some(engine.clone());
        Ok(engine)
    }

    /// The held engine.
    pub fn existing(&self) -> Result<SimEngine, EngineError> {
        self.slot.lock().clone().ok_or(EngineError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Destroys the held engine and empties the slot. Returns whether there
    /// was one.
    pub fn destroy(&self) -> bool {
        let engine = self.slot.lock().take();
        match engine {
            Some(engine) => {
                engine.destroy();
                info!("registry slot freed");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SimSettings {
        SimSettings::default()
    }

    #[test]
    fn existing_before_init_fails() {
        let registry = EngineRegistry::new();
        assert!(matches!(
            registry.existing(),
            Err(EngineError::NotInitialized)
        ));
        assert!(!registry.destroy());
    }

    #[test]
    fn init_is_idempotent() {
        let registry = EngineRegistry::new();
        let mut calls = 0;
        let first = registry
            .get_or_init_with(|| {
                calls += 1;
                Ok(SimEngine::new(settings()))
            })
            .unwrap();
        let second = registry
            .get_or_init_with(|| {
                calls += 1;
                Ok(SimEngine::new(settings()))
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert!(first.same_engine(&second));
        assert!(registry.existing().unwrap().same_engine(&first));
    }

    #[test]
    fn failed_init_leaves_slot_empty() {
        let registry = EngineRegistry::new();
        let err = registry.get_or_init_with(|| Err(EngineError::NotInitialized));
        assert!(err.is_err());
        assert!(!registry.is_initialized());
    }

    #[test]
    fn destroy_frees_slot() {
        let registry = EngineRegistry::new();
        let first = registry
            .get_or_init_with(|| Ok(SimEngine::new(settings())))
            .unwrap();
        assert!(registry.destroy());
        assert!(!registry.is_initialized());

        let second = registry
            .get_or_init_with(|| Ok(SimEngine::new(settings())))
            .unwrap();
        assert!(!first.same_engine(&second));
        assert_eq!(second.get_asn(), 0);
    }
}
