// host.rs -- module host with state-handoff reload
//
// Reload is operator-driven: snapshot the live instance's state, build a
// replacement from it, and only then tear the old one down. A failed build
// gets one retry after 100ms, then the previous instance stays live.
// Reloads of the same slot are debounced.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("module {0} failed to load: {1}")]
    ModuleLoadFailed(&'static str, String),
    #[error("module {0} reload debounced")]
    ReloadDebounced(&'static str),
}

/// Minimum spacing between reloads of one slot.
pub const RELOAD_DEBOUNCE_MS: i64 = 1500;

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Lifecycle contract for a hosted component.
pub trait Module {
    /// Versioned state snapshot handed to the replacement instance.
    fn state(&self) -> Vec<u8>;
    /// Detach every hook and timer the instance owns.
    fn destruct(&mut self);
}

pub type ModuleFactory<M> = Box<dyn Fn(Option<Vec<u8>>) -> Result<M, String>>;

pub struct ModuleHost<M: Module> {
    name: &'static str,
    factory: ModuleFactory<M>,
    slot: Option<M>,
    last_reload: i64,
}

impl<M: Module> ModuleHost<M> {
    /// Build the host and load the first instance. The first load has no
    /// previous state and no previous instance to fall back to.
    pub fn load(name: &'static str, factory: ModuleFactory<M>) -> Result<Self, HostError> {
        let instance = match factory(None) {
            Ok(m) => m,
            Err(first) => {
                log::warn!("{}: first load failed ({}), retrying", name, first);
                std::thread::sleep(RETRY_DELAY);
                factory(None).map_err(|e| HostError::ModuleLoadFailed(name, e))?
            }
        };
        Ok(Self {
            name,
            factory,
            slot: Some(instance),
            last_reload: i64::MIN / 2,
        })
    }

    pub fn module(&self) -> &M {
        self.slot.as_ref().expect("module host always holds an instance")
    }

    pub fn module_mut(&mut self) -> &mut M {
        self.slot.as_mut().expect("module host always holds an instance")
    }

    /// Replace the instance, carrying its state across. The previous
    /// instance is only destructed once the replacement exists.
    pub fn reload(&mut self, now: i64) -> Result<(), HostError> {
        if now - self.last_reload < RELOAD_DEBOUNCE_MS {
            return Err(HostError::ReloadDebounced(self.name));
        }
        self.last_reload = now;

        let prev_state = self.module().state();
        let replacement = match (self.factory)(Some(prev_state.clone())) {
            Ok(m) => m,
            Err(first) => {
                log::warn!("{}: reload failed ({}), retrying", self.name, first);
                std::thread::sleep(RETRY_DELAY);
                match (self.factory)(Some(prev_state)) {
                    Ok(m) => m,
                    Err(e) => {
                        log::error!("{}: reload failed twice, keeping previous instance", self.name);
                        return Err(HostError::ModuleLoadFailed(self.name, e));
                    }
                }
            }
        };

        if let Some(mut prev) = self.slot.take() {
            prev.destruct();
        }
        self.slot = Some(replacement);
        log::info!("{}: reloaded", self.name);
        Ok(())
    }
}
