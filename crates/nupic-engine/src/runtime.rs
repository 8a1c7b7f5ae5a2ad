// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Process lifecycle: the init/shutdown gate every network passes through.
//!
//! A [`NupicRuntime`] owns the region factory, the link policy table and the
//! set of live networks. Tests build isolated instances with
//! [`NupicRuntime::new`]; applications may share [`NupicRuntime::global`].
//!
//! ```text
//! Uninitialized --init()--> Initialized --shutdown()--> Uninitialized
//!                               |  ^
//!                 register_network  unregister_network
//! ```
//! `shutdown()` is refused while any network is still registered.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashSet;
use nupic_config::EngineConfig;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::factory::RegionImplFactory;
use crate::link_policy::LinkPolicyFactory;
use crate::{EngineError, EngineResult};

/// OS facilities set up once per init/shutdown cycle
pub trait Platform: Send {
    fn initialize(&mut self) -> EngineResult<()>;

    fn shutdown(&mut self) -> EngineResult<()>;

    fn platform_name(&self) -> &'static str;
}

/// Desktop/server platform; nothing to set up beyond the standard library
#[derive(Debug, Clone, Copy, Default)]
pub struct StdPlatform;

impl Platform for StdPlatform {
    fn initialize(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn platform_name(&self) -> &'static str {
        "Standard (Desktop/Server)"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(u64);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "network#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct LifecycleState {
    initialized: bool,
    live_networks: AHashSet<NetworkId>,
}

static GLOBAL: Lazy<Arc<NupicRuntime>> =
    Lazy::new(|| Arc::new(NupicRuntime::new(EngineConfig::default(), Box::new(StdPlatform))));

pub struct NupicRuntime {
    config: EngineConfig,
    state: Mutex<LifecycleState>,
    platform: Mutex<Box<dyn Platform>>,
    factory: Mutex<RegionImplFactory>,
    link_policies: RwLock<LinkPolicyFactory>,
    next_network_id: AtomicU64,
}

impl NupicRuntime {
    pub fn new(config: EngineConfig, platform: Box<dyn Platform>) -> Self {
        let factory = RegionImplFactory::new(&config.runtime);
        Self {
            config,
            state: Mutex::new(LifecycleState::default()),
            platform: Mutex::new(platform),
            factory: Mutex::new(factory),
            link_policies: RwLock::new(LinkPolicyFactory::new()),
            next_network_id: AtomicU64::new(0),
        }
    }

    /// Process-wide runtime with default configuration
    pub fn global() -> Arc<NupicRuntime> {
        Arc::clone(&GLOBAL)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Idempotent: platform setup runs once per transition to Initialized
    pub fn init(&self) -> EngineResult<()> {
        let mut state = self.state.lock();
        if state.initialized {
            debug!(target: "nupic-engine", "runtime already initialized");
            return Ok(());
        }
        let mut platform = self.platform.lock();
        platform.initialize()?;
        state.initialized = true;
        info!(target: "nupic-engine", "runtime initialized on {}", platform.platform_name());
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Release factory caches and tear down the platform
    ///
    /// Fails with `NetworksStillAlive` (state unchanged) while any network
    /// is registered.
    pub fn shutdown(&self) -> EngineResult<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(EngineError::NotInitialized);
        }
        let live = state.live_networks.len();
        if live > 0 {
            warn!(target: "nupic-engine", "shutdown refused: {} network(s) still alive", live);
            return Err(EngineError::NetworksStillAlive { count: live });
        }

        self.factory.lock().cleanup()?;
        self.platform.lock().shutdown()?;
        state.initialized = false;
        info!(target: "nupic-engine", "runtime shut down");
        Ok(())
    }

    pub(crate) fn register_network(&self) -> EngineResult<NetworkId> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(EngineError::NotInitialized);
        }
        let id = NetworkId(self.next_network_id.fetch_add(1, Ordering::Relaxed));
        state.live_networks.insert(id);
        debug!(target: "nupic-engine", "registered {} ({} live)", id, state.live_networks.len());
        Ok(id)
    }

    pub(crate) fn unregister_network(&self, id: NetworkId) {
        let mut state = self.state.lock();
        if state.live_networks.remove(&id) {
            debug!(target: "nupic-engine", "unregistered {} ({} live)", id, state.live_networks.len());
        } else {
            warn!(target: "nupic-engine", "unregistering unknown {}", id);
        }
    }

    pub fn live_network_count(&self) -> usize {
        self.state.lock().live_networks.len()
    }

    pub fn factory(&self) -> MutexGuard<'_, RegionImplFactory> {
        self.factory.lock()
    }

    pub fn link_policies(&self) -> RwLockReadGuard<'_, LinkPolicyFactory> {
        self.link_policies.read()
    }

    pub fn link_policies_mut(&self) -> RwLockWriteGuard<'_, LinkPolicyFactory> {
        self.link_policies.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingPlatform {
        setups: Arc<AtomicUsize>,
    }

    impl Platform for CountingPlatform {
        fn initialize(&mut self) -> EngineResult<()> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn shutdown(&mut self) -> EngineResult<()> {
            Ok(())
        }

        fn platform_name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let setups = Arc::new(AtomicUsize::new(0));
        let runtime = NupicRuntime::new(
            EngineConfig::default(),
            Box::new(CountingPlatform {
                setups: Arc::clone(&setups),
            }),
        );
        runtime.init().unwrap();
        runtime.init().unwrap();
        assert_eq!(setups.load(Ordering::SeqCst), 1);

        runtime.shutdown().unwrap();
        runtime.init().unwrap();
        assert_eq!(setups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registration_requires_init() {
        let runtime = NupicRuntime::new(EngineConfig::default(), Box::new(StdPlatform));
        assert!(matches!(runtime.register_network(), Err(EngineError::NotInitialized)));
        assert!(matches!(runtime.shutdown(), Err(EngineError::NotInitialized)));
    }

    #[test]
    fn test_shutdown_refused_while_networks_live() {
        let runtime = NupicRuntime::new(EngineConfig::default(), Box::new(StdPlatform));
        runtime.init().unwrap();
        let a = runtime.register_network().unwrap();
        let b = runtime.register_network().unwrap();
        assert_ne!(a, b);

        assert!(matches!(
            runtime.shutdown(),
            Err(EngineError::NetworksStillAlive { count: 2 })
        ));
        assert!(runtime.is_initialized());

        runtime.unregister_network(a);
        runtime.unregister_network(a);
        runtime.unregister_network(b);
        runtime.shutdown().unwrap();
        assert!(!runtime.is_initialized());
    }
}
