// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 dmcodec contributors

//! Engine handle management.
//!
//! A [`Platform`] wraps one hardware engine implementation and owns the only
//! state shared between sessions: the allocator reference count and the
//! per-domain session slots. Everything handed out is an owning guard that
//! releases its resource exactly once when dropped:
//!
//! - [`AllocatorRef`] keeps the runtime allocator initialised; the first
//!   reference initialises it and the last one shuts it down.
//! - [`EngineHandle`] closes its engine domain.
//! - [`SessionSlot`] frees the domain for the next decoder or encoder.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
};

use log::{debug, error, warn};

use crate::{
    hw::{Domain, EngineId, HardwareEngine},
    native::NativeEngine,
    Error,
};

static NATIVE: OnceLock<Arc<Platform>> = OnceLock::new();

#[derive(Debug, Default)]
struct PlatformState {
    allocator_refs: usize,
    open_engines: usize,
    decoder_active: bool,
    encoder_active: bool,
}

/// Snapshot of the resources a platform currently has outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformStats {
    pub allocator_refs: usize,
    pub open_engines: usize,
    pub decoder_active: bool,
    pub encoder_active: bool,
}

impl PlatformStats {
    /// Returns `true` when nothing is held.
    pub fn is_idle(&self) -> bool {
        *self == PlatformStats::default()
    }
}

/// A hardware engine together with its process-wide bookkeeping.
pub struct Platform {
    engine: Arc<dyn HardwareEngine>,
    state: Mutex<PlatformState>,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("engine", &self.engine.name())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Platform {
    /// Create a platform around an engine implementation.
    ///
    /// Each platform keeps its own allocator count and session slots, so two
    /// platforms must never drive the same physical engine.
    pub fn new(engine: Arc<dyn HardwareEngine>) -> Arc<Platform> {
        Arc::new(Platform {
            engine,
            state: Mutex::new(PlatformState::default()),
        })
    }

    /// The process-wide platform backed by the runtime-loaded codec engine.
    ///
    /// The runtime library is loaded on the first call; later calls return
    /// the same platform.
    pub fn native() -> Result<Arc<Platform>, Error> {
        if let Some(platform) = NATIVE.get() {
            return Ok(platform.clone());
        }
        let engine = NativeEngine::load()?;
        Ok(NATIVE
            .get_or_init(|| Platform::new(Arc::new(engine)))
            .clone())
    }

    pub(crate) fn engine(&self) -> &dyn HardwareEngine {
        self.engine.as_ref()
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn stats(&self) -> PlatformStats {
        let state = self.lock();
        PlatformStats {
            allocator_refs: state.allocator_refs,
            open_engines: state.open_engines,
            decoder_active: state.decoder_active,
            encoder_active: state.encoder_active,
        }
    }

    /// Acquire a reference to the runtime allocator, initialising it if this
    /// is the first live reference.
    pub fn acquire_allocator(self: &Arc<Self>) -> Result<AllocatorRef, Error> {
        let mut state = self.lock();
        if state.allocator_refs == 0 {
            debug!("{}: initialising runtime allocator", self.engine.name());
            self.engine.runtime_init().map_err(|reason| {
                error!("{}: runtime init failed: {}", self.engine.name(), reason);
                Error::EngineUnavailable(format!("runtime allocator: {}", reason))
            })?;
        }
        state.allocator_refs += 1;
        Ok(AllocatorRef {
            platform: self.clone(),
        })
    }

    /// Open an engine domain.
    pub fn open_engine(self: &Arc<Self>, domain: Domain) -> Result<EngineHandle, Error> {
        let id = self.engine.engine_open(domain).map_err(|code| {
            error!(
                "{}: cannot open engine '{}' (error {})",
                self.engine.name(),
                domain,
                code
            );
            Error::EngineUnavailable(format!("engine '{}' returned error {}", domain, code))
        })?;
        self.lock().open_engines += 1;
        debug!("{}: opened engine '{}' ({:?})", self.engine.name(), domain, id);
        Ok(EngineHandle {
            platform: self.clone(),
            id,
            domain,
        })
    }

    /// Claim the single session slot of a domain.
    ///
    /// At most one decoder and one encoder may be active per platform.
    pub fn claim(self: &Arc<Self>, domain: Domain) -> Result<SessionSlot, Error> {
        let mut state = self.lock();
        let active = match domain {
            Domain::Decode => &mut state.decoder_active,
            Domain::Encode => &mut state.encoder_active,
        };
        if *active {
            warn!("{}: {} session already active", self.engine.name(), domain);
            return Err(Error::EngineUnavailable(format!(
                "a {} session is already active",
                domain
            )));
        }
        *active = true;
        Ok(SessionSlot {
            platform: self.clone(),
            domain,
        })
    }
}

/// A counted reference to the runtime allocator.
///
/// Cloning acquires another reference; the allocator is shut down when the
/// last reference is dropped.
pub struct AllocatorRef {
    platform: Arc<Platform>,
}

impl AllocatorRef {
    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }
}

impl Clone for AllocatorRef {
    fn clone(&self) -> Self {
        self.platform.lock().allocator_refs += 1;
        AllocatorRef {
            platform: self.platform.clone(),
        }
    }
}

impl fmt::Debug for AllocatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocatorRef")
            .field("engine", &self.platform.engine.name())
            .finish()
    }
}

impl Drop for AllocatorRef {
    fn drop(&mut self) {
        let mut state = self.platform.lock();
        state.allocator_refs -= 1;
        if state.allocator_refs == 0 {
            debug!("{}: shutting down runtime allocator", self.platform.engine.name());
            self.platform.engine.runtime_exit();
        }
    }
}

/// An open engine domain, closed when dropped.
pub struct EngineHandle {
    platform: Arc<Platform>,
    id: EngineId,
    domain: Domain,
}

impl EngineHandle {
    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .finish()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.platform.engine.engine_close(self.id);
        self.platform.lock().open_engines -= 1;
        debug!(
            "{}: closed engine '{}' ({:?})",
            self.platform.engine.name(),
            self.domain,
            self.id
        );
    }
}

/// The claimed decode or encode slot of a platform.
pub struct SessionSlot {
    platform: Arc<Platform>,
    domain: Domain,
}

impl SessionSlot {
    pub fn domain(&self) -> Domain {
        self.domain
    }
}

impl fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSlot")
            .field("domain", &self.domain)
            .finish()
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        let mut state = self.platform.lock();
        match self.domain {
            Domain::Decode => state.decoder_active = false,
            Domain::Encode => state.encoder_active = false,
        }
    }
}
