//! Config snapshot publication and settings storage.
//!
//! The config task resolves settings into a [`PulseSequenceConfig`] and
//! publishes it whole; the pulse task copies one snapshot out per tick.
//! Both cells are generic over the raw mutex so host tests can use
//! `NoopRawMutex` while the firmware uses `CriticalSectionRawMutex`.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;
use stim_core::resolver::PulseSequenceConfig;
use stim_core::settings::{MemorySettingsStore, SettingKey, Settings, SettingsError, SettingsStore};

/// Interval between battery polls when no setting changes.
pub const BATTERY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Latest resolved config. Empty until the first successful resolve.
pub struct ConfigSlot<M: RawMutex> {
    inner: Mutex<M, Cell<Option<PulseSequenceConfig>>>,
}

impl<M: RawMutex> ConfigSlot<M> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(None)),
        }
    }

    /// Replaces the whole snapshot.
    pub fn publish(&self, cfg: PulseSequenceConfig) {
        self.inner.lock(|slot| slot.set(Some(cfg)));
    }

    /// Copies the current snapshot out.
    pub fn snapshot(&self) -> Option<PulseSequenceConfig> {
        self.inner.lock(Cell::get)
    }
}

/// Settings store plus a change notification for the config task.
pub struct SettingsCell<M: RawMutex> {
    store: Mutex<M, RefCell<MemorySettingsStore>>,
    changed: Signal<M, SettingKey>,
}

impl<M: RawMutex> SettingsCell<M> {
    pub const fn new() -> Self {
        Self {
            store: Mutex::new(RefCell::new(MemorySettingsStore::new())),
            changed: Signal::new(),
        }
    }

    /// Current selections with defaults applied.
    pub fn load(&self) -> Settings {
        self.store.lock(|store| Settings::load(&*store.borrow()))
    }

    /// Validates and stores a selection, then wakes the config task.
    pub fn update(&self, key: SettingKey, value: u8) -> Result<(), SettingsError> {
        self.store
            .lock(|store| store.borrow_mut().set(key, value))?;
        self.changed.signal(key);
        Ok(())
    }

    /// Waits for the next accepted [`update`](Self::update).
    pub async fn changed(&self) -> SettingKey {
        self.changed.wait().await
    }
}
