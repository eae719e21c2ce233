//! Playback session management.
//!
//! The session keeps two output slots consistent with the live device list.
//! Slot 0 is always enabled; slot 1 is only used when dual output is on.

use crate::audio::asset::{Gain, SoundAsset};
use crate::audio::channel::OutputChannel;
use crate::audio::device::{DeviceEvent, DeviceId, DeviceInfo, OutputBackend};
use crate::audio::error::{AudioError, AudioResult};
use tracing::{debug, info, warn};

/// Number of playback slots
pub const OUTPUT_SLOTS: usize = 2;

/// Primary output slot
pub const PRIMARY: usize = 0;

/// Secondary output slot, active only with dual output
pub const SECONDARY: usize = 1;

/// One output slot
///
/// While `channel` is open, `device_index` refers to an entry of the
/// session's device list.
#[derive(Default)]
pub struct PlaybackConfig {
    channel: Option<Box<dyn OutputChannel>>,
    device_index: usize,
    preferred: String,
    gain: Gain,
}

impl PlaybackConfig {
    pub fn channel(&self) -> Option<&dyn OutputChannel> {
        self.channel.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    pub fn device_index(&self) -> usize {
        self.device_index
    }

    /// Name of the device the user last picked for this slot
    pub fn preferred(&self) -> &str {
        &self.preferred
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }
}

impl std::fmt::Debug for PlaybackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackConfig")
            .field("device", &self.channel.as_ref().map(|c| c.device()))
            .field("device_index", &self.device_index)
            .field("preferred", &self.preferred)
            .field("gain", &self.gain)
            .finish()
    }
}

/// Outcome of [`PlaybackSessionManager::play`]
#[derive(Debug, Default)]
pub struct PlayReport {
    /// Slots the sound was queued on
    pub played: Vec<usize>,
    /// Slots that failed, with the reason
    pub failures: Vec<(usize, AudioError)>,
}

impl PlayReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Coordinates the output slots against the device list
pub struct PlaybackSessionManager {
    backend: Box<dyn OutputBackend>,
    devices: Vec<DeviceInfo>,
    slots: [PlaybackConfig; OUTPUT_SLOTS],
    dual_output: bool,
    can_sleep: bool,
}

impl PlaybackSessionManager {
    /// Create a session with no devices and both slots closed
    ///
    /// Devices are fed in through [`PlaybackSessionManager::on_device_added`].
    pub fn new(backend: Box<dyn OutputBackend>) -> Self {
        Self {
            backend,
            devices: Vec::new(),
            slots: Default::default(),
            dual_output: false,
            can_sleep: true,
        }
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// # Panics
    /// Panics if `slot` is not below [`OUTPUT_SLOTS`].
    pub fn slot(&self, slot: usize) -> &PlaybackConfig {
        assert!(slot < OUTPUT_SLOTS, "playback slot {slot} out of range");
        &self.slots[slot]
    }

    pub fn dual_output(&self) -> bool {
        self.dual_output
    }

    pub fn backend_mut(&mut self) -> &mut dyn OutputBackend {
        self.backend.as_mut()
    }

    fn is_enabled(&self, slot: usize) -> bool {
        slot == PRIMARY || self.dual_output
    }

    /// Record a new device
    ///
    /// Every enabled slot that prefers this device, or has no open channel,
    /// is moved onto it and reopened.
    pub fn on_device_added(&mut self, device: DeviceInfo) {
        info!("Device added: {}", device.name);
        self.devices.push(device);
        let index = self.devices.len() - 1;

        for slot in 0..OUTPUT_SLOTS {
            if !self.is_enabled(slot) {
                continue;
            }
            let config = &mut self.slots[slot];
            if config.preferred == self.devices[index].name || config.channel.is_none() {
                config.device_index = index;
                if let Err(e) = self.reset_channel(slot, false) {
                    warn!("Failed to open slot {} on new device: {}", slot, e);
                }
            }
        }
    }

    /// Forget a device
    ///
    /// Slot indices are repaired before the device leaves the list, channels
    /// on the removed device are closed, and enabled slots left without a
    /// channel are reopened on whatever device their index now refers to.
    pub fn on_device_removed(&mut self, id: DeviceId) {
        let Some(pos) = self.devices.iter().position(|device| device.id == id) else {
            debug!("Ignoring removal of unknown device {:?}", id);
            return;
        };
        info!("Device removed: {}", self.devices[pos].name);

        let remaining = self.devices.len() - 1;
        for config in &mut self.slots {
            if config.channel.as_ref().is_some_and(|c| c.device() == id) {
                config.channel = None;
            }
            if config.device_index == pos {
                config.device_index = pos.min(remaining.saturating_sub(1));
            } else if config.device_index > pos {
                config.device_index -= 1;
            }
        }
        self.devices.remove(pos);

        if self.devices.is_empty() {
            return;
        }
        for slot in 0..OUTPUT_SLOTS {
            if self.is_enabled(slot) && !self.slots[slot].is_open() {
                if let Err(e) = self.reset_channel(slot, false) {
                    warn!("Failed to reopen slot {}: {}", slot, e);
                }
            }
        }
    }

    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Added(device) => self.on_device_added(device),
            DeviceEvent::Removed(id) => self.on_device_removed(id),
        }
    }

    /// Close and reopen a slot's channel on its current device index
    ///
    /// An index past the end of the list is clamped to the last device. With
    /// `make_preferred` the device also becomes the slot's preferred device.
    ///
    /// # Errors
    /// - `AudioError::DeviceNotFound` if no devices are available
    /// - any error from the backend while opening the channel
    pub fn reset_channel(&mut self, slot: usize, make_preferred: bool) -> AudioResult<()> {
        assert!(slot < OUTPUT_SLOTS, "playback slot {slot} out of range");
        let config = &mut self.slots[slot];
        config.channel = None;

        if self.devices.is_empty() {
            return Err(AudioError::DeviceNotFound);
        }
        config.device_index = config.device_index.min(self.devices.len() - 1);
        let device = &self.devices[config.device_index];

        let mut channel = self.backend.open(device)?;
        channel.set_gain(config.gain);
        config.channel = Some(channel);
        if make_preferred {
            config.preferred = device.name.clone();
        }

        info!("Slot {} playing on {}", slot, device.name);
        Ok(())
    }

    /// Move a slot onto the device at `index` and remember it as preferred
    pub fn select_device(&mut self, slot: usize, index: usize) -> AudioResult<()> {
        assert!(slot < OUTPUT_SLOTS, "playback slot {slot} out of range");
        if index >= self.devices.len() {
            return Err(AudioError::DeviceIndexOutOfRange {
                index,
                count: self.devices.len(),
            });
        }
        self.slots[slot].device_index = index;
        self.reset_channel(slot, true)
    }

    /// Enable or disable the secondary slot
    pub fn set_dual_output(&mut self, enabled: bool) -> AudioResult<()> {
        self.dual_output = enabled;
        if !enabled {
            self.slots[SECONDARY].channel = None;
            return Ok(());
        }
        if self.slots[SECONDARY].is_open() {
            return Ok(());
        }

        // Start the secondary slot on the preferred device when it is present.
        let preferred = &self.slots[SECONDARY].preferred;
        if let Some(index) = self.devices.iter().position(|d| &d.name == preferred) {
            self.slots[SECONDARY].device_index = index;
        }
        self.reset_channel(SECONDARY, false)
    }

    pub fn set_slot_gain(&mut self, slot: usize, gain: Gain) {
        assert!(slot < OUTPUT_SLOTS, "playback slot {slot} out of range");
        let config = &mut self.slots[slot];
        config.gain = gain;
        if let Some(channel) = config.channel.as_mut() {
            channel.set_gain(gain);
        }
    }

    /// Set the preferred device name without touching the channel
    ///
    /// If the device is already enumerated the slot index is pointed at it,
    /// so the next reopen lands there.
    pub fn set_preferred(&mut self, slot: usize, name: impl Into<String>) {
        assert!(slot < OUTPUT_SLOTS, "playback slot {slot} out of range");
        let name = name.into();
        if let Some(index) = self.devices.iter().position(|d| d.name == name) {
            self.slots[slot].device_index = index;
        }
        self.slots[slot].preferred = name;
    }

    /// Whether the secondary slot should receive sounds
    fn secondary_playable(&self) -> bool {
        let secondary = &self.slots[SECONDARY];
        self.dual_output
            && secondary.is_open()
            && secondary.device_index != self.slots[PRIMARY].device_index
    }

    /// Play a sound on every enabled slot
    ///
    /// Each slot uses the sound's gain override of the same index. A failing
    /// slot does not stop the other one. With `ptt_armed` the session stays
    /// awake until every queue drains.
    pub fn play(&mut self, asset: &SoundAsset, ptt_armed: bool) -> PlayReport {
        let mut report = PlayReport::default();
        let secondary = self.secondary_playable();

        for slot in 0..OUTPUT_SLOTS {
            if slot == SECONDARY && !secondary {
                continue;
            }
            let config = &mut self.slots[slot];
            if config.device_index >= self.devices.len() {
                continue;
            }
            let Some(channel) = config.channel.as_deref_mut() else {
                continue;
            };

            match asset.play(channel, slot) {
                Ok(()) => report.played.push(slot),
                Err(e) => {
                    warn!("Failed to play {} on slot {}: {}", asset.name(), slot, e);
                    report.failures.push((slot, e));
                }
            }
        }

        if ptt_armed {
            self.can_sleep = false;
        }
        report
    }

    /// Silence every open channel, keeping the devices open
    pub fn stop(&mut self) {
        for config in &mut self.slots {
            if let Some(channel) = config.channel.as_mut() {
                channel.pause();
                channel.clear();
            }
        }
        debug!("Playback stopped");
    }

    /// Whether any open channel still has queued audio
    pub fn is_active(&self) -> bool {
        self.slots
            .iter()
            .filter_map(PlaybackConfig::channel)
            .any(|channel| channel.is_active())
    }

    /// Whether the polling loop may block waiting for events
    pub fn can_sleep(&self) -> bool {
        self.can_sleep
    }

    /// Reopen every enabled slot whose stream has died
    ///
    /// Returns the number of slots that were reopened.
    pub fn recover_failed_channels(&mut self) -> usize {
        let mut reopened = 0;
        for slot in 0..OUTPUT_SLOTS {
            let failed = self.slots[slot]
                .channel
                .as_ref()
                .is_some_and(|channel| channel.is_failed());
            if !failed {
                continue;
            }
            if !self.is_enabled(slot) {
                self.slots[slot].channel = None;
                continue;
            }

            warn!("Output stream on slot {} failed, reopening", slot);
            match self.reset_channel(slot, false) {
                Ok(()) => reopened += 1,
                Err(e) => warn!("Failed to reopen slot {}: {}", slot, e),
            }
        }
        reopened
    }

    /// Allow sleeping again once all queues have drained
    pub fn refresh_sleep_state(&mut self) {
        if !self.can_sleep && !self.is_active() {
            self.can_sleep = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::SoundFormat;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        opened: Vec<String>,
        gains: Vec<f32>,
    }

    struct FakeChannel {
        device: DeviceId,
        queued: usize,
        log: Rc<RefCell<Log>>,
    }

    impl OutputChannel for FakeChannel {
        fn device(&self) -> DeviceId {
            self.device
        }
        fn pause(&mut self) {}
        fn clear(&mut self) {
            self.queued = 0;
        }
        fn set_format(&mut self, _format: SoundFormat) -> AudioResult<()> {
            Ok(())
        }
        fn set_gain(&mut self, gain: Gain) {
            self.log.borrow_mut().gains.push(gain.get());
        }
        fn set_gain_override(&mut self, _gain: Option<Gain>) {}
        fn enqueue(&mut self, samples: &[i16]) -> AudioResult<()> {
            self.queued += samples.len();
            Ok(())
        }
        fn resume(&mut self) -> AudioResult<()> {
            Ok(())
        }
        fn queued(&self) -> usize {
            self.queued
        }
    }

    struct FakeBackend {
        log: Rc<RefCell<Log>>,
    }

    impl OutputBackend for FakeBackend {
        fn output_devices(&mut self) -> AudioResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn open(&mut self, device: &DeviceInfo) -> AudioResult<Box<dyn OutputChannel>> {
            self.log.borrow_mut().opened.push(device.name.clone());
            Ok(Box::new(FakeChannel {
                device: device.id,
                queued: 0,
                log: Rc::clone(&self.log),
            }))
        }
    }

    fn session() -> (PlaybackSessionManager, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let backend = FakeBackend {
            log: Rc::clone(&log),
        };
        (PlaybackSessionManager::new(Box::new(backend)), log)
    }

    fn device(id: u32, name: &str) -> DeviceInfo {
        DeviceInfo {
            id: DeviceId(id),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_first_device_opens_primary() {
        let (mut session, log) = session();
        session.on_device_added(device(0, "Speakers"));

        assert!(session.slot(PRIMARY).is_open());
        assert!(!session.slot(SECONDARY).is_open());
        assert_eq!(log.borrow().opened, vec!["Speakers"]);
    }

    #[test]
    fn test_preferred_device_reclaims_slot() {
        let (mut session, log) = session();
        session.set_preferred(PRIMARY, "Headset");
        session.on_device_added(device(0, "Speakers"));
        session.on_device_added(device(1, "Headset"));

        assert_eq!(session.slot(PRIMARY).device_index(), 1);
        assert_eq!(log.borrow().opened, vec!["Speakers", "Headset"]);
    }

    #[test]
    fn test_removal_of_open_device_reopens() {
        let (mut session, log) = session();
        session.on_device_added(device(0, "Speakers"));
        session.on_device_added(device(1, "Headset"));
        session.select_device(PRIMARY, 1).unwrap();

        session.on_device_removed(DeviceId(1));
        assert_eq!(session.devices().len(), 1);
        assert_eq!(session.slot(PRIMARY).device_index(), 0);
        assert_eq!(
            session.slot(PRIMARY).channel().map(|c| c.device()),
            Some(DeviceId(0))
        );
        assert_eq!(session.slot(PRIMARY).preferred(), "Headset");
        assert_eq!(log.borrow().opened.last().map(String::as_str), Some("Speakers"));
    }

    #[test]
    fn test_removal_of_last_device_closes() {
        let (mut session, _log) = session();
        session.on_device_added(device(0, "Speakers"));
        session.on_device_removed(DeviceId(0));

        assert!(session.devices().is_empty());
        assert!(!session.slot(PRIMARY).is_open());
        assert_eq!(session.slot(PRIMARY).device_index(), 0);
    }

    #[test]
    fn test_unknown_removal_is_ignored() {
        let (mut session, _log) = session();
        session.on_device_added(device(0, "Speakers"));
        session.on_device_removed(DeviceId(42));
        assert_eq!(session.devices().len(), 1);
    }

    #[test]
    fn test_slot_gain_reaches_channel() {
        let (mut session, log) = session();
        session.set_slot_gain(PRIMARY, Gain::new(0.5).unwrap());
        session.on_device_added(device(0, "Speakers"));
        session.set_slot_gain(PRIMARY, Gain::new(1.5).unwrap());

        assert_eq!(log.borrow().gains, vec![0.5, 1.5]);
    }

    #[test]
    fn test_dual_output_toggle() {
        let (mut session, _log) = session();
        session.on_device_added(device(0, "Speakers"));
        session.on_device_added(device(1, "Cable"));
        session.set_preferred(SECONDARY, "Cable");

        session.set_dual_output(true).unwrap();
        assert!(session.slot(SECONDARY).is_open());
        assert_eq!(session.slot(SECONDARY).device_index(), 1);

        session.set_dual_output(false).unwrap();
        assert!(!session.slot(SECONDARY).is_open());
    }

    #[test]
    fn test_select_device_out_of_range() {
        let (mut session, _log) = session();
        session.on_device_added(device(0, "Speakers"));
        assert!(matches!(
            session.select_device(PRIMARY, 3),
            Err(AudioError::DeviceIndexOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_reset_without_devices_fails() {
        let (mut session, _log) = session();
        assert!(matches!(
            session.reset_channel(PRIMARY, false),
            Err(AudioError::DeviceNotFound)
        ));
    }

    #[test]
    #[should_panic]
    fn test_slot_out_of_range_panics() {
        let (session, _log) = session();
        session.slot(OUTPUT_SLOTS);
    }
}
