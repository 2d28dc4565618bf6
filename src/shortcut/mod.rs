pub mod conflict;
pub mod global;
pub mod keys;
pub mod reserved;

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::profile::{HotkeyId, Profile, ProfileId};
use keys::HotkeyCombo;

/// OS-level global hotkey capability.
///
/// Calls must come from the thread that receives the hotkey events.
pub trait HotkeyBackend {
    /// Returns false when the OS refuses the combination (typically because
    /// another application already owns it).
    fn register(&mut self, id: HotkeyId, combo: HotkeyCombo) -> bool;
    fn unregister(&mut self, id: HotkeyId);
}

/// Accepts everything. Used for offline profile edits where the running
/// daemon owns the real bindings.
#[derive(Debug, Default)]
pub struct NoopBackend;

impl HotkeyBackend for NoopBackend {
    fn register(&mut self, _id: HotkeyId, _combo: HotkeyCombo) -> bool {
        true
    }

    fn unregister(&mut self, _id: HotkeyId) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Another profile earlier in the list already holds the combination
    Conflict { with: String },
    Reserved(String),
    Unsupported(String),
    /// The OS refused the registration
    Refused,
}

/// A profile that could not be bound during `register_all`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub profile: String,
    pub combo: HotkeyCombo,
    pub reason: FailureReason,
}

impl fmt::Display for RegistrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FailureReason::Conflict { with } => write!(
                f,
                "{} ({}): already used by {}",
                self.profile, self.combo, with
            ),
            FailureReason::Reserved(reason) | FailureReason::Unsupported(reason) => {
                write!(f, "{}: {}", self.profile, reason)
            }
            FailureReason::Refused => write!(
                f,
                "{} ({}): failed to register hotkey, it may be in use by another application",
                self.profile, self.combo
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebindOutcome {
    /// The profile now holds the new combination under this id
    Bound(HotkeyId),
    /// The profile's hotkey was removed
    Cleared,
    /// The profile already held this combination; nothing changed
    Unchanged,
    /// Another profile owns the combination; no OS call was made
    Conflict { profile: String },
    Reserved { reason: String },
    /// The combination cannot be registered at all (no key, unknown key)
    Unsupported { reason: String },
    /// The OS refused the new combination. `restored` tells whether the
    /// previous binding was registered again.
    RegistrationFailed { restored: bool },
}

impl RebindOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Bound(_) | Self::Cleared | Self::Unchanged)
    }

    /// User-facing explanation for the failure variants
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Conflict { profile } => Some(format!(
                "This hotkey is already used by {}. Please choose a different one.",
                profile
            )),
            Self::Reserved { reason } | Self::Unsupported { reason } => Some(reason.clone()),
            Self::RegistrationFailed { restored: true } => Some(
                "Failed to register hotkey. It may be in use by another application. The previous hotkey was kept."
                    .to_string(),
            ),
            Self::RegistrationFailed { restored: false } => Some(
                "Failed to register hotkey. It may be in use by another application.".to_string(),
            ),
            _ => None,
        }
    }
}

/// Hands out hotkey ids and keeps the id -> profile map in step with the OS.
///
/// Ids start at 1 and are never reused within a process, so a late OS event
/// for a retired id cannot resolve to a different profile.
pub struct HotkeyRegistry<B: HotkeyBackend> {
    backend: B,
    next_id: u32,
    bindings: HashMap<HotkeyId, ProfileId>,
}

impl<B: HotkeyBackend> HotkeyRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            next_id: 1,
            bindings: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn bound_count(&self) -> usize {
        self.bindings.len()
    }

    fn allocate(&mut self) -> HotkeyId {
        let id = HotkeyId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Try to bind `profile`'s current combination under a fresh id.
    fn bind(&mut self, profile: &mut Profile, combo: HotkeyCombo) -> Option<HotkeyId> {
        let id = self.allocate();
        if !self.backend.register(id, combo) {
            return None;
        }
        profile.hotkey_id = Some(id);
        self.bindings.insert(id, profile.id());
        Some(id)
    }

    /// Bind every configured, currently unbound profile. Failures are
    /// collected and the rest carry on.
    pub fn register_all(&mut self, profiles: &mut [Profile]) -> Vec<RegistrationFailure> {
        let mut failures = Vec::new();

        for i in 0..profiles.len() {
            let combo = profiles[i].combo();
            if !combo.is_configured() || profiles[i].is_bound() {
                continue;
            }

            let earlier_owner = profiles[..i]
                .iter()
                .find(|p| p.combo() == combo)
                .map(|p| p.name.clone());

            let reason = if let Some(with) = earlier_owner {
                Some(FailureReason::Conflict { with })
            } else if let Err(reason) = combo.check_registrable() {
                Some(FailureReason::Unsupported(reason))
            } else if let Err(reason) = reserved::check_reserved_shortcut(combo) {
                Some(FailureReason::Reserved(reason))
            } else if self.bind(&mut profiles[i], combo).is_none() {
                Some(FailureReason::Refused)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    let failure = RegistrationFailure {
                        profile: profiles[i].name.clone(),
                        combo,
                        reason,
                    };
                    warn!("[register_all] {}", failure);
                    failures.push(failure);
                }
                None => debug!(
                    "[register_all] Bound {} to {} ({:?})",
                    profiles[i].name, combo, profiles[i].hotkey_id
                ),
            }
        }

        info!(
            "[register_all] {} hotkey(s) bound, {} failed",
            self.bindings.len(),
            failures.len()
        );
        failures
    }

    /// Move the profile at `index` to `combo`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn rebind(&mut self, profiles: &mut [Profile], index: usize, combo: HotkeyCombo) -> RebindOutcome {
        let target = profiles[index].id();

        if let Some(owner) = conflict::find_conflict(profiles, target, combo) {
            warn!("[rebind] {} is already used by {}", combo, owner.name);
            return RebindOutcome::Conflict { profile: owner.name.clone() };
        }
        if combo.is_configured() {
            if let Err(reason) = combo.check_registrable() {
                warn!("[rebind] {}", reason);
                return RebindOutcome::Unsupported { reason };
            }
            if let Err(reason) = reserved::check_reserved_shortcut(combo) {
                warn!("[rebind] {}", reason);
                return RebindOutcome::Reserved { reason };
            }
        }

        let profile = &mut profiles[index];
        let previous = profile.combo();
        if previous == combo && (profile.is_bound() || !combo.is_configured()) {
            return RebindOutcome::Unchanged;
        }

        let had_binding = profile.is_bound();
        self.unbind(profile);

        if !combo.is_configured() {
            profile.set_combo(combo);
            info!("[rebind] Cleared hotkey for {}", profile.name);
            return RebindOutcome::Cleared;
        }

        if let Some(id) = self.bind(profile, combo) {
            profile.set_combo(combo);
            info!("[rebind] {} -> {} ({})", profile.name, combo, id);
            return RebindOutcome::Bound(id);
        }

        warn!("[rebind] OS refused {} for {}", combo, profile.name);
        let restored = had_binding && self.bind(profile, previous).is_some();
        if had_binding && !restored {
            warn!("[rebind] Could not restore {} for {}", previous, profile.name);
        }
        RebindOutcome::RegistrationFailed { restored }
    }

    /// Drop the profile's OS binding. No-op when it has none.
    pub fn unbind(&mut self, profile: &mut Profile) {
        if let Some(id) = profile.hotkey_id.take() {
            self.backend.unregister(id);
            self.bindings.remove(&id);
            debug!("[unbind] Released {} from {}", id, profile.name);
        }
    }

    /// Release every binding, including any whose profile is no longer in
    /// `profiles`.
    pub fn unbind_all(&mut self, profiles: &mut [Profile]) {
        for profile in profiles.iter_mut() {
            self.unbind(profile);
        }
        for (id, _) in self.bindings.drain() {
            self.backend.unregister(id);
        }
    }

    pub fn resolve(&self, id: HotkeyId) -> Option<ProfileId> {
        self.bindings.get(&id).copied()
    }
}
