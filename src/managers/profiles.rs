use thiserror::Error;
use tracing::{info, warn};

use crate::profile::{display_name, HotkeyId, Profile};
use crate::profile_store::{ProfileStore, ProfileStoreError};
use crate::shortcut::keys::HotkeyCombo;
use crate::shortcut::{HotkeyBackend, HotkeyRegistry, RebindOutcome, RegistrationFailure};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Cannot delete the last remaining profile")]
    LastProfile,
    #[error("There is no Hotkey {}", .0 + 1)]
    NoSuchProfile(usize),
    /// The change was applied in memory but could not be written to disk
    #[error(transparent)]
    Persist(#[from] ProfileStoreError),
}

/// Owns the profile list and its hotkey registry. Every edit goes through
/// here and is written to disk before returning.
pub struct ProfileManager<B: HotkeyBackend> {
    store: ProfileStore,
    registry: HotkeyRegistry<B>,
    profiles: Vec<Profile>,
}

impl<B: HotkeyBackend> ProfileManager<B> {
    /// Load the saved profiles and bind their hotkeys.
    pub fn load(store: ProfileStore, backend: B) -> (Self, Vec<RegistrationFailure>) {
        let mut manager = Self {
            profiles: store.load(),
            store,
            registry: HotkeyRegistry::new(backend),
        };
        let failures = manager.registry.register_all(&mut manager.profiles);
        info!("Loaded {} profile(s)", manager.profiles.len());
        (manager, failures)
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn registry(&self) -> &HotkeyRegistry<B> {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        self.registry.backend()
    }

    /// The profile currently bound to `id`, if any
    pub fn resolve(&self, id: HotkeyId) -> Option<&Profile> {
        let profile_id = self.registry.resolve(id)?;
        self.profiles.iter().find(|p| p.id() == profile_id)
    }

    fn check_index(&self, index: usize) -> Result<(), ProfileError> {
        if index < self.profiles.len() {
            Ok(())
        } else {
            Err(ProfileError::NoSuchProfile(index))
        }
    }

    pub fn persist(&self) -> Result<(), ProfileError> {
        self.store.save(&self.profiles).map_err(|e| {
            warn!("Failed to save profiles: {}", e);
            ProfileError::from(e)
        })
    }

    /// Append an unconfigured profile. Returns its index.
    pub fn add_profile(&mut self) -> Result<usize, ProfileError> {
        let index = self.profiles.len();
        self.profiles.push(Profile::unconfigured(display_name(index)));
        info!("Added {}", self.profiles[index].name);
        self.persist()?;
        Ok(index)
    }

    /// Remove a profile, release its hotkey and renumber the rest.
    pub fn delete_profile(&mut self, index: usize) -> Result<Profile, ProfileError> {
        self.check_index(index)?;
        if self.profiles.len() <= 1 {
            return Err(ProfileError::LastProfile);
        }

        self.registry.unbind(&mut self.profiles[index]);
        let removed = self.profiles.remove(index);
        for (i, profile) in self.profiles.iter_mut().enumerate() {
            profile.name = display_name(i);
        }
        info!("Deleted {} ({} left)", removed.name, self.profiles.len());

        self.persist()?;
        Ok(removed)
    }

    pub fn set_prompt(&mut self, index: usize, prompt: impl Into<String>) -> Result<(), ProfileError> {
        self.check_index(index)?;
        self.profiles[index].prompt = prompt.into();
        self.persist()
    }

    /// Bind the profile at `index` to `combo`. Only changes that took effect
    /// are persisted; refusals leave the file alone.
    pub fn assign_hotkey(&mut self, index: usize, combo: HotkeyCombo) -> Result<RebindOutcome, ProfileError> {
        self.check_index(index)?;
        let outcome = self.registry.rebind(&mut self.profiles, index, combo);
        if matches!(outcome, RebindOutcome::Bound(_) | RebindOutcome::Cleared) {
            self.persist()?;
        }
        Ok(outcome)
    }

    pub fn clear_hotkey(&mut self, index: usize) -> Result<RebindOutcome, ProfileError> {
        self.assign_hotkey(index, HotkeyCombo::NONE)
    }

    /// Drop every binding and start over from what is on disk.
    pub fn reload(&mut self) -> Vec<RegistrationFailure> {
        self.registry.unbind_all(&mut self.profiles);
        self.profiles = self.store.load();
        let failures = self.registry.register_all(&mut self.profiles);
        info!("Reloaded {} profile(s)", self.profiles.len());
        failures
    }

    /// Release all hotkeys. Every mutation has already been saved, and the
    /// file may hold edits made by another process since the last reload, so
    /// nothing is written here.
    pub fn shutdown(&mut self) {
        self.registry.unbind_all(&mut self.profiles);
        info!("Released all hotkeys");
    }
}
