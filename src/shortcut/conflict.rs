use crate::profile::{Profile, ProfileId};

use super::keys::HotkeyCombo;

/// Returns the profile, other than `exclude`, that already holds `combo`.
///
/// Unconfigured combinations never conflict: any number of profiles may sit
/// at "Not set".
pub fn find_conflict<'a>(
    profiles: &'a [Profile],
    exclude: ProfileId,
    combo: HotkeyCombo,
) -> Option<&'a Profile> {
    if !combo.is_configured() {
        return None;
    }
    profiles
        .iter()
        .find(|p| p.id() != exclude && p.combo() == combo)
}
