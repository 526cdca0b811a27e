//! In-memory import session.
//!
//! Holds the add-ons discovered by the last import together with the
//! selection state a front end renders.

use std::cmp::Ordering;

use super::manifest::compare_versions;
use super::types::AddonInfo;

/// A discovered add-on with its UI state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    /// Extracted metadata.
    pub info: AddonInfo,
    /// Marked for installation.
    pub selected: bool,
    /// Details expanded in the list.
    pub show_expanded: bool,
}

/// Discovered add-ons and their selection state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Entries in discovery order.
    entries: Vec<SessionEntry>,
    /// Host Blender version for compatibility checks.
    host_version: Option<Vec<u32>>,
}

impl Session {
    /// Creates an empty session for a host at `host_version`.
    ///
    /// With no host version every add-on counts as compatible.
    #[must_use]
    pub fn new(host_version: Option<Vec<u32>>) -> Self {
        Self {
            entries: Vec::new(),
            host_version,
        }
    }

    /// Replaces the entries with freshly discovered add-ons.
    pub fn replace(&mut self, addons: Vec<AddonInfo>) {
        self.entries = addons
            .into_iter()
            .map(|info| SessionEntry {
                info,
                selected: false,
                show_expanded: false,
            })
            .collect();
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in discovery order.
    #[must_use]
    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Host version used for compatibility checks.
    #[must_use]
    pub fn host_version(&self) -> Option<&[u32]> {
        self.host_version.as_deref()
    }

    /// Returns true if the add-on can run on the host.
    #[must_use]
    pub fn is_compatible(&self, info: &AddonInfo) -> bool {
        fits_host(self.host_version.as_deref(), info)
    }

    /// Flips the expanded flag of the entry with `key`.
    pub fn toggle_expanded(&mut self, key: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.info.key() == key) {
            Some(entry) => {
                entry.show_expanded = !entry.show_expanded;
                true
            }
            None => false,
        }
    }

    /// Flips the selection of the entry with `key`.
    ///
    /// Incompatible entries cannot be selected; returns false for them.
    pub fn toggle_selected(&mut self, key: &str) -> bool {
        let Some(index) = self.entries.iter().position(|e| e.info.key() == key) else {
            return false;
        };
        if !self.is_compatible(&self.entries[index].info) {
            return false;
        }

        let entry = &mut self.entries[index];
        entry.selected = !entry.selected;
        true
    }

    /// Selects the first compatible entry whose name matches `name`.
    pub fn select_by_name(&mut self, name: &str) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .position(|e| e.info.name().eq_ignore_ascii_case(name) && self.is_compatible(&e.info))
        else {
            return false;
        };

        self.entries[index].selected = true;
        true
    }

    /// Sets the selection of every compatible entry.
    pub fn select_all(&mut self, selected: bool) {
        let host = self.host_version.as_deref();
        for entry in &mut self.entries {
            if fits_host(host, &entry.info) {
                entry.selected = selected;
            }
        }
    }

    /// Iterates over the selected add-ons.
    pub fn selected(&self) -> impl Iterator<Item = &AddonInfo> {
        self.entries.iter().filter(|e| e.selected).map(|e| &e.info)
    }

    /// Number of selected entries.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.selected).count()
    }
}

fn fits_host(host: Option<&[u32]>, info: &AddonInfo) -> bool {
    host.is_none_or(|host| compare_versions(&info.blender(), host) != Ordering::Greater)
}
