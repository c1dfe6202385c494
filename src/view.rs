//! Toggle state of a retailer section.
//!
//! Flags are partitioned into exclusive groups. A group stores at most one
//! active flag index, so "at most one flag on per group" holds by
//! construction. [`ViewState::transition`] is the only way a flag changes.

use anyhow::{Result, anyhow};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeGroup {
    pub name: String,
    pub flags: Vec<String>,
    active: Option<usize>,
}

impl ModeGroup {
    pub fn new<I, S>(name: &str, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            flags: flags.into_iter().map(Into::into).collect(),
            active: None,
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active
            .and_then(|idx| self.flags.get(idx))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    groups: Vec<ModeGroup>,
}

impl ViewState {
    pub fn new(groups: Vec<ModeGroup>) -> Self {
        let mut state = Self { groups };
        state.reset();
        state
    }

    pub fn groups(&self) -> &[ModeGroup] {
        &self.groups
    }

    /// Returns the state after toggling `flag`: switching it on turns every
    /// other flag of its group off, switching it off clears the group.
    /// Other groups are left as they are.
    pub fn transition(&self, flag: &str) -> Result<ViewState> {
        let (group_idx, flag_idx) = self.locate(flag)?;
        let mut next = self.clone();
        let group = &mut next.groups[group_idx];
        group.active = if group.active == Some(flag_idx) {
            None
        } else {
            Some(flag_idx)
        };
        Ok(next)
    }

    pub fn toggle(&mut self, flag: &str) -> Result<()> {
        *self = self.transition(flag)?;
        Ok(())
    }

    pub fn is_active(&self, flag: &str) -> bool {
        self.groups.iter().any(|g| g.active() == Some(flag))
    }

    /// Active flag of the named group.
    pub fn active(&self, group: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .and_then(ModeGroup::active)
    }

    pub fn reset(&mut self) {
        for group in &mut self.groups {
            group.active = None;
        }
    }

    pub fn all_flags(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.flags.iter().map(String::as_str))
    }

    fn locate(&self, flag: &str) -> Result<(usize, usize)> {
        let wanted = flag.trim();
        self.groups
            .iter()
            .enumerate()
            .find_map(|(g, group)| {
                group
                    .flags
                    .iter()
                    .position(|f| f.eq_ignore_ascii_case(wanted))
                    .map(|f| (g, f))
            })
            .ok_or_else(|| {
                let known = self.all_flags().collect::<Vec<_>>().join(", ");
                if known.is_empty() {
                    anyhow!("Unknown toggle '{wanted}' (this section has no toggles)")
                } else {
                    anyhow!("Unknown toggle '{wanted}' (available: {known})")
                }
            })
    }
}
