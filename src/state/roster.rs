//! Roster of closers eligible for the draw.

use indexmap::IndexMap;
use thiserror::Error;

use crate::dao::models::CloserEntity;

/// A closer as seen by the draw engine and the admin operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Closer {
    /// Unique key of the closer.
    pub name: String,
    /// Name shown to the user who drew the closer.
    pub display_name: String,
    /// Hex color used by the admin views.
    pub color: String,
    /// Weight restored on every reset.
    pub default_weight: f64,
    /// Whether the closer currently receives tickets.
    pub active: bool,
}

/// Roster mutation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// A closer with the same name already exists.
    #[error("closer `{0}` already exists")]
    Duplicate(String),
    /// No closer with this name exists.
    #[error("closer `{0}` not found")]
    Unknown(String),
    /// Removing the closer would leave the roster empty.
    #[error("cannot remove `{0}`: at least one closer must remain")]
    LastCloser(String),
}

/// Ordered set of closers keyed by name.
///
/// The registry travels with the bucket snapshot; every process reads it from
/// storage instead of holding its own copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosersRegistry {
    closers: IndexMap<String, Closer>,
}

impl ClosersRegistry {
    /// Build a registry, keeping the first closer when names collide.
    pub fn new(closers: impl IntoIterator<Item = Closer>) -> Self {
        let mut registry = Self::default();
        for closer in closers {
            let _ = registry.insert(closer);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&Closer> {
        self.closers.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Closer> {
        self.closers.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.closers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.closers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closers.is_empty()
    }

    /// Closers in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &Closer> {
        self.closers.values()
    }

    /// Add a closer; names are unique.
    pub fn insert(&mut self, closer: Closer) -> Result<(), RosterError> {
        if self.closers.contains_key(&closer.name) {
            return Err(RosterError::Duplicate(closer.name));
        }
        self.closers.insert(closer.name.clone(), closer);
        Ok(())
    }

    /// Remove a closer, refusing to empty the roster.
    pub fn remove(&mut self, name: &str) -> Result<Closer, RosterError> {
        if !self.closers.contains_key(name) {
            return Err(RosterError::Unknown(name.to_owned()));
        }
        if self.closers.len() == 1 {
            return Err(RosterError::LastCloser(name.to_owned()));
        }
        self.closers
            .shift_remove(name)
            .ok_or_else(|| RosterError::Unknown(name.to_owned()))
    }
}

impl From<(String, CloserEntity)> for Closer {
    fn from((name, entity): (String, CloserEntity)) -> Self {
        Self {
            name,
            display_name: entity.display_name,
            color: entity.color,
            default_weight: entity.default_weight,
            active: entity.active,
        }
    }
}

impl From<&Closer> for CloserEntity {
    fn from(closer: &Closer) -> Self {
        Self {
            display_name: closer.display_name.clone(),
            color: closer.color.clone(),
            default_weight: closer.default_weight,
            active: closer.active,
        }
    }
}
