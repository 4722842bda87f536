use std::collections::HashMap;

use serde::{Serialize, Serializer};

use crate::error::{ExportError, ExportResult};

pub trait Entity {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
}

macro_rules! impl_entity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::target::container::Entity for $ty {
                fn name(&self) -> &str {
                    &self.name
                }
                fn set_name(&mut self, name: String) {
                    self.name = name;
                }
            }
        )*
    };
}
pub(crate) use impl_entity;

/// Insertion-ordered entities with names unique within the container.
///
/// Removal leaves a hole; holes are compacted away once they outnumber live entities.
#[derive(Debug, Clone)]
pub struct EntityContainer<T> {
    slots: Vec<Option<T>>,
    index: HashMap<String, usize>,
}

impl<T> Default for EntityContainer<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Serialize> Serialize for EntityContainer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.slots.iter().flatten())
    }
}

/// Holes tolerated before a removal compacts the slots.
const MIN_HOLES_BEFORE_COMPACT: usize = 32;

impl<T: Entity> EntityContainer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: String, entity: T) {
        self.index.insert(name, self.slots.len());
        self.slots.push(Some(entity));
    }

    /// Fails when the name is already taken.
    pub fn insert(&mut self, entity: T) -> ExportResult<()> {
        if self.index.contains_key(entity.name()) {
            return Err(ExportError::Fatal(format!(
                "duplicate entity name: {}",
                entity.name()
            )));
        }
        self.push(entity.name().to_string(), entity);
        Ok(())
    }

    /// Inserts under a free name, suffixing `_1`, `_2`, ... on collision. Returns the name
    /// the entity ended up with.
    pub fn insert_unique(&mut self, mut entity: T) -> String {
        let name = self.unique_name(entity.name());
        entity.set_name(name.clone());
        self.push(name.clone(), entity);
        name
    }

    pub fn unique_name(&self, base: &str) -> String {
        if !self.index.contains_key(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base}_{i}"))
            .find(|candidate| !self.index.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        let i = self.index.remove(name)?;
        let removed = self.slots.get_mut(i).and_then(Option::take);
        let holes = self.slots.len() - self.index.len();
        if holes >= MIN_HOLES_BEFORE_COMPACT && holes > self.index.len() {
            self.compact();
        }
        removed
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        for (i, entity) in self.slots.iter().flatten().enumerate() {
            if let Some(slot) = self.index.get_mut(entity.name()) {
                *slot = i;
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        let i = *self.index.get(name)?;
        self.slots.get(i).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let i = *self.index.get(name)?;
        self.slots.get_mut(i).and_then(Option::as_mut)
    }

    pub fn get_or_insert_with(&mut self, name: &str, make: impl FnOnce() -> T) -> &mut T {
        let i = match self.index.get(name) {
            Some(&i) => i,
            None => {
                self.index.insert(name.to_string(), self.slots.len());
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[i].get_or_insert_with(|| {
            let mut entity = make();
            entity.set_name(name.to_string());
            entity
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|e| e.name()).collect()
    }
}
