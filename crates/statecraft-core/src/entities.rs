use statecraft_protocol::EntityId;

#[derive(Clone, Debug, PartialEq)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational slot storage for cities and units.
///
/// Iteration is in ascending slot order, which the turn driver and the AI
/// rely on for deterministic tie-breaking.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityStore<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<T> EntityStore<T> {
    pub fn insert(&mut self, value: T) -> EntityId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                debug_assert!(slot.value.is_none());
                slot.value = Some(value);
                EntityId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                EntityId::new(index, 0)
            }
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter_ordered(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((EntityId::new(index as u32, slot.generation), value))
        })
    }

    /// Snapshot of live ids, for loops that mutate the store.
    pub fn ids(&self) -> Vec<EntityId> {
        self.iter_ordered().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_ids_do_not_alias_reused_slots() {
        let mut store = EntityStore::default();
        let a = store.insert("a");
        let b = store.insert("b");
        assert_eq!(store.remove(a), Some("a"));
        let c = store.insert("c");
        assert_eq!(c.index, a.index);
        assert!(store.get(a).is_none());
        assert_eq!(store.get(c), Some(&"c"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.ids(), vec![c, b]);
    }
}
