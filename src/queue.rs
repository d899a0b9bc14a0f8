// Playback queues - an ordered list plus a cursor
// Tracks and episodes each get their own PlayQueue; the controller decides which one is live

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::media::{Episode, Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop at either end of the queue
    #[default]
    Off,
    /// Wrap around
    All,
    /// Stay on the current item
    One,
}

/// Anything that can sit in a queue needs a stable id for shuffle bookkeeping
pub trait Queued: Clone {
    fn queue_id(&self) -> &str;
}

impl Queued for Track {
    fn queue_id(&self) -> &str {
        &self.id
    }
}

impl Queued for Episode {
    fn queue_id(&self) -> &str {
        &self.id
    }
}

/// Ordered items with a cursor.
///
/// The cursor is always a valid index while the queue is non-empty and is
/// pinned to 0 (and ignored) when it is empty. A detached queue has no current
/// item (what is playing isn't queued, or was removed) and instead remembers the
/// slot the next item would come from.
#[derive(Debug, Clone)]
pub struct PlayQueue<T: Queued> {
    items: Vec<T>,
    cursor: usize,
    // Some(slot) while detached; `slot` may equal len when the removed item was last
    detached: Option<usize>,
    // Order before shuffling, kept so shuffle can be undone
    unshuffled: Option<Vec<T>>,
}

impl<T: Queued> Default for PlayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Queued> PlayQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            detached: None,
            unshuffled: None,
        }
    }

    /// Rebuild from persisted parts; an out-of-range cursor is pulled back into range
    pub fn from_parts(items: Vec<T>, cursor: usize) -> Self {
        let mut queue = Self {
            items,
            cursor,
            detached: None,
            unshuffled: None,
        };
        queue.clamp_cursor();
        queue
    }

    /// Replace the whole queue and point the cursor at `start` (clamped into range)
    pub fn replace(&mut self, items: Vec<T>, start: usize) -> Option<&T> {
        self.items = items;
        self.unshuffled = None;
        self.cursor = start;
        self.detached = None;
        self.clamp_cursor();
        self.current()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Index of the current item; None when empty or detached
    pub fn index(&self) -> Option<usize> {
        if self.detached.is_some() || self.items.is_empty() {
            None
        } else {
            Some(self.cursor)
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached.is_some()
    }

    /// Drop the current item; the next step in either direction starts from the top
    pub fn detach(&mut self) {
        self.detached = Some(0);
    }

    pub fn is_shuffled(&self) -> bool {
        self.unshuffled.is_some()
    }

    pub fn current(&self) -> Option<&T> {
        if self.detached.is_some() {
            return None;
        }
        self.items.get(self.cursor)
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.queue_id() == id)
    }

    /// Jump straight to an index
    pub fn select(&mut self, index: usize) -> Option<&T> {
        if index < self.items.len() {
            self.cursor = index;
            self.detached = None;
            self.current()
        } else {
            None
        }
    }

    /// Point the cursor at the item with this id, preferring the current slot when ids repeat.
    /// Detaches when the id isn't queued. Returns whether the item was found.
    pub fn follow(&mut self, id: &str) -> bool {
        if self.current().map_or(false, |item| item.queue_id() == id) {
            return true;
        }
        match self.position_of(id) {
            Some(index) => {
                self.select(index);
                true
            }
            None => {
                self.detach();
                false
            }
        }
    }

    fn reattach(&mut self, index: usize) -> Option<&T> {
        self.detached = None;
        self.cursor = index;
        self.clamp_cursor();
        self.current()
    }

    /// Move forward one step. Returns None (cursor untouched) when the end is reached with repeat off.
    pub fn advance(&mut self, repeat: RepeatMode) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        if let Some(slot) = self.detached {
            return if slot < self.items.len() {
                self.reattach(slot)
            } else if repeat == RepeatMode::All {
                self.reattach(0)
            } else {
                None
            };
        }
        match repeat {
            RepeatMode::One => {}
            RepeatMode::All => self.cursor = (self.cursor + 1) % self.items.len(),
            RepeatMode::Off => {
                if self.cursor + 1 >= self.items.len() {
                    return None;
                }
                self.cursor += 1;
            }
        }
        self.current()
    }

    /// Move back one step, mirror image of `advance`
    pub fn retreat(&mut self, repeat: RepeatMode) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        if let Some(slot) = self.detached {
            return self.reattach(slot.saturating_sub(1));
        }
        match repeat {
            RepeatMode::One => {}
            RepeatMode::All => {
                self.cursor = if self.cursor == 0 {
                    self.items.len() - 1
                } else {
                    self.cursor - 1
                };
            }
            RepeatMode::Off => {
                if self.cursor == 0 {
                    return None;
                }
                self.cursor -= 1;
            }
        }
        self.current()
    }

    pub fn push(&mut self, item: T) {
        if let Some(original) = self.unshuffled.as_mut() {
            original.push(item.clone());
        }
        self.items.push(item);
    }

    /// Remove by index, keeping the cursor on the same item. Removing the current
    /// item detaches the queue at that slot.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        if let Some(original) = self.unshuffled.as_mut() {
            if let Some(pos) = original.iter().position(|i| i.queue_id() == removed.queue_id()) {
                original.remove(pos);
            }
        }
        match self.detached {
            Some(slot) if index < slot => self.detached = Some(slot - 1),
            Some(_) => {}
            None if index == self.cursor => self.detached = Some(index),
            None if index < self.cursor => self.cursor -= 1,
            None => {}
        }
        self.clamp_cursor();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.unshuffled = None;
        self.cursor = 0;
        self.detached = Some(0);
    }

    /// Shuffle everything except the current item, which moves to the front.
    /// Turning shuffle off restores the original order and follows the current item.
    pub fn set_shuffled<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) {
        if enabled == self.is_shuffled() {
            return;
        }

        let current_id = self.current().map(|item| item.queue_id().to_string());

        if enabled {
            self.unshuffled = Some(self.items.clone());
            if self.items.is_empty() {
                return;
            }
            if self.detached.is_some() {
                self.items.shuffle(rng);
                self.detached = Some(0);
            } else {
                let current = self.items.remove(self.cursor);
                self.items.shuffle(rng);
                self.items.insert(0, current);
            }
            self.cursor = 0;
        } else if let Some(original) = self.unshuffled.take() {
            self.items = original;
            if self.detached.is_some() {
                self.detached = Some(0);
            }
            self.cursor = current_id
                .and_then(|id| self.position_of(&id))
                .unwrap_or(0);
            self.clamp_cursor();
        }
    }

    fn clamp_cursor(&mut self) {
        if self.items.is_empty() {
            self.cursor = 0;
        } else if self.cursor >= self.items.len() {
            self.cursor = self.items.len() - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter()
            .map(|id| Track::new(*id, format!("Song {}", id), format!("{}.mp3", id)))
            .collect()
    }

    fn ids(queue: &PlayQueue<Track>) -> Vec<String> {
        queue.items().iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn replace_clamps_start_index() {
        let mut queue = PlayQueue::new();
        let current = queue.replace(tracks(&["a", "b", "c"]), 7).cloned();
        assert_eq!(current.map(|t| t.id), Some("c".to_string()));
        assert_eq!(queue.cursor(), 2);

        assert!(queue.replace(Vec::new(), 3).is_none());
        assert_eq!(queue.cursor(), 0);
    }

    #[test]
    fn advance_respects_repeat_modes() {
        let mut queue = PlayQueue::new();
        queue.replace(tracks(&["a", "b"]), 1);

        assert!(queue.advance(RepeatMode::Off).is_none());
        assert_eq!(queue.cursor(), 1);

        assert_eq!(queue.advance(RepeatMode::One).map(|t| t.id.as_str()), Some("b"));
        assert_eq!(queue.advance(RepeatMode::All).map(|t| t.id.as_str()), Some("a"));
        assert_eq!(queue.retreat(RepeatMode::All).map(|t| t.id.as_str()), Some("b"));
        assert_eq!(queue.retreat(RepeatMode::Off).map(|t| t.id.as_str()), Some("a"));
        assert!(queue.retreat(RepeatMode::Off).is_none());
    }

    #[test]
    fn remove_keeps_cursor_on_same_item() {
        let mut queue = PlayQueue::new();
        queue.replace(tracks(&["a", "b", "c", "d"]), 2);

        queue.remove(0);
        assert_eq!(queue.current().map(|t| t.id.as_str()), Some("c"));

        // removing the current item leaves nothing current, its successor comes next
        queue.remove(1);
        assert!(queue.current().is_none());
        assert_eq!(queue.index(), None);
        assert_eq!(queue.advance(RepeatMode::Off).map(|t| t.id.as_str()), Some("d"));

        // last one gone: nothing further with repeat off, the previous one going back
        queue.remove(1);
        assert!(queue.advance(RepeatMode::Off).is_none());
        assert_eq!(queue.retreat(RepeatMode::Off).map(|t| t.id.as_str()), Some("b"));

        queue.remove(0);
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), 0);
        assert!(queue.remove(0).is_none());
    }

    #[test]
    fn shuffle_keeps_current_first_and_restores_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut queue = PlayQueue::new();
        queue.replace(tracks(&["a", "b", "c", "d", "e"]), 3);

        queue.set_shuffled(true, &mut rng);
        assert!(queue.is_shuffled());
        assert_eq!(queue.cursor(), 0);
        assert_eq!(queue.current().map(|t| t.id.as_str()), Some("d"));
        let mut sorted = ids(&queue);
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c", "d", "e"]);

        queue.advance(RepeatMode::Off);
        let now_current = queue.current().map(|t| t.id.clone()).unwrap();

        queue.set_shuffled(false, &mut rng);
        assert_eq!(ids(&queue), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(queue.current().map(|t| t.id.clone()), Some(now_current));
    }

    #[test]
    fn follow_prefers_current_slot_and_detaches_unknown_ids() {
        let mut queue = PlayQueue::new();
        queue.replace(tracks(&["a", "b", "a", "c"]), 2);

        assert!(queue.follow("a"));
        assert_eq!(queue.index(), Some(2));

        assert!(queue.follow("b"));
        assert_eq!(queue.index(), Some(1));

        assert!(!queue.follow("x"));
        assert!(queue.is_detached());
        assert_eq!(queue.index(), None);
        assert!(queue.current().is_none());
    }

    #[test]
    fn detached_queue_restarts_from_the_top() {
        let mut queue = PlayQueue::new();
        queue.replace(tracks(&["a", "b", "c"]), 2);
        queue.detach();
        assert_eq!(queue.retreat(RepeatMode::Off).map(|t| t.id.as_str()), Some("a"));
        assert_eq!(queue.index(), Some(0));

        queue.detach();
        assert_eq!(queue.advance(RepeatMode::Off).map(|t| t.id.as_str()), Some("a"));
        assert_eq!(queue.advance(RepeatMode::Off).map(|t| t.id.as_str()), Some("b"));
    }

    #[test]
    fn push_while_shuffled_survives_unshuffle() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut queue = PlayQueue::new();
        queue.replace(tracks(&["a", "b"]), 0);
        queue.set_shuffled(true, &mut rng);
        queue.push(Track::new("z", "Late", "z.mp3"));
        queue.set_shuffled(false, &mut rng);
        assert_eq!(ids(&queue), vec!["a", "b", "z"]);
    }
}
