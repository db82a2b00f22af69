//! Random-order navigation history

use rand::seq::IteratorRandom;
use rand::Rng;

/// History grows to this many entries before being trimmed
pub const HISTORY_CAP: usize = 200;

/// Entries kept (most recent) after a trim
pub const HISTORY_KEEP: usize = 100;

/// Visited indices in random playback, with a replay cursor.
///
/// Stepping forward replays history while the cursor is behind the tail and
/// only draws a new index at the tail, so going back and then forward again
/// shows the same images in the same order.
#[derive(Debug, Clone, Default)]
pub struct RandomHistory {
    entries: Vec<usize>,
    cursor: Option<usize>,
}

impl RandomHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the cursor in the history, if any step was taken
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Step forward from `current` in a sequence of `len` items.
    ///
    /// Returns `None` when there is nothing else to show.
    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        current: usize,
        len: usize,
        rng: &mut R,
    ) -> Option<usize> {
        if len <= 1 {
            return None;
        }

        if let Some(cursor) = self.cursor {
            if cursor + 1 < self.entries.len() {
                self.cursor = Some(cursor + 1);
                return Some(self.entries[cursor + 1]);
            }
        }

        // Never repeat the image on screen
        let next = (0..len).filter(|&i| i != current).choose(rng)?;

        if self.entries.is_empty() {
            self.entries.push(current);
        }
        self.entries.push(next);
        if self.entries.len() > HISTORY_CAP {
            let excess = self.entries.len() - HISTORY_KEEP;
            self.entries.drain(..excess);
        }
        self.cursor = Some(self.entries.len() - 1);
        Some(next)
    }

    /// Step back through history; `None` at its start
    pub fn back(&mut self) -> Option<usize> {
        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                Some(self.entries[cursor - 1])
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_back_before_forward_is_noop() {
        let mut history = RandomHistory::new();
        assert_eq!(history.back(), None);
        assert!(history.is_empty());
    }

    #[test]
    fn test_never_repeats_current() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut history = RandomHistory::new();
        let mut current = 0;
        for _ in 0..50 {
            let next = history.forward(current, 3, &mut rng).unwrap();
            assert_ne!(next, current);
            assert!(next < 3);
            current = next;
        }
    }

    #[test]
    fn test_single_item_has_nowhere_to_go() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut history = RandomHistory::new();
        assert_eq!(history.forward(0, 1, &mut rng), None);
    }

    #[test]
    fn test_back_then_forward_replays() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut history = RandomHistory::new();

        let mut shown = vec![0];
        for _ in 0..5 {
            let next = history.forward(*shown.last().unwrap(), 10, &mut rng).unwrap();
            shown.push(next);
        }

        let mut backwards = Vec::new();
        while let Some(i) = history.back() {
            backwards.push(i);
        }
        let mut expected: Vec<usize> = shown[..shown.len() - 1].to_vec();
        expected.reverse();
        assert_eq!(backwards, expected);

        let mut replayed = Vec::new();
        for _ in 0..5 {
            replayed.push(history.forward(0, 10, &mut rng).unwrap());
        }
        assert_eq!(replayed, shown[1..]);
    }

    #[test]
    fn test_trim_keeps_recent() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut history = RandomHistory::new();
        let mut current = 0;
        for _ in 0..HISTORY_CAP {
            current = history.forward(current, 5, &mut rng).unwrap();
        }
        assert_eq!(history.len(), HISTORY_KEEP);
        assert_eq!(history.cursor(), Some(HISTORY_KEEP - 1));
    }
}
