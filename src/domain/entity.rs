/// Input-side entities shared by the simulation: facing, logical keys,
/// and per-tick key sets with new-press edge detection.
///
/// The frontends (keyboard, gamepad) only report which logical keys are
/// held. `InputTracker` turns consecutive held sets into `FrameInput`, so
/// every consumer gets the same debounce: a key held across many ticks is
/// a new press exactly once.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

/// Logical keys the simulation understands.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Key {
    Left,
    Right,
    Up,       // jump / climb up
    Down,     // climb down
    Interact, // switches, exits
}

impl Key {
    fn bit(self) -> u8 {
        match self {
            Key::Left => 1 << 0,
            Key::Right => 1 << 1,
            Key::Up => 1 << 2,
            Key::Down => 1 << 3,
            Key::Interact => 1 << 4,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct KeySet(u8);

impl KeySet {
    pub const EMPTY: KeySet = KeySet(0);

    pub fn of(keys: &[Key]) -> Self {
        let mut set = KeySet::EMPTY;
        for &k in keys {
            set.insert(k);
        }
        set
    }

    pub fn insert(&mut self, key: Key) {
        self.0 |= key.bit();
    }

    pub fn contains(self, key: Key) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: KeySet) -> KeySet {
        KeySet(self.0 | other.0)
    }

    fn difference(self, other: KeySet) -> KeySet {
        KeySet(self.0 & !other.0)
    }
}

/// Input for one simulation tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameInput {
    pub held: KeySet,
    /// Keys held now that were not held last tick.
    pub pressed: KeySet,
}

impl FrameInput {
    pub fn is_down(&self, key: Key) -> bool {
        self.held.contains(key)
    }

    pub fn is_new_press(&self, key: Key) -> bool {
        self.pressed.contains(key)
    }
}

#[derive(Clone, Debug, Default)]
pub struct InputTracker {
    previous: KeySet,
}

impl InputTracker {
    pub fn new() -> Self {
        InputTracker::default()
    }

    /// Advance one tick with the keys currently held.
    pub fn advance(&mut self, held: KeySet) -> FrameInput {
        let pressed = held.difference(self.previous);
        self.previous = held;
        FrameInput { held, pressed }
    }

    /// Forget held keys (after respawn or level change) so nothing is
    /// misread as still held.
    pub fn reset(&mut self) {
        self.previous = KeySet::EMPTY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_key_is_new_press_once() {
        let mut t = InputTracker::new();
        let held = KeySet::of(&[Key::Interact]);
        let presses: Vec<bool> = (0..5)
            .map(|_| t.advance(held).is_new_press(Key::Interact))
            .collect();
        assert_eq!(presses, vec![true, false, false, false, false]);
    }

    #[test]
    fn release_then_press_fires_again() {
        let mut t = InputTracker::new();
        let held = KeySet::of(&[Key::Up]);
        assert!(t.advance(held).is_new_press(Key::Up));
        assert!(!t.advance(KeySet::EMPTY).is_down(Key::Up));
        assert!(t.advance(held).is_new_press(Key::Up));
    }

    #[test]
    fn keys_are_independent() {
        let mut t = InputTracker::new();
        t.advance(KeySet::of(&[Key::Left]));
        let f = t.advance(KeySet::of(&[Key::Left, Key::Interact]));
        assert!(f.is_down(Key::Left));
        assert!(!f.is_new_press(Key::Left));
        assert!(f.is_new_press(Key::Interact));
    }

    #[test]
    fn reset_forgets_previous() {
        let mut t = InputTracker::new();
        let held = KeySet::of(&[Key::Interact]);
        t.advance(held);
        t.reset();
        assert!(t.advance(held).is_new_press(Key::Interact));
    }

    #[test]
    fn union_merges_sources() {
        let kb = KeySet::of(&[Key::Left]);
        let pad = KeySet::of(&[Key::Interact]);
        let both = kb.union(pad);
        assert!(both.contains(Key::Left) && both.contains(Key::Interact));
        assert_eq!(both.union(KeySet::EMPTY), both);
    }
}
