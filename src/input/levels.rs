use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

use strum_macros::{Display, EnumIter};


#[derive(Display, EnumIter, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Encoder,
    Cover,
    Mode,
}

impl Key {
    pub fn mask(self) -> u16 {
        match self {
            Key::Encoder => 1 << 0,
            Key::Cover => 1 << 1,
            Key::Mode => 1 << 2,
        }
    }
}


/// A set of keys as a bit mask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Keys(pub u16);

impl Keys {
    pub fn contains(self, key: Key) -> bool {
        self.0 & key.mask() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> u32 {
        self.0.count_ones()
    }
}

impl From<Key> for Keys {
    fn from(key: Key) -> Self {
        Keys(key.mask())
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use strum::IntoEnumIterator;

        f.debug_set()
            .entries(Key::iter().filter(|key| self.contains(*key)))
            .finish()
    }
}


/// Raw button levels, written by the producer and sampled by [`super::ChordInput`].
#[derive(Debug, Default)]
pub struct ButtonLevels(AtomicU16);

impl ButtonLevels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: Key, pressed: bool) {
        if pressed {
            self.0.fetch_or(key.mask(), Ordering::AcqRel);
        } else {
            self.0.fetch_and(!key.mask(), Ordering::AcqRel);
        }
    }

    pub fn sample(&self) -> Keys {
        Keys(self.0.load(Ordering::Acquire))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let levels = ButtonLevels::new();
        assert!(levels.sample().is_empty());

        levels.set(Key::Mode, true);
        levels.set(Key::Cover, true);
        assert!(levels.sample().contains(Key::Mode));
        assert!(levels.sample().contains(Key::Cover));
        assert!(!levels.sample().contains(Key::Encoder));
        assert_eq!(levels.sample().len(), 2);

        levels.set(Key::Mode, false);
        assert_eq!(levels.sample(), Keys::from(Key::Cover));
    }

    #[test]
    fn test_debug() {
        let keys = Keys(Key::Encoder.mask() | Key::Mode.mask());
        assert_eq!(format!("{keys:?}"), "{Encoder, Mode}");
    }
}
