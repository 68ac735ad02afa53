#![cfg_attr(not(test), no_std)]

pub mod sample;
pub mod state;
#[cfg(any(feature = "stm32f0x1", feature = "stm32f303"))]
pub mod tsc;

pub use sample::{Clock, SampleSource};
pub use state::{TouchEvent, TouchState};

/// Millisecond timestamp. Deltas are taken with wrapping arithmetic, so a
/// single counter overflow between two readings is harmless.
pub type Millis = u32;

/// Debounced contact state of a sensor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Contact {
    Touched,
    Untouched,
}

impl Contact {
    pub fn from_touch(touch: bool) -> Self {
        if touch {
            Contact::Touched
        } else {
            Contact::Untouched
        }
    }

    pub fn is_touched(&self) -> bool {
        matches!(self, Contact::Touched)
    }
}

/// Raw reading below which a pad is considered touched.
///
/// Chosen empirically for capacitive pads read on a `touchRead`-style scale,
/// where an idle pad sits somewhere around 60-80 and a finger pulls it into
/// the teens or twenties. Hardware with a different scale (e.g. the STM32 TSC
/// counts) should provide its own [`TouchConfig`].
pub const DEFAULT_THRESHOLD: u16 = 35;

/// By default any touch that persists past its first poll counts as a hold
pub const DEFAULT_HOLD_DURATION: Millis = 0;

/// Configuration for a touch input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchConfig {
    /// A raw reading strictly below this value is a touch
    pub threshold: u16,
    /// How long (ms) a touch must persist before `poll` reports `Hold`
    pub hold_duration: Millis,
}

impl TouchConfig {
    const fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            hold_duration: DEFAULT_HOLD_DURATION,
        }
    }
}

impl Default for TouchConfig {
    fn default() -> Self {
        DEFAULT_TOUCH_CONFIG
    }
}

pub const DEFAULT_TOUCH_CONFIG: TouchConfig = TouchConfig::default();
