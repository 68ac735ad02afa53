//! Collaborators injected into a [`TouchState`](crate::TouchState), and the
//! majority vote used to reject single-sample glitches.

use crate::Millis;

/// Something that can take a raw analog reading from a sensor channel.
///
/// Lower readings mean more contact. Reads are assumed to always succeed and
/// to return promptly; a source that can fail should map the failure to a
/// reading on the untouched end of its scale.
pub trait SampleSource {
    type Channel: Copy;

    fn read_raw(&mut self, channel: Self::Channel) -> u16;
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    type Channel = S::Channel;

    fn read_raw(&mut self, channel: Self::Channel) -> u16 {
        (**self).read_raw(channel)
    }
}

/// Monotonic millisecond counter
pub trait Clock {
    fn now_millis(&self) -> Millis;
}

impl<F: Fn() -> Millis> Clock for F {
    fn now_millis(&self) -> Millis {
        self()
    }
}

/// Take one sample and compare it against `threshold`
pub fn sample_once<S: SampleSource>(source: &mut S, channel: S::Channel, threshold: u16) -> bool {
    source.read_raw(channel) < threshold
}

/// Majority vote over up to three samples.
///
/// Two samples are taken; if they agree that is the answer. Otherwise a third
/// sample breaks the tie, and it wins even if it disagrees with both of the
/// earlier two.
pub fn debounce<S: SampleSource>(source: &mut S, channel: S::Channel, threshold: u16) -> bool {
    let first = sample_once(source, channel, threshold);
    if first != sample_once(source, channel, threshold) {
        sample_once(source, channel, threshold)
    } else {
        first
    }
}
