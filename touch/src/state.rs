use crate::sample::{self, Clock, SampleSource};
use crate::{Contact, Millis, TouchConfig, DEFAULT_TOUCH_CONFIG};

/// Classification of a single poll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchEvent {
    /// Still touched, but not for long enough to count as a hold
    NoChange = 0,
    /// Was untouched, now touched
    Click = 1,
    /// Was touched, now untouched
    Unclick = 2,
    /// Continuously touched for at least the hold duration
    Hold = 3,
    /// Continuously untouched. There is no minimum duration for this one.
    Unhold = 4,
}

impl TouchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoChange => "no-change",
            Self::Click => "click",
            Self::Unclick => "unclick",
            Self::Hold => "hold",
            Self::Unhold => "unhold",
        }
    }
}

impl From<TouchEvent> for u8 {
    fn from(event: TouchEvent) -> u8 {
        event as u8
    }
}

/// Debounced touch tracker for a single sensor channel.
///
/// Each call to [`poll`](Self::poll) takes one majority-voted sample and
/// classifies it against the previous one. Alongside the explicit contact
/// state, four timestamps are kept:
///
/// - `last_push` / `last_lift`: when the pad last became touched / untouched
/// - `last_touch` / `last_untouch`: when the pad last *read* touched / untouched
///
/// and the duration queries are derived from those. Timestamps start at 0 and
/// the contact state starts `Untouched`.
pub struct TouchState<S: SampleSource, C: Clock> {
    source: S,
    clock: C,
    channel: S::Channel,
    config: TouchConfig,
    contact: Contact,
    last_push: Millis,
    last_lift: Millis,
    last_touch: Millis,
    last_untouch: Millis,
    last_hold_duration: Millis,
    last_unhold_duration: Millis,
}

impl<S: SampleSource, C: Clock> TouchState<S, C> {
    pub fn new(source: S, clock: C, channel: S::Channel, config: Option<TouchConfig>) -> Self {
        Self {
            source,
            clock,
            channel,
            config: config.unwrap_or(DEFAULT_TOUCH_CONFIG),
            contact: Contact::Untouched,
            last_push: 0,
            last_lift: 0,
            last_touch: 0,
            last_untouch: 0,
            last_hold_duration: 0,
            last_unhold_duration: 0,
        }
    }

    /// Give back the sample source and clock
    pub fn release(self) -> (S, C) {
        (self.source, self.clock)
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn config(&self) -> &TouchConfig {
        &self.config
    }

    pub fn threshold(&self) -> u16 {
        self.config.threshold
    }

    /// Out of range values are accepted; they just pin the pad touched or untouched
    pub fn set_threshold(&mut self, threshold: u16) {
        self.config.threshold = threshold;
    }

    pub fn set_hold_duration(&mut self, hold_duration: Millis) {
        self.config.hold_duration = hold_duration;
    }

    pub fn channel(&self) -> S::Channel {
        self.channel
    }

    pub fn set_channel(&mut self, channel: S::Channel) {
        self.channel = channel;
    }

    /// The current raw reading, without any thresholding
    pub fn read_raw(&mut self) -> u16 {
        self.source.read_raw(self.channel)
    }

    /// Whether a single raw reading is below the threshold
    pub fn sample_once(&mut self) -> bool {
        sample::sample_once(&mut self.source, self.channel, self.config.threshold)
    }

    /// Majority-voted reading over two or three samples
    pub fn sample_debounced(&mut self) -> bool {
        sample::debounce(&mut self.source, self.channel, self.config.threshold)
    }

    /// Sample the pad and classify the result using the configured hold duration
    pub fn poll(&mut self) -> TouchEvent {
        self.poll_with_hold(self.config.hold_duration)
    }

    /// Sample the pad and classify the result.
    ///
    /// hold_duration: ms of continuous touch before `Hold` is reported. Until
    /// then a persisting touch reports `NoChange`.
    pub fn poll_with_hold(&mut self, hold_duration: Millis) -> TouchEvent {
        let touch = self.sample_debounced();
        let now = self.clock.now_millis();
        let edge = self.record(touch, now);

        match (self.contact, edge) {
            (Contact::Touched, true) => TouchEvent::Click,
            (Contact::Touched, false) => {
                if now.wrapping_sub(self.last_push) >= hold_duration {
                    TouchEvent::Hold
                } else {
                    TouchEvent::NoChange
                }
            }
            (Contact::Untouched, true) => TouchEvent::Unclick,
            (Contact::Untouched, false) => TouchEvent::Unhold,
        }
    }

    /// Sample the pad and return whether it is touched.
    ///
    /// Keeps the same bookkeeping as [`poll`](Self::poll), so the two can be
    /// mixed freely.
    pub fn is_touched(&mut self) -> bool {
        let touch = self.sample_debounced();
        let now = self.clock.now_millis();
        self.record(touch, now);
        touch
    }

    /// Update timestamps for a new debounced reading.
    ///
    /// Returns true if the reading differs from the previous one.
    fn record(&mut self, touch: bool, now: Millis) -> bool {
        let contact = Contact::from_touch(touch);
        let edge = contact != self.contact;
        self.contact = contact;

        match contact {
            Contact::Touched => {
                if edge {
                    self.last_push = now;
                    #[cfg(feature = "defmt")]
                    defmt::debug!("touch: push at {=u32}", now);
                }
                self.last_touch = now;
                self.last_hold_duration = now.wrapping_sub(self.last_untouch);
            }
            Contact::Untouched => {
                if edge {
                    self.last_lift = now;
                    #[cfg(feature = "defmt")]
                    defmt::debug!("touch: lift at {=u32}", now);
                }
                self.last_untouch = now;
                self.last_unhold_duration = now.wrapping_sub(self.last_touch);
            }
        }

        edge
    }

    pub fn contact(&self) -> Contact {
        self.contact
    }

    /// True while in an unbroken touched run
    pub fn is_held(&self) -> bool {
        self.contact.is_touched()
    }

    pub fn is_unheld(&self) -> bool {
        !self.is_held()
    }

    /// Length of the current touched run, as of the last touched reading.
    ///
    /// Zero while unheld. No clock read is made, so repeated calls between
    /// polls agree with each other.
    pub fn current_hold_duration(&self) -> Millis {
        if self.is_held() {
            self.last_touch.wrapping_sub(self.last_push)
        } else {
            0
        }
    }

    /// Length of the current untouched run, as of the last untouched reading.
    pub fn current_unhold_duration(&self) -> Millis {
        if self.is_unheld() {
            self.last_untouch.wrapping_sub(self.last_lift)
        } else {
            0
        }
    }

    pub fn last_completed_hold_duration(&self) -> Millis {
        self.last_hold_duration
    }

    pub fn last_completed_unhold_duration(&self) -> Millis {
        self.last_unhold_duration
    }

    /// Time of the most recent push or lift, whichever came later
    pub fn last_activity_timestamp(&self) -> Millis {
        // The later of the two is always the one matching the current
        // contact, which stays correct across a counter wrap.
        match self.contact {
            Contact::Touched => self.last_push,
            Contact::Untouched => self.last_lift,
        }
    }

    pub fn last_push(&self) -> Millis {
        self.last_push
    }

    pub fn last_lift(&self) -> Millis {
        self.last_lift
    }

    pub fn last_touch(&self) -> Millis {
        self.last_touch
    }

    pub fn last_untouch(&self) -> Millis {
        self.last_untouch
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::sample::fake::{manual_clock, Scripted};

    const UP: u16 = 50;
    const DOWN: u16 = 20;

    fn config(hold_duration: Millis) -> Option<TouchConfig> {
        Some(TouchConfig {
            threshold: 35,
            hold_duration,
        })
    }

    #[test]
    pub fn test_initial_state() {
        let (_, clock) = manual_clock(0);
        let t = TouchState::new(Scripted::new(&[UP]), clock, 3, None);
        assert_eq!(t.contact(), Contact::Untouched);
        assert!(t.is_unheld());
        assert!(!t.is_held());
        assert_eq!(t.threshold(), crate::DEFAULT_THRESHOLD);
        assert_eq!(t.channel(), 3);
        assert_eq!(t.current_hold_duration(), 0);
        assert_eq!(t.current_unhold_duration(), 0);
        assert_eq!(t.last_activity_timestamp(), 0);
    }

    #[test]
    pub fn test_reading_stream() {
        let (now, clock) = manual_clock(0);
        let source = Scripted::new(&[50, 50, 50, 20, 20, 20, 50]);
        let mut t = TouchState::new(source, clock, 0, config(0));

        let mut events = Vec::new();
        for _ in 0..3 {
            now.set(now.get() + 10);
            events.push(t.poll());
        }

        // [50, 50] agree; [50, 20] disagree and the third 20 wins; [20, 50]
        // disagree and the final 50 wins.
        assert_eq!(events, vec![TouchEvent::Unhold, TouchEvent::Click, TouchEvent::Unclick]);
        assert_eq!(t.last_push(), 20);
        assert_eq!(t.last_lift(), 30);
    }

    #[test]
    pub fn test_click_then_hold() {
        let (now, clock) = manual_clock(0);
        let mut t = TouchState::new(Scripted::new(&[DOWN]), clock, 0, config(200));

        assert_eq!(t.poll(), TouchEvent::Click);
        assert!(t.is_held());

        now.set(100);
        assert_eq!(t.poll(), TouchEvent::NoChange);

        now.set(250);
        assert_eq!(t.poll(), TouchEvent::Hold);

        now.set(500);
        assert_eq!(t.poll(), TouchEvent::Hold);
        assert_eq!(t.current_hold_duration(), 500);
        assert_eq!(t.current_unhold_duration(), 0);
    }

    #[test]
    pub fn test_hold_threshold_boundary() {
        let (now, clock) = manual_clock(1000);
        let mut t = TouchState::new(Scripted::new(&[DOWN]), clock, 0, config(0));

        assert_eq!(t.poll_with_hold(50), TouchEvent::Click);
        now.set(1049);
        assert_eq!(t.poll_with_hold(50), TouchEvent::NoChange);
        now.set(1050);
        assert_eq!(t.poll_with_hold(50), TouchEvent::Hold);

        // Zero hold duration means every persisting touch is a hold
        assert_eq!(t.poll(), TouchEvent::Hold);
    }

    #[test]
    pub fn test_no_change_is_stable() {
        let (now, clock) = manual_clock(0);
        let mut t = TouchState::new(Scripted::new(&[DOWN]), clock, 0, config(1000));

        assert_eq!(t.poll(), TouchEvent::Click);
        for ms in (10..1000).step_by(10) {
            now.set(ms);
            assert_eq!(t.poll(), TouchEvent::NoChange, "Unexpected event at {} ms", ms);
        }
        now.set(1000);
        assert_eq!(t.poll(), TouchEvent::Hold);
    }

    #[test]
    pub fn test_one_click_per_run() {
        let (now, clock) = manual_clock(0);
        let mut t = TouchState::new(Scripted::new(&[UP]), clock, 0, config(0));

        let mut clicks = 0;
        let mut unclicks = 0;
        // Alternate runs of 4 touched / 4 untouched polls
        for run in 0..6 {
            let reading = if run % 2 == 0 { DOWN } else { UP };
            for _ in 0..4 {
                now.set(now.get() + 5);
                t.source_mut().extend(&[reading, reading]);
                match t.poll() {
                    TouchEvent::Click => clicks += 1,
                    TouchEvent::Unclick => unclicks += 1,
                    _ => (),
                }
            }
        }
        assert_eq!(clicks, 3);
        assert_eq!(unclicks, 3);
    }

    #[test]
    pub fn test_unhold_every_poll() {
        let (now, clock) = manual_clock(0);
        let mut t = TouchState::new(Scripted::new(&[UP]), clock, 0, config(500));

        for ms in 0..5 {
            now.set(ms);
            assert_eq!(t.poll(), TouchEvent::Unhold);
        }
        assert_eq!(t.current_unhold_duration(), 4);
    }

    #[test]
    pub fn test_hold_duration_monotonic() {
        let (now, clock) = manual_clock(10);
        let mut t = TouchState::new(Scripted::new(&[DOWN]), clock, 0, config(0));

        t.poll();
        let mut previous = t.current_hold_duration();
        assert_eq!(previous, 0);
        for ms in [11, 15, 15, 40, 41, 300] {
            now.set(ms);
            t.poll();
            let duration = t.current_hold_duration();
            assert!(duration >= previous);
            assert_eq!(duration, ms - 10);
            previous = duration;
        }
    }

    #[test]
    pub fn test_duration_queries_do_not_read_clock() {
        let (now, clock) = manual_clock(0);
        let mut t = TouchState::new(Scripted::new(&[DOWN]), clock, 0, config(0));

        t.poll();
        now.set(80);
        t.poll();
        now.set(5000);
        assert_eq!(t.current_hold_duration(), 80);
        assert_eq!(t.current_hold_duration(), 80);
    }

    #[test]
    pub fn test_completed_durations() {
        let (now, clock) = manual_clock(0);
        let mut t = TouchState::new(Scripted::new(&[UP, UP]), clock, 0, config(0));

        now.set(100);
        assert_eq!(t.poll(), TouchEvent::Unhold);

        t.source_mut().extend(&[DOWN, DOWN]);
        now.set(200);
        assert_eq!(t.poll(), TouchEvent::Click);
        t.source_mut().extend(&[DOWN, DOWN]);
        now.set(300);
        assert_eq!(t.poll(), TouchEvent::Hold);
        t.source_mut().extend(&[DOWN, DOWN]);
        now.set(400);
        assert_eq!(t.poll(), TouchEvent::Hold);

        t.source_mut().extend(&[UP, UP]);
        now.set(410);
        assert_eq!(t.poll(), TouchEvent::Unclick);

        // Touched from 200 to 400, measured from the last untouched reading
        // at 100 so within one sampling interval of the true 200ms run.
        assert_eq!(t.last_completed_hold_duration(), 300);
        assert_eq!(t.last_completed_unhold_duration(), 10);
        assert_eq!(t.current_hold_duration(), 0);
        assert_eq!(t.current_unhold_duration(), 0);
        assert_eq!(t.last_activity_timestamp(), 410);

        t.source_mut().extend(&[UP, UP]);
        now.set(450);
        assert_eq!(t.poll(), TouchEvent::Unhold);
        assert_eq!(t.current_unhold_duration(), 40);
        assert_eq!(t.last_completed_unhold_duration(), 50);
        assert_eq!(t.last_activity_timestamp(), 410);
    }

    #[test]
    pub fn test_is_touched_matches_poll() {
        let (now, clock) = manual_clock(0);
        let mut t = TouchState::new(Scripted::new(&[DOWN, DOWN]), clock, 0, config(0));

        now.set(10);
        assert!(t.is_touched());
        assert!(t.is_held());
        assert_eq!(t.last_push(), 10);

        // The rising edge was consumed by is_touched, so poll sees a hold
        t.source_mut().extend(&[DOWN, DOWN]);
        now.set(20);
        assert_eq!(t.poll(), TouchEvent::Hold);
        assert_eq!(t.last_push(), 10);

        t.source_mut().extend(&[UP, UP]);
        now.set(30);
        assert!(!t.is_touched());
        assert!(t.is_unheld());
        assert_eq!(t.last_lift(), 30);
        assert_eq!(t.last_completed_hold_duration(), 20);

        t.source_mut().extend(&[UP, UP]);
        now.set(40);
        assert_eq!(t.poll(), TouchEvent::Unhold);
    }

    #[test]
    pub fn test_edges_within_one_millisecond() {
        let (_, clock) = manual_clock(5);
        let mut t = TouchState::new(Scripted::new(&[DOWN, DOWN]), clock, 0, config(0));

        let mut events = vec![t.poll()];
        for reading in [UP, DOWN, DOWN] {
            t.source_mut().extend(&[reading, reading]);
            events.push(t.poll());
        }

        // Timestamps alone can't order these, the contact state still does
        assert_eq!(
            events,
            vec![TouchEvent::Click, TouchEvent::Unclick, TouchEvent::Click, TouchEvent::Hold]
        );
        assert!(t.is_held());
        assert_eq!(t.last_push(), 5);
        assert_eq!(t.last_lift(), 5);
        assert_eq!(t.last_activity_timestamp(), 5);
    }

    #[test]
    pub fn test_touch_at_time_zero() {
        let (now, clock) = manual_clock(0);
        let mut t = TouchState::new(Scripted::new(&[DOWN]), clock, 0, config(0));

        assert_eq!(t.poll(), TouchEvent::Click);
        now.set(10);
        assert_eq!(t.poll(), TouchEvent::Hold, "Touch starting at t=0 clicked twice");
        assert!(t.is_held());
        assert_eq!(t.last_push(), 0);
        assert_eq!(t.current_hold_duration(), 10);
    }

    #[test]
    pub fn test_counter_wraparound() {
        let (now, clock) = manual_clock(Millis::MAX - 50);
        let mut t = TouchState::new(Scripted::new(&[DOWN]), clock, 0, config(100));

        assert_eq!(t.poll(), TouchEvent::Click);
        now.set(20);
        assert_eq!(t.poll(), TouchEvent::NoChange);
        now.set(60);
        assert_eq!(t.poll(), TouchEvent::Hold);
        assert_eq!(t.current_hold_duration(), 111);
        assert_eq!(t.last_activity_timestamp(), Millis::MAX - 50);
    }

    #[test]
    pub fn test_setters() {
        let (_, clock) = manual_clock(0);
        let mut t = TouchState::new(Scripted::new(&[40]), clock, 1, None);

        assert!(!t.sample_once());
        t.set_threshold(41);
        assert!(t.sample_once());
        t.set_channel(9);
        assert_eq!(t.read_raw(), 40);
        t.set_hold_duration(25);
        assert_eq!(t.config().hold_duration, 25);

        let (source, _) = t.release();
        assert_eq!(source.channels, vec![1, 1, 9]);
    }

    #[test]
    pub fn test_event_codes() {
        let codes: Vec<u8> = [
            TouchEvent::NoChange,
            TouchEvent::Click,
            TouchEvent::Unclick,
            TouchEvent::Hold,
            TouchEvent::Unhold,
        ]
        .into_iter()
        .map(u8::from)
        .collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4]);
        assert_eq!(TouchEvent::Unclick.name(), "unclick");
    }
}
