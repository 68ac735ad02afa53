//! Blocking sample source for the STM32 Touch Sensing Controller.
//!
//! Each raw reading is one acquisition of a single electrode: the count of
//! charge transfer cycles needed to charge the group's sampling capacitor.
//! A finger adds capacitance to the electrode, so the count drops when the
//! pad is touched, which is the polarity `TouchState` expects.
//!
//! Creating a `Tsc` accesses the TSC and RCC registers directly instead of
//! taking a PAC peripheral from the caller. The PAC version used here can't
//! be forced to match the one used by the application's HAL, so stealing the
//! register block is the only way to share it. Don't touch the TSC registers
//! elsewhere in the application.

#[cfg(feature="stm32f0x1")]
use stm32f0::stm32f0x1 as pac;
#[cfg(feature="stm32f303")]
use stm32f3::stm32f303 as pac;

use crate::sample::SampleSource;

pub const GROUPS: usize = 6;
pub const IOS_PER_GROUP: u8 = 4;

/// One TSC IO, addressed by group and IO number (both starting at 1)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Channel {
    group: u8,
    io: u8,
}

impl Channel {
    pub const fn new(group: u8, io: u8) -> Self {
        assert!(group >= 1 && group as usize <= GROUPS);
        assert!(io >= 1 && io <= IOS_PER_GROUP);
        Self { group, io }
    }

    pub const fn group(self) -> u8 {
        self.group
    }

    pub const fn io(self) -> u8 {
        self.io
    }
}

/// Which IO of each group is the sampling cap and which are measured
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleConfig {
    // One byte per group: bit 7 marks the group enabled, bits 6:4 hold the IO
    // used as the sampling cap, and bits 3:0 are the electrodes to measure.
    pub groups: [u8; GROUPS],
}

impl SampleConfig {
    pub const fn new() -> Self {
        Self { groups: [0; GROUPS] }
    }

    /// Use `sample` as the sampling capacitor IO for its group
    pub const fn sample(mut self, sample: Channel) -> Self {
        let group = sample.group() as usize;
        assert!(self.groups[group - 1] == 0);
        self.groups[group - 1] = 0x80 | (sample.io() << 4);
        self
    }

    /// Enable `channel` for measurement. Meant for building `static`s, where
    /// the asserts turn a wiring mistake into a compile error.
    pub const fn channel(self, channel: Channel) -> Self {
        match self.try_channel(channel) {
            Some(config) => config,
            None => panic!("channel has no sampling cap in its group, or is the cap"),
        }
    }

    /// Enable `channel` for measurement, or `None` if its group has no
    /// sampling cap or `channel` is that cap
    pub const fn try_channel(mut self, channel: Channel) -> Option<Self> {
        let group = channel.group() as usize;
        let current = self.groups[group - 1];
        if current == 0 || (current >> 4) & 0x7 == channel.io() {
            return None;
        }
        self.groups[group - 1] = current | (1 << (channel.io() - 1));
        Some(self)
    }

    /// The register values (IOGCSR, IOSCR, IOCCR) for this config
    pub fn registers(&self) -> (u32, u32, u32) {
        let mut iogcsr: u32 = 0;
        let mut ioscr: u32 = 0;
        let mut ioccr: u32 = 0;

        for (gid, group) in self.groups.iter().enumerate() {
            if *group == 0 {
                continue;
            }
            let sample_id = ((group >> 4) & 0x7) as u32;
            let channel_mask = (group & 0xf) as u32;

            iogcsr |= 1 << gid;
            ioscr |= 1 << (gid as u32 * 4 + sample_id - 1);
            ioccr |= channel_mask << (gid * 4);
        }

        (iogcsr, ioscr, ioccr)
    }
}

/// Acquisition timing.
///
/// Field values are the register encodings: the pulse generator runs at
/// `HCLK / 2^prescale`, each charge transfer phase lasts `cycles + 1` pulse
/// periods, and an acquisition gives up after `2^(max_count + 8) - 1` transfers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// 0..=7
    pub prescale: u8,
    /// 0..=6
    pub max_count: u8,
    /// 0..=15
    pub charge_high: u8,
    /// 0..=15
    pub charge_low: u8,
}

impl Config {
    const fn default() -> Self {
        Self {
            prescale: 4,
            max_count: 5,
            charge_high: 1,
            charge_low: 1,
        }
    }

    /// Transfer count at which an acquisition is abandoned
    pub const fn max_transfers(&self) -> u16 {
        let bits = if self.max_count > 6 { 6 } else { self.max_count };
        (256u16 << bits) - 1
    }
}

/// HCLK/16, 8191 max transfers, two cycles per charge transfer phase
pub const DEFAULT_TSC_CONFIG: Config = Config::default();

pub struct Tsc {
    tsc: &'static pac::tsc::RegisterBlock,
    max_count: u16,
    sample_caps: SampleConfig,
}

impl Tsc {
    /// Enable and configure the TSC.
    ///
    /// sample_caps: the sampling capacitor IO for every group that will be
    /// read, as built with [`SampleConfig::sample`]
    pub fn new(config: Option<Config>, sample_caps: SampleConfig) -> Self {
        let config = config.unwrap_or(DEFAULT_TSC_CONFIG);

        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.ahbenr.modify(|_, w| w.tscen().set_bit());
        rcc.ahbrstr.modify(|_, w| w.tscrst().set_bit());
        rcc.ahbrstr.modify(|_, w| w.tscrst().clear_bit());

        let tsc = unsafe { &*pac::TSC::ptr() };
        tsc.cr.write(|w| unsafe {
            w.ctph().bits(config.charge_high & 0xf)
            .ctpl().bits(config.charge_low & 0xf)
            .sse().set_bit()
            .ssd().bits(16)
            .pgpsc().bits(config.prescale & 0x7)
            .mcv().bits(config.max_count.min(6))
            .tsce().set_bit()
        });

        Self {
            tsc,
            max_count: config.max_transfers(),
            sample_caps,
        }
    }

    /// Reading reported when a channel can't be measured: the group hit max
    /// count, or the channel isn't wired to a sampling cap. Either way it is
    /// the far untouched end of the scale.
    pub fn overrun_count(&self) -> u16 {
        self.max_count + 1
    }

    /// Load the IO configuration and begin an acquisition
    pub fn start(&mut self, sample_config: &SampleConfig) {
        let (iogcsr, ioscr, ioccr) = sample_config.registers();

        self.tsc.iogcsr.write(|w| unsafe { w.bits(iogcsr) });
        self.tsc.ioscr.write(|w| unsafe { w.bits(ioscr) });
        self.tsc.ioccr.write(|w| unsafe { w.bits(ioccr) });

        self.clear_flags();
        self.tsc.cr.modify(|_, w| w.iodef().clear_bit());
        self.tsc.cr.modify(|_, w| w.start().set_bit());
    }

    /// Start an acquisition and block until it is complete
    pub fn acquire(&mut self, sample_config: &SampleConfig) {
        self.start(sample_config);
        while !self.is_finished() {}
    }

    /// Returns true once the acquisition has ended, either normally or on max count
    pub fn is_finished(&self) -> bool {
        let isr = self.tsc.isr.read();
        isr.eoaf().bit_is_set() || isr.mcef().bit_is_set()
    }

    /// Count for one group (starting at 1) from the last acquisition
    pub fn read_group(&self, group: u8) -> u16 {
        let group_status = self.tsc.iogcsr.read().bits() >> 16;

        if group_status & (1 << (group - 1)) == 0 {
            return self.overrun_count();
        }
        match group {
            1 => self.tsc.iog1cr.read().cnt().bits(),
            2 => self.tsc.iog2cr.read().cnt().bits(),
            3 => self.tsc.iog3cr.read().cnt().bits(),
            4 => self.tsc.iog4cr.read().cnt().bits(),
            5 => self.tsc.iog5cr.read().cnt().bits(),
            6 => self.tsc.iog6cr.read().cnt().bits(),
            _ => self.overrun_count(),
        }
    }

    pub fn clear_flags(&mut self) {
        self.tsc.icr.write(|w| {
            w.eoaic().set_bit() // end-of-acquisition
            .mceic().set_bit() // max-count-error
        });
    }
}

impl SampleSource for Tsc {
    type Channel = Channel;

    fn read_raw(&mut self, channel: Channel) -> u16 {
        match self.sample_caps.try_channel(channel) {
            Some(sample_config) => {
                self.acquire(&sample_config);
                self.read_group(channel.group())
            }
            None => self.overrun_count(),
        }
    }
}
