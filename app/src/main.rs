#![no_main]
#![no_std]

use core::sync::atomic::{AtomicU32, Ordering};
use cortex_m_rt::{entry, exception};
use panic_halt as _;

use stm32f0xx_hal as hal;

use touch::tsc::{self, Channel, SampleConfig, Tsc};
use touch::{Millis, TouchConfig, TouchEvent, TouchState};

use crate::hal::pac;
use crate::hal::pac::interrupt;
use crate::hal::prelude::*;

mod serial;

/// Sampling caps for every TSC group in use. The pad is on G1IO1 (PA0) with
/// its cap on G1IO2 (PA1).
static SAMPLE_CAPS: SampleConfig = SampleConfig::new().sample(Channel::new(1, 2));
const PAD: Channel = Channel::new(1, 1);

/// HCLK/16 pulses, two-cycle transfers. An idle pad stays well under 4095
/// transfers, so there is no point waiting longer than that for a reading.
static TSC_CONFIG: tsc::Config = tsc::Config {
    prescale: 4,
    max_count: 4,
    charge_high: 1,
    charge_low: 1,
};

/// TSC counts for the pad. Idle reads around 1550-1600, a fingertip pulls it
/// down by 200 or more.
static TOUCH_CONFIG: TouchConfig = TouchConfig {
    threshold: 1450,
    hold_duration: 600,
};

const POLL_INTERVAL_MS: Millis = 10;
const IDLE_TIMEOUT_MS: Millis = 30_000;

static TIME: AtomicU32 = AtomicU32::new(0);

fn now_millis() -> Millis {
    TIME.load(Ordering::Relaxed)
}

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();

    let mut flash = dp.FLASH;
    let mut rcc = dp.RCC.configure().sysclk(48.mhz()).freeze(&mut flash);
    let gpioa = dp.GPIOA.split(&mut rcc);
    let gpiob = dp.GPIOB.split(&mut rcc);
    let gpioc = dp.GPIOC.split(&mut rcc);

    // A library requiring a critical section to set a gpio AF register is bad and I just won't.
    let fake_cs = unsafe { cortex_m::interrupt::CriticalSection::new() };

    // Touch pins
    let _pad = gpioa.pa0.into_alternate_af3(&fake_cs);
    let _g1_cap = gpioa.pa1.into_alternate_af3(&fake_cs);

    // Lit while the pad is held
    let mut led = gpioc.pc9.into_push_pull_output(&fake_cs);

    let mut syst = hal::timers::Timer::syst(cp.SYST, 1000.hz(), &mut rcc);
    syst.listen(&hal::timers::Event::TimeOut);

    let tx_pin = gpiob.pb6.into_alternate_af0(&fake_cs);
    let rx_pin = gpiob.pb7.into_alternate_af0(&fake_cs);
    let uart = hal::serial::Serial::usart1(dp.USART1, (tx_pin, rx_pin), 115200.bps(), &mut rcc);
    serial::init(uart, 4);

    let tsc = Tsc::new(Some(TSC_CONFIG), SAMPLE_CAPS);
    let mut pad = TouchState::new(tsc, now_millis, PAD, Some(TOUCH_CONFIG));

    let raw = pad.read_raw();
    serial::ready(pad.channel(), pad.threshold(), raw);

    let mut next_time: Millis = 0;
    let mut hold_reported = false;
    let mut idle_reported = false;

    loop {
        let time = now_millis();
        if time.wrapping_sub(next_time) as i32 >= 0 {
            next_time = time.wrapping_add(POLL_INTERVAL_MS);

            let event = pad.poll();

            if pad.is_held() {
                led.set_high().ok();
            } else {
                led.set_low().ok();
            }

            let report = match event {
                TouchEvent::Click => {
                    hold_reported = false;
                    idle_reported = false;
                    true
                },
                TouchEvent::Hold if !hold_reported => {
                    hold_reported = true;
                    true
                },
                TouchEvent::Unclick => true,
                _ => false,
            };

            if report {
                let duration = match event {
                    TouchEvent::Unclick => pad.last_completed_hold_duration(),
                    _ => pad.current_hold_duration(),
                };
                serial::event(event, time, duration);
            }

            let idle_for = time.wrapping_sub(pad.last_activity_timestamp());
            if pad.is_unheld() && !idle_reported && idle_for >= IDLE_TIMEOUT_MS {
                idle_reported = true;
                serial::idle(time, pad.last_activity_timestamp());
            }
        }

        cortex_m::asm::wfi();
    }
}

#[exception]
fn SysTick() {
    let time = TIME.load(Ordering::Relaxed);
    TIME.store(time.wrapping_add(1), Ordering::Relaxed);
}
