//! Touch event log on USART1.
//!
//! Lines are formatted into a fixed buffer and queued whole; the TXE
//! interrupt drains the queue so logging never stalls the poll loop. A line
//! that doesn't fit in the buffer or the queue is dropped, never truncated.

use core::cell::RefCell;
use core::fmt::{Debug, Write};

use cortex_m::interrupt::Mutex;
use heapless::spsc::{Consumer, Producer, Queue};
use heapless::String;
use stm32f0xx_hal::gpio::{gpiob, Alternate, AF0};
use touch::{Millis, TouchEvent};

use crate::hal::{
    pac,
    prelude::*,
    serial::{Event, Serial},
};
use crate::interrupt;

const TX_Q_SIZE: usize = 256;
const LINE_SIZE: usize = 64;

pub type Port = Serial<pac::USART1, gpiob::PB6<Alternate<AF0>>, gpiob::PB7<Alternate<AF0>>>;

struct Log {
    port: Port,
    pending: Producer<'static, u8, TX_Q_SIZE>,
    outgoing: Consumer<'static, u8, TX_Q_SIZE>,
}

static LOG: Mutex<RefCell<Option<Log>>> = Mutex::new(RefCell::new(None));

/// Must be called once during application initialization. Lines logged
/// before this are discarded.
pub fn init(port: Port, irq_prio: u8) {
    let queue: &'static mut Queue<u8, TX_Q_SIZE> =
        cortex_m::singleton!(: Queue<u8, TX_Q_SIZE> = Queue::new()).unwrap();
    let (pending, outgoing) = queue.split();

    cortex_m::interrupt::free(|cs| {
        LOG.borrow(cs).replace(Some(Log { port, pending, outgoing }));
    });

    let mut nvic = unsafe { pac::CorePeripherals::steal() }.NVIC;
    unsafe {
        nvic.set_priority(pac::Interrupt::USART1, irq_prio);
        pac::NVIC::unmask(pac::Interrupt::USART1);
    }
}

/// Startup banner with the pad's configuration and an idle reading to tune against
pub fn ready(channel: impl Debug, threshold: u16, raw: u16) {
    send(format_args!("READY ch={:?} threshold={} raw={}", channel, threshold, raw));
}

/// `EVT <code> <name> t=<ms> dur=<ms>`
pub fn event(event: TouchEvent, time: Millis, duration: Millis) {
    send(format_args!("EVT {} {} t={} dur={}", u8::from(event), event.name(), time, duration));
}

/// No push or lift since `since`
pub fn idle(time: Millis, since: Millis) {
    send(format_args!("IDLE t={} since={}", time, since));
}

fn send(args: core::fmt::Arguments) {
    let mut line: String<LINE_SIZE> = String::new();
    if line.write_fmt(args).is_err() || line.push_str("\r\n").is_err() {
        return;
    }

    cortex_m::interrupt::free(|cs| {
        let mut log = LOG.borrow(cs).borrow_mut();
        let Some(log) = log.as_mut() else {
            return;
        };
        if log.pending.capacity() - log.pending.len() < line.len() {
            return;
        }
        for b in line.bytes() {
            let _ = log.pending.enqueue(b);
        }
        log.port.listen(Event::Txe);
    });
}

#[interrupt]
fn USART1() {
    cortex_m::interrupt::free(|cs| {
        let mut log = LOG.borrow(cs).borrow_mut();
        let Some(log) = log.as_mut() else {
            return;
        };

        match log.outgoing.peek() {
            Some(&b) => {
                // WouldBlock leaves the byte queued for the next TXE
                if log.port.write(b).is_ok() {
                    log.outgoing.dequeue();
                }
            },
            None => {
                // Drained; send() re-enables TXE when there is more
                log.port.unlisten(Event::Txe);
            }
        }
    });
}
