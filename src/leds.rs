//! Countdown on the board LEDs before the camera fires.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// One countdown step: blink `count` times, each `hold_ms` on and `hold_ms`
/// off, then wait `dwell_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkStep {
    pub hold_ms: u32,
    pub dwell_ms: u32,
    pub count: u32,
}

/// 3-2-1 with a pause between groups
pub const COUNTDOWN: [BlinkStep; 3] = [
    BlinkStep {
        hold_ms: 100,
        dwell_ms: 250,
        count: 3,
    },
    BlinkStep {
        hold_ms: 100,
        dwell_ms: 250,
        count: 2,
    },
    BlinkStep {
        hold_ms: 100,
        dwell_ms: 0,
        count: 1,
    },
];

pub struct LedCountdown<P, D> {
    pin: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> LedCountdown<P, D> {
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    pub fn blink(&mut self, hold_ms: u32, dwell_ms: u32, count: u32) -> Result<(), P::Error> {
        for _ in 0..count {
            self.pin.set_high()?;
            self.delay.delay_ms(hold_ms);
            self.pin.set_low()?;
            self.delay.delay_ms(hold_ms);
        }
        self.delay.delay_ms(dwell_ms);
        Ok(())
    }

    pub fn countdown(&mut self) -> Result<(), P::Error> {
        for step in COUNTDOWN {
            self.blink(step.hold_ms, step.dwell_ms, step.count)?;
        }
        Ok(())
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}
