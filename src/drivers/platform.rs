use fugit::MillisDurationU32;
use nrf52832_hal::pac::{RTC1, WDT};
use nrf52832_hal::rtc::{Rtc, RtcCompareReg, RtcInterrupt};

use crate::event_loop::Platform;
use crate::transport::StartupTimeout;

const LFCLK_HZ: u64 = 32_768;
/// Largest value the 24-bit RTC counter reaches.
const RTC_MAX: u32 = 0x00FF_FFFF;

pub struct BoardPlatform {
    wdt: WDT,
    rtc: Rtc<RTC1>,
    timeout: &'static StartupTimeout,
}

impl BoardPlatform {
    /// RTC1 prescaler giving a tick of roughly one millisecond.
    pub const PRESCALER: u32 = 32;

    pub fn new(wdt: WDT, rtc: Rtc<RTC1>, timeout: &'static StartupTimeout) -> Self {
        BoardPlatform { wdt, rtc, timeout }
    }

    fn ticks(timeout: MillisDurationU32) -> u32 {
        let ticks = u64::from(timeout.to_millis()) * LFCLK_HZ
            / (u64::from(Self::PRESCALER + 1) * 1000);
        ticks.clamp(1, u64::from(RTC_MAX)) as u32
    }
}

impl Platform for BoardPlatform {
    fn wait_for_event(&mut self) {
        cortex_m::asm::wfe();
    }

    fn watchdog_running(&self) -> bool {
        self.wdt.runstatus.read().runstatus().bit_is_set()
    }

    fn watchdog_reload(&mut self, channel: u8) {
        self.wdt.rr[usize::from(channel)].write(|w| w.rr().reload());
    }

    fn arm_startup_timer(&mut self, timeout: MillisDurationU32) {
        self.timeout.rearm();

        self.rtc.disable_counter();
        self.rtc.clear_counter();
        if let Err(e) = self.rtc.set_compare(RtcCompareReg::Compare0, Self::ticks(timeout)) {
            warn!("startup timer not armed: {:?}", e);
            return;
        }
        self.rtc.reset_event(RtcInterrupt::Compare0);
        self.rtc.enable_event(RtcInterrupt::Compare0);
        self.rtc.enable_interrupt(RtcInterrupt::Compare0, None);
        self.rtc.enable_counter();
    }
}

/// Called from the RTC1 interrupt: stop the one-shot timer and clear its
/// event so the interrupt does not fire again.
pub fn acknowledge_startup_timer() {
    let rtc = unsafe { &*RTC1::ptr() };
    rtc.intenclr.write(|w| w.compare0().clear());
    rtc.events_compare[0].reset();
    rtc.tasks_stop.write(|w| unsafe { w.bits(1) });
}
