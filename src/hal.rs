use core::fmt;
use core::ops::{Deref, DerefMut};

/// An already-mapped MMIO address, as handed over by the platform glue.
pub type MmioAddr = usize;

#[repr(transparent)]
pub struct Reg16(volatile_register::RW<u16>);

#[repr(transparent)]
pub struct Reg32(volatile_register::RW<u32>);

impl fmt::Debug for Reg16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("Reg16[RW] {:#06x}", self.0.read()))
    }
}

impl fmt::Debug for Reg32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("Reg32[RW] {:#010x}", self.0.read()))
    }
}

impl Reg16 {
    pub fn read(&self) -> u16 {
        self.0.read()
    }

    pub fn write(&mut self, val: u16) {
        unsafe { self.0.write(val) };
    }
}

impl Reg32 {
    pub fn read(&self) -> u32 {
        self.0.read()
    }

    pub fn write(&mut self, val: u32) {
        unsafe { self.0.write(val) };
    }
}

/// Borrow of a `#[repr(C)]` register block living at a fixed MMIO address.
pub struct RegWindow<'a, T> {
    ptr: &'a mut T,
}

impl<T> RegWindow<'_, T> {
    /// `base` must point at a live, mapped register block of layout `T` that
    /// no other code accesses for the lifetime of the window.
    pub fn from_raw(base: MmioAddr) -> Self {
        Self {
            ptr: unsafe { &mut *(base as *mut T) },
        }
    }
}

impl<T> Deref for RegWindow<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.ptr
    }
}

impl<T> DerefMut for RegWindow<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ptr
    }
}

/// One spin per core cycle at the 134MHz the SDHC bus side runs from.
const SPINS_PER_MS: u64 = 134_000;

pub struct Timer;

impl Timer {
    /// Bounded busy-wait. The clock settle path needs a short fixed hold,
    /// not a suspension point, so a calibrated spin is enough.
    pub fn mdelay(&self, ms: u64) {
        for _ in 0..ms.saturating_mul(SPINS_PER_MS) {
            core::hint::spin_loop();
        }
    }
}
