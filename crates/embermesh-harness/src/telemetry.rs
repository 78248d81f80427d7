//! Scriptable battery telemetry.

use std::cell::Cell;
use std::rc::Rc;

use embermesh_core::PowerTelemetry;

#[derive(Debug)]
struct TelemetryInner {
    mv: Cell<u16>,
    percent: Cell<u8>,
    projected: Cell<Option<u32>>,
    usb: Cell<bool>,
}

/// Shared telemetry double; clones observe the same readings. Defaults to
/// USB powered so scenarios without battery scripting stay silent.
#[derive(Debug, Clone)]
pub struct SimTelemetry {
    inner: Rc<TelemetryInner>,
}

impl Default for SimTelemetry {
    fn default() -> Self {
        Self {
            inner: Rc::new(TelemetryInner {
                mv: Cell::new(5_000),
                percent: Cell::new(100),
                projected: Cell::new(None),
                usb: Cell::new(true),
            }),
        }
    }
}

impl SimTelemetry {
    /// Healthy USB-powered telemetry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the readings.
    pub fn set(&self, mv: u16, percent: u8, projected: Option<u32>, usb: bool) {
        self.inner.mv.set(mv);
        self.inner.percent.set(percent);
        self.inner.projected.set(projected);
        self.inner.usb.set(usb);
    }
}

impl PowerTelemetry for SimTelemetry {
    fn battery_millivolts(&self) -> u16 {
        self.inner.mv.get()
    }

    fn battery_percent(&self) -> u8 {
        self.inner.percent.get()
    }

    fn projected_hours(&self) -> Option<u32> {
        self.inner.projected.get()
    }

    fn usb_powered(&self) -> bool {
        self.inner.usb.get()
    }
}
