//! Console report lines
//!
//! The layout is fixed: banner, separator, raw-call latency in microseconds,
//! then a Put/Get pair in milliseconds per payload size, separator, footer.

use std::io::{self, Write};
use std::time::Duration;

const SEPARATOR_WIDTH: usize = 20;

pub fn separator() -> String {
    "*".repeat(SEPARATOR_WIDTH)
}

/// Writes the speed check report to any sink, usually stdout.
pub struct ConsoleReport<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn banner(&mut self, bridge_name: &str) -> io::Result<()> {
        writeln!(self.out, "{} speed test", bridge_name)?;
        writeln!(self.out, "{}", separator())?;
        self.out.flush()
    }

    pub fn raw_speed(&mut self, average: Duration) -> io::Result<()> {
        writeln!(self.out, "Raw speed:")?;
        writeln!(self.out, "    {:.1} usec per loop", average.as_secs_f64() * 1e6)?;
        self.out.flush()
    }

    pub fn put(&mut self, side: usize, average: Duration) -> io::Result<()> {
        self.transfer("Put", side, average)
    }

    pub fn get(&mut self, side: usize, average: Duration) -> io::Result<()> {
        self.transfer("Get", side, average)
    }

    fn transfer(&mut self, label: &str, side: usize, average: Duration) -> io::Result<()> {
        writeln!(self.out, "{} {}x{}:", label, side, side)?;
        writeln!(self.out, "    {:.1} msec", average.as_secs_f64() * 1e3)?;
        self.out.flush()
    }

    pub fn footer(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", separator())?;
        writeln!(self.out, "Test complete!")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
