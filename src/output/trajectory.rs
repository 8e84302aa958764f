//! Trajectory output
//!
//! The driver only knows the `FrameSink` trait: one `add_frame` call per save
//! boundary and a single `close` at the end. `XyzWriter` is the file-backed
//! implementation. Each frame is
//!
//! ```text
//! <particle count>
//! id x y z vx vy vz radius mass pressure time
//! <one line per particle>
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;
use crate::simulation::states::Particle;

pub const FRAME_HEADER: &str = "id x y z vx vy vz radius mass pressure time";

pub trait FrameSink {
    fn add_frame(&mut self, particles: &[Particle], time: f64) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Sink that drops every frame
pub struct NullSink;

impl FrameSink for NullSink {
    fn add_frame(&mut self, _particles: &[Particle], _time: f64) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct XyzWriter<W: Write> {
    out: W,
    frames: usize,
}

impl XyzWriter<BufWriter<File>> {
    /// Truncate or create `<directory>/<name>.xyz`
    pub fn create(directory: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(directory)?;
        let path: PathBuf = directory.join(format!("{name}.xyz"));
        debug!("writing trajectory to {}", path.display());
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> XyzWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, frames: 0 }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for XyzWriter<W> {
    fn add_frame(&mut self, particles: &[Particle], time: f64) -> Result<()> {
        writeln!(self.out, "{}", particles.len())?;
        writeln!(self.out, "{FRAME_HEADER}")?;
        for p in particles {
            writeln!(
                self.out,
                "{} {} {} {} {} {} {} {} {} {} {}",
                p.id, p.x.x, p.x.y, p.x.z, p.v.x, p.v.y, p.v.z, p.radius, p.m, p.pressure, time
            )?;
        }
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
