//! Checkpoint persistence
//!
//! A checkpoint is a JSON-lines file, one particle per line, carrying every
//! field of `Particle` including the integrator history. Floats are written
//! in shortest round-trip form, so `load(save(p))` restores the exact bits.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Result, SimError};
use crate::simulation::states::Particle;

/// Path of checkpoint `name` inside `directory`
pub fn checkpoint_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{name}.jsonl"))
}

pub fn save(particles: &[Particle], directory: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(directory)?;
    let path = checkpoint_path(directory, name);
    let mut out = BufWriter::new(File::create(&path)?);
    for p in particles {
        let line = serde_json::to_string(p).map_err(|source| SimError::CheckpointFormat { line: 0, source })?;
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    info!("saved {} particles to {}", particles.len(), path.display());
    Ok(path)
}

pub fn load(directory: &Path, name: &str) -> Result<Vec<Particle>> {
    let path = checkpoint_path(directory, name);
    let reader = BufReader::new(File::open(&path)?);
    let mut particles = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let p: Particle = serde_json::from_str(&line).map_err(|source| SimError::CheckpointFormat { line: i + 1, source })?;
        p.validate()
            .map_err(|e| SimError::config(format!("{} line {}: {e}", path.display(), i + 1)))?;
        particles.push(p);
    }
    info!("loaded {} particles from {}", particles.len(), path.display());
    Ok(particles)
}

pub fn exists(directory: &Path, name: &str) -> bool {
    checkpoint_path(directory, name).is_file()
}
