//! Wavefront OBJ frame output
//!
//! Points are padded with zeros to three coordinates (or truncated to the
//! first three for d > 3); faces use 1-based indices.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::geometry::Grid;
use crate::error::ElasticResult;

/// Receives the deformed configuration after every accepted step
pub trait FrameExporter {
    /// Export one frame. Frames are numbered from 1 (the initial state).
    fn export(&mut self, frame: usize, positions: &Grid, faces: &[Vec<usize>]) -> ElasticResult<()>;
}

/// Writes `frame_<k>.obj` files into a directory
pub struct ObjExporter {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl ObjExporter {
    /// Create the exporter, creating `output_dir` if needed
    pub fn new<P: AsRef<Path>>(output_dir: P) -> ElasticResult<Self> {
        fs::create_dir_all(output_dir.as_ref())?;
        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            written: Vec::new(),
        })
    }

    pub fn frame_path(&self, frame: usize) -> PathBuf {
        self.output_dir.join(format!("frame_{}.obj", frame))
    }

    /// Files written so far, in order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Write a single OBJ file
    pub fn write_obj<P: AsRef<Path>>(path: P, positions: &Grid, faces: &[Vec<usize>]) -> ElasticResult<()> {
        let mut out = BufWriter::new(File::create(path)?);

        for i in 0..positions.num_points() {
            let mut xyz = [0.0; 3];
            for (slot, c) in xyz.iter_mut().zip(positions.points.row(i).iter()) {
                *slot = *c;
            }
            writeln!(out, "v {} {} {}", xyz[0], xyz[1], xyz[2])?;
        }

        for face in faces {
            write!(out, "f")?;
            for &idx in face {
                write!(out, " {}", idx + 1)?;
            }
            writeln!(out)?;
        }

        out.flush()?;
        Ok(())
    }
}

impl FrameExporter for ObjExporter {
    fn export(&mut self, frame: usize, positions: &Grid, faces: &[Vec<usize>]) -> ElasticResult<()> {
        let path = self.frame_path(frame);
        Self::write_obj(&path, positions, faces)?;
        self.written.push(path);
        Ok(())
    }
}

/// Keeps every exported frame in memory
#[derive(Debug, Default)]
pub struct MemoryExporter {
    pub frames: Vec<(usize, Grid)>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameExporter for MemoryExporter {
    fn export(&mut self, frame: usize, positions: &Grid, _faces: &[Vec<usize>]) -> ElasticResult<()> {
        self.frames.push((frame, positions.clone()));
        Ok(())
    }
}

/// Discards frames
pub struct NullExporter;

impl FrameExporter for NullExporter {
    fn export(&mut self, _frame: usize, _positions: &Grid, _faces: &[Vec<usize>]) -> ElasticResult<()> {
        Ok(())
    }
}
