//! Append-only CSV sinks.
//!
//! Fixed filenames in the output directory, column headers written once
//! at startup. Per-iteration histogram files are created on demand as
//! `hist_<iter>.txt` / `disj_<iter>.txt`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use gyre_mesh::{Mesh, Phase};

use crate::HopHistograms;

/// The simulation's log files.
#[derive(Debug)]
pub struct LogSinks {
    dir: PathBuf,
    log: BufWriter<File>,
    node: BufWriter<File>,
    states: BufWriter<File>,
    fx: BufWriter<File>,
}

impl LogSinks {
    pub fn open(dir: &Path) -> io::Result<Self> {
        let log = BufWriter::new(File::create(dir.join("log.txt"))?);
        let node = BufWriter::new(File::create(dir.join("node.txt"))?);
        let mut states = BufWriter::new(File::create(dir.join("states.txt"))?);
        writeln!(states, "iter,join,wait,xData,askPeer")?;
        let mut fx = BufWriter::new(File::create(dir.join("fx.txt"))?);
        writeln!(fx, "iter,fx,fx^2,n,avg,stddev")?;
        Ok(Self { dir: dir.to_path_buf(), log, node, states, fx })
    }

    /// One free-form summary line in the run log.
    pub fn write_log(&mut self, iter: u64, summary: &str) -> io::Result<()> {
        writeln!(self.log, "{iter}: {summary}")
    }

    /// Track the node in arena slot 0: its position and the positions of
    /// its data. Skipped while the slot is empty.
    pub fn write_node(&mut self, iter: u64, mesh: &Mesh) -> io::Result<()> {
        let Some(node) = mesh.nodes().first().and_then(|n| n.as_ref()) else {
            return Ok(());
        };
        let locations = node.data_locations(mesh.data());
        let joined: Vec<String> = locations.iter().map(|v| v.to_string()).collect();
        writeln!(
            self.node,
            "{iter},{},{},[{}]",
            node.location,
            locations.len(),
            joined.join(" ")
        )
    }

    /// Per-phase counts of what nodes did this tick.
    pub fn write_states(&mut self, iter: u64, counts: &[usize; Phase::COUNT]) -> io::Result<()> {
        writeln!(
            self.states,
            "{iter},{},{},{},{}",
            counts[Phase::Join.index()],
            counts[Phase::Wait.index()],
            counts[Phase::ExchangeData.index()],
            counts[Phase::AskPeer.index()]
        )
    }

    /// Aggregate objective statistics. `stddev` is written verbatim; the
    /// population formula can go slightly negative under float error.
    pub fn write_fx(
        &mut self,
        iter: u64,
        fx: f64,
        fx_sq: f64,
        n_fx: usize,
        avg: f64,
        stddev: f64,
    ) -> io::Result<()> {
        writeln!(self.fx, "{iter},{fx},{fx_sq},{n_fx},{avg},{stddev}")
    }

    /// Emit the hop and disjointedness histograms for one iteration into
    /// their own files.
    pub fn write_histograms(&mut self, iter: u64, hist: &HopHistograms) -> io::Result<()> {
        let mut hops = BufWriter::new(File::create(self.dir.join(format!("hist_{iter}.txt")))?);
        writeln!(hops, "hops,count")?;
        for (h, count) in hist.hops.iter().enumerate() {
            writeln!(hops, "{h},{count}")?;
        }
        hops.flush()?;
        let mut disj = BufWriter::new(File::create(self.dir.join(format!("disj_{iter}.txt")))?);
        writeln!(disj, "disjoint,count")?;
        for (k, count) in hist.disjoint.iter().enumerate() {
            writeln!(disj, "{k},{count}")?;
        }
        disj.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.log.flush()?;
        self.node.flush()?;
        self.states.flush()?;
        self.fx.flush()
    }
}
