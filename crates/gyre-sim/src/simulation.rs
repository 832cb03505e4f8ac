//! The tick/tock driver and its supervisor thread.
//!
//! One dedicated thread drives ticks on a fixed period. Each tick body
//! runs under the writer half of the world lock: optional histogram
//! computation, state application and advancement, event hooks, then
//! statistics and CSV writes. Visualizers hold the reader half for the
//! duration of one frame; the redraw callback fires after the writer
//! lock is released so a callback that re-enters simulation APIs cannot
//! deadlock.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::info;

use crate::{hop_histograms, is_hop_hist_iter, Factories, LogSinks, PeerPolicy, Tocker, World};

/// The tick period of the simulation thread.
pub const TICK_PERIOD: Duration = Duration::from_millis(16);

/// Construction parameters for a simulation.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub n_start_nodes: usize,
    pub n_max_data: usize,
    pub n_max_node: usize,
    pub seed: u64,
    /// Skip every file sink; state is only observable through the lock.
    pub viz_only: bool,
    pub out_dir: PathBuf,
    pub factories: Factories,
    pub peer_policy: PeerPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            n_start_nodes: 100,
            n_max_data: 1_000_000,
            n_max_node: 1000,
            seed: 1,
            viz_only: false,
            out_dir: PathBuf::from("."),
            factories: Factories::default(),
            peer_policy: PeerPolicy::default(),
        }
    }
}

/// Per-tick numbers handed to the redraw callback, after the writer lock
/// has been released.
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    pub iteration: u64,
    /// Aggregate objective, rounded to the nearest integer.
    pub fx: i64,
    pub n_fx: usize,
    pub avg: f64,
    pub stddev: f64,
    /// Whole tick including lock acquisition.
    pub total: Duration,
    /// Portion after the writer lock was acquired.
    pub post_lock: Duration,
}

pub type RedrawFn = Box<dyn FnMut(TickReport) + Send>;

/// The simulation driver. Owns the world lock, the event hooks and the
/// sinks; [`Simulation::step`] runs one full tick body and is what both
/// the supervisor thread and tests call.
pub struct Simulation {
    world: Arc<RwLock<World>>,
    tockers: Vec<Box<dyn Tocker>>,
    sinks: Option<LogSinks>,
    redraw: Option<RedrawFn>,
    iteration: u64,
}

impl Simulation {
    pub fn new(config: SimConfig, tockers: Vec<Box<dyn Tocker>>) -> io::Result<Self> {
        let sinks = if config.viz_only {
            None
        } else {
            Some(LogSinks::open(&config.out_dir)?)
        };
        let world = World::new(
            config.n_max_data,
            config.n_max_node,
            config.n_start_nodes,
            config.seed,
            config.factories,
            config.peer_policy,
        );
        Ok(Self {
            world: Arc::new(RwLock::new(world)),
            tockers,
            sinks,
            redraw: None,
            iteration: 0,
        })
    }

    /// The shared world lock, the visualizer side of the contract.
    pub fn world(&self) -> Arc<RwLock<World>> {
        self.world.clone()
    }

    /// Install the callback invoked after every tick, outside the lock.
    pub fn set_redraw(&mut self, redraw: RedrawFn) {
        self.redraw = Some(redraw);
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Run one full tick: histograms when due, state application and
    /// advancement, event hooks, statistics, CSV writes, then the redraw
    /// callback once the lock is down.
    pub fn step(&mut self) {
        let i = self.iteration;
        let start = Instant::now();
        let (fx, n_fx, avg, stddev, post_lock_start) = {
            let mut world = self.world.write();
            let post_lock_start = Instant::now();
            if let Some(sinks) = &mut self.sinks {
                if is_hop_hist_iter(i) {
                    let hist = hop_histograms(world.mesh());
                    let _ = sinks.write_histograms(i, &hist);
                }
            }
            let sinks = &mut self.sinks;
            world.tick(|summary| {
                if let Some(s) = sinks.as_mut() {
                    let _ = s.write_log(i, &summary);
                }
            });
            for tocker in &mut self.tockers {
                tocker.tock(&mut world, i);
            }
            let (fx, fx_sq, n_fx) = world.mesh().fx_statistics();
            let (avg, stddev) = if n_fx > 0 {
                let avg = fx / n_fx as f64;
                (avg, fx_sq / n_fx as f64 - avg * avg)
            } else {
                (0.0, 0.0)
            };
            if let Some(sinks) = &mut self.sinks {
                let counts = world.mesh().count_states();
                let _ = sinks.write_states(i, &counts);
                let _ = sinks.write_node(i, world.mesh());
                let _ = sinks.write_fx(i, fx, fx_sq, n_fx, avg, stddev);
            }
            (fx, n_fx, avg, stddev, post_lock_start)
        };
        let end = Instant::now();
        if let Some(redraw) = &mut self.redraw {
            redraw(TickReport {
                iteration: i,
                fx: fx.round() as i64,
                n_fx,
                avg,
                stddev,
                total: end - start,
                post_lock: end - post_lock_start,
            });
        }
        self.iteration += 1;
    }

    /// Flush sinks, typically on shutdown.
    pub fn flush(&mut self) {
        if let Some(sinks) = &mut self.sinks {
            let _ = sinks.flush();
        }
    }

    /// Move the driver onto its dedicated thread and return the control
    /// handle. The thread ticks every [`TICK_PERIOD`] until told to quit,
    /// pausing and resuming on demand.
    pub fn run(mut self) -> SimulationHandle {
        let world = self.world.clone();
        let (done_tx, done_rx) = bounded::<()>(0);
        let (ack_tx, ack_rx) = bounded::<()>(0);
        let (pause_tx, pause_rx) = bounded::<()>(0);
        let (play_tx, play_rx) = bounded::<()>(0);
        let thread = thread::spawn(move || {
            info!("simulation thread started");
            let ticker = tick(TICK_PERIOD);
            'run: loop {
                select! {
                    recv(done_rx) -> _ => break 'run,
                    recv(pause_rx) -> _ => {
                        select! {
                            recv(done_rx) -> _ => break 'run,
                            recv(play_rx) -> _ => {}
                        }
                    }
                    recv(ticker) -> _ => self.step(),
                }
            }
            self.flush();
            info!(iterations = self.iteration, "simulation thread stopped");
            let _ = ack_tx.send(());
        });
        SimulationHandle {
            world,
            done_tx,
            ack_rx,
            pause_tx,
            play_tx,
            thread: Some(thread),
        }
    }
}

/// Control handle for a running simulation.
pub struct SimulationHandle {
    world: Arc<RwLock<World>>,
    done_tx: Sender<()>,
    ack_rx: Receiver<()>,
    pause_tx: Sender<()>,
    play_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SimulationHandle {
    /// Acquire the reader lock for the duration of one frame's read.
    /// Multiple readers may coexist; the simulation thread blocks on its
    /// writer half only between ticks.
    pub fn read(&self) -> RwLockReadGuard<'_, World> {
        self.world.read()
    }

    pub fn world(&self) -> Arc<RwLock<World>> {
        self.world.clone()
    }

    pub fn pause(&self) {
        let _ = self.pause_tx.send(());
    }

    pub fn play(&self) {
        let _ = self.play_tx.send(());
    }

    /// Stop the simulation thread, wait for its acknowledgement, and
    /// join it. Sinks are flushed before the ack.
    pub fn quit(mut self) {
        let _ = self.done_tx.send(());
        let _ = self.ack_rx.recv();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> SimConfig {
        SimConfig {
            n_start_nodes: 4,
            n_max_data: 64,
            n_max_node: 8,
            seed: 11,
            viz_only: false,
            out_dir: dir.to_path_buf(),
            factories: Factories::small(),
            peer_policy: PeerPolicy::default(),
        }
    }

    #[test]
    fn step_advances_iteration_and_writes_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = Simulation::new(test_config(dir.path()), Vec::new()).unwrap();
        for _ in 0..3 {
            sim.step();
        }
        sim.flush();
        assert_eq!(sim.iteration(), 3);
        let states = std::fs::read_to_string(dir.path().join("states.txt")).unwrap();
        let mut lines = states.lines();
        assert_eq!(lines.next(), Some("iter,join,wait,xData,askPeer"));
        // Header plus one line per tick.
        assert_eq!(lines.count(), 3);
        // Iteration 0 and 1 are hop-histogram iterations.
        assert!(dir.path().join("hist_0.txt").exists());
        assert!(dir.path().join("disj_1.txt").exists());
        assert!(!dir.path().join("hist_2.txt").exists());
    }

    #[test]
    fn viz_only_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.viz_only = true;
        let mut sim = Simulation::new(config, Vec::new()).unwrap();
        sim.step();
        assert!(!dir.path().join("states.txt").exists());
        assert!(!dir.path().join("hist_0.txt").exists());
    }

    #[test]
    fn redraw_fires_outside_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = Simulation::new(test_config(dir.path()), Vec::new()).unwrap();
        let world = sim.world();
        let (tx, rx) = std::sync::mpsc::channel();
        sim.set_redraw(Box::new(move |report| {
            // Re-entering the lock from the callback must not deadlock.
            let guard = world.read();
            let live = guard.mesh().live_node_count();
            tx.send((report.iteration, live)).unwrap();
        }));
        sim.step();
        let (iter, live) = rx.recv().unwrap();
        assert_eq!(iter, 0);
        assert_eq!(live, 4);
    }

    #[test]
    fn run_pause_play_quit() {
        let dir = tempfile::tempdir().unwrap();
        let sim = Simulation::new(test_config(dir.path()), Vec::new()).unwrap();
        let handle = sim.run();
        std::thread::sleep(Duration::from_millis(80));
        handle.pause();
        {
            let guard = handle.read();
            assert!(guard.mesh().live_node_count() > 0);
        }
        handle.play();
        std::thread::sleep(Duration::from_millis(40));
        handle.quit();
    }
}
