//! Headless simulation runner.
//!
//! Drives the tick loop with one optional churn experiment and reports
//! aggregate statistics through tracing. Selecting no experiment runs a
//! plain relaxation.

use std::path::PathBuf;

use clap::Parser;
use crossbeam_channel::bounded;
use gyre_sim::{
    Factories, GrowthAfterRelaxed, JoinAtRelaxed, LeaveAtRelaxed, PeerPolicy, Prod, SimConfig,
    Simulation, Tocker, RELAXED_ITER,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "gyre-sim", about = "Spherical content-routing simulator")]
struct Args {
    /// Initial number of nodes to simulate.
    #[arg(long, default_value_t = 100)]
    n_init_nodes: usize,

    /// Maximum number of pieces of data to simulate.
    #[arg(long, default_value_t = 1_000_000)]
    n_max_data: usize,

    /// Maximum number of nodes to simulate.
    #[arg(long, default_value_t = 1000)]
    n_max_nodes: usize,

    /// Seed for the simulation RNG; identical seeds reproduce runs.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Stop after this many iterations (0 = run until interrupted).
    #[arg(long, default_value_t = 10_000)]
    iterations: u64,

    /// Skip the CSV sinks; state is observable only through the lock.
    #[arg(long)]
    viz: bool,

    /// Directory for the CSV sinks.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Experiment: one node joins at the relaxation point.
    #[arg(long)]
    exp_node_join: bool,

    /// Experiment: one node leaves at the relaxation point.
    #[arg(long)]
    exp_node_leave: bool,

    /// Experiment: nodes grow data after relaxation at ~1%.
    #[arg(long)]
    exp_gen_data_after_relax: bool,

    /// Experiment: nodes grow data after relaxation at ~2%.
    #[arg(long)]
    exp_gen_data_after_relax_2: bool,

    /// Experiment: growth plus probabilistic node churn.
    #[arg(long)]
    exp_prod: bool,

    /// Retain closest peers instead of maximizing spread.
    #[arg(long)]
    peer_closest: bool,

    /// Retain a max-spread sublist backed by a closest sublist.
    #[arg(long)]
    peer_max_spread_then_closest: bool,
}

const N_MAX_PEER_SPREAD: usize = 16;
const N_THEN_AFTER_CLOSEST: usize = 8;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gyre_sim=info,gyre=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let n_experiments = [
        args.exp_node_join,
        args.exp_node_leave,
        args.exp_gen_data_after_relax,
        args.exp_gen_data_after_relax_2,
        args.exp_prod,
    ]
    .iter()
    .filter(|f| **f)
    .count();
    if n_experiments > 1 {
        eprintln!("choose at most one exp_* flag");
        std::process::exit(2);
    }
    if args.peer_closest && args.peer_max_spread_then_closest {
        eprintln!("choose at most one peer_* flag");
        std::process::exit(2);
    }

    let mut factories = Factories::default();
    let mut tockers: Vec<Box<dyn Tocker>> = Vec::new();
    if args.exp_node_join {
        tockers.push(Box::new(JoinAtRelaxed));
    } else if args.exp_node_leave {
        tockers.push(Box::new(LeaveAtRelaxed));
    } else if args.exp_gen_data_after_relax {
        tockers.push(Box::new(GrowthAfterRelaxed));
    } else if args.exp_gen_data_after_relax_2 {
        tockers.push(Box::new(GrowthAfterRelaxed));
        factories = factories.with_fast_growth();
    } else if args.exp_prod {
        tockers.push(Box::new(Prod));
        factories = factories.with_fast_growth();
    }

    let peer_policy = if args.peer_closest {
        PeerPolicy::Closest { capacity: N_MAX_PEER_SPREAD }
    } else if args.peer_max_spread_then_closest {
        PeerPolicy::Hybrid {
            spread: N_MAX_PEER_SPREAD - N_THEN_AFTER_CLOSEST,
            closest: N_THEN_AFTER_CLOSEST,
        }
    } else {
        PeerPolicy::MaxSpread { capacity: N_MAX_PEER_SPREAD }
    };

    if !args.viz {
        if let Err(err) = std::fs::create_dir_all(&args.out_dir) {
            eprintln!("cannot create output directory: {err}");
            std::process::exit(1);
        }
    }

    let config = SimConfig {
        n_start_nodes: args.n_init_nodes,
        n_max_data: args.n_max_data,
        n_max_node: args.n_max_nodes,
        seed: args.seed,
        viz_only: args.viz,
        out_dir: args.out_dir,
        factories,
        peer_policy,
    };

    let mut sim = match Simulation::new(config, tockers) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("cannot open log sinks: {err}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        nodes = args.n_init_nodes,
        relaxed_iter = RELAXED_ITER,
        iterations = args.iterations,
        "starting simulation"
    );

    let (finished_tx, finished_rx) = bounded::<()>(1);
    let limit = args.iterations;
    sim.set_redraw(Box::new(move |report| {
        if report.iteration % 100 == 0 {
            tracing::info!(
                iter = report.iteration,
                fx = report.fx,
                n = report.n_fx,
                avg = report.avg,
                stddev = report.stddev,
                tick_ms = report.total.as_millis() as u64,
                "tick"
            );
        }
        if limit > 0 && report.iteration + 1 >= limit {
            let _ = finished_tx.try_send(());
        }
    }));

    let handle = sim.run();
    if limit > 0 {
        let _ = finished_rx.recv();
    } else {
        // Run until the process is interrupted.
        loop {
            std::thread::park();
        }
    }
    handle.quit();
    tracing::info!("simulation finished");
}
