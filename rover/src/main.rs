//! # Rover Supervisor
//!
//! Wires the control runtime together and runs it against the simulated
//! motor drivers: clock task, bus dispatch task, one control loop per
//! wheel, plus the cruise and arbitration behaviours on the bus.
//!
//! With `--travel-cm` the robot performs a fixed-distance maneuver and
//! shuts down; otherwise it cruises until ctrl-c (or `--duration-sec`).
//! On shutdown the supervisor closes every task in priority order and
//! prints a JSON status snapshot.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rover_common::config::RobotConfig;
use rover_common::event::{Event, Payload};
use rover_common::geometry::Geometry;
use rover_common::types::Orientation;
use rover_core::behaviour::{Arbitrator, CruiseBehaviour, TravelBehaviour};
use rover_core::control::motor::MotorController;
use rover_core::messaging::{MessageBus, MessageFactory};
use rover_core::rt::rt_setup;
use rover_core::sim::SimMotor;
use rover_core::task::{Supervisor, Task, TaskSpec};

/// Rover — mobile robot control runtime (simulation)
#[derive(Parser, Debug)]
#[command(name = "rover")]
#[command(version)]
#[command(about = "Mobile robot control runtime over simulated motors")]
struct Args {
    /// Path to the robot configuration TOML.
    #[arg(default_value = "config/rover.toml")]
    config: PathBuf,

    /// Perform a fixed-distance travel maneuver [cm], then shut down.
    #[arg(long)]
    travel_cm: Option<f64>,

    /// Cruise for this many seconds then shut down (0 = until ctrl-c).
    #[arg(long, default_value_t = 0.0)]
    duration_sec: f64,

    /// CPU core to pin the control threads to (rt feature only).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (rt feature only).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

/// Final runtime snapshot, printed as JSON on shutdown.
#[derive(Debug, Serialize)]
struct StatusSnapshot {
    tasks: Vec<TaskStatus>,
    port_steps: i64,
    stbd_steps: i64,
    messages_dispatched: u64,
    messages_pending: usize,
}

#[derive(Debug, Serialize)]
struct TaskStatus {
    name: String,
    state: String,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("rover v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("rover shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    info!(
        "config OK: kp={}, loop={}Hz, cruising={}cm/s",
        config.pid.kp, config.pid.loop_hz, config.cruise.cruising_velocity
    );

    // RT setup (mlockall, affinity, scheduler); no-op without the rt feature.
    rt_setup(args.cpu_core, args.rt_priority)?;

    // Simulated motor drivers and the two-wheel controller.
    let geometry = Geometry::from_config(&config.geometry);
    let port_sim = Arc::new(SimMotor::new(&geometry, 0.1));
    let stbd_sim = Arc::new(SimMotor::new(&geometry, 0.1));
    let motors = MotorController::new(port_sim.clone(), stbd_sim.clone(), &config);

    // Bus, factory and the behaviours consuming it.
    let bus = Arc::new(MessageBus::new());
    let factory = Arc::new(MessageFactory::new());
    let arbitrator = Arbitrator::new(&motors);
    arbitrator.register(&bus);
    let cruise = CruiseBehaviour::new(&motors, config.cruise);
    cruise.register(&bus);

    let mut supervisor = Supervisor::new();

    // Bus dispatch task: most urgent, drains ahead of the producers.
    let mut dispatcher = Task::new(TaskSpec::new("bus", 2, 2 * config.clock.tick_hz), config.task);
    {
        let bus = Arc::clone(&bus);
        dispatcher.run(move || {
            bus.dispatch();
        })?;
    }
    supervisor.register(dispatcher);

    // Per-wheel control loops, advancing the simulation in step.
    let sim_dt = 1.0 / f64::from(config.pid.loop_hz);
    for (orientation, sim) in [
        (Orientation::Port, Arc::clone(&port_sim)),
        (Orientation::Stbd, Arc::clone(&stbd_sim)),
    ] {
        let wheel = motors.wheel(orientation);
        let mut task = Task::new(
            TaskSpec::new(
                format!("pid-{}", orientation.label()),
                3,
                config.pid.loop_hz,
            )
            .safety_critical(),
            config.task,
        );
        task.run(move || {
            sim.advance(sim_dt);
            let mut wheel = wheel.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            wheel.loop_iteration();
        })?;
        supervisor.register(task);
    }

    // Clock task: ticks, with a tock every Nth.
    let mut clock = Task::new(TaskSpec::new("clock", 4, config.clock.tick_hz), config.task);
    {
        let bus = Arc::clone(&bus);
        let factory = Arc::clone(&factory);
        let ticks_per_tock = u64::from(config.clock.ticks_per_tock);
        let counter = AtomicU64::new(0);
        clock.run(move || {
            let n = counter.fetch_add(1, Ordering::Relaxed);
            let event = if n % ticks_per_tock == 0 {
                Event::ClockTock
            } else {
                Event::ClockTick
            };
            if let Err(e) = bus.handle(factory.message(event, Payload::Tick(n))) {
                warn!(error = %e, "clock message dropped");
            }
        })?;
    }
    supervisor.register(clock);

    supervisor.enable_all()?;
    info!("all tasks enabled");

    // Ctrl-c requests a graceful shutdown.
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    if let Some(distance_cm) = args.travel_cm {
        // Fixed-distance maneuver: two per-wheel threads, joined before
        // the maneuver reports complete.
        let travel = TravelBehaviour::new(&motors, config.travel);
        let outcome = travel.travel(distance_cm)?;
        info!(
            port_steps = outcome.port_steps,
            stbd_steps = outcome.stbd_steps,
            target_steps = outcome.target_steps,
            "maneuver finished"
        );
    } else {
        // Cruise until ctrl-c or the requested duration.
        cruise.enable();
        let started = Instant::now();
        while running.load(Ordering::SeqCst) {
            if args.duration_sec > 0.0 && started.elapsed().as_secs_f64() >= args.duration_sec {
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        cruise.disable();
    }

    // Drain whatever the producers queued last, then close everything.
    supervisor.disable_all()?;
    bus.dispatch();
    supervisor.close_all();

    let (port_steps, stbd_steps) = motors.steps();
    let snapshot = StatusSnapshot {
        tasks: supervisor
            .states()
            .into_iter()
            .map(|(name, state)| TaskStatus {
                name,
                state: format!("{state:?}"),
            })
            .collect(),
        port_steps,
        stbd_steps,
        messages_dispatched: bus.dispatched(),
        messages_pending: bus.pending(),
    };
    info!("final status:\n{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}

/// Load the configuration file; a missing file falls back to defaults
/// with a warning, an invalid one is fatal.
fn load_config(path: &PathBuf) -> Result<RobotConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(RobotConfig::load(path)?)
    } else {
        warn!(
            "config {} not found; continuing with defaults",
            path.display()
        );
        Ok(RobotConfig::default())
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
