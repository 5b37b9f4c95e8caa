//! Integration tests for the rover control runtime.
//!
//! These exercise multiple modules together: supervised tasks feeding the
//! bus, priority dispatch driving the arbitration behaviours, and the
//! full travel maneuver closed over the simulated motors.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use rover_common::config::RobotConfig;
use rover_common::event::{ContactZones, Event, Payload};
use rover_common::types::Orientation;
use rover_core::behaviour::{Arbitrator, CruiseBehaviour, TravelBehaviour};
use rover_core::control::motor::MotorController;
use rover_core::fsm::State;
use rover_core::messaging::{MessageBus, MessageFactory};
use rover_core::sim::SimMotor;
use rover_core::task::{Supervisor, Task, TaskSpec};

/// Config tuned for fast, deterministic tests: wide-open slew and a PID
/// that converges quickly at a 100Hz loop.
fn test_config() -> RobotConfig {
    let mut config = RobotConfig::default();
    config.slew.rate_limit_per_sec = 100_000.0;
    config.pid.kp = 0.5;
    config.pid.sample_time_sec = 0.005;
    config.pid.loop_hz = 100;
    config.travel.loop_hz = 100;
    config
}

fn sim_motors(config: &RobotConfig) -> (Arc<SimMotor>, Arc<SimMotor>, MotorController) {
    let geometry = rover_common::geometry::Geometry::from_config(&config.geometry);
    let port = Arc::new(SimMotor::new(&geometry, 0.05));
    let stbd = Arc::new(SimMotor::new(&geometry, 0.05));
    let motors = MotorController::new(port.clone(), stbd.clone(), config);
    (port, stbd, motors)
}

fn setpoints(motors: &MotorController) -> (f64, f64) {
    let port = motors.wheel(Orientation::Port);
    let stbd = motors.wheel(Orientation::Stbd);
    let p = port.lock().unwrap().setpoint();
    let s = stbd.lock().unwrap().setpoint();
    (p, s)
}

// ─── Tasks + Bus ────────────────────────────────────────────────────

#[test]
fn clock_task_feeds_bus_through_supervised_lifecycle() {
    let config = test_config();
    let bus = Arc::new(MessageBus::new());
    let factory = Arc::new(MessageFactory::new());

    let ticks_seen = Arc::new(AtomicU64::new(0));
    {
        let ticks_seen = Arc::clone(&ticks_seen);
        bus.add_handler(Event::ClockTick, "recorder", move |_| {
            ticks_seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
    }

    let mut supervisor = Supervisor::new();

    // Clock producer at 100Hz.
    let mut clock = Task::new(TaskSpec::new("clock", 4, 100), config.task);
    {
        let bus = Arc::clone(&bus);
        let factory = Arc::clone(&factory);
        let counter = AtomicU64::new(0);
        clock
            .run(move || {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                let _ = bus.handle(factory.message(Event::ClockTick, Payload::Tick(n)));
            })
            .unwrap();
    }
    supervisor.register(clock);

    // Bus dispatcher at 200Hz.
    let mut dispatcher = Task::new(TaskSpec::new("bus", 2, 200), config.task);
    {
        let bus = Arc::clone(&bus);
        dispatcher
            .run(move || {
                bus.dispatch();
            })
            .unwrap();
    }
    supervisor.register(dispatcher);

    supervisor.enable_all().unwrap();
    thread::sleep(Duration::from_millis(300));
    supervisor.disable_all().unwrap();
    supervisor.close_all();

    assert!(
        ticks_seen.load(Ordering::Relaxed) > 5,
        "expected ticks to flow through the bus, saw {}",
        ticks_seen.load(Ordering::Relaxed)
    );
    for (name, state) in supervisor.states() {
        assert_eq!(state, State::Closed, "task {name} not closed");
    }
}

// ─── Arbitration over the bus ───────────────────────────────────────

#[test]
fn collision_event_outranks_earlier_drive_command() {
    let config = test_config();
    let (_port, _stbd, motors) = sim_motors(&config);
    let bus = MessageBus::new();
    let factory = MessageFactory::new();
    let arbitrator = Arbitrator::new(&motors);
    arbitrator.register(&bus);

    // The drive command arrives first, the collision second; dispatch
    // must service the collision first and then suppress the drive.
    bus.handle(factory.message(Event::ForwardVelocity, Payload::Velocity(20.0)))
        .unwrap();
    bus.handle(factory.message(
        Event::BumperContact,
        Payload::Contact(ContactZones::CNTR),
    ))
    .unwrap();
    assert_eq!(bus.dispatch(), 2);

    assert!(arbitrator.is_engaged());
    let (port_sp, stbd_sp) = setpoints(&motors);
    assert_eq!(port_sp, 0.0, "drive command must not override the contact halt");
    assert_eq!(stbd_sp, 0.0);
}

#[test]
fn ballistic_guard_releases_once_stopped() {
    let config = test_config();
    let (_port, _stbd, motors) = sim_motors(&config);
    let bus = MessageBus::new();
    let factory = MessageFactory::new();
    let arbitrator = Arbitrator::new(&motors);
    arbitrator.register(&bus);

    bus.handle(factory.message(
        Event::BumperContact,
        Payload::Contact(ContactZones::PORT),
    ))
    .unwrap();
    bus.dispatch();
    assert!(arbitrator.is_engaged());

    // Wheels are stopped, so a tock releases the guard.
    bus.handle(factory.message(Event::ClockTock, Payload::None))
        .unwrap();
    bus.dispatch();
    assert!(!arbitrator.is_engaged());

    // Drive commands flow again.
    thread::sleep(Duration::from_millis(20));
    bus.handle(factory.message(Event::ForwardVelocity, Payload::Velocity(15.0)))
        .unwrap();
    bus.dispatch();
    let (port_sp, stbd_sp) = setpoints(&motors);
    assert!((port_sp - 15.0).abs() < 1e-6, "port setpoint: {port_sp}");
    assert!((stbd_sp - 15.0).abs() < 1e-6, "stbd setpoint: {stbd_sp}");
}

#[test]
fn per_wheel_drive_directives() {
    let config = test_config();
    let (_port, _stbd, motors) = sim_motors(&config);
    let bus = MessageBus::new();
    let factory = MessageFactory::new();
    let arbitrator = Arbitrator::new(&motors);
    arbitrator.register(&bus);

    thread::sleep(Duration::from_millis(20));
    bus.handle(factory.message(Event::PortVelocity, Payload::Velocity(10.0)))
        .unwrap();
    bus.handle(factory.message(Event::StbdVelocity, Payload::Velocity(12.0)))
        .unwrap();
    bus.dispatch();

    let (port_sp, stbd_sp) = setpoints(&motors);
    assert!((port_sp - 10.0).abs() < 1e-6);
    assert!((stbd_sp - 12.0).abs() < 1e-6);
}

// ─── Cruise behaviour over the bus ──────────────────────────────────

#[test]
fn cruise_maps_obstacle_distance_onto_velocity_bound() {
    let config = test_config();
    let (_port, _stbd, motors) = sim_motors(&config);
    let bus = MessageBus::new();
    let factory = MessageFactory::new();
    let cruise = CruiseBehaviour::new(&motors, config.cruise);
    cruise.register(&bus);

    thread::sleep(Duration::from_millis(20));
    cruise.enable();
    let (port_sp, _) = setpoints(&motors);
    assert!((port_sp - 25.0).abs() < 1e-6, "cruising setpoint: {port_sp}");

    // Obstacle at 60cm: clamp to [20,100] then remap to [0,25] → 12.5.
    bus.handle(factory.message(Event::InfraredCntr, Payload::Distance(60.0)))
        .unwrap();
    bus.dispatch();
    let (port_sp, stbd_sp) = setpoints(&motors);
    assert!((port_sp - 12.5).abs() < 1e-6, "bounded setpoint: {port_sp}");
    assert!((stbd_sp - 12.5).abs() < 1e-6);

    // No further infrared events: after the tock timeout the bound is
    // cleared and the cruising velocity restored.
    for _ in 0..=config.cruise.tock_timeout {
        bus.handle(factory.message(Event::ClockTock, Payload::None))
            .unwrap();
        bus.dispatch();
    }
    let (port_sp, stbd_sp) = setpoints(&motors);
    assert!((port_sp - 25.0).abs() < 1e-6, "restored setpoint: {port_sp}");
    assert!((stbd_sp - 25.0).abs() < 1e-6);
}

#[test]
fn cruise_ignores_messages_while_disabled() {
    let config = test_config();
    let (_port, _stbd, motors) = sim_motors(&config);
    let bus = MessageBus::new();
    let factory = MessageFactory::new();
    let cruise = CruiseBehaviour::new(&motors, config.cruise);
    cruise.register(&bus);

    bus.handle(factory.message(Event::InfraredCntr, Payload::Distance(30.0)))
        .unwrap();
    bus.dispatch();
    let (port_sp, stbd_sp) = setpoints(&motors);
    assert_eq!(port_sp, 0.0);
    assert_eq!(stbd_sp, 0.0);
}

// ─── Travel maneuver over the simulated motors ──────────────────────

#[test]
fn travel_maneuver_reaches_step_target() {
    let config = test_config();
    let (port_sim, stbd_sim, motors) = sim_motors(&config);

    // Per-wheel control loops driving the simulated motors.
    let mut supervisor = Supervisor::new();
    for (orientation, sim) in [
        (Orientation::Port, Arc::clone(&port_sim)),
        (Orientation::Stbd, Arc::clone(&stbd_sim)),
    ] {
        let wheel = motors.wheel(orientation);
        let mut task = Task::new(
            TaskSpec::new(format!("pid-{}", orientation.label()), 3, 100),
            config.task,
        );
        task.run(move || {
            sim.advance(0.01);
            wheel.lock().unwrap().loop_iteration();
        })
        .unwrap();
        task.enable().unwrap();
        supervisor.register(task);
    }

    let travel = TravelBehaviour::new(&motors, config.travel);
    let outcome = travel.travel(10.0).expect("maneuver should complete");

    // Both wheel threads joined; each wheel is at or just past its step
    // target (the creep loop exits at the exact target, overshoot is
    // bounded by one poll of creep velocity plus simulated inertia).
    assert_eq!(outcome.target_steps, 230);
    for steps in [outcome.port_steps, outcome.stbd_steps] {
        assert!(steps >= outcome.target_steps, "undershoot: {steps}");
        assert!(
            steps <= outcome.target_steps + 60,
            "overshoot too large: {steps}"
        );
    }
    assert!(motors.is_stopped());

    supervisor.close_all();
}

#[test]
fn travel_rejects_nonpositive_distance() {
    let config = test_config();
    let (_port, _stbd, motors) = sim_motors(&config);
    let travel = TravelBehaviour::new(&motors, config.travel);
    assert!(travel.travel(0.0).is_err());
    assert!(travel.travel(-5.0).is_err());
}
