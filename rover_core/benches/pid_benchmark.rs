//! PID hot-path micro-benchmark.
//!
//! Measures throughput of a single PID update and of one full wheel
//! setpoint slew + update pair, the two operations on the 20Hz control
//! loop's critical path.

use criterion::{Criterion, criterion_group, criterion_main};

use rover_common::config::{PidConfig, SlewConfig};
use rover_core::control::pid::Pid;
use rover_core::control::slew::SlewLimiter;

const DT: f64 = 0.05; // 20 Hz loop

fn reference_pid() -> Pid {
    let mut pid = Pid::new(&PidConfig {
        kp: 0.095,
        ki: 0.01,
        kd: 0.002,
        min_output: -100.0,
        max_output: 100.0,
        sample_time_sec: 0.01,
        loop_hz: 20,
    });
    pid.set_setpoint(25.0);
    pid
}

fn bench_pid_update(c: &mut Criterion) {
    let mut pid = reference_pid();
    let mut target = 0.0;
    c.bench_function("pid_update", |b| {
        b.iter(|| {
            target = (target + 0.1) % 30.0;
            std::hint::black_box(pid.update_with_dt(target, DT))
        })
    });
}

fn bench_slew_then_pid(c: &mut Criterion) {
    let mut pid = reference_pid();
    let mut slew = SlewLimiter::new(&SlewConfig::default());
    slew.enable();
    let mut target = 0.0;
    c.bench_function("slew_then_pid", |b| {
        b.iter(|| {
            target = (target + 0.1) % 30.0;
            let bounded = slew.slew_with_elapsed(pid.setpoint(), target, DT);
            pid.set_setpoint(bounded);
            std::hint::black_box(pid.update_with_dt(target, DT))
        })
    });
}

criterion_group!(benches, bench_pid_update, bench_slew_then_pid);
criterion_main!(benches);
