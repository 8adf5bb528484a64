use criterion::{black_box, criterion_group, criterion_main, Criterion};
use altitude_hold::control::{AltitudeController, NullSink};
use altitude_hold::hub::{AltitudeSample, HubSettings, MotorCommand, MotorLimits, SensorSnapshot, SharedStateHub};
use altitude_hold::ControlClock;

fn benchmark_pid_compute(c: &mut Criterion) {
    let (clock, mock) = ControlClock::mock();
    let mut pid = AltitudeController::default().with_clock(clock).with_sink(NullSink);
    pid.calibrate_initial_value(120.0).ok();
    pid.set_target_value(5.0);
    pid.enable();
    c.bench_function("pid_compute", |b| {
        b.iter(|| {
            mock.advance_ms(100);
            pid.compute(black_box(121.3))
        })
    });
}

fn benchmark_hub_snapshots(c: &mut Criterion) {
    let hub = SharedStateHub::new(&HubSettings::default());
    let mut ts = 0u64;
    c.bench_function("hub_write_sensor_snapshot", |b| {
        b.iter(|| {
            ts += 1;
            hub.write_sensor_snapshot(SensorSnapshot {
                filtered_altitude: 120.0,
                last_read_ms: ts,
                ..Default::default()
            })
        })
    });
    c.bench_function("hub_read_sensor_snapshot", |b| b.iter(|| hub.read_sensor_snapshot()));

    let cmd = MotorCommand::auto(42, &MotorLimits::default());
    c.bench_function("hub_motor_round_trip", |b| {
        b.iter(|| {
            hub.write_motor_command(black_box(cmd)).ok();
            hub.read_motor_command()
        })
    });
}

fn benchmark_sample_channel(c: &mut Criterion) {
    let hub = SharedStateHub::new(&HubSettings::default());
    let sample = AltitudeSample {
        altitude: 120.0,
        timestamp_ms: 0,
    };
    c.bench_function("sample_channel_keep_latest", |b| {
        b.iter(|| hub.altitude_samples.try_send(black_box(sample)))
    });
}

criterion_group!(benches, benchmark_pid_compute, benchmark_hub_snapshots, benchmark_sample_channel);
criterion_main!(benches);
