use cluster_core::ClusterContext;
use cluster_sim::messages::SpeedChanged;
use cluster_sim::{
    ClusterConfig, ClusterControls, ClusterKernel, DriverInput, Gear, TelemetryBus, VehicleParams,
    VehicleSimulation,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::rc::Rc;

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("Simulation Tick");

    group.bench_function("Vehicle only (no subscribers)", |b| {
        let mut vehicle =
            VehicleSimulation::new(Rc::new(TelemetryBus::new()), VehicleParams::default(), None);
        let _ = vehicle.set_gear(Gear::Drive);
        let input = DriverInput {
            throttle: true,
            steer_left: true,
            pitch_deg: -3.0,
            ..Default::default()
        };
        b.iter(|| {
            vehicle.sim_tick(black_box(1.0 / 60.0), &input);
            black_box(vehicle.speed_kph());
        });
    });

    group.bench_function("Booted cluster", |b| {
        let mut ctx = ClusterContext::new();
        let mut kernel = ClusterKernel::new(ClusterConfig::default());
        kernel.boot(&mut ctx).expect("boot");
        let cluster = kernel.cluster_mut().expect("booted");
        let controls = ClusterControls {
            gear_request: Some(Gear::Drive),
            throttle: true,
            ..Default::default()
        };
        b.iter(|| {
            cluster.tick(black_box(1.0 / 60.0), &controls);
            black_box(cluster.frame());
        });
    });

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let bus = TelemetryBus::new();
    for _ in 0..64 {
        bus.on(|m: &SpeedChanged| {
            black_box(m.kmh);
        });
    }

    c.bench_function("Publish to 64 subscribers", |b| {
        b.iter(|| bus.publish(SpeedChanged { kmh: black_box(88.0) }));
    });
}

criterion_group!(benches, bench_tick, bench_fan_out);
criterion_main!(benches);
