use std::collections::HashMap;

use esnode_offload::PolicyKind;
use fogsim_core::device::{DeviceSpec, FogDevice, IotDevice};
use fogsim_core::{run_policy, SimConfig, Simulation};

fn spec(total_mips: u64, max_queue: usize) -> DeviceSpec {
    DeviceSpec {
        total_mips,
        ram_mb: 2048,
        storage_mb: 32_768,
        bandwidth_mbps: 500,
        max_queue,
    }
}

fn fog(id: &str, x: f64, y: f64, total_mips: u64) -> FogDevice {
    FogDevice::new(id.to_string(), x, y, spec(total_mips, 10))
}

fn iot(id: &str, x: f64, y: f64, fog_id: &str) -> IotDevice {
    IotDevice::new(id.to_string(), x, y, fog_id.to_string())
}

/// One saturated device. Two tasks execute concurrently at most, drops
/// start only after the queue has had time to fill, and throughput stays
/// above the floor the progress guarantee implies.
#[test]
fn saturating_load_on_a_single_device() {
    let config = SimConfig {
        iot_devices: 1,
        cells: 1,
        ticks: 60,
        gen_probability: 1.0,
        min_task_mi: 500,
        max_task_mi: 500,
        min_deadline_ticks: 100,
        max_deadline_ticks: 100,
        urgent_probability: 0.0,
        ..SimConfig::default()
    };
    let devices = vec![fog("fog-000", 500.0, 500.0, 1000)];
    let sources = vec![iot("iot-000", 500.0, 490.0, "fog-000")];
    let mut sim = Simulation::from_parts(config, devices, sources, PolicyKind::Static).unwrap();

    let mut first_drop = None;
    for tick in 0..60u64 {
        sim.step();
        let device = &sim.devices()[0];
        assert!(device.sched.executing_len() <= 2);
        assert!(device.ledger.available() <= device.spec.total_mips);
        if first_drop.is_none() && sim.stats().dropped > 0 {
            first_drop = Some(tick);
        }
    }
    let record = sim.finish();

    assert!(record.dropped > 0);
    assert!(first_drop.unwrap() > 10, "first drop at {first_drop:?}");
    assert!(
        record.completion_rate >= 0.3,
        "completion rate {}",
        record.completion_rate
    );
    assert_eq!(record.failed, 0);
    assert_eq!(record.generated, 60);
}

/// Two devices on a static ring, traffic only at the strong one. A
/// clear majority of the work must move over to the partner.
#[test]
fn static_ring_offloads_the_hot_device() {
    let config = SimConfig {
        iot_devices: 1,
        cells: 1,
        ticks: 200,
        gen_probability: 0.5,
        min_task_mi: 1500,
        max_task_mi: 1500,
        min_deadline_ticks: 20,
        max_deadline_ticks: 20,
        urgent_probability: 0.0,
        ..SimConfig::default()
    };
    let devices = vec![
        fog("fog-a", 0.0, 0.0, 2000),
        fog("fog-b", 100.0, 0.0, 1000),
    ];
    let sources = vec![iot("iot-000", 0.0, 5.0, "fog-a")];
    let mut sim = Simulation::from_parts(config, devices, sources, PolicyKind::Static).unwrap();
    let record = sim.run();

    assert!(record.generated > 50);
    assert!(
        record.offload_rate > 0.4,
        "offload rate {}",
        record.offload_rate
    );
    // fog-b can never dispatch a 1500 MI task, so its share fails by
    // deadline rather than completing.
    assert!(record.failed > 0);
}

/// Hybrid keeps work at the master until it is overloaded, so the
/// master handles a larger share of cell traffic than under dynamic
/// selection on the identical topology.
#[test]
fn hybrid_biases_work_towards_the_master() {
    let build = |kind: PolicyKind| {
        let config = SimConfig {
            iot_devices: 3,
            cells: 1,
            ticks: 400,
            gen_probability: 0.2,
            min_task_mi: 600,
            max_task_mi: 800,
            min_deadline_ticks: 30,
            max_deadline_ticks: 50,
            urgent_probability: 0.0,
            ..SimConfig::default()
        };
        let devices = vec![
            fog("fog-a", 100.0, 100.0, 1000),
            fog("fog-b", 500.0, 500.0, 2000),
            fog("fog-c", 900.0, 900.0, 1000),
        ];
        let sources = vec![
            iot("iot-000", 110.0, 110.0, "fog-a"),
            iot("iot-001", 510.0, 510.0, "fog-b"),
            iot("iot-002", 890.0, 890.0, "fog-c"),
        ];
        Simulation::from_parts(config, devices, sources, kind).unwrap()
    };

    let master_share = |sim: &mut Simulation| {
        let record = sim.run();
        assert!(record.generated > 100);
        let received: HashMap<String, u64> = sim
            .devices()
            .iter()
            .map(|d| (d.id.clone(), d.received))
            .collect();
        let master = sim.cells()[0].master.clone().unwrap();
        assert_eq!(master, "fog-b", "centroid device must be elected master");
        let total: u64 = received.values().sum();
        received[&master] as f64 / total as f64
    };

    let hybrid = master_share(&mut build(PolicyKind::Hybrid));
    let dynamic = master_share(&mut build(PolicyKind::Dynamic));

    assert!(hybrid >= 0.4, "hybrid master share {hybrid}");
    assert!(
        hybrid > dynamic,
        "hybrid ({hybrid}) must exceed dynamic ({dynamic})"
    );
    assert!(dynamic <= 0.55, "dynamic master share {dynamic}");
}

/// Identical seeds and parameters give byte-identical records, for every
/// policy.
#[test]
fn runs_are_deterministic_per_policy() {
    let config = SimConfig {
        fog_devices: 12,
        iot_devices: 20,
        cells: 3,
        ticks: 60,
        ..SimConfig::default()
    };
    for kind in PolicyKind::all() {
        let a = run_policy(&config, kind).unwrap();
        let b = run_policy(&config, kind).unwrap();
        assert_eq!(a.to_string(), b.to_string(), "policy {kind}");
    }
}

/// Every generated task ends in exactly one terminal bucket.
/// (The engine also asserts this internally; the record must expose it.)
#[test]
fn generated_work_is_fully_accounted_for() {
    let config = SimConfig {
        fog_devices: 12,
        iot_devices: 20,
        cells: 3,
        ticks: 80,
        ..SimConfig::default()
    };
    for kind in PolicyKind::all() {
        let record = run_policy(&config, kind).unwrap();
        assert_eq!(
            record.generated,
            record.completed + record.failed + record.dropped + record.in_flight,
            "policy {kind}"
        );
        assert!(record.generated > 100);
        // Every transfer costs at least one message.
        let offloaded = record.offload_rate * record.generated as f64;
        assert!(record.messages as f64 >= offloaded - 0.5);
    }
}

/// The ledger never leaves its bounds on any device under any policy.
#[test]
fn available_mips_stay_bounded() {
    let config = SimConfig {
        fog_devices: 9,
        iot_devices: 15,
        cells: 3,
        ticks: 50,
        gen_probability: 0.4,
        ..SimConfig::default()
    };
    for kind in PolicyKind::all() {
        let mut sim = Simulation::new(config.clone(), kind).unwrap();
        for _ in 0..50 {
            sim.step();
            for device in sim.devices() {
                assert!(device.ledger.available() <= device.spec.total_mips);
            }
        }
    }
}

/// Cross-seed sanity: a different base seed changes the traffic but not
/// the accounting identities.
#[test]
fn reseeded_runs_still_balance() {
    let mut config = SimConfig {
        fog_devices: 9,
        iot_devices: 12,
        cells: 3,
        ticks: 60,
        ..SimConfig::default()
    };
    config.apply_base_seed(1234);
    let record = run_policy(&config, PolicyKind::Hybrid).unwrap();
    assert_eq!(
        record.generated,
        record.completed + record.failed + record.dropped + record.in_flight
    );
}
