use criterion::{black_box, criterion_group, criterion_main, Criterion};
use heromedia::monitor::NetworkStatus;
use heromedia::recovery::planner::RecoveryConfig;
use heromedia::recovery::FixedJitter;
use heromedia::{
    CapabilitySnapshot, ConnectionClass, DeviceClass, ErrorClassifier, ErrorContext, ErrorKind,
    ErrorRecord, MediaError, QualityTier, RecoveryPlanner, RecoveryState, SourceCatalog, SourceSelector,
    ThermalState,
};

fn snapshot(device: DeviceClass, connection: ConnectionClass) -> CapabilitySnapshot {
    CapabilitySnapshot {
        device_class: device,
        connection_class: connection,
        online: Some(true),
        pixel_ratio: 2.0,
        battery_level: Some(0.8),
        charging: Some(true),
        thermal_state: ThermalState::Nominal,
        low_end_device: false,
        hardware_acceleration: true,
        viewport_width: Some(1440),
        downlink_mbps: Some(25.0),
        save_data: false,
        device_memory_gb: Some(8.0),
        supports_webm: true,
    }
}

fn bench_select(c: &mut Criterion) {
    let selector = SourceSelector::default();
    let catalog = SourceCatalog::landing_default();
    let mut group = c.benchmark_group("select");
    for (label, device, connection) in [
        ("desktop_wifi", DeviceClass::Desktop, ConnectionClass::Wifi),
        ("tablet_4g", DeviceClass::Tablet, ConnectionClass::FourG),
        ("mobile_slow_2g", DeviceClass::Mobile, ConnectionClass::Slow2g),
    ] {
        let snap = snapshot(device, connection);
        group.bench_function(label, |b| {
            b.iter(|| selector.select(black_box(&snap), black_box(&catalog)))
        });
    }
    group.finish();
}

fn bench_classify_and_plan(c: &mut Criterion) {
    let classifier = ErrorClassifier::default();
    let context = ErrorContext::default();
    let error = MediaError::from_element(3, "PIPELINE_ERROR_DECODE: video decoder reinitialization failed");
    c.bench_function("classify_and_plan", |b| {
        let mut planner = RecoveryPlanner::with_jitter(RecoveryConfig::default(), FixedJitter(250));
        let network = NetworkStatus::default();
        b.iter(|| {
            let kind = classifier.classify(black_box(&error), black_box(&context));
            let record = ErrorRecord {
                kind,
                raw_cause: String::new(),
                context: context.clone(),
                timestamp_ms: 0,
                retry_count_at_time: 0,
            };
            let mut state = RecoveryState::new(QualityTier::High);
            debug_assert_eq!(kind, ErrorKind::Codec);
            planner.plan(&record, &mut state, &network)
        })
    });
}

criterion_group!(benches, bench_select, bench_classify_and_plan);
criterion_main!(benches);
