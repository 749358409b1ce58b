use scopectl_rs::sim::SimulatedBus;
use scopectl_rs::{
    CaptureRequest, ExportFormat, InstrumentError, Oscilloscope, ResourceAddress, WireFormat,
    DEFAULT_TIMEOUT,
};
use std::time::Duration;

fn connect(bus: &SimulatedBus) -> Oscilloscope {
    let address = ResourceAddress::Tcpip("192.168.1.100".to_string());
    Oscilloscope::connect(bus, &address, DEFAULT_TIMEOUT).unwrap()
}

#[test]
fn ascii_and_binary_captures_agree_within_one_level() {
    let bus = SimulatedBus::new();
    let mut scope = connect(&bus);
    scope.set_channel_scale(2, 0.5).unwrap();

    let request = CaptureRequest::new(&[1, 2], 5_000);
    let ascii = scope.capture(&request.clone().format(WireFormat::Ascii)).unwrap();
    let binary = scope.capture(&request.format(WireFormat::Binary)).unwrap();

    assert_eq!(ascii.time, binary.time);
    for label in ["CH1", "CH2"] {
        let coarse = ascii.trace(label).unwrap();
        let fine = binary.voltages(label).unwrap();
        let lsb = coarse.scaling.voltage.y_mult;
        assert_eq!(coarse.voltages.len(), fine.len());
        for (a, b) in coarse.voltages.iter().zip(fine) {
            assert!((a - b).abs() <= lsb, "{label}: {a} vs {b}");
        }
    }
}

#[test]
fn failing_capture_returns_nothing_and_scope_stays_usable() {
    let bus = SimulatedBus::new();
    let mut scope = connect(&bus);

    bus.truncate_curve(1);
    let result = scope.capture(&CaptureRequest::new(&[1, 2], 1_000));
    assert!(matches!(result, Err(InstrumentError::DataIntegrity(_))));

    bus.truncate_curve(0);
    let capture = scope.capture(&CaptureRequest::new(&[1, 2], 1_000)).unwrap();
    assert_eq!(capture.traces.len(), 2);
}

#[test]
fn corrupted_ascii_reports_position() {
    let bus = SimulatedBus::new();
    let mut scope = connect(&bus);
    bus.corrupt_curve(true);
    let request = CaptureRequest::new(&[1], 2_000).format(WireFormat::Ascii);
    match scope.capture(&request) {
        Err(InstrumentError::DataParse { index, token }) => {
            assert_eq!(index, 1_000);
            assert_eq!(token, "1O");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn triggered_capture_with_metadata_exports_both_formats() {
    let bus = SimulatedBus::new();
    let mut scope = connect(&bus);
    let request = CaptureRequest::new(&[1, 3], 2_000)
        .with_metadata()
        .acquire_within(Duration::from_secs(1));
    let capture = scope.capture(&request).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("scope_run");

    let csv = capture.save(&base, ExportFormat::Csv).unwrap();
    let text = std::fs::read_to_string(csv).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Time,CH1,CH3"));
    assert_eq!(lines.count(), 2_000);

    let json = capture.save(&base, ExportFormat::Json).unwrap();
    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(document["metadata"]["identity"]["model"], "MSO44B");
    assert_eq!(document["metadata"]["acquisition"]["record_length"], 2_000);
    assert!(document["metadata"]["channels"]["CH3"].is_object());
    assert_eq!(document["waveforms"]["sample_count"], 2_000);
    assert_eq!(document["waveforms"]["CH3"].as_array().unwrap().len(), 2_000);
    assert!(document["scaling"]["CH1"]["timing"]["x_incr"].is_number());
}

#[test]
fn closed_scope_rejects_captures() {
    let bus = SimulatedBus::new();
    let mut scope = connect(&bus);
    scope.close().unwrap();
    assert_eq!(bus.open_sessions(), 0);
    let result = scope.capture(&CaptureRequest::new(&[1], 1_000));
    assert!(matches!(result, Err(InstrumentError::SessionClosed(_))));
}
