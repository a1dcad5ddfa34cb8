use std::{num::NonZeroU32, path::Path, time::Duration};

use super::*;
use crate::{
    device::{IoMode, MemoryDevice, StdDevice},
    record::CSV_HEADER,
    test_util::InstrumentedDevice,
    timing::{test_clock::SteppingClock, MonotonicClock},
};

const MIB: usize = 1 << 20;

struct Row {
    chunk_size: usize,
    run_number: u32,
    read_time_ms: f64,
    throughput_mbps: f64,
}

fn three_decimals(field: &str) -> f64 {
    let (_, frac) = field
        .split_once('.')
        .unwrap_or_else(|| panic!("no decimal point in {field:?}"));
    assert_eq!(frac.len(), 3, "{field:?}");
    field.parse().unwrap()
}

fn parse_csv(contents: &[u8]) -> Vec<Row> {
    let contents = std::str::from_utf8(contents).unwrap();
    assert!(contents.ends_with('\n'));
    let mut lines = contents.lines();
    assert_eq!(Some(CSV_HEADER.trim_end()), lines.next());
    lines
        .map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 4, "{line:?}");
            Row {
                chunk_size: fields[0].parse().unwrap(),
                run_number: fields[1].parse().unwrap(),
                read_time_ms: three_decimals(fields[2]),
                throughput_mbps: three_decimals(fields[3]),
            }
        })
        .collect()
}

fn memory_device(file_size: usize) -> MemoryDevice {
    let device = MemoryDevice::new();
    device.insert(crate::config::DEFAULT_TEST_FILE, vec![0x5A; file_size]);
    device
}

fn config(file_size: usize, schedule: &str, repetitions: u32) -> SweepConfig {
    let mut config = SweepConfig::with_defaults(
        ByteSize(file_size as u64),
        schedule.parse().unwrap(),
    );
    config.repetitions = NonZeroU32::new(repetitions).unwrap();
    config
}

fn output(device: &MemoryDevice, config: &SweepConfig) -> Vec<u8> {
    device.contents(&config.output_file).unwrap()
}

#[test]
fn small_preset_writes_header_and_ninety_rows() {
    let device = memory_device(MIB);
    let config = SweepConfig::small();
    let clock = MonotonicClock::new();
    let report = Sweep::new(&device, &clock, &config).run().unwrap();

    let rows = parse_csv(&output(&device, &config));
    assert_eq!(rows.len(), 90);
    for (i, chunk_size) in [100, 1024, 65536].into_iter().enumerate() {
        let group = &rows[i * 30..(i + 1) * 30];
        for (j, row) in group.iter().enumerate() {
            assert_eq!(row.chunk_size, chunk_size);
            assert_eq!(row.run_number as usize, j + 1);
            assert!(row.read_time_ms >= 0.0);
            assert!(row.throughput_mbps >= 0.0);
        }
    }

    assert_eq!(report.chunk_sizes, vec![100, 1024, 65536]);
    assert_eq!(report.total_runs, 90);
    assert_eq!(report.bytes_read, 90 * MIB as u64);
    assert_eq!(device.open_handles(), 0);
}

#[test]
fn one_millisecond_per_pass() {
    let device = memory_device(MIB);
    let config = config(MIB, "64k,1m", 3);
    let clock = SteppingClock::new(Duration::from_millis(1));
    let report = Sweep::new(&device, &clock, &config).run().unwrap();

    let contents = String::from_utf8(output(&device, &config)).unwrap();
    assert_eq!(
        contents,
        "chunk_size,run_number,read_time_ms,throughput_mbps\n\
         65536,1,1.000,1000.000\n\
         65536,2,1.000,1000.000\n\
         65536,3,1.000,1000.000\n\
         1048576,1,1.000,1000.000\n\
         1048576,2,1.000,1000.000\n\
         1048576,3,1.000,1000.000\n"
    );
    assert_eq!(report.read_time_us, Duration::from_millis(6));
    assert_eq!(report.clamped_runs, 0);
}

#[test]
fn zero_elapsed_time_still_produces_parseable_rows() {
    let device = memory_device(4096);
    let config = config(4096, "1k", 5);
    let clock = SteppingClock::new(Duration::ZERO);
    let report = Sweep::new(&device, &clock, &config).run().unwrap();

    let rows = parse_csv(&output(&device, &config));
    assert_eq!(rows.len(), 5);
    for row in rows {
        assert_eq!(row.read_time_ms, 0.0);
        assert!(row.throughput_mbps.is_finite());
        assert!(row.throughput_mbps > 0.0);
    }
    assert_eq!(report.clamped_runs, 5);
}

#[test]
fn uneven_chunk_size_reads_whole_file() {
    let device = memory_device(MIB);
    let config = config(MIB, "100000", 2);
    let clock = MonotonicClock::new();
    let report = Sweep::new(&device, &clock, &config).run().unwrap();
    assert_eq!(report.bytes_read, 2 * MIB as u64);
    assert_eq!(parse_csv(&output(&device, &config)).len(), 2);
}

#[test]
fn zero_read_aborts_and_keeps_earlier_rows() {
    // 1024 reads per pass; the second read of the third repetition returns 0
    let device = InstrumentedDevice::new(memory_device(MIB)).fail_read_call(2 * 1024 + 2);
    let config = config(MIB, "1k", 30);
    let clock = MonotonicClock::new();
    let err = Sweep::new(&device, &clock, &config).run().unwrap_err();

    match err {
        BenchError::ShortRead {
            chunk_size,
            run_number,
            expected,
            actual,
            stop,
            ..
        } => {
            assert_eq!(chunk_size, 1024);
            assert_eq!(run_number, 3);
            assert_eq!(expected, MIB as u64);
            assert_eq!(actual, 1024);
            assert!(matches!(stop, crate::read_loop::EarlyStop::EndOfFile));
        }
        other => panic!("unexpected error: {other}"),
    }

    let rows = parse_csv(&device.inner().contents(&config.output_file).unwrap());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].run_number, 1);
    assert_eq!(rows[1].run_number, 2);
    assert_eq!(device.inner().open_handles(), 0);
}

#[test]
fn device_error_aborts() {
    let device = InstrumentedDevice::new(memory_device(8192)).error_read_call(1);
    let config = config(8192, "4k", 2);
    let clock = MonotonicClock::new();
    let err = Sweep::new(&device, &clock, &config).run().unwrap_err();
    assert!(
        err.to_string().contains("injected read failure"),
        "{err}"
    );
    let rows = parse_csv(&device.inner().contents(&config.output_file).unwrap());
    assert!(rows.is_empty());
    assert_eq!(device.inner().open_handles(), 0);
}

#[test]
fn oversized_read_aborts() {
    // the second and last read of the first pass reports 4097 bytes
    let device = InstrumentedDevice::new(memory_device(8192)).overrun_read_call(2);
    let config = config(8192, "4k", 3);
    let clock = MonotonicClock::new();
    let err = Sweep::new(&device, &clock, &config).run().unwrap_err();
    match err {
        BenchError::ShortRead {
            run_number,
            expected,
            actual,
            stop,
            ..
        } => {
            assert_eq!(run_number, 1);
            assert_eq!(expected, 8192);
            assert_eq!(actual, 8193);
            assert!(matches!(stop, crate::read_loop::EarlyStop::Overrun));
        }
        other => panic!("unexpected error: {other}"),
    }
    let rows = parse_csv(&device.inner().contents(&config.output_file).unwrap());
    assert!(rows.is_empty());
    assert_eq!(device.inner().open_handles(), 0);
}

#[test]
fn missing_test_file_fails_after_header() {
    let device = MemoryDevice::new();
    let config = config(4096, "1k", 1);
    let clock = MonotonicClock::new();
    let err = Sweep::new(&device, &clock, &config).run().unwrap_err();
    assert!(matches!(err, BenchError::Open { .. }), "{err}");
    assert_eq!(output(&device, &config), CSV_HEADER.as_bytes());
    assert_eq!(device.open_handles(), 0);
}

#[test]
fn repeated_sweeps_have_identical_shape() {
    let device = memory_device(64 * 1024);
    let config = config(64 * 1024, "100,1k,4k..=16k:4k", 4);
    let clock = MonotonicClock::new();

    let first = Sweep::new(&device, &clock, &config).run().unwrap();
    let first_rows = parse_csv(&output(&device, &config));
    let second = Sweep::new(&device, &clock, &config).run().unwrap();
    let second_rows = parse_csv(&output(&device, &config));

    assert_eq!(first_rows.len(), 6 * 4);
    assert_eq!(first_rows.len(), second_rows.len());
    for (a, b) in first_rows.iter().zip(&second_rows) {
        assert_eq!(a.chunk_size, b.chunk_size);
        assert_eq!(a.run_number, b.run_number);
    }
    assert_eq!(first.chunk_sizes, second.chunk_sizes);
    assert_eq!(first.total_runs, second.total_runs);
}

#[test]
fn std_device_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let device = StdDevice::new(IoMode::Cached);
    let mut config = config(256 * 1024, "100,4k,256k", 3);
    config.test_file = dir.path().join("test_file.bin");
    config.output_file = dir.path().join("benchmark_results.csv");

    crate::fixture::prepare(&device, &config.test_file, config.file_size).unwrap();
    let clock = MonotonicClock::new();
    let report = Sweep::new(&device, &clock, &config).run().unwrap();
    assert_eq!(report.total_runs, 9);

    let rows = parse_csv(&std::fs::read(&config.output_file).unwrap());
    assert_eq!(rows.len(), 9);
    assert!(rows.iter().all(|r| r.run_number >= 1 && r.run_number <= 3));
}

#[cfg(target_os = "linux")]
#[test]
fn std_device_direct_io_end_to_end() {
    // tmpfs rejects O_DIRECT, so stay on the file system the crate lives on
    let dir = tempfile::tempdir_in(env!("CARGO_MANIFEST_DIR")).unwrap();
    let mut config = config(64 * 1024, "4k,8k", 3);
    config.test_file = dir.path().join("test_file.bin");
    config.output_file = dir.path().join("benchmark_results.csv");
    config.validate_for(IoMode::Direct).unwrap();

    let device = StdDevice::new(IoMode::Direct);
    crate::fixture::prepare(&device, &config.test_file, config.file_size).unwrap();
    if let Err(e) = crate::device::DeviceFile::open(
        &device,
        &config.test_file,
        crate::device::OpenMode::ReadOnly,
    ) {
        assert_eq!(e.raw_os_error(), Some(libc::EINVAL), "{e}");
        eprintln!("skipping: {:?} does not support O_DIRECT", dir.path());
        return;
    }

    let clock = MonotonicClock::new();
    let report = Sweep::new(&device, &clock, &config).run().unwrap();
    assert_eq!(report.total_runs, 6);
    assert_eq!(report.bytes_read, 6 * 64 * 1024);

    let rows = parse_csv(&std::fs::read(&config.output_file).unwrap());
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].chunk_size, 4096);
    assert_eq!(rows[5].chunk_size, 8192);
}

#[test]
fn std_device_truncated_fixture_is_a_short_read() {
    let dir = tempfile::tempdir().unwrap();
    let device = StdDevice::new(IoMode::Cached);
    let mut config = config(8192, "1k", 3);
    config.test_file = dir.path().join("test_file.bin");
    config.output_file = dir.path().join("benchmark_results.csv");
    std::fs::write(&config.test_file, vec![0u8; 5000]).unwrap();

    let clock = MonotonicClock::new();
    let err = Sweep::new(&device, &clock, &config).run().unwrap_err();
    match err {
        BenchError::ShortRead {
            run_number, actual, ..
        } => {
            assert_eq!(run_number, 1);
            assert_eq!(actual, 5000);
        }
        other => panic!("unexpected error: {other}"),
    }
    let contents = std::fs::read(&config.output_file).unwrap();
    assert_eq!(contents, CSV_HEADER.as_bytes());
    assert!(Path::new(&config.output_file).exists());
}

#[test]
fn invalid_config_fails_before_touching_output() {
    let device = memory_device(MIB);
    let config = config(MIB, "100,2m", 1);
    let clock = MonotonicClock::new();
    let err = Sweep::new(&device, &clock, &config).run().unwrap_err();
    assert!(matches!(err, BenchError::Config(_)), "{err}");
    assert!(device.contents(&config.output_file).is_none());
}
