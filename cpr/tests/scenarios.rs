use std::fs;

use cpr::*;
use cpr::algo::{simulate, StepReport};
use cpr::algo::generate::{generate, write_trace, ArrivalProcess, LaxityDistribution, TraceSpec};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cpr-tests-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn forced_migration_between_two_stations() {
    let mut co = Coordinator::new(GrowthPolicy::Constant);
    let clients: Vec<Client> = (1..=4).map(|id| Client::new(id, 0, 5, 2)).collect();
    for c in &clients {
        co.add(*c).unwrap();
    }
    assert_eq!(co.station_count(), 2);
    assert!(co.delete(&clients[1]));
    assert!(co.delete(&clients[3]));
    // Each station now has exactly one top-level hole.
    let out = co.reallocate(2);
    assert_eq!(out.migrations, 1);
    assert_eq!(co.station_count(), 1);
    assert_eq!(co.find(3).unwrap().last_realloc, Some(2));
    assert_eq!(co.find(1).unwrap().last_realloc, None);
}

#[test]
fn generated_traces_replay_under_every_policy() {
    let spec = TraceSpec {
        clients:    150,
        max_laxity: 256,
        laxities:   LaxityDistribution::SmallBiased,
        arrivals:   ArrivalProcess::Uniform,
        seed:       11,
    };
    let set = init(generate(&spec).unwrap()).unwrap();
    let last = horizon(&set).unwrap();
    for policy in [GrowthPolicy::Constant, GrowthPolicy::Logarithmic, GrowthPolicy::Quadratic] {
        let mut reports: Vec<StepReport> = vec![];
        let sum = simulate(&set, policy, |r| reports.push(*r)).unwrap();
        assert_eq!(sum.steps, last + 1);
        assert_eq!(reports.len(), sum.steps);
        assert!(sum.alpha_max >= 1.0);
        assert!(reports.iter().all(|r| r.stations >= r.lower_bound));
        assert_eq!(reports.last().map(|r| r.stations), Some(0));
        assert_eq!(sum.peak_stations, reports.iter().map(|r| r.stations).max().unwrap());
        // Same input, same run.
        assert_eq!(simulate(&set, policy, |_| {}).unwrap(), sum);
    }
}

#[test]
fn trace_files_survive_the_round_trip() {
    let spec = TraceSpec {
        clients:    40,
        max_laxity: 1024,
        laxities:   LaxityDistribution::Powers,
        arrivals:   ArrivalProcess::Batched,
        seed:       5,
    };
    let set = generate(&spec).unwrap();
    for format in [TraceFormat::Txt, TraceFormat::Xml] {
        let path = scratch(&spec.file_name(format));
        write_trace(File::create(&path).unwrap(), &set, format).unwrap();
        assert_eq!(read_trace(path.clone(), format).unwrap(), set);
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn duplicate_ids_are_caught_at_ingestion() {
    let path = scratch("dup.txt");
    fs::write(&path, "h1\nh2\n0 4 0 2 0.5 3\n1 4 1 2 0.5 3\n").unwrap();
    match read_trace(path.clone(), TraceFormat::Txt) {
        Err(TraceError::Integrity(e)) => assert_eq!(e.culprit.id, 5),
        other => panic!("unexpected {:?}", other),
    }
    fs::remove_file(path).unwrap();
}

#[test]
fn missing_file_is_an_io_error() {
    let path = scratch("nope.xml");
    assert!(matches!(read_trace(path, TraceFormat::Xml), Err(TraceError::Io(_))));
}
