use serde_json::{Value, json};
use std::{collections::BTreeMap, fs, net::IpAddr, path::Path};
use tempfile::TempDir;
use traceroute_analysis::{
    aggregator::MeasurementAggregate,
    error::Error,
    geolocation::{MockOriginLocator, OfflineLocator, OriginLocator},
    pipeline::{Pipeline, StageReport},
    projector::read_table,
    settings::Settings,
};

const MEASUREMENT_ID: u64 = 57017288;

fn hop(hop: u32, rtts: &[f64]) -> Value {
    let replies: Vec<Value> = if rtts.is_empty() {
        vec![json!({"x": "*"}), json!({"x": "*"}), json!({"x": "*"})]
    } else {
        rtts.iter()
            .map(|rtt| json!({"from": "198.51.100.1", "ttl": 255 - hop, "rtt": rtt, "size": 28}))
            .collect()
    };
    json!({"hop": hop, "result": replies})
}

fn attempt(probe_id: u64, src_addr: &str, timestamp: i64, hops: Vec<Value>) -> Value {
    json!({
        "fw": 5080,
        "prb_id": probe_id,
        "msm_id": MEASUREMENT_ID,
        "timestamp": timestamp,
        "src_addr": src_addr,
        "from": src_addr,
        "af": 4,
        "proto": "ICMP",
        "result": hops,
    })
}

fn write_measurements(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    let good = json!([
        attempt(1, "192.0.2.1", 1688652300, vec![hop(1, &[10.0, 10.0, 10.0]), hop(2, &[30.0]), hop(3, &[])]),
        attempt(1, "192.0.2.1", 1688655900, vec![hop(1, &[12.0]), hop(2, &[28.0])]),
        attempt(2, "192.0.2.2", 1688652360, vec![hop(1, &[40.0]), hop(2, &[60.0]), hop(3, &[80.0])]),
    ]);
    let silent = json!([attempt(3, "192.0.2.3", 1688652300, vec![hop(1, &[]), hop(2, &[])])]);

    fs::write(dir.join("a_broken.json"), "{ not json").unwrap();
    fs::write(dir.join("b_measurement.json"), good.to_string()).unwrap();
    fs::write(dir.join("c_silent.json"), silent.to_string()).unwrap();
}

fn pelotas_locator(expected_calls: usize) -> MockOriginLocator {
    let mut locator = MockOriginLocator::new();
    locator
        .expect_locate()
        .times(expected_calls)
        .returning(|address: IpAddr| {
            if address.to_string() == "192.0.2.1" {
                Ok(Some("Pelotas, RS".to_string()))
            } else {
                Err(Error::GeolocationUnavailable("RateLimited".to_string()))
            }
        });
    locator
}

fn read_cache(path: &Path) -> BTreeMap<u64, String> {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_full_run_isolates_failing_files() {
    let workspace = TempDir::new().unwrap();
    let measurements = workspace.path().join("measurements");
    let output = workspace.path().join("out");
    write_measurements(&measurements);

    let pipeline = Pipeline::new(Settings::default(), &output, Box::new(pelotas_locator(2)));

    let report = pipeline.write_traceroute_data(&measurements).await.unwrap();
    assert_eq!(
        report,
        StageReport {
            processed: 1,
            failed: 2
        }
    );

    let stats: MeasurementAggregate = serde_json::from_str(
        &fs::read_to_string(output.join(format!("stats_{MEASUREMENT_ID}.json"))).unwrap(),
    )
    .unwrap();
    assert_eq!(stats.measurement_id, MEASUREMENT_ID);
    assert_eq!(stats.probes.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(stats.probes[&1][0].average_latency, 20);
    assert_eq!(stats.probes[&1][0].total_hops, 3);
    assert_eq!(stats.probes[&2][0].average_latency, 60);

    let cache = read_cache(&output.join("probe_origin.json"));
    assert_eq!(cache.get(&1).map(String::as_str), Some("Pelotas, RS"));
    assert!(!cache.contains_key(&2));

    let report = pipeline.generate_csv_tables().unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let rows = read_table(&output.join(format!("table_{MEASUREMENT_ID}.csv"))).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows.iter().map(|r| r.probe_id).collect::<Vec<_>>(),
        vec![1, 1, 2]
    );
    assert_eq!(rows[0].origin, "Pelotas, RS");
    assert_eq!(rows[2].origin, "N/A");
    assert!(rows.iter().all(|r| r.created_at_time().is_ok()));

    let report = pipeline.generate_charts().unwrap();
    assert_eq!(report.processed, 1);
    let svg = fs::read_to_string(output.join(format!("chart_{MEASUREMENT_ID}.svg"))).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("Netflix"));
}

#[tokio::test]
async fn test_table_header_uses_semicolons() {
    let workspace = TempDir::new().unwrap();
    let measurements = workspace.path().join("measurements");
    let output = workspace.path().join("out");
    write_measurements(&measurements);

    let pipeline = Pipeline::new(Settings::default(), &output, Box::new(OfflineLocator));
    pipeline.write_traceroute_data(&measurements).await.unwrap();
    pipeline.generate_csv_tables().unwrap();

    let table = fs::read_to_string(output.join(format!("table_{MEASUREMENT_ID}.csv"))).unwrap();
    let mut lines = table.lines();
    assert_eq!(
        lines.next(),
        Some("Probe_ID;Origin;Average_Latency;Total_Hops;Created_At")
    );
    assert_eq!(lines.count(), 3);
}

#[tokio::test]
async fn test_cached_origin_survives_a_failing_lookup() {
    let workspace = TempDir::new().unwrap();
    let measurements = workspace.path().join("measurements");
    let output = workspace.path().join("out");
    write_measurements(&measurements);

    let first = Pipeline::new(Settings::default(), &output, Box::new(pelotas_locator(2)));
    first.write_traceroute_data(&measurements).await.unwrap();

    let mut failing = MockOriginLocator::new();
    failing
        .expect_locate()
        .times(2)
        .returning(|_| Err(Error::GeolocationUnavailable("RateLimited".to_string())));
    let second = Pipeline::new(Settings::default(), &output, Box::new(failing));
    second.write_traceroute_data(&measurements).await.unwrap();

    let cache = read_cache(&output.join("probe_origin.json"));
    assert_eq!(cache.get(&1).map(String::as_str), Some("Pelotas, RS"));

    second.generate_csv_tables().unwrap();
    let rows = read_table(&output.join(format!("table_{MEASUREMENT_ID}.csv"))).unwrap();
    assert_eq!(rows[0].origin, "Pelotas, RS");
}

#[tokio::test]
async fn test_missing_measurements_directory_is_fatal() {
    let workspace = TempDir::new().unwrap();
    let locator: Box<dyn OriginLocator> = Box::new(OfflineLocator);
    let pipeline = Pipeline::new(Settings::default(), workspace.path(), locator);

    let result = pipeline
        .write_traceroute_data(&workspace.path().join("does-not-exist"))
        .await;
    assert!(result.is_err());
}

#[test]
fn test_stages_without_inputs_do_nothing() {
    let workspace = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        Settings::default(),
        workspace.path(),
        Box::new(OfflineLocator),
    );

    assert_eq!(pipeline.generate_csv_tables().unwrap(), StageReport::default());
    assert_eq!(pipeline.generate_charts().unwrap(), StageReport::default());
}

#[test]
fn test_unlabelled_measurement_chart_title() {
    let workspace = TempDir::new().unwrap();
    let output = workspace.path();
    fs::write(
        output.join("table_42.csv"),
        "Probe_ID;Origin;Average_Latency;Total_Hops;Created_At\n\
         7;N/A;35;12;14:05 06/07/23\n\
         7;N/A;37;12;15:05 06/07/23\n",
    )
    .unwrap();
    fs::write(output.join("table_bad.csv"), "Probe_ID\nnope\n").unwrap();

    let pipeline = Pipeline::new(Settings::default(), output, Box::new(OfflineLocator));
    let report = pipeline.generate_charts().unwrap();
    assert_eq!(
        report,
        StageReport {
            processed: 1,
            failed: 1
        }
    );

    let svg = fs::read_to_string(output.join("chart_42.svg")).unwrap();
    assert!(svg.contains("Measurements table_42"));
}

#[tokio::test]
async fn test_unwritable_stats_artifact_aborts_the_run() {
    let workspace = TempDir::new().unwrap();
    let measurements = workspace.path().join("measurements");
    let output = workspace.path().join("out");
    write_measurements(&measurements);
    // A directory where the artifact should go makes every write fail
    fs::create_dir_all(output.join(format!("stats_{MEASUREMENT_ID}.json"))).unwrap();

    let pipeline = Pipeline::new(Settings::default(), &output, Box::new(OfflineLocator));
    let result = pipeline.write_traceroute_data(&measurements).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_unwritable_table_and_chart_abort_their_stage() {
    let workspace = TempDir::new().unwrap();
    let measurements = workspace.path().join("measurements");
    let output = workspace.path().join("out");
    write_measurements(&measurements);

    let pipeline = Pipeline::new(Settings::default(), &output, Box::new(OfflineLocator));
    pipeline.write_traceroute_data(&measurements).await.unwrap();
    fs::write(output.join("stats_2.json"), "{ not json").unwrap();

    fs::create_dir(output.join(format!("table_{MEASUREMENT_ID}.csv"))).unwrap();
    assert!(pipeline.generate_csv_tables().is_err());

    fs::remove_dir(output.join(format!("table_{MEASUREMENT_ID}.csv"))).unwrap();
    let report = pipeline.generate_csv_tables().unwrap();
    assert_eq!(
        report,
        StageReport {
            processed: 1,
            failed: 1
        }
    );

    fs::create_dir(output.join(format!("chart_{MEASUREMENT_ID}.svg"))).unwrap();
    assert!(pipeline.generate_charts().is_err());
}

#[tokio::test]
async fn test_probe_in_many_files_is_looked_up_once() {
    let workspace = TempDir::new().unwrap();
    let measurements = workspace.path().join("measurements");
    let output = workspace.path().join("out");
    fs::create_dir_all(&measurements).unwrap();
    for (i, timestamp) in [1688652300, 1688655900, 1688659500].into_iter().enumerate() {
        let file = json!([attempt(9, "192.0.2.9", timestamp, vec![hop(1, &[15.0])])]);
        fs::write(measurements.join(format!("day_{i}.json")), file.to_string()).unwrap();
    }

    let mut locator = MockOriginLocator::new();
    locator
        .expect_locate()
        .times(1)
        .returning(|_| Err(Error::GeolocationUnavailable("RateLimited".to_string())));

    let pipeline = Pipeline::new(Settings::default(), &output, Box::new(locator));
    let report = pipeline.write_traceroute_data(&measurements).await.unwrap();
    assert_eq!(report.processed, 3);
    assert!(read_cache(&output.join("probe_origin.json")).is_empty());
}
