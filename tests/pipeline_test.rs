#![allow(clippy::unwrap_used)]

//! End-to-end tests of the ingestion pipeline through the `Logger` handle.

use aislogger::alert::{AlertMode, RemarkDict, RemarkEntry};
use aislogger::notification::Notification;
use aislogger::Logger;
use std::io::Write;
use std::time::Duration;
use tokio::time::timeout;

const CLASS_A: &str = "!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C";
const CLASS_A_MMSI: u32 = 477553000;
const STATIC_1: &str = "!AIVDM,2,1,3,B,55P5TL01VIaAL@7WKO@mBplU@<PDhh000000001S;AJ::4A80?4i@E53,0*3E";
const STATIC_2: &str = "!AIVDM,2,2,3,B,1@0000000000000,2*55";

async fn next(logger: &Logger) -> Notification {
    timeout(Duration::from_secs(5), logger.next_notification())
        .await
        .expect("notification within 5s")
}

async fn stop(logger: Logger) {
    logger.stop(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_insert_then_update() {
    let logger = Logger::from_str("[general]\nshow_after_updates = 1\n").await.unwrap();

    assert!(logger.submit_line("ais", CLASS_A));
    let first = next(&logger).await;
    assert_eq!(first.tag(), "insert");
    assert_eq!(first.mmsi(), Some(CLASS_A_MMSI));

    assert!(logger.submit_line("ais", CLASS_A));
    let second = next(&logger).await;
    assert_eq!(second.tag(), "update");

    let stats = logger.stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].0, "ais");
    assert_eq!(stats[0].1.received, 2);
    assert_eq!(stats[0].1.parsed, 2);
    assert_eq!(logger.drain_raw().len(), 2);

    stop(logger).await;
}

#[tokio::test]
async fn test_vessel_hidden_until_threshold() {
    let logger = Logger::from_str("[general]\nshow_after_updates = 3\n").await.unwrap();

    for _ in 0..3 {
        logger.submit_line("ais", CLASS_A);
    }
    let event = next(&logger).await;
    match event {
        Notification::Insert { view } => assert_eq!(view.vessel.version_count, 3),
        other => panic!("expected insert, got {:?}", other),
    }

    stop(logger).await;
}

#[tokio::test]
async fn test_fragments_from_interleaved_sources() {
    let logger = Logger::from_str("[general]\nshow_after_updates = 1\n").await.unwrap();

    logger.submit_line("a", STATIC_1);
    logger.submit_line("b", CLASS_A);
    logger.submit_line("a", STATIC_2);

    let mut names = Vec::new();
    for _ in 0..2 {
        if let Notification::Insert { view } = next(&logger).await {
            names.push((view.vessel.mmsi, view.vessel.name.clone()));
        }
    }
    names.sort();
    assert_eq!(
        names,
        vec![
            (369190000, Some("MT.MITCHELL".to_string())),
            (CLASS_A_MMSI, None),
        ]
    );

    stop(logger).await;
}

#[tokio::test]
async fn test_query_known_vessel() {
    let logger = Logger::from_str("[general]\nshow_after_updates = 1\n").await.unwrap();

    logger.submit_line("ais", CLASS_A);
    assert_eq!(next(&logger).await.tag(), "insert");

    logger.query(999_999_999);
    logger.query(CLASS_A_MMSI);
    let event = next(&logger).await;
    assert_eq!(event.tag(), "query");
    assert_eq!(event.mmsi(), Some(CLASS_A_MMSI));

    stop(logger).await;
}

#[tokio::test]
async fn test_override_position_announced() {
    let logger = Logger::from_str("").await.unwrap();

    logger.override_position(57.7, 11.9);
    match next(&logger).await {
        Notification::OwnPosition { latitude, longitude, sog, georef, source, .. } => {
            assert_eq!((latitude, longitude), (57.7, 11.9));
            assert_eq!(sog, None);
            assert!(georef.is_some());
            assert_eq!(source, "Manual");
        }
        other => panic!("expected own_position, got {:?}", other),
    }

    stop(logger).await;
}

#[tokio::test]
async fn test_gps_fix_reports_course_and_speed() {
    let logger = Logger::from_str("").await.unwrap();

    logger.submit_line(
        "gps",
        "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
    );
    match next(&logger).await {
        Notification::OwnPosition { sog, cog, georef, source, .. } => {
            assert_eq!((sog, cog), (Some(22.4), Some(84.4)));
            assert!(georef.is_some());
            assert_eq!(source, "gps");
        }
        other => panic!("expected own_position, got {:?}", other),
    }

    stop(logger).await;
}

#[tokio::test]
async fn test_configured_override_announced_at_startup() {
    let logger = Logger::from_str(
        "[position]\noverride = true\nlatitude = 10.5\nlongitude = -20.25\n",
    )
    .await
    .unwrap();

    match next(&logger).await {
        Notification::OwnPosition { latitude, longitude, .. } => {
            assert_eq!((latitude, longitude), (10.5, -20.25));
        }
        other => panic!("expected own_position, got {:?}", other),
    }

    stop(logger).await;
}

#[tokio::test]
async fn test_remark_replace_and_query() {
    let logger = Logger::from_str("").await.unwrap();

    let mut remarks = RemarkDict::new();
    remarks.insert(
        CLASS_A_MMSI,
        RemarkEntry {
            mmsi: CLASS_A_MMSI,
            mode: AlertMode::Sound,
            remark: "pilot boat".to_string(),
        },
    );
    logger.replace_remarks(remarks.clone());
    logger.query_remarks();

    match next(&logger).await {
        Notification::RemarkDict { remarks: got } => assert_eq!(got, remarks),
        other => panic!("expected remarkdict, got {:?}", other),
    }

    stop(logger).await;
}

#[tokio::test]
async fn test_error_sink_forwards_to_notifications() {
    let logger = Logger::from_str("").await.unwrap();

    logger.error_sink().forward("disk full".to_string());
    match next(&logger).await {
        Notification::Error { message } => assert_eq!(message, "disk full"),
        other => panic!("expected error, got {:?}", other),
    }

    stop(logger).await;
}

#[tokio::test]
async fn test_replay_file() {
    let logger = Logger::from_str("[general]\nshow_after_updates = 1\n").await.unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", CLASS_A).unwrap();
    writeln!(file, "# comment line").unwrap();
    writeln!(file, "{}\r", CLASS_A).unwrap();

    let queued = logger.replay_file(file.path()).await.unwrap();
    assert_eq!(queued, 2);

    assert_eq!(next(&logger).await.tag(), "insert");
    assert_eq!(next(&logger).await.tag(), "update");
    let raw = logger.drain_raw();
    assert!(raw.iter().all(|r| r.source.as_str() == "File"));

    stop(logger).await;
}

#[tokio::test]
async fn test_stop_is_bounded() {
    let logger = Logger::from_str("").await.unwrap();
    let token = logger.cancel_token();

    timeout(Duration::from_secs(3), logger.stop(Duration::from_secs(1)))
        .await
        .expect("stop should return within its timeout");
    assert!(token.is_cancelled());
}
