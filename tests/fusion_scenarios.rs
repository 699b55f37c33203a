use occupancy_fusion::error::AppError;
use occupancy_fusion::fusion::{FusionEngine, SharedEngine, run_analysis};
use occupancy_fusion::oracle::{DecisionOracle, OracleError, OracleRequest};
use occupancy_fusion::publish::{COMMAND_TOPIC, MemoryPublisher, OCCUPANCY_TOPIC};
use occupancy_fusion::sensor::{SensorReading, SensorRole};
use occupancy_fusion::state::{Confidence, OccupancyState};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug)]
struct StubOracle(&'static str);

impl DecisionOracle for StubOracle {
    fn consult(&self, _request: &OracleRequest) -> Result<String, OracleError> {
        Ok(self.0.to_string())
    }
}

#[derive(Debug)]
struct TimedOutOracle;

impl DecisionOracle for TimedOutOracle {
    fn consult(&self, _request: &OracleRequest) -> Result<String, OracleError> {
        Err(OracleError::Unavailable("request timed out".to_string()))
    }
}

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn ingest(engine: &SharedEngine, topic: &str, payload: &[u8], now: SystemTime) -> Result<(), AppError> {
    let mut guard = engine.write().map_err(|_| AppError::StateLock)?;
    guard.ingest(topic, payload, now)?;
    Ok(())
}

fn occupied_since(secs: u64) -> Result<SharedEngine, AppError> {
    let engine = FusionEngine::default().into_shared();
    ingest(&engine, "/group1/sensors", br#"{"motion_detected":1,"distance_cm":30}"#, at(secs))?;
    let transition = run_analysis(&engine, &StubOracle("OCCUPIED"), &MemoryPublisher::new(), at(secs))?;
    assert!(transition.is_some());
    Ok(engine)
}

#[test]
fn two_agreeing_groups_confirm_occupancy_with_high_confidence() -> Result<(), AppError> {
    let engine = FusionEngine::default().into_shared();
    for offset in 0..3 {
        ingest(&engine, "/group1/sensors", br#"{"motion_detected":1,"distance_cm":30}"#, at(1_000 + offset))?;
        ingest(&engine, "group3/status", br#"{"motion":0,"distance":40}"#, at(1_000 + offset))?;
    }
    let publisher = MemoryPublisher::new();

    let transition = run_analysis(&engine, &StubOracle("OCCUPIED."), &publisher, at(1_003))?;

    let transition = transition.expect("vacant to occupied");
    assert_eq!(transition.previous_state, OccupancyState::Vacant);
    assert_eq!(transition.new_state, OccupancyState::Occupied);
    assert_eq!(transition.confidence, Confidence::High);

    let messages = publisher.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].0, OCCUPANCY_TOPIC);
    assert_eq!(messages[1].0, COMMAND_TOPIC);

    let occupancy = &publisher.json_on(OCCUPANCY_TOPIC)[0];
    assert_eq!(occupancy["voting_result"], "2/2 sensors");
    assert_eq!(occupancy["ai_analysis"], "OCCUPIED.");
    let group3 = &occupancy["occupancy_sensors"][1];
    assert_eq!(group3["sensor"], "group3");
    assert_eq!(group3["occupancy_reasons"][0], "proximity_consistent_activity");

    let command = &publisher.json_on(COMMAND_TOPIC)[0];
    assert_eq!(command["occupancy_state"], "occupied");
    assert_eq!(command["confidence"], "high");
    Ok(())
}

#[test]
fn stale_motion_times_out_to_vacant() -> Result<(), AppError> {
    let engine = occupied_since(100)?;
    ingest(&engine, "group3/status", br#"{"motion":0,"distance":40}"#, at(134))?;
    {
        let guard = engine.read().map_err(|_| AppError::StateLock)?;
        let snapshot = guard.snapshot(at(135));
        assert!(snapshot.vacancy_timeout);
        assert_eq!(snapshot.predicted_state, OccupancyState::Vacant);
    }
    let publisher = MemoryPublisher::new();

    let transition = run_analysis(&engine, &StubOracle("VACANT"), &publisher, at(135))?;

    assert_eq!(transition.map(|t| t.new_state), Some(OccupancyState::Vacant));
    let guard = engine.read().map_err(|_| AppError::StateLock)?;
    assert_eq!(guard.state().current(), OccupancyState::Vacant);
    assert_eq!(guard.state().last_vacant_time(), Some(at(135)));
    assert_eq!(guard.state().last_occupied_time(), Some(at(100)));
    assert_eq!(publisher.json_on(OCCUPANCY_TOPIC)[0]["previous_state"], "occupied");
    Ok(())
}

#[test]
fn oracle_timeout_leaves_state_untouched() -> Result<(), AppError> {
    let engine = occupied_since(100)?;
    let before = {
        let guard = engine.read().map_err(|_| AppError::StateLock)?;
        guard.state().clone()
    };
    let publisher = MemoryPublisher::new();

    let transition = run_analysis(&engine, &TimedOutOracle, &publisher, at(140))?;

    assert!(transition.is_none());
    assert!(publisher.messages().is_empty());
    let guard = engine.read().map_err(|_| AppError::StateLock)?;
    assert_eq!(guard.state().current(), before.current());
    assert_eq!(guard.state().last_occupied_time(), before.last_occupied_time());
    assert_eq!(guard.state().last_vacant_time(), before.last_vacant_time());
    assert_eq!(guard.state().last_transition(), before.last_transition());
    Ok(())
}

#[test]
fn unrecognized_reply_is_not_a_transition() -> Result<(), AppError> {
    let engine = occupied_since(100)?;
    let publisher = MemoryPublisher::new();

    let transition = run_analysis(&engine, &StubOracle("I am not sure"), &publisher, at(101))?;

    assert!(transition.is_none());
    assert!(publisher.messages().is_empty());
    Ok(())
}

#[test]
fn repeated_verdict_does_not_republish() -> Result<(), AppError> {
    let engine = occupied_since(100)?;
    let publisher = MemoryPublisher::new();

    let transition = run_analysis(&engine, &StubOracle("OCCUPIED"), &publisher, at(102))?;

    assert!(transition.is_none());
    assert!(publisher.messages().is_empty());
    Ok(())
}

#[test]
fn history_keeps_only_the_newest_readings() {
    let mut engine = FusionEngine::default();
    for secs in 0..15 {
        engine.record(
            SensorRole::Group2Ultrasonic,
            SensorReading::new(false, Some(secs as f64), at(secs)),
            at(secs),
        );
    }

    let history = engine.history().history(SensorRole::Group2Ultrasonic);
    assert_eq!(history.len(), engine.history().capacity());
    assert_eq!(history.front().and_then(|r| r.distance_cm), Some(5.0));
    assert_eq!(history.back().and_then(|r| r.distance_cm), Some(14.0));
}
