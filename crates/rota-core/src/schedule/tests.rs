use std::{sync::Arc, time::Duration};

use rota_model::{DEFAULT_LOCK_TTL, ModelError, Mode, OverlapPolicy, TaskConfig};

use super::*;
use crate::{
    LockCapability, MemoryLock, TriggerError,
    mocks::{CountingHandler, ManualTrigger, RecordingSubscriber, ScriptedLock},
};

const WAIT: Duration = Duration::from_secs(5);

fn periodic(name: &str, trigger: &ManualTrigger) -> ScheduleBuilder {
    Schedule::builder(name)
        .with_app_name("test")
        .with_task(|t| t.with_mode(Mode::PeriodicOnly).with_spec("@every 1s"))
        .with_trigger_factory(trigger.factory())
}

async fn fire_and_drain(schedule: &Schedule, trigger: &ManualTrigger, times: usize) {
    for _ in 0..times {
        assert_eq!(trigger.fire(), 1);
    }
    schedule.drain().await;
}

async fn wait_for(rec: &RecordingSubscriber, kind: EventKind, n: usize) {
    tokio::time::timeout(WAIT, rec.wait_for(kind, n))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {n} x {kind:?}"));
}

#[tokio::test]
async fn stopped_mode_never_runs() {
    let trigger = ManualTrigger::new();
    let once = CountingHandler::ok();
    let every = CountingHandler::ok();
    let schedule = Schedule::builder("idle")
        .with_task(|t| t.with_mode(Mode::Stopped).with_spec("@every 1s"))
        .with_once_handler(once.clone())
        .with_periodic_handler(every.clone())
        .with_trigger_factory(trigger.factory())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    assert!(!schedule.is_serving());
    assert_eq!(trigger.fire(), 0);
    schedule.drain().await;

    assert_eq!(once.calls(), 0);
    assert_eq!(every.calls(), 0);
    assert_eq!(trigger.engines_created(), 0);
}

#[tokio::test]
async fn once_only_runs_exactly_once_without_a_trigger() {
    let trigger = ManualTrigger::new();
    let once = CountingHandler::ok();
    let schedule = Schedule::builder("warmup")
        .with_task(|t| t.with_mode(Mode::OnceOnly))
        .with_once_handler(once.clone())
        .with_trigger_factory(trigger.factory())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    schedule.drain().await;

    assert_eq!(once.calls(), 1);
    assert_eq!(trigger.engines_created(), 0);
    assert!(trigger.registered_specs().is_empty());
}

#[tokio::test]
async fn serve_returns_before_the_run_finishes() {
    let once = CountingHandler::gated();
    let rec = RecordingSubscriber::new();
    let schedule = Schedule::builder("slow")
        .with_task(|t| t.with_mode(Mode::OnceOnly))
        .with_once_handler(once.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    wait_for(&rec, EventKind::RunStarting, 1).await;
    assert_eq!(schedule.in_flight(), 1);

    once.open();
    schedule.drain().await;
    assert_eq!(schedule.in_flight(), 0);
    assert_eq!(rec.count(EventKind::RunSucceeded), 1);
}

#[tokio::test]
async fn each_firing_is_one_run() {
    let trigger = ManualTrigger::new();
    let every = CountingHandler::ok();
    let schedule = periodic("tick", &trigger)
        .with_periodic_handler(every.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    assert_eq!(trigger.registered_specs(), vec!["@every 1s".to_string()]);

    fire_and_drain(&schedule, &trigger, 3).await;
    assert_eq!(every.calls(), 3);
}

#[tokio::test]
async fn once_and_periodic_fire_independently() {
    let trigger = ManualTrigger::new();
    let once = CountingHandler::ok();
    let every = CountingHandler::ok();
    let rec = RecordingSubscriber::new();
    let schedule = periodic("both", &trigger)
        .with_task(|t| t.with_mode(Mode::OnceAndPeriodic))
        .with_once_handler(once.clone())
        .with_periodic_handler(every.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 2).await;

    assert_eq!(once.calls(), 1);
    assert_eq!(every.calls(), 2);
    let once_runs = rec
        .events()
        .iter()
        .filter(|e| e.kind == EventKind::RunSucceeded && e.run == RunKind::Once)
        .count();
    assert_eq!(once_runs, 1);
}

#[tokio::test]
async fn periodic_without_handler_skips_registration() {
    let trigger = ManualTrigger::new();
    let schedule = periodic("headless", &trigger).build().unwrap();

    schedule.serve().await.unwrap();
    assert_eq!(trigger.engines_created(), 0);
}

#[tokio::test]
async fn malformed_spec_fails_serve_without_runs() {
    let trigger = ManualTrigger::new();
    let every = CountingHandler::ok();
    let schedule = periodic("broken", &trigger)
        .with_task(|t| t.with_spec("not a cron"))
        .with_periodic_handler(every.clone())
        .build()
        .unwrap();

    let err = schedule.serve().await.unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::Trigger(TriggerError::InvalidSpec { ref spec, .. }) if spec == "not a cron"
    ));
    assert!(!schedule.is_serving());
    assert_eq!(trigger.fire(), 0);
    schedule.drain().await;
    assert_eq!(every.calls(), 0);
}

#[tokio::test]
async fn once_still_runs_when_periodic_spec_is_rejected() {
    let trigger = ManualTrigger::new();
    let once = CountingHandler::ok();
    let every = CountingHandler::ok();
    let schedule = periodic("half-broken", &trigger)
        .with_task(|t| t.with_mode(Mode::OnceAndPeriodic).with_spec("not a cron"))
        .with_once_handler(once.clone())
        .with_periodic_handler(every.clone())
        .build()
        .unwrap();

    let err = schedule.serve().await.unwrap_err();
    assert!(matches!(err, ScheduleError::Trigger(TriggerError::InvalidSpec { .. })));
    assert!(!schedule.is_serving());
    schedule.drain().await;

    assert_eq!(once.calls(), 1);
    assert_eq!(every.calls(), 0);
}

#[tokio::test]
async fn oversized_lock_ttl_is_rejected_at_build() {
    let cfg: TaskConfig = serde_json::from_str(
        r#"{ "type": 2, "spec": "@every 1s", "compete": true, "lockSeconds": 18446744073709551615 }"#,
    )
    .unwrap();
    let res = Schedule::builder("greedy")
        .with_config(&cfg)
        .with_lock(Arc::new(MemoryLock::new()))
        .with_periodic_handler(CountingHandler::ok())
        .build();

    assert!(matches!(
        res,
        Err(ScheduleError::Config(ModelError::LockTtlTooLarge { ref task, .. })) if task == "greedy"
    ));
}

#[tokio::test]
async fn empty_spec_is_rejected_at_build() {
    let trigger = ManualTrigger::new();
    let res = periodic("blank", &trigger)
        .with_task(|t| t.with_spec(""))
        .with_periodic_handler(CountingHandler::ok())
        .build();

    assert!(matches!(
        res,
        Err(ScheduleError::Config(ModelError::MissingSpec { ref task })) if task == "blank"
    ));
}

#[tokio::test]
async fn empty_name_is_rejected_at_build() {
    let res = Schedule::builder("").build();
    assert!(matches!(res, Err(ScheduleError::Config(ModelError::EmptyName))));
}

#[tokio::test]
async fn competitive_without_lock_is_rejected_at_build() {
    let res = Schedule::builder("solo")
        .with_task(|t| t.with_mode(Mode::OnceOnly).with_competitive(true))
        .build();
    assert!(matches!(res, Err(ScheduleError::MissingLock { ref task }) if task == "solo"));
}

#[tokio::test]
async fn build_applies_defaults() {
    let schedule = Schedule::builder("report")
        .with_app_name("billing")
        .with_task(|t| t.with_lock_ttl(Duration::ZERO))
        .build()
        .unwrap();

    assert_eq!(schedule.task().lock_ttl, DEFAULT_LOCK_TTL);
    assert_eq!(schedule.task().lock_key_prefix, "billing");
    assert_eq!(schedule.lock_key(), "billing.schedules.report.locker");
}

#[tokio::test]
async fn build_from_config_entry() {
    let cfg: TaskConfig = serde_json::from_str(
        r#"{ "type": 2, "spec": "@every 5s", "compete": true, "autoUnlock": true, "lockSeconds": 30 }"#,
    )
    .unwrap();
    let schedule = Schedule::builder("invoice")
        .with_app_name("billing")
        .with_config(&cfg)
        .with_lock(Arc::new(MemoryLock::new()))
        .build()
        .unwrap();

    let task = schedule.task();
    assert_eq!(schedule.name(), "invoice");
    assert_eq!(task.mode, Mode::PeriodicOnly);
    assert_eq!(task.lock_ttl, Duration::from_secs(30));
    assert!(task.competitive && task.auto_release && task.precheck);
    assert_eq!(schedule.lock_key(), "billing.schedules.invoice.locker");
}

#[tokio::test]
async fn non_competitive_runs_every_trigger_without_lock_calls() {
    let trigger = ManualTrigger::new();
    let lock = ScriptedLock::denying();
    let every = CountingHandler::ok();
    let schedule = periodic("fanout", &trigger)
        .with_lock(lock.clone())
        .with_periodic_handler(every.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 2).await;

    assert_eq!(every.calls(), 2);
    assert_eq!(lock.total_calls(), 0);
}

#[tokio::test]
async fn denied_lock_never_runs_the_handler() {
    let trigger = ManualTrigger::new();
    let lock = ScriptedLock::denying();
    let every = CountingHandler::ok();
    let rec = RecordingSubscriber::new();
    let schedule = periodic("contested", &trigger)
        .with_task(|t| t.with_competitive(true))
        .with_lock(lock.clone())
        .with_periodic_handler(every.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 3).await;

    assert_eq!(every.calls(), 0);
    assert_eq!(lock.is_held_calls(), 3);
    assert_eq!(lock.acquire_calls(), 3);
    assert_eq!(lock.release_calls(), 0);
    assert_eq!(rec.count(EventKind::ElectionLost), 3);
}

#[tokio::test]
async fn held_lock_short_circuits_acquisition() {
    let trigger = ManualTrigger::new();
    let lock = ScriptedLock::held();
    let every = CountingHandler::ok();
    let schedule = periodic("busy", &trigger)
        .with_task(|t| t.with_competitive(true))
        .with_lock(lock.clone())
        .with_periodic_handler(every.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 1).await;

    assert_eq!(every.calls(), 0);
    assert_eq!(lock.is_held_calls(), 1);
    assert_eq!(lock.acquire_calls(), 0);
}

#[tokio::test]
async fn disabled_precheck_goes_straight_to_acquire() {
    let trigger = ManualTrigger::new();
    let lock = ScriptedLock::held();
    lock.set_grant(true);
    let every = CountingHandler::ok();
    let schedule = periodic("direct", &trigger)
        .with_task(|t| t.with_competitive(true).with_precheck(false))
        .with_lock(lock.clone())
        .with_periodic_handler(every.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 1).await;

    assert_eq!(lock.is_held_calls(), 0);
    assert_eq!(lock.acquire_calls(), 1);
    assert_eq!(every.calls(), 1);
}

#[tokio::test]
async fn lock_errors_fail_closed() {
    let trigger = ManualTrigger::new();
    let lock = ScriptedLock::granting();
    let every = CountingHandler::ok();
    let rec = RecordingSubscriber::new();
    let schedule = periodic("flaky", &trigger)
        .with_task(|t| t.with_competitive(true))
        .with_lock(lock.clone())
        .with_periodic_handler(every.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();
    schedule.serve().await.unwrap();

    lock.fail_is_held(true);
    fire_and_drain(&schedule, &trigger, 1).await;
    assert_eq!(lock.acquire_calls(), 0);

    lock.fail_is_held(false);
    lock.fail_acquire(true);
    fire_and_drain(&schedule, &trigger, 1).await;

    assert_eq!(every.calls(), 0);
    assert_eq!(rec.count(EventKind::ElectionFailed), 2);
    assert!(rec.events().iter().all(|e| e.reason.is_some()));
}

#[tokio::test]
async fn two_instances_share_one_winner_per_occurrence() {
    let store = MemoryLock::new();
    let every = CountingHandler::ok();
    let (ta, tb) = (ManualTrigger::new(), ManualTrigger::new());

    let build = |trigger: &ManualTrigger, lock: MemoryLock| {
        periodic("report", trigger)
            .with_task(|t| t.with_competitive(true).with_auto_release(false))
            .with_lock(Arc::new(lock))
            .with_periodic_handler(every.clone())
            .build()
            .unwrap()
    };
    let a = build(&ta, store.handle());
    let b = build(&tb, store.handle());
    a.serve().await.unwrap();
    b.serve().await.unwrap();

    // Same occurrence seen by both instances at once.
    assert_eq!(ta.fire(), 1);
    assert_eq!(tb.fire(), 1);
    a.drain().await;
    b.drain().await;

    assert_eq!(every.calls(), 1);
    assert!(store.is_held(a.lock_key()).await.unwrap());
}

#[tokio::test]
async fn auto_release_frees_the_lock_on_every_outcome() {
    let handlers = [
        CountingHandler::ok(),
        CountingHandler::failing("bad input"),
        CountingHandler::panicking("boom"),
    ];

    for handler in handlers {
        let trigger = ManualTrigger::new();
        let lock = MemoryLock::new();
        let rec = RecordingSubscriber::new();
        let schedule = periodic("cleanup", &trigger)
            .with_task(|t| t.with_competitive(true).with_auto_release(true))
            .with_lock(Arc::new(lock.clone()))
            .with_periodic_handler(handler.clone())
            .with_subscriber(rec.clone())
            .build()
            .unwrap();

        schedule.serve().await.unwrap();
        fire_and_drain(&schedule, &trigger, 1).await;

        assert_eq!(handler.calls(), 1);
        assert!(!lock.is_held(schedule.lock_key()).await.unwrap());
        assert_eq!(rec.kinds().last(), Some(&EventKind::LockReleased));
    }
}

#[tokio::test]
async fn release_failure_is_reported_not_raised() {
    let trigger = ManualTrigger::new();
    let lock = ScriptedLock::granting();
    lock.fail_release(true);
    let every = CountingHandler::ok();
    let rec = RecordingSubscriber::new();
    let schedule = periodic("sticky", &trigger)
        .with_task(|t| t.with_competitive(true).with_auto_release(true))
        .with_lock(lock.clone())
        .with_periodic_handler(every.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 2).await;

    assert_eq!(every.calls(), 2);
    assert_eq!(lock.release_calls(), 2);
    assert_eq!(rec.count(EventKind::LockReleaseFailed), 2);
}

#[tokio::test(start_paused = true)]
async fn without_auto_release_the_lock_expires_after_ttl() {
    let trigger = ManualTrigger::new();
    let lock = MemoryLock::new();
    let every = CountingHandler::ok();
    let schedule = periodic("nightly", &trigger)
        .with_task(|t| {
            t.with_competitive(true)
                .with_auto_release(false)
                .with_lock_ttl(Duration::from_secs(5))
        })
        .with_lock(Arc::new(lock.clone()))
        .with_periodic_handler(every.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 1).await;
    assert!(lock.is_held(schedule.lock_key()).await.unwrap());

    // Still inside the TTL window: the same instance does not run again.
    fire_and_drain(&schedule, &trigger, 1).await;
    assert_eq!(every.calls(), 1);

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(!lock.is_held(schedule.lock_key()).await.unwrap());

    fire_and_drain(&schedule, &trigger, 1).await;
    assert_eq!(every.calls(), 2);
}

#[tokio::test]
async fn crash_does_not_stop_the_next_trigger() {
    let trigger = ManualTrigger::new();
    let every = CountingHandler::panicking("boom");
    let rec = RecordingSubscriber::new();
    let schedule = periodic("fragile", &trigger)
        .with_periodic_handler(every.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 1).await;

    let crashed: Vec<_> = rec
        .events()
        .into_iter()
        .filter(|e| e.kind == EventKind::RunCrashed)
        .collect();
    assert_eq!(crashed.len(), 1);
    assert_eq!(crashed[0].reason.as_deref(), Some("boom"));

    fire_and_drain(&schedule, &trigger, 1).await;
    assert_eq!(every.calls(), 2);
    assert_eq!(rec.count(EventKind::RunCrashed), 2);
}

#[tokio::test]
async fn handler_error_is_reported() {
    let trigger = ManualTrigger::new();
    let every = CountingHandler::failing("upstream timeout");
    let rec = RecordingSubscriber::new();
    let schedule = periodic("sync", &trigger)
        .with_periodic_handler(every.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 1).await;

    assert_eq!(rec.kinds(), vec![EventKind::RunStarting, EventKind::RunFailed]);
    assert_eq!(rec.events()[1].reason.as_deref(), Some("upstream timeout"));
}

#[tokio::test]
async fn winner_events_are_ordered() {
    let trigger = ManualTrigger::new();
    let rec = RecordingSubscriber::new();
    let schedule = periodic("ordered", &trigger)
        .with_task(|t| t.with_competitive(true).with_auto_release(true))
        .with_lock(ScriptedLock::granting())
        .with_periodic_handler(CountingHandler::ok())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 1).await;

    assert_eq!(
        rec.kinds(),
        vec![EventKind::RunStarting, EventKind::RunSucceeded, EventKind::LockReleased]
    );
    assert!(rec.events().iter().all(|e| e.task == "ordered" && e.run == RunKind::Periodic));
}

#[tokio::test]
async fn handler_receives_the_descriptor() {
    let trigger = ManualTrigger::new();
    let every = CountingHandler::ok();
    let schedule = periodic("args", &trigger)
        .with_task(|t| t.with_args(serde_json::json!({ "batch": 50 })))
        .with_periodic_handler(every.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 1).await;

    let seen = every.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "args");
    assert_eq!(seen[0].args["batch"], 50);
}

#[tokio::test]
async fn skip_policy_drops_overlapping_runs() {
    let trigger = ManualTrigger::new();
    let every = CountingHandler::gated();
    let rec = RecordingSubscriber::new();
    let schedule = periodic("exclusive", &trigger)
        .with_task(|t| t.with_overlap(OverlapPolicy::Skip))
        .with_periodic_handler(every.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();
    schedule.serve().await.unwrap();

    trigger.fire();
    wait_for(&rec, EventKind::RunStarting, 1).await;
    trigger.fire();
    wait_for(&rec, EventKind::OverlapSkipped, 1).await;

    every.open();
    schedule.drain().await;
    assert_eq!(every.calls(), 1);

    fire_and_drain(&schedule, &trigger, 1).await;
    assert_eq!(every.calls(), 2);
}

#[tokio::test]
async fn allow_policy_runs_overlapping_runs() {
    let trigger = ManualTrigger::new();
    let every = CountingHandler::gated();
    let rec = RecordingSubscriber::new();
    let schedule = periodic("parallel", &trigger)
        .with_periodic_handler(every.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();
    schedule.serve().await.unwrap();

    trigger.fire();
    trigger.fire();
    wait_for(&rec, EventKind::RunStarting, 2).await;
    assert_eq!(schedule.in_flight(), 2);

    every.open();
    schedule.drain().await;
    assert_eq!(every.calls(), 2);
    assert_eq!(rec.count(EventKind::OverlapSkipped), 0);
}

#[tokio::test]
async fn shutdown_stops_future_firings() {
    let trigger = ManualTrigger::new();
    let every = CountingHandler::ok();
    let schedule = periodic("stoppable", &trigger)
        .with_periodic_handler(every.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    fire_and_drain(&schedule, &trigger, 1).await;

    schedule.shutdown().await.unwrap();
    assert!(trigger.is_stopped());
    assert!(!schedule.is_serving());
    assert_eq!(trigger.fire(), 0);
    schedule.drain().await;
    assert_eq!(every.calls(), 1);

    // A stopped schedule can be served again with a fresh engine.
    schedule.serve().await.unwrap();
    assert_eq!(trigger.engines_created(), 2);
    fire_and_drain(&schedule, &trigger, 1).await;
    assert_eq!(every.calls(), 2);
}

#[tokio::test]
async fn shutdown_does_not_cancel_in_flight_runs() {
    let trigger = ManualTrigger::new();
    let every = CountingHandler::gated();
    let rec = RecordingSubscriber::new();
    let schedule = periodic("long", &trigger)
        .with_periodic_handler(every.clone())
        .with_subscriber(rec.clone())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    trigger.fire();
    wait_for(&rec, EventKind::RunStarting, 1).await;

    schedule.shutdown().await.unwrap();
    assert_eq!(schedule.in_flight(), 1);

    every.open();
    schedule.drain().await;
    assert_eq!(rec.count(EventKind::RunSucceeded), 1);
}

#[tokio::test]
async fn serving_twice_is_rejected() {
    let trigger = ManualTrigger::new();
    let schedule = periodic("twice", &trigger)
        .with_periodic_handler(CountingHandler::ok())
        .build()
        .unwrap();

    schedule.serve().await.unwrap();
    let err = schedule.serve().await.unwrap_err();
    assert!(matches!(err, ScheduleError::AlreadyServing { ref task } if task == "twice"));
    assert_eq!(trigger.engines_created(), 1);
}

#[tokio::test]
async fn shutdown_without_serve_is_a_no_op() {
    let schedule = Schedule::builder("never").build().unwrap();
    schedule.shutdown().await.unwrap();
    assert!(!schedule.is_serving());
}
