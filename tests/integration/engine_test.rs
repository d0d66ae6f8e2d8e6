//! Cross-plugin engine behavior: ordering, gating, and unload semantics.

use std::sync::{Arc, Mutex};

use serde_json::json;

use wirehub_plugin::{ConditionGate, DispatchEngine, EventPayload, PluginDescriptor};
use wirehub_plugin_sdk::prelude::*;

type CallLog = Arc<Mutex<Vec<String>>>;

fn build_start_plugin(name: &'static str, priority: i32, log: CallLog) -> PluginDescriptor {
    PluginDescriptor::from_factory(name, move || {
        let log = log.clone();
        Ok(PluginManifest::builder()
            .on_event("build:start", priority, move |_| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(format!("{name}@{priority}"));
                    Ok(json!(null))
                }
            })
            .build())
    })
}

#[tokio::test]
async fn priorities_across_plugins_run_ascending() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let engine = DispatchEngine::new();

    // Two plugins declare handlers for the same event with priorities 5
    // and -1; the lower value runs first.
    engine
        .load_plugin(build_start_plugin("high", 5, log.clone()))
        .await
        .unwrap();
    engine
        .load_plugin(build_start_plugin("low", -1, log.clone()))
        .await
        .unwrap();

    let invoked = engine
        .fire_event("build:start", EventPayload::new())
        .await
        .unwrap();

    assert_eq!(invoked, 2);
    assert_eq!(log.lock().unwrap().as_slice(), ["low@-1", "high@5"]);
}

#[tokio::test]
async fn unloaded_plugin_contributes_nothing() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let engine = DispatchEngine::new();

    engine
        .load_plugin(build_start_plugin("solo", 0, log.clone()))
        .await
        .unwrap();
    engine.unload_plugin("solo").await.unwrap();

    let invoked = engine
        .fire_event("build:start", EventPayload::new())
        .await
        .unwrap();
    assert_eq!(invoked, 0);
    assert!(log.lock().unwrap().is_empty());
    assert!(engine.get_event_handlers(None).await.is_empty());
}

#[tokio::test]
async fn gated_handler_runs_only_on_exact_field_match() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let engine = DispatchEngine::new();

    let shared = log.clone();
    engine
        .load_plugin(PluginDescriptor::from_factory("gated", move || {
            let log = shared.clone();
            Ok(PluginManifest::builder()
                .on_event_gated(
                    "deploy",
                    0,
                    ConditionGate::new().with_field("foo", json!("bar")),
                    move |_| {
                        let log = log.clone();
                        async move {
                            log.lock().unwrap().push("ran".into());
                            Ok(json!(null))
                        }
                    },
                )
                .build())
        }))
        .await
        .unwrap();

    // Matching keyword: the handler runs.
    let invoked = engine
        .fire_event("deploy", EventPayload::new().with_string("foo", "bar"))
        .await
        .unwrap();
    assert_eq!(invoked, 1);

    // Any other value, or its absence, suppresses without raising.
    let invoked = engine
        .fire_event("deploy", EventPayload::new().with_string("foo", "baz"))
        .await
        .unwrap();
    assert_eq!(invoked, 0);

    let invoked = engine
        .fire_event("deploy", EventPayload::new())
        .await
        .unwrap();
    assert_eq!(invoked, 0);

    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn actions_are_isolated_from_events() {
    let engine = DispatchEngine::new();

    engine
        .load_plugin(PluginDescriptor::from_factory("mixed", || {
            Ok(PluginManifest::builder()
                .on_event("ping", 0, |_| async { Ok(json!(null)) })
                .on_action("ping", 0, |_| async { Ok(json!(null)) })
                .build())
        }))
        .await
        .unwrap();

    assert_eq!(engine.get_event_handlers(Some("ping")).await.len(), 1);
    assert_eq!(engine.get_action_handlers(Some("ping")).await.len(), 1);
    assert_eq!(
        engine.fire_event("ping", EventPayload::new()).await.unwrap(),
        1
    );
    assert_eq!(
        engine.do_action("ping", EventPayload::new()).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn loose_coupling_absent_action_handler_is_a_no_op() {
    let engine = DispatchEngine::new();
    // No plugin serves this action; the request simply does nothing.
    let invoked = engine
        .do_action("mail:send", EventPayload::new())
        .await
        .unwrap();
    assert_eq!(invoked, 0);
}

#[tokio::test]
async fn unload_plugins_by_query() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let engine = DispatchEngine::new();

    engine
        .load_plugin(build_start_plugin("keep", 0, log.clone()))
        .await
        .unwrap();
    engine
        .load_plugin(build_start_plugin("drop", 0, log.clone()))
        .await
        .unwrap();

    let removed = engine
        .unload_plugins(
            &wirehub_plugin::PluginQuery::new().attr("name", json!("drop")),
        )
        .await
        .unwrap();

    assert_eq!(removed, vec!["drop".to_string()]);
    assert!(engine.get_plugin("drop").await.is_none());
    assert!(engine.get_plugin("keep").await.is_some());
}
