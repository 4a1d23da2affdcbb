//! Scheduler integration tests: ordering, async launch/join, skip
//! semantics, outputs overrides, failure propagation.

use cogflow::{
    CogConfig, ConfigManager, Engine, EngineError, EventKind, Halt, WorkflowBuilder,
};
use serde_json::json;

fn async_cog(name: &str) -> ConfigManager {
    ConfigManager::new().for_name(name, CogConfig::new().with("async", true))
}

// ════════════════════════════════════════════════════════════════
// ORDERING
// ════════════════════════════════════════════════════════════════

#[tokio::test]
async fn synchronous_cogs_complete_in_declaration_order() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.compute("one", |_input, _ctx| async { Ok(Some(json!(1))) })
                .compute("two", |_input, _ctx| async { Ok(Some(json!(2))) })
                .compute("three", |_input, _ctx| async { Ok(Some(json!(3))) })
        })
        .build();

    let engine = Engine::new(workflow);
    engine.run().await.unwrap();

    assert_eq!(engine.events().completions(), ["one", "two", "three"]);
}

#[tokio::test]
async fn later_steps_see_earlier_outputs() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.compute("base", |_input, _ctx| async { Ok(Some(json!(20))) })
                .compute("plus", |_input, ctx| async move {
                    let base = ctx.demand("base").await?.integer()?;
                    Ok(Some(json!(base + 22)))
                })
        })
        .build();

    let handle = Engine::new(workflow).run().await.unwrap();
    assert_eq!(handle.final_value().as_ref(), &json!(42));
}

// ════════════════════════════════════════════════════════════════
// ASYNC COGS
// ════════════════════════════════════════════════════════════════

#[tokio::test]
async fn scope_exit_joins_unreferenced_async_cogs() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.step("mock", "background", |input, _ctx| async move {
                input.set("delay_ms", 50);
                input.set("value", "slow");
                Ok(None)
            })
            .compute("quick", |_input, _ctx| async { Ok(Some(json!("fast"))) })
        })
        .build();

    let engine = Engine::new(workflow).with_config(async_cog("background"));
    let handle = engine.run().await.unwrap();

    // nothing referenced the background cog, yet run() did not return
    // until it reached a terminal state
    assert!(handle.succeeded("background"));
    assert_eq!(handle.demand("background").unwrap().text(), "slow");
    assert_eq!(engine.events().completions(), ["quick", "background"]);
}

#[tokio::test]
async fn blocking_accessor_waits_only_for_its_dependency() {
    // async A sleeps; sync B is independent; sync C demands A.
    // Expected completion order: B, then A, then C.
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.step("mock", "a", |input, _ctx| async move {
                input.set("delay_ms", 60);
                input.set("value", "A-done");
                Ok(None)
            })
            .compute("b", |_input, _ctx| async { Ok(Some(json!("B-done"))) })
            .compute("c", |_input, ctx| async move {
                let a = ctx.demand("a").await?.text();
                Ok(Some(json!(format!("{a}, C-done"))))
            })
        })
        .build();

    let engine = Engine::new(workflow).with_config(async_cog("a"));
    let handle = engine.run().await.unwrap();

    assert_eq!(engine.events().completions(), ["b", "a", "c"]);
    // final output belongs to the last invoked cog
    assert_eq!(handle.final_value().as_ref(), &json!("A-done, C-done"));
}

#[tokio::test]
async fn independent_async_cogs_may_complete_out_of_order() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.step("mock", "slow", |input, _ctx| async move {
                input.set("delay_ms", 60);
                input.set("value", 1);
                Ok(None)
            })
            .step("mock", "fast", |input, _ctx| async move {
                input.set("delay_ms", 5);
                input.set("value", 2);
                Ok(None)
            })
        })
        .build();

    let config = ConfigManager::new()
        .for_matching("^(slow|fast)$", CogConfig::new().with("async", true))
        .unwrap();
    let engine = Engine::new(workflow).with_config(config);
    let handle = engine.run().await.unwrap();

    // both terminal by scope exit; the slower one finishes last even
    // though it was declared first
    assert!(handle.succeeded("slow") && handle.succeeded("fast"));
    assert_eq!(engine.events().completions(), ["fast", "slow"]);
}

// ════════════════════════════════════════════════════════════════
// SKIP
// ════════════════════════════════════════════════════════════════

#[tokio::test]
async fn skipped_cog_never_runs_and_accessors_agree() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.compute("optional", |_input, _ctx| async { Err(Halt::skip()) })
                .compute("probe", |_input, ctx| async move {
                    Ok(Some(json!({
                        "exists": ctx.output("optional").is_some(),
                        "succeeded": ctx.succeeded("optional"),
                    })))
                })
        })
        .build();

    let engine = Engine::new(workflow);
    let handle = engine.run().await.unwrap();

    assert_eq!(
        handle.final_value().as_ref(),
        &json!({"exists": false, "succeeded": false})
    );
    // the strict accessor raises on a skipped cog
    assert!(matches!(
        handle.demand("optional").unwrap_err(),
        EngineError::CogSkipped { .. }
    ));
    // never reached running state: no started/completed events
    assert!(engine
        .events()
        .filter_cog("optional")
        .iter()
        .all(|e| matches!(&e.kind, EventKind::CogSkipped { .. })));
}

#[tokio::test]
async fn skipped_cog_does_not_become_the_final_output() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.compute("real", |_input, _ctx| async { Ok(Some(json!("kept"))) })
                .compute("ghost", |_input, _ctx| async { Err(Halt::skip()) })
        })
        .build();

    let handle = Engine::new(workflow).run().await.unwrap();
    assert_eq!(handle.final_value().as_ref(), &json!("kept"));
}

// ════════════════════════════════════════════════════════════════
// OUTPUTS OVERRIDES
// ════════════════════════════════════════════════════════════════

#[tokio::test]
async fn outputs_step_overrides_the_final_output() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.compute("a", |_input, _ctx| async { Ok(Some(json!("ignored"))) })
                .outputs_strict(|ctx| async move {
                    let a = ctx.demand("a").await?.text();
                    Ok(Some(json!({"wrapped": a})))
                })
        })
        .build();

    let handle = Engine::new(workflow).run().await.unwrap();
    assert_eq!(
        handle.final_value().as_ref(),
        &json!({"wrapped": "ignored"})
    );
}

#[tokio::test]
async fn strict_outputs_propagates_access_errors() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.outputs_strict(|ctx| async move {
                let missing = ctx.demand("never_defined").await?;
                Ok(Some(missing.as_value().as_ref().clone()))
            })
        })
        .build();

    let err = Engine::new(workflow).run().await.unwrap_err();
    assert!(matches!(err, EngineError::CogDoesNotExist { name } if name == "never_defined"));
}

#[tokio::test]
async fn lenient_outputs_degrades_access_errors_to_nil() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.compute("a", |_input, _ctx| async { Ok(Some(json!("present"))) })
                .outputs(|ctx| async move {
                    let missing = ctx.demand("never_defined").await?;
                    Ok(Some(missing.as_value().as_ref().clone()))
                })
        })
        .build();

    let handle = Engine::new(workflow).run().await.unwrap();
    // override is set to nil, not the last cog's output
    assert!(handle.final_output().is_none());
}

// ════════════════════════════════════════════════════════════════
// FAILURE PROPAGATION
// ════════════════════════════════════════════════════════════════

#[tokio::test]
async fn sync_failure_aborts_the_scope_by_default() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.step("mock", "bad", |input, _ctx| async move {
                input.set("fail", "subprocess exploded");
                Ok(None)
            })
            .compute("after", |_input, _ctx| async { Ok(Some(json!("unreached"))) })
        })
        .build();

    let engine = Engine::new(workflow);
    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, EngineError::CogFailed { name, .. } if name == "bad"));
    // the scope halted: the later step never ran
    assert!(engine.events().filter_cog("after").is_empty());
}

#[tokio::test]
async fn tolerated_failure_is_observable_through_non_raising_accessors() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.step("mock", "flaky", |input, _ctx| async move {
                input.set("fail", "transient");
                Ok(None)
            })
            .compute("after", |_input, ctx| async move {
                Ok(Some(json!({
                    "succeeded": ctx.succeeded("flaky"),
                    "output": ctx.output("flaky").map(|o| o.text()),
                })))
            })
        })
        .build();

    let config =
        ConfigManager::new().for_name("flaky", CogConfig::new().with("fail_on_error", false));
    let handle = Engine::new(workflow).with_config(config).run().await.unwrap();
    assert_eq!(
        handle.final_value().as_ref(),
        &json!({"succeeded": false, "output": null})
    );
}

#[tokio::test]
async fn demanding_a_failed_cog_propagates_its_failure() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.step("mock", "flaky", |input, _ctx| async move {
                input.set("fail", "transient");
                Ok(None)
            })
            .compute("needy", |_input, ctx| async move {
                let out = ctx.demand("flaky").await?;
                Ok(Some(out.as_value().as_ref().clone()))
            })
        })
        .build();

    let config =
        ConfigManager::new().for_name("flaky", CogConfig::new().with("fail_on_error", false));
    let err = Engine::new(workflow).with_config(config).run().await.unwrap_err();
    assert!(matches!(err, EngineError::CogFailed { name, .. } if name == "flaky"));
}

#[tokio::test]
async fn async_failure_aborts_at_scope_exit() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.step("mock", "doomed", |input, _ctx| async move {
                input.set("delay_ms", 20);
                input.set("fail", "late failure");
                Ok(None)
            })
            .compute("quick", |_input, _ctx| async { Ok(Some(json!("done"))) })
        })
        .build();

    let engine = Engine::new(workflow).with_config(async_cog("doomed"));
    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, EngineError::CogFailed { name, .. } if name == "doomed"));
    // the sync step had already completed before the join noticed
    assert!(engine.events().completions().contains(&"quick".to_string()));
}

#[tokio::test]
async fn tolerated_async_failure_completes_the_scope() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.step("mock", "doomed", |input, _ctx| async move {
                input.set("delay_ms", 10);
                input.set("fail", "late failure");
                Ok(None)
            })
            .compute("quick", |_input, _ctx| async { Ok(Some(json!("done"))) })
        })
        .build();

    let config = ConfigManager::new().for_name(
        "doomed",
        CogConfig::new().with("async", true).with("fail_on_error", false),
    );
    let handle = Engine::new(workflow).with_config(config).run().await.unwrap();
    assert!(!handle.succeeded("doomed"));
    assert_eq!(handle.final_value().as_ref(), &json!("done"));
}

// ════════════════════════════════════════════════════════════════
// INITIAL WORKFLOW VALUE
// ════════════════════════════════════════════════════════════════

#[tokio::test]
async fn top_scope_receives_the_initial_value() {
    let workflow = WorkflowBuilder::new()
        .top(|s| {
            s.compute("echo", |_input, ctx| async move {
                Ok(ctx.value().cloned())
            })
        })
        .build();

    let handle = Engine::new(workflow)
        .run_with_value(json!({"target": "deploy"}))
        .await
        .unwrap();
    assert_eq!(handle.final_value().as_ref(), &json!({"target": "deploy"}));
}
