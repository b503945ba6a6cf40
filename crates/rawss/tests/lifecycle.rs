#![allow(clippy::unwrap_used, reason = "tests")]

mod common;

use std::sync::Arc;
use std::thread;

use common::{controller, init_logs, next_frame, pixel_tokens, shared_dom, style_of};
use html::{DOMUpdate, Dom, ElementSpec, NodeKey};
use rawss::{
    FrameScheduler, LifecycleState, Rawss, RawssConfig, ResolvedStyle, SharedHost, ThemeTokens, TokenTable, create_rawss,
    create_style_resolver,
};

fn styled_child(dom: &SharedHost<Dom>, style: &str) -> NodeKey {
    let mut guard = dom.lock().unwrap();
    let body = guard.body();
    guard
        .insert(body, ElementSpec::new("div").attr("id", "test").attr("data-style", style))
        .unwrap()
}

fn set_style_attr(dom: &SharedHost<Dom>, node: NodeKey, style: &str) {
    dom.lock().unwrap().set_attribute(node, "data-style", style).unwrap();
}

#[tokio::test(start_paused = true)]
async fn once_resolves_synchronously() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: three-pixels");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(pixel_tokens());

    let report = rawss.once().unwrap();

    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("3px"));
    assert_eq!(report.properties_written, 1);
    assert_eq!(rawss.state(), LifecycleState::Idle);
    assert_eq!(rawss.counters().passes_once, 1);
}

#[tokio::test(start_paused = true)]
async fn start_resolves_replaced_children_on_the_next_frame() {
    init_logs();
    let dom = shared_dom();
    styled_child(&dom, "height: three-pixels");
    let body = dom.lock().unwrap().body();
    let rawss = controller(&dom, body);
    rawss.add(pixel_tokens());
    rawss.start().unwrap();

    dom.lock()
        .unwrap()
        .replace_children(
            body,
            [ElementSpec::new("div").attr("id", "test").attr("data-style", "height: four-pixels")],
        )
        .unwrap();
    next_frame().await;

    let test = dom.lock().unwrap().get_element_by_id("test").unwrap();
    assert_eq!(style_of(&dom, test, "height").as_deref(), Some("4px"));
    assert_eq!(rawss.state(), LifecycleState::Running);
    assert_eq!(rawss.counters().passes_mutation, 1);
}

#[tokio::test(start_paused = true)]
async fn mutations_within_one_frame_share_a_pass() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: three-pixels");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(pixel_tokens());
    rawss.start().unwrap();
    let mut updates = dom.lock().unwrap().subscribe();

    set_style_attr(&dom, div, "height: hundred-pixels");
    set_style_attr(&dom, div, "height: four-pixels");
    next_frame().await;

    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("4px"));
    let counters = rawss.counters();
    assert_eq!(counters.passes_start, 1);
    assert_eq!(counters.passes_mutation, 1);
    let mut written = Vec::new();
    while let Ok(batch) = updates.try_recv() {
        for update in batch {
            if let DOMUpdate::SetStyle { value, .. } = update {
                written.push(value);
            }
        }
    }
    assert_eq!(written, vec!["4px"]);
}

#[tokio::test(start_paused = true)]
async fn own_style_writes_do_not_retrigger() {
    init_logs();
    let dom = shared_dom();
    styled_child(&dom, "height: three-pixels");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(pixel_tokens());
    rawss.start().unwrap();

    next_frame().await;
    next_frame().await;

    assert_eq!(rawss.counters().passes_total, 1);
}

#[tokio::test(start_paused = true)]
async fn pause_stops_resolution() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: hundred-pixels");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(pixel_tokens());
    rawss.start().unwrap();
    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("100px"));

    rawss.pause();
    set_style_attr(&dom, div, "height: four-pixels");
    next_frame().await;

    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("100px"));
    assert_eq!(rawss.state(), LifecycleState::Paused);
    assert_eq!(rawss.counters().dropped_while_paused, 1);
    assert_eq!(rawss.counters().passes_mutation, 0);
}

#[tokio::test(start_paused = true)]
async fn pause_cancels_a_scheduled_pass() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: three-pixels");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(pixel_tokens());
    rawss.start().unwrap();

    set_style_attr(&dom, div, "height: four-pixels");
    tokio::task::yield_now().await;
    rawss.pause();
    next_frame().await;

    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("3px"));
    let counters = rawss.counters();
    assert_eq!(counters.passes_mutation, 0);
    assert_eq!(counters.cancelled_frames + counters.dropped_while_paused, 1);
}

#[tokio::test(start_paused = true)]
async fn restart_picks_up_changes_made_while_paused() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: three-pixels");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(pixel_tokens());
    rawss.start().unwrap();
    rawss.pause();
    set_style_attr(&dom, div, "height: four-pixels");
    next_frame().await;

    rawss.start().unwrap();

    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("4px"));
    assert_eq!(rawss.state(), LifecycleState::Running);
    assert_eq!(rawss.counters().passes_start, 2);
}

#[tokio::test(start_paused = true)]
async fn invalid_transitions_are_ignored() {
    init_logs();
    let dom = shared_dom();
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);

    rawss.pause();
    assert_eq!(rawss.state(), LifecycleState::Idle);

    rawss.start().unwrap();
    rawss.start().unwrap();
    assert_eq!(rawss.counters().passes_start, 1);

    rawss.pause();
    rawss.pause();
    assert_eq!(rawss.state(), LifecycleState::Paused);
}

#[tokio::test(start_paused = true)]
async fn repeated_once_writes_nothing_new() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: three-pixels");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(pixel_tokens());
    rawss.once().unwrap();
    let mut updates = dom.lock().unwrap().subscribe();

    let report = rawss.once().unwrap();

    assert_eq!(report.properties_written, 0);
    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("3px"));
    assert!(updates.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn mutations_outside_the_root_are_ignored() {
    init_logs();
    let dom = shared_dom();
    let (main, outside) = {
        let mut guard = dom.lock().unwrap();
        let body = guard.body();
        let main = guard.insert(body, ElementSpec::new("main")).unwrap();
        let outside = guard.insert(body, ElementSpec::new("aside")).unwrap();
        (main, outside)
    };
    let rawss = controller(&dom, main);
    rawss.add(pixel_tokens());
    rawss.start().unwrap();

    set_style_attr(&dom, outside, "height: four-pixels");
    next_frame().await;

    assert_eq!(style_of(&dom, outside, "height"), None);
    assert_eq!(rawss.counters().passes_mutation, 0);
}

#[tokio::test(start_paused = true)]
async fn processors_added_later_join_the_next_pass() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: three-pixels; width: wide");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(pixel_tokens());
    rawss.start().unwrap();
    assert_eq!(style_of(&dom, div, "width"), None);

    rawss.add(Arc::new(TokenTable::new("widths").token("wide", "50px")));
    set_style_attr(&dom, div, "height: three-pixels; width: wide;");
    next_frame().await;

    assert_eq!(style_of(&dom, div, "width").as_deref(), Some("50px"));
    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("3px"));
}

#[tokio::test(start_paused = true)]
async fn any_attribute_change_triggers_a_pass() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: size");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(create_style_resolver(
        |rule| rule.value == "size",
        |_style, element| {
            let height = if element.attribute("class") == Some("big") { "40px" } else { "4px" };
            Ok(ResolvedStyle::new().with("height", height))
        },
    ));
    rawss.start().unwrap();
    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("4px"));

    dom.lock().unwrap().set_attribute(div, "class", "big").unwrap();
    next_frame().await;
    next_frame().await;

    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("40px"));
    assert_eq!(rawss.counters().passes_mutation, 1);

    dom.lock().unwrap().set_attribute(div, "title", "anything").unwrap();
    next_frame().await;
    assert_eq!(rawss.counters().passes_mutation, 2);
}

#[tokio::test(start_paused = true)]
async fn inline_custom_property_changes_trigger_passes() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: gap");
    dom.lock().unwrap().set_style_property(div, "--gap", "1px").unwrap();
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(Arc::new(ThemeTokens::new()));
    rawss.start().unwrap();
    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("1px"));

    dom.lock().unwrap().set_style_property(div, "--gap", "9px").unwrap();
    next_frame().await;
    next_frame().await;

    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("9px"));
    assert_eq!(rawss.counters().passes_mutation, 1);
}

#[tokio::test(start_paused = true)]
async fn narrowed_watch_ignores_other_attributes() {
    init_logs();
    let dom = shared_dom();
    let div = styled_child(&dom, "height: three-pixels");
    let root = dom.lock().unwrap().document_element();
    let config = RawssConfig::new("data-style", common::FRAME_BUDGET_MS, false).observe_attribute("class");
    let clock = Box::new(FrameScheduler::new(config.frame_budget()));
    let rawss = Rawss::with_config(Arc::clone(&dom), root, config, clock).unwrap();
    rawss.add(pixel_tokens());
    rawss.start().unwrap();

    dom.lock().unwrap().set_attribute(div, "class", "dark").unwrap();
    next_frame().await;
    dom.lock().unwrap().set_attribute(div, "title", "ignored").unwrap();
    next_frame().await;
    set_style_attr(&dom, div, "height: four-pixels");
    next_frame().await;

    assert_eq!(style_of(&dom, div, "height").as_deref(), Some("4px"));
    assert_eq!(rawss.counters().passes_mutation, 2);
}

#[tokio::test(start_paused = true)]
async fn panicking_processor_leaves_the_host_usable() {
    init_logs();
    let dom = shared_dom();
    let first = styled_child(&dom, "height: three-pixels");
    let second = styled_child(&dom, "height: four-pixels");
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.add(create_style_resolver(
        |rule| rule.property == "height",
        |_style, element| {
            let missing = element.attribute("nope").unwrap();
            Ok(ResolvedStyle::new().with("color", missing))
        },
    ));
    rawss.add(pixel_tokens());

    let report = rawss.once().unwrap();

    assert_eq!(report.failures.len(), 2);
    assert_eq!(style_of(&dom, first, "height").as_deref(), Some("3px"));
    assert_eq!(style_of(&dom, second, "height").as_deref(), Some("4px"));
    assert!(dom.lock().is_ok());
    assert!(rawss.once().is_ok());
    assert_eq!(rawss.counters().failures_total, 4);
}

#[tokio::test(start_paused = true)]
async fn failed_start_keeps_the_previous_state() {
    init_logs();
    let dom = shared_dom();
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    rawss.start().unwrap();
    rawss.pause();

    let poisoner = Arc::clone(&dom);
    let outcome = thread::spawn(move || {
        let _guard = poisoner.lock().unwrap();
        panic!("poisoning the host lock");
    })
    .join();
    assert!(outcome.is_err());

    assert!(rawss.start().is_err());
    assert_eq!(rawss.state(), LifecycleState::Paused);
}

#[tokio::test(start_paused = true)]
async fn pass_events_count_completed_passes() {
    init_logs();
    let dom = shared_dom();
    let root = dom.lock().unwrap().document_element();
    let rawss = controller(&dom, root);
    let mut events = rawss.pass_events();
    assert_eq!(*events.borrow_and_update(), 0);

    rawss.once().unwrap();

    assert!(events.has_changed().unwrap());
    assert_eq!(*events.borrow_and_update(), 1);
}

#[tokio::test(start_paused = true)]
async fn create_rawss_rejects_detached_roots() {
    init_logs();
    let dom = shared_dom();
    let detached = dom.lock().unwrap().create_element("div");

    assert!(create_rawss(Arc::clone(&dom), detached).is_err());
    let root = dom.lock().unwrap().document_element();
    assert!(create_rawss(dom, root).is_ok());
}

#[test]
fn create_rawss_needs_a_runtime() {
    init_logs();
    let dom = shared_dom();
    let root = dom.lock().unwrap().document_element();

    let err = create_rawss(dom, root).unwrap_err();

    assert!(err.to_string().contains("tokio runtime"), "{err}");
}
