#![allow(dead_code, reason = "each test binary uses a subset")]
#![allow(clippy::unwrap_used, reason = "tests")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use html::{Dom, NodeKey};
use rawss::{FrameScheduler, ProcessorRef, Rawss, RawssConfig, SharedHost, create_style_resolver};

pub const FRAME_BUDGET_MS: u64 = 16;

const PIXEL_TOKENS: [(&str, &str); 3] = [("three-pixels", "3px"), ("four-pixels", "4px"), ("hundred-pixels", "100px")];

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn shared_dom() -> SharedHost<Dom> {
    Arc::new(Mutex::new(Dom::new()))
}

pub fn controller(dom: &SharedHost<Dom>, root: NodeKey) -> Rawss<Dom> {
    let config = RawssConfig::new("data-style", FRAME_BUDGET_MS, false);
    let clock = Box::new(FrameScheduler::new(config.frame_budget()));
    Rawss::with_config(Arc::clone(dom), root, config, clock).unwrap()
}

fn pixel_value(token: &str) -> Option<&'static str> {
    PIXEL_TOKENS
        .iter()
        .find(|(known, _)| *known == token)
        .map(|(_, value)| *value)
}

/// Resolves the `*-pixels` tokens, leaving other declarations alone.
pub fn pixel_tokens() -> ProcessorRef {
    create_style_resolver(
        |rule| pixel_value(&rule.value).is_some(),
        |style, _element| {
            Ok(style
                .iter()
                .filter_map(|rule| pixel_value(&rule.value).map(|value| (rule.property.as_str(), value)))
                .collect())
        },
    )
}

/// Sleep just past the next frame boundary.
pub async fn next_frame() {
    tokio::time::sleep(Duration::from_millis(FRAME_BUDGET_MS + 1)).await;
}

pub fn style_of(dom: &SharedHost<Dom>, node: NodeKey, property: &str) -> Option<String> {
    dom.lock()
        .unwrap()
        .style_property(node, property)
        .map(str::to_owned)
}
