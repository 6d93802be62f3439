use design_bridge::bridge::{BootstrapMessage, PointerInput};
use design_bridge::protocol::BridgeConnectBootstrap;
use design_bridge::{BridgeAgent, BridgeInput, BridgeOptions, DomTree, Effect};
use design_bridge::{HostDocument, NodeId, Rect};
use serde_json::{Value, json};
use std::time::{Duration, Instant};

const SESSION: &str = "session-7f3a";

const PAGE: &str = r##"{
    "viewport": { "width": 1280, "height": 800 },
    "root": {
        "tag_name": "body",
        "children": [
            {
                "tag_name": "header",
                "attributes": { "id": "top" },
                "bounding_box": { "x": 0, "y": 0, "width": 1280, "height": 64 },
                "children": [
                    {
                        "tag_name": "a",
                        "attributes": { "class": "logo", "href": "/" },
                        "text_content": "Wiblo",
                        "bounding_box": { "x": 16, "y": 16, "width": 80, "height": 32 }
                    }
                ]
            },
            {
                "tag_name": "main",
                "bounding_box": { "x": 0, "y": 64, "width": 1280, "height": 600 },
                "children": [
                    {
                        "tag_name": "h1",
                        "attributes": { "id": "hero-title", "style": "color: rgb(0, 0, 0);" },
                        "text_content": "Build faster",
                        "bounding_box": { "x": 100, "y": 120, "width": 600, "height": 60 },
                        "styles": { "font-size": "40px" }
                    },
                    {
                        "tag_name": "p",
                        "attributes": { "id": "hero-copy" },
                        "text_content": "Ship design changes without a deploy.",
                        "bounding_box": { "x": 100, "y": 200, "width": 600, "height": 40 }
                    },
                    {
                        "tag_name": "div",
                        "attributes": { "id": "tracker", "data-wiblo-ignore": "" },
                        "bounding_box": { "x": 900, "y": 120, "width": 200, "height": 200 }
                    }
                ]
            }
        ]
    }
}"##;

fn parent_message(message_type: &str, payload: Value) -> BridgeInput {
    BridgeInput::PortMessage(json!({
        "protocol": "wiblo.design-bridge.v1",
        "sessionId": SESSION,
        "messageId": format!("m-{}", message_type.to_lowercase()),
        "timestamp": 1_760_000_000_000_i64,
        "type": message_type,
        "payload": payload,
    }))
}

/// Wire form of every envelope posted by the effects
fn posted(effects: &[Effect]) -> Vec<Value> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Post(envelope) => Some(envelope.to_value().unwrap()),
            _ => None,
        })
        .collect()
}

fn types(messages: &[Value]) -> Vec<&str> {
    messages.iter().map(|message| message["type"].as_str().unwrap()).collect()
}

fn connected_agent() -> (BridgeAgent<DomTree>, Instant) {
    let now = Instant::now();
    let tree = DomTree::from_json(PAGE).unwrap();
    let mut agent = BridgeAgent::new(tree, BridgeOptions::default(), now);
    assert!(agent.start().is_empty());

    let handshake = BridgeConnectBootstrap::new(SESSION, "secret-token").to_value();
    let effects = agent.handle(
        BridgeInput::Bootstrap(BootstrapMessage::from_parent(handshake, "https://app.wiblo.dev")),
        now,
    );
    assert_eq!(types(&posted(&effects)), vec!["BRIDGE_CONNECTED"]);
    (agent, now)
}

fn element(agent: &BridgeAgent<DomTree>, id: &str) -> NodeId {
    agent.document().element_by_id(id).unwrap()
}

#[test]
fn test_envelopes_follow_wire_format() {
    let (mut agent, now) = connected_agent();
    let enable = parent_message("DESIGN_MODE_SET_ENABLED", json!({ "reason": "sidebar" }));
    let effects = agent.handle(enable, now);

    let messages = posted(&effects);
    assert_eq!(types(&messages), vec!["PREVIEW_READY"]);

    let ready = &messages[0];
    assert_eq!(ready["protocol"], "wiblo.design-bridge.v1");
    assert_eq!(ready["sessionId"], SESSION);
    assert!(ready["messageId"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(ready["timestamp"].as_i64().is_some());

    let capabilities = &ready["payload"]["capabilities"];
    assert_eq!(capabilities["protocol"], "wiblo.design-bridge.v1");
    assert_eq!(capabilities["selectionModes"], json!(["point", "drag"]));
    assert_eq!(capabilities["supportsMultiSelectDrag"], true);
}

#[test]
fn test_point_selection_round_trip() {
    let (mut agent, now) = connected_agent();
    agent.handle(parent_message("DESIGN_MODE_SET_ENABLED", json!({})), now);

    agent.handle(BridgeInput::PointerDown(PointerInput::new(1, 300.0, 150.0)), now);
    let effects = agent.handle(BridgeInput::PointerUp(PointerInput::new(1, 300.0, 150.0)), now);
    let messages = posted(&effects);
    assert_eq!(types(&messages), vec!["ELEMENT_SELECTED"]);

    let selection = &messages[0]["payload"]["selection"];
    assert_eq!(selection["selector"], "#hero-title");
    assert_eq!(selection["tagName"], "h1");
    assert_eq!(selection["selectionMode"], "point");
    assert_eq!(selection["textContent"], "Build faster");
    assert_eq!(selection["rect"]["top"], 120.0);
    assert_eq!(selection["rect"]["width"], 600.0);
    assert!(selection["domId"].as_str().is_some_and(|id| !id.is_empty()));

    // the parent edits the selection, then asks for a fresh snapshot
    agent.handle(
        parent_message(
            "SELECTION_APPLY_TEMP_STYLES",
            json!({
                "selector": "#hero-title",
                "styles": { "color": "rgb(255, 0, 0)", "letterSpacing": "2px" }
            }),
        ),
        now,
    );
    let title = element(&agent, "hero-title");
    assert_eq!(agent.document().inline_style(title, "letter-spacing"), "2px");

    let effects = agent.handle(parent_message("SELECTION_REQUEST_SNAPSHOT", json!({})), now);
    assert_eq!(types(&posted(&effects)), vec!["ELEMENT_SELECTED"]);

    let clear = parent_message("SELECTION_CLEAR_TEMP_STYLES", json!({ "selector": "#hero-title" }));
    agent.handle(clear, now);
    assert_eq!(agent.document().inline_style(title, "color"), "rgb(0, 0, 0)");
    assert_eq!(agent.document().inline_style(title, "letter-spacing"), "");
}

#[test]
fn test_ignored_subtree_is_never_selected() {
    let (mut agent, now) = connected_agent();
    agent.handle(parent_message("DESIGN_MODE_SET_ENABLED", json!({})), now);

    agent.handle(BridgeInput::PointerDown(PointerInput::new(1, 950.0, 200.0)), now);
    agent.handle(BridgeInput::PointerUp(PointerInput::new(1, 950.0, 200.0)), now);
    let tracker = element(&agent, "tracker");
    assert!(!agent.selected_elements().contains(&tracker));

    let highlight =
        parent_message("SELECTION_HIGHLIGHT_SELECTOR", json!({ "selector": "#tracker" }));
    agent.handle(highlight, now);
    assert!(agent.selected_elements().is_empty());
}

#[test]
fn test_drag_over_hero_selects_title_and_copy() {
    let (mut agent, now) = connected_agent();
    agent.handle(parent_message("DESIGN_MODE_SET_ENABLED", json!({})), now);

    agent.handle(BridgeInput::PointerDown(PointerInput::new(2, 90.0, 110.0)), now);
    agent.handle(BridgeInput::PointerMove(PointerInput::new(2, 720.0, 250.0)), now);
    assert!(agent.is_freeze_active());
    let effects = agent.handle(BridgeInput::PointerUp(PointerInput::new(2, 720.0, 250.0)), now);

    let messages = posted(&effects);
    assert_eq!(types(&messages), vec!["ELEMENTS_SELECTED"]);
    let selectors: Vec<&str> = messages[0]["payload"]["selections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|selection| selection["selector"].as_str().unwrap())
        .collect();
    assert_eq!(selectors, vec!["#hero-title", "#hero-copy"]);

    let freeze_styles = agent.document().descendants(agent.document().head()).len();
    assert_eq!(freeze_styles, 0, "freeze stylesheets are removed once the drag ends");
}

#[test]
fn test_nextjs_overlay_is_forwarded_and_cleared() {
    let (mut agent, now) = connected_agent();

    let body = agent.document().body();
    let tree = agent.document_mut();
    let dialog = tree.create_element("div");
    tree.set_attribute(dialog, "data-nextjs-dialog", "");
    let header = tree.create_element("h1");
    tree.set_text_content(header, "Failed to compile");
    tree.append_child(dialog, header);
    tree.append_child(body, dialog);
    tree.set_bounding_box(dialog, Rect::new(200.0, 100.0, 800.0, 400.0)).unwrap();

    let effects = agent.handle(BridgeInput::DomMutated, now);
    let messages = posted(&effects);
    assert_eq!(types(&messages), vec!["PREVIEW_ERROR"]);
    assert_eq!(messages[0]["payload"]["error"]["type"], "nextjs-overlay");
    assert_eq!(messages[0]["payload"]["error"]["message"], "Failed to compile");

    // still visible: nothing new
    assert!(posted(&agent.handle(BridgeInput::DomMutated, now)).is_empty());

    agent.document_mut().set_inline_style(dialog, "display", "none");
    let effects = agent.handle(BridgeInput::DomMutated, now);
    let messages = posted(&effects);
    assert_eq!(types(&messages), vec!["PREVIEW_ERROR_CLEAR"]);
    assert_eq!(messages[0]["payload"]["errorType"], "nextjs-overlay");
}

#[test]
fn test_heartbeat_and_dispose() {
    let (mut agent, now) = connected_agent();

    let effects = agent.handle(BridgeInput::HeartbeatTick, now + Duration::from_millis(1500));
    let messages = posted(&effects);
    assert_eq!(
        messages[0]["payload"],
        json!({ "uptimeMs": 1500, "designModeEnabled": false, "selectionCount": 0 })
    );

    let effects = agent.handle(parent_message("BRIDGE_DISPOSE", json!({})), now);
    assert!(effects.contains(&Effect::ClosePort));
    assert!(effects.contains(&Effect::StopHeartbeat));
    assert!(posted(&effects).is_empty());
}

#[cfg(feature = "runtime")]
mod runtime {
    use super::*;
    use design_bridge::{BridgePort, BridgeRuntime, ChannelPort, NoopContextProvider};

    #[tokio::test(start_paused = true)]
    async fn test_runtime_session() {
        let tree = DomTree::from_json(PAGE).unwrap();
        let agent = BridgeAgent::new(tree, BridgeOptions::default(), std::time::Instant::now());
        let mut runtime = BridgeRuntime::new(agent, NoopContextProvider);

        let (bridge_end, mut parent) = ChannelPort::pair();
        let handshake = BridgeConnectBootstrap::new(SESSION, "secret-token").to_value();
        let message = BootstrapMessage::from_parent(handshake, "https://app.wiblo.dev");
        runtime.bootstrap(message, Some(bridge_end));

        let BridgeInput::PortMessage(enable) = parent_message("DESIGN_MODE_SET_ENABLED", json!({}))
        else {
            unreachable!()
        };
        parent.post(enable).unwrap();
        runtime.run_for(Duration::from_millis(5)).await;

        runtime.dispatch(BridgeInput::PointerMove(PointerInput::new(1, 300.0, 210.0)));
        runtime.run_for(Duration::from_millis(100)).await;

        let messages = parent.drain();
        assert_eq!(types(&messages), vec!["BRIDGE_CONNECTED", "PREVIEW_READY", "ELEMENT_HOVERED"]);
        assert_eq!(messages[2]["payload"]["selection"]["selector"], "#hero-copy");

        let BridgeInput::PortMessage(dispose) = parent_message("BRIDGE_DISPOSE", json!({})) else {
            unreachable!()
        };
        parent.post(dispose).unwrap();
        runtime.run_for(Duration::from_millis(5)).await;
        assert!(!runtime.has_port());
        assert!(!runtime.is_listening());
    }
}
