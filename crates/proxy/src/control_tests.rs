// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn exec_command_serializes_with_tag() {
    let cmd = ControlCommand::Exec { script: "console.log(1)".into() };
    let json = serde_json::to_value(&cmd).unwrap();
    assert_eq!(json["command"], "exec");
    assert_eq!(json["script"], "console.log(1)");
}

#[test]
fn sse_frame_shape() {
    let cmd = ControlCommand::Toast { message: "build done".into() };
    let frame = sse_frame(&cmd);
    assert!(frame.starts_with("event: toast\n"));
    assert!(frame.contains("data: {"));
    assert!(frame.ends_with("\n\n"));

    // The data line is valid JSON carrying the message.
    let data = frame
        .lines()
        .find_map(|l| l.strip_prefix("data: "))
        .unwrap();
    let parsed: ControlCommand = serde_json::from_str(data).unwrap();
    assert_eq!(parsed, cmd);
}

#[test]
fn event_names() {
    assert_eq!(ControlCommand::Exec { script: String::new() }.event_name(), "exec");
    assert_eq!(ControlCommand::Toast { message: String::new() }.event_name(), "toast");
}

#[test]
fn status_response_carries_message() {
    let resp = status_response(StatusCode::NOT_FOUND, "nope");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
