use super::*;
use serde_json::json;

// ===================================================================
// Test helpers
// ===================================================================

fn jsonl(lines: &[serde_json::Value]) -> String {
    lines
        .iter()
        .map(|v| serde_json::to_string(v).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

fn user_text(text: &str) -> serde_json::Value {
    json!({
        "type": "user",
        "uuid": "u",
        "timestamp": "2025-01-01T00:00:00Z",
        "message": { "role": "user", "content": text }
    })
}

fn assistant_blocks(blocks: serde_json::Value) -> serde_json::Value {
    json!({
        "type": "assistant",
        "uuid": "a",
        "timestamp": "2025-01-01T00:00:01Z",
        "message": { "role": "assistant", "content": blocks }
    })
}

fn tool_result(content: serde_json::Value) -> serde_json::Value {
    json!({
        "type": "user",
        "message": {
            "role": "user",
            "content": [{ "type": "tool_result", "tool_use_id": "toolu_01", "content": content }]
        }
    })
}

// ===================================================================
// Line parsing
// ===================================================================

#[test]
fn parse_user_text_message() {
    let entry = match parse_line(&user_text("hello world").to_string()) {
        ParsedLine::Entry(e) => e,
        other => panic!("expected Entry, got {:?}", other),
    };
    match entry {
        TranscriptEntry::User(e) => {
            assert_eq!(e.timestamp.as_deref(), Some("2025-01-01T00:00:00Z"));
            match &e.message.content {
                MessageContent::Text(t) => assert_eq!(t, "hello world"),
                other => panic!("expected Text, got {:?}", other),
            }
        }
        other => panic!("expected User, got {:?}", other),
    }
}

#[test]
fn parse_assistant_with_thinking_text_and_tool_use() {
    let line = assistant_blocks(json!([
        { "type": "thinking", "thinking": "hmm", "signature": "sig" },
        { "type": "text", "text": "Let me read that file." },
        { "type": "tool_use", "id": "toolu_01", "name": "Read", "input": { "file_path": "/tmp/f.txt" } }
    ]));
    let entry = match parse_line(&line.to_string()) {
        ParsedLine::Entry(e) => e,
        other => panic!("expected Entry, got {:?}", other),
    };
    let conv = entry.conversation().unwrap();
    let blocks = match &conv.message.content {
        MessageContent::Blocks(b) => b,
        other => panic!("expected Blocks, got {:?}", other),
    };
    assert_eq!(blocks.len(), 3);
    assert!(matches!(&blocks[0], ContentBlock::Thinking));
    assert!(matches!(&blocks[1], ContentBlock::Text(_)));
    assert!(matches!(&blocks[2], ContentBlock::ToolUse(tu) if tu.name == "Read"));
    assert_eq!(entry.role(), Some("assistant"));
}

#[test]
fn unknown_entry_types_parse_as_other() {
    for ty in ["progress", "system", "file-history-snapshot", "queue-operation", "summary"] {
        let line = json!({ "type": ty, "uuid": "x", "data": { "anything": 1 } }).to_string();
        match parse_line(&line) {
            ParsedLine::Entry(TranscriptEntry::Other) => {}
            other => panic!("expected Other for {ty}, got {:?}", other),
        }
    }
}

#[test]
fn unknown_content_blocks_are_tolerated() {
    let line = assistant_blocks(json!([
        { "type": "image", "source": { "type": "base64", "data": "..." } },
        { "type": "text", "text": "described the image" }
    ]));
    let (transcript, errors) = Transcript::parse(&line.to_string());
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(
        transcript.records(),
        vec![Record::Assistant {
            text: "described the image".into()
        }]
    );
}

#[test]
fn classify_blank_untyped_and_garbage_lines() {
    assert!(matches!(parse_line("   "), ParsedLine::Blank));
    assert!(matches!(parse_line(r#"{"role":"user"}"#), ParsedLine::Untyped));
    assert!(matches!(parse_line("{not json"), ParsedLine::Unparseable(_)));
    assert!(matches!(parse_line("[1,2,3]"), ParsedLine::Unparseable(_)));
    // Right tag, wrong shape.
    assert!(matches!(
        parse_line(r#"{"type":"user","message":{"content":42}}"#),
        ParsedLine::Unparseable(_)
    ));
}

#[test]
fn parse_reports_line_numbers_of_corrupt_lines() {
    let contents = format!(
        "{}\n{{truncated\n\n{}",
        user_text("one"),
        user_text("two")
    );
    let (transcript, errors) = Transcript::parse(&contents);
    assert_eq!(transcript.entries().len(), 2);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, 2);
}

// ===================================================================
// Records
// ===================================================================

#[test]
fn records_flatten_entries_in_order() {
    let contents = jsonl(&[
        user_text("  fix the bug  "),
        assistant_blocks(json!([
            { "type": "text", "text": "Looking." },
            { "type": "tool_use", "id": "t1", "name": "Bash", "input": { "command": "ls" } }
        ])),
        tool_result(json!("a.rs\nb.rs")),
        assistant_blocks(json!([{ "type": "text", "text": "Done." }])),
    ]);
    let (transcript, _) = Transcript::parse(&contents);
    assert_eq!(
        transcript.records(),
        vec![
            Record::User {
                text: "fix the bug".into()
            },
            Record::Assistant {
                text: "Looking.".into()
            },
            Record::ToolUse {
                name: "Bash".into(),
                input: json!({ "command": "ls" })
            },
            Record::ToolResult {
                content: "a.rs\nb.rs".into(),
                is_error: false
            },
            Record::Assistant {
                text: "Done.".into()
            },
        ]
    );
}

#[test]
fn empty_text_and_thinking_produce_no_records() {
    let contents = jsonl(&[
        user_text("   "),
        assistant_blocks(json!([
            { "type": "thinking", "thinking": "private" },
            { "type": "text", "text": "" }
        ])),
    ]);
    let (transcript, _) = Transcript::parse(&contents);
    assert!(transcript.records().is_empty());
}

#[test]
fn tool_result_array_content_is_flattened() {
    let contents = jsonl(&[tool_result(json!([
        { "type": "text", "text": "first" },
        { "type": "text", "text": "second" }
    ]))]);
    let (transcript, _) = Transcript::parse(&contents);
    assert_eq!(
        transcript.records(),
        vec![Record::ToolResult {
            content: "first\nsecond".into(),
            is_error: false
        }]
    );
}

#[test]
fn tool_result_error_flag_is_kept() {
    let line = json!({
        "type": "user",
        "message": { "content": [{ "type": "tool_result", "content": "boom", "is_error": true }] }
    });
    let (transcript, _) = Transcript::parse(&line.to_string());
    assert_eq!(
        transcript.records(),
        vec![Record::ToolResult {
            content: "boom".into(),
            is_error: true
        }]
    );
}

// ===================================================================
// Turns
// ===================================================================

#[test]
fn tool_results_do_not_start_turns() {
    let contents = jsonl(&[
        user_text("first"),
        assistant_blocks(json!([{ "type": "tool_use", "id": "t", "name": "Bash", "input": {} }])),
        tool_result(json!("ok")),
        assistant_blocks(json!([{ "type": "text", "text": "reply" }])),
        user_text("second"),
        assistant_blocks(json!([{ "type": "text", "text": "reply 2" }])),
    ]);
    let (transcript, _) = Transcript::parse(&contents);
    let turns = transcript.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].records.len(), 4);
    assert_eq!(turns[1].records.len(), 2);
    assert_eq!(turns[1].records[0].kind(), RecordKind::User);
}

#[test]
fn leading_records_before_first_user_message_form_a_turn() {
    let records = vec![
        Record::Assistant { text: "resumed".into() },
        Record::User { text: "hi".into() },
    ];
    let turns = group_turns(records);
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].records[0].kind(), RecordKind::Assistant);
}

#[test]
fn last_turns_keeps_the_newest_window() {
    let turns: Vec<Turn> = (1..=15)
        .map(|i| Turn {
            records: vec![Record::User {
                text: format!("turn {i}"),
            }],
        })
        .collect();
    let window = last_turns(&turns, 5);
    assert_eq!(window.len(), 5);
    assert_eq!(window[0].records[0], Record::User { text: "turn 11".into() });
    assert_eq!(window[4].records[0], Record::User { text: "turn 15".into() });

    assert_eq!(last_turns(&turns[..3], 10).len(), 3);
    assert!(last_turns(&[], 4).is_empty());
}

#[test]
fn invalid_utf8_line_is_reported_with_its_line_number() {
    let mut contents = user_line_bytes("before");
    contents.extend_from_slice(b"\n\xff\xfe garbage\r\n");
    contents.extend_from_slice(&user_line_bytes("after"));

    let (transcript, errors) = Transcript::parse_bytes(&contents);
    assert_eq!(transcript.entries().len(), 2);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, 2);
}

fn user_line_bytes(text: &str) -> Vec<u8> {
    json!({ "type": "user", "message": { "role": "user", "content": text } })
        .to_string()
        .into_bytes()
}
