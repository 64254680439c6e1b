use super::*;
use crate::todos::Priority;

#[test]
fn splits_a_fully_annotated_reply() {
    let reply = "<thinking>\nConsider the options.\n</thinking>\n\
        <plan>Write a helper</plan>\n\
        <todo>\n[x] Read code\n[high] Add helper\n</todo>\n\
        <feedback type=\"success\">Looks good</feedback>\n\
        Here is the helper:\n```rust\nfn helper() {}\n```\n";

    let segments = segment(reply);

    assert_eq!(segments.thinking.as_deref(), Some("Consider the options."));
    assert_eq!(segments.plan.as_deref(), Some("Write a helper"));
    assert_eq!(segments.todos.len(), 2);
    assert!(segments.todos[0].completed);
    assert_eq!(segments.todos[1].priority, Priority::High);
    assert_eq!(
        segments.feedbacks,
        vec![Feedback {
            kind: "success".to_string(),
            text: "Looks good".to_string()
        }]
    );
    assert_eq!(
        segments.code_blocks,
        vec![CodeBlock {
            lang: "rust".to_string(),
            code: "fn helper() {}".to_string()
        }]
    );
    assert_eq!(
        segments.prose,
        "Here is the helper:\n```rust\nfn helper() {}\n```"
    );
    assert!(segments.has_insights());
}

#[test]
fn plain_text_is_all_prose() {
    let segments = segment("  just an answer  ");
    assert_eq!(segments.prose, "just an answer");
    assert!(!segments.has_insights());
    assert!(segments.thinking.is_none());
}

#[test]
fn only_the_first_thinking_block_is_extracted_but_all_are_removed() {
    let segments = segment("<thinking>one</thinking>mid<thinking>two</thinking>");
    assert_eq!(segments.thinking.as_deref(), Some("one"));
    assert_eq!(segments.prose, "mid");
}

#[test]
fn tag_names_are_case_insensitive() {
    let segments = segment("<PLAN>Step 1</PLAN>rest");
    assert_eq!(segments.plan.as_deref(), Some("Step 1"));
    assert_eq!(segments.prose, "rest");
}

#[test]
fn collects_every_feedback_and_maps_unknown_kinds_to_info() {
    let segments = segment(
        "<feedback type=\"warning\">careful</feedback>\
         <feedback type=\"celebrate\">yay</feedback>",
    );
    assert_eq!(segments.feedbacks.len(), 2);
    assert_eq!(segments.feedbacks[0].level(), FeedbackKind::Warning);
    assert_eq!(segments.feedbacks[1].kind, "celebrate");
    assert_eq!(segments.feedbacks[1].level(), FeedbackKind::Info);
    assert_eq!(segments.prose, "");
}

#[test]
fn code_blocks_default_to_text_language() {
    let segments = segment("a\n```\nplain\n```\nb\n```py\nprint(1)\n```");
    assert_eq!(segments.code_blocks.len(), 2);
    assert_eq!(segments.code_blocks[0].lang, "text");
    assert_eq!(segments.code_blocks[0].code, "plain");
    assert_eq!(
        segments.first_code_block().map(|block| block.code.as_str()),
        Some("plain")
    );
    assert_eq!(segments.code_blocks[1].lang, "py");
}

#[test]
fn unclosed_tags_stay_in_prose() {
    let segments = segment("<thinking>never closed");
    assert!(segments.thinking.is_none());
    assert_eq!(segments.prose, "<thinking>never closed");
}

#[test]
fn empty_todo_block_yields_no_items() {
    let segments = segment("<todo>\n\n</todo>ok");
    assert!(segments.todos.is_empty());
    assert_eq!(segments.prose, "ok");
}

#[test]
fn thinking_and_plan_are_lifted_out_of_the_prose() {
    let segments = segment("<thinking>T</thinking><plan>P</plan>Hello");
    assert_eq!(segments.thinking.as_deref(), Some("T"));
    assert_eq!(segments.plan.as_deref(), Some("P"));
    assert_eq!(segments.prose, "Hello");
}

#[test]
fn language_tags_with_symbols_stay_out_of_the_code() {
    let segments = segment(
        "```c++\nint x;\n```\n```c#\nvar y = 1;\n```\n``` rust\nfn a() {}\n```\n\
         ```objective-c\n@end\n```",
    );
    assert_eq!(
        segments.code_blocks,
        vec![
            CodeBlock {
                lang: "c++".to_string(),
                code: "int x;".to_string()
            },
            CodeBlock {
                lang: "c#".to_string(),
                code: "var y = 1;".to_string()
            },
            CodeBlock {
                lang: "rust".to_string(),
                code: "fn a() {}".to_string()
            },
            CodeBlock {
                lang: "objective-c".to_string(),
                code: "@end".to_string()
            },
        ]
    );
}

#[test]
fn single_line_fences_and_unclosed_fences() {
    let segments = segment("inline ```x = 1``` then ```\nnever closed");
    assert_eq!(
        segments.code_blocks,
        vec![CodeBlock {
            lang: "text".to_string(),
            code: "x = 1".to_string()
        }]
    );
}
