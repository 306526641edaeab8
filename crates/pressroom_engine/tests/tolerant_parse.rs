use pressroom_engine::{TolerantParser, PLACEHOLDER_TITLE};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn recovers_json_wrapped_in_prose_and_fences() {
    let text = "Here is the result: ```json {\"wordpress_params\": {\"title\":\"A\"}, \"adaptedContent\":\"B\"}``` thanks";
    let result = TolerantParser::new().parse(text, "source body");

    assert_eq!(result.params().unwrap()["title"], json!("A"));
    assert_eq!(result.adapted_content(), Some("B"));
    assert_eq!(result.params().unwrap()["content"], json!("source body"));
    assert!(result.used_fallback);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("extracted JSON object")));
}

#[test]
fn promotes_first_present_alias() {
    let text = json!({
        "params": {"title": "From params"},
        "wordpressParams": {"title": "From camel case", "content": "Body"},
    })
    .to_string();
    let result = TolerantParser::new().parse(&text, "source");

    let params = result.params().unwrap();
    assert_eq!(params["title"], json!("From camel case"));
    assert_eq!(params["content"], json!("Body"));
    assert_eq!(result.adapted_content(), Some("Body"));
    assert_eq!(
        result.warnings,
        vec![
            "promoted `wordpressParams` to `wordpress_params`".to_string(),
            "missing adaptedContent, using content".to_string(),
        ]
    );
}

#[test]
fn unparseable_text_synthesizes_everything() {
    let result = TolerantParser::new().parse("I could not do that.", "original text");

    assert!(result.used_fallback);
    assert_eq!(
        result.value,
        json!({
            "wordpress_params": {"content": "original text", "title": PLACEHOLDER_TITLE},
            "adaptedContent": "original text",
        })
        .as_object()
        .unwrap()
        .clone()
    );
    assert_eq!(result.warnings.len(), 6);
}

#[test]
fn broken_extracted_object_is_a_warning_not_an_error() {
    let result = TolerantParser::new().parse("prefix {\"wordpress_params\": {oops} suffix", "src");
    assert!(result.used_fallback);
    assert_eq!(result.params().unwrap()["title"], json!(PLACEHOLDER_TITLE));
}

#[test]
fn placeholder_title_is_configurable() {
    let parser = TolerantParser::new().with_placeholder_title("Draft");
    let result = parser.parse("{}", "src");
    assert_eq!(result.params().unwrap()["title"], json!("Draft"));
}
