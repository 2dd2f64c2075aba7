#![forbid(unsafe_code)]

use kubesnap_export::OutputFormat;
use serde_json::json;

#[test]
fn extensions_match_formats() {
    assert_eq!(OutputFormat::Yaml.extension(), "yaml");
    assert_eq!(OutputFormat::Json.extension(), "json");
}

#[test]
fn yaml_rendering_is_stable() {
    let doc = json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": "settings", "namespace": "default"},
        "data": {"retries": "3"}
    });
    let a = OutputFormat::Yaml.serialize(&doc).unwrap();
    let b = OutputFormat::Yaml.serialize(&doc).unwrap();
    assert_eq!(a, b);
    let text = String::from_utf8(a).unwrap();
    assert!(text.contains("kind: ConfigMap"));
    assert!(text.ends_with('\n'));
}

#[test]
fn json_rendering_ends_with_newline() {
    let doc = json!({"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "tls"}});
    let bytes = OutputFormat::Json.serialize(&doc).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.ends_with('\n'));
    assert!(text.contains("\"kind\": \"Secret\""));
}
