// crates/graphcore/tests/pool_test.rs

use graphcore::{
    extract_selectors, replace_markers, Segment, SegmentType, VariablePool, VariableResolutionError,
    VariableSelector,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Initialize tracing for tests
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

#[test]
fn test_render_literal_scenario() {
    init_tracing();
    let pool = VariablePool::new();
    pool.add(["node1", "value"], json!("World"));
    pool.add(["url"], json!("https://example.com"));

    let rendered = pool
        .render_template("Hello {{#node1.value#}} {{#url#}}")
        .unwrap();
    assert_eq!(rendered, "Hello World https://example.com");
}

#[test]
fn test_render_scope_values_shadow_the_pool() {
    let pool = VariablePool::new();
    pool.add(["node1", "value"], json!("World"));
    pool.add(["node1", "other"], json!("pool"));

    let scope = HashMap::from([
        (VariableSelector::new(["url"]), Segment::from("https://example.com")),
        (VariableSelector::new(["node1", "other"]), Segment::from("scope")),
    ]);
    let rendered = pool
        .render_template_in_scope("Hello {{#node1.value#}} {{#url#}} {{#node1.other#}}", &scope)
        .unwrap();
    assert_eq!(rendered, "Hello World https://example.com scope");

    // Scope values are not written back.
    assert!(pool.render_template("{{#url#}}").is_err());
}

#[test]
fn test_replace_markers_stops_at_first_error() {
    let mut seen = Vec::new();
    let result: Result<String, String> = replace_markers("{{#a.b#}} {{#c#}} {{#d#}}", |selector| {
        seen.push(selector.to_string());
        if selector.len() == 1 {
            Err(format!("no {}", selector))
        } else {
            Ok("{{#d#}}".to_string())
        }
    });
    assert_eq!(result.unwrap_err(), "no c");
    assert_eq!(seen, vec!["a.b", "c"]);
}

#[test]
fn test_render_unresolved_marker_names_path() {
    let pool = VariablePool::new();
    pool.add(["node1", "value"], json!("World"));

    let err = pool
        .render_template("Hello {{#node1.value#}} {{#node2.missing#}}")
        .unwrap_err();
    assert_eq!(
        err,
        VariableResolutionError {
            selector: VariableSelector::new(["node2", "missing"]),
        }
    );
    assert_eq!(err.to_string(), "Variable node2.missing not found");
}

#[test]
fn test_render_is_non_recursive() {
    let pool = VariablePool::new();
    pool.add(["a", "b"], json!("{{#a.c#}}"));

    // The substituted marker text is left alone even though a.c is absent.
    let once = pool.render_template("value: {{#a.b#}}").unwrap();
    assert_eq!(once, "value: {{#a.c#}}");
}

#[test]
fn test_render_is_idempotent_without_markers() {
    let pool = VariablePool::new();
    pool.add(["greet", "name"], json!("Ada"));

    let rendered = pool.render_template("Hi {{#greet.name#}}!").unwrap();
    assert_eq!(rendered, "Hi Ada!");
    assert_eq!(pool.render_template(&rendered).unwrap(), rendered);
    assert_eq!(pool.render_template("").unwrap(), "");
}

#[test]
fn test_render_structured_values_use_canonical_text() {
    let pool = VariablePool::new();
    pool.add(["n", "obj"], json!({"k": 1}));
    pool.add(["n", "list"], json!([1, "two"]));
    pool.add(["n", "num"], json!(2.5));
    pool.add(["n", "nothing"], json!(null));

    let rendered = pool
        .render_template("{{#n.obj#}}|{{#n.list#}}|{{#n.num#}}|{{#n.nothing#}}")
        .unwrap();
    assert_eq!(
        rendered,
        format!(
            "{}|{}|{}|",
            Segment::infer(json!({"k": 1})).text(),
            Segment::infer(json!([1, "two"])).text(),
            "2.5"
        )
    );
}

#[test]
fn test_add_then_get_and_overwrite() {
    let pool = VariablePool::new();
    let path = VariableSelector::new(["node1", "count"]);

    pool.add(path.clone(), json!(1));
    let first = pool.get(&path).unwrap();
    assert_eq!(first, Segment::infer(json!(1)));
    assert_eq!(first.value_type(), SegmentType::Integer);

    pool.add(path.clone(), json!("replaced"));
    let second = pool.get(&path).unwrap();
    assert_eq!(second.value(), &json!("replaced"));
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_get_descends_into_stored_values() {
    let pool = VariablePool::new();
    pool.add(["http", "body"], json!({"items": [{"name": "a"}, {"name": "b"}]}));

    let name = pool.get(&VariableSelector::parse("http.body.items.1.name")).unwrap();
    assert_eq!(name.as_str(), Some("b"));
    assert!(pool.get(&VariableSelector::parse("http.body.items.7")).is_none());
    assert!(pool.get(&VariableSelector::parse("http.other")).is_none());
}

#[test]
fn test_node_namespace_helpers() {
    let pool = VariablePool::new().with_system_variables(HashMap::from([(
        "user_id".to_string(),
        json!("u-1"),
    )]));
    pool.add_node_outputs(
        "llm",
        &HashMap::from([
            ("text".to_string(), json!("hi")),
            ("tokens".to_string(), json!(3)),
        ]),
    );

    assert_eq!(
        pool.get(&VariableSelector::new(["sys", "user_id"])).unwrap().text(),
        "u-1"
    );
    let vars = pool.node_variables("llm");
    assert_eq!(vars.len(), 2);
    assert_eq!(vars["tokens"].as_f64(), Some(3.0));

    pool.remove_node("llm");
    assert!(pool.node_variables("llm").is_empty());
    assert!(pool.contains(&VariableSelector::new(["sys", "user_id"])));
}

#[test]
fn test_extract_selectors_in_order() {
    let selectors = extract_selectors("{{#b.x#}} then {{#a#}} and {{#not a marker}}");
    assert_eq!(
        selectors,
        vec![VariableSelector::new(["b", "x"]), VariableSelector::new(["a"])]
    );
}

#[test]
fn test_selector_serde_forms() {
    let from_array: VariableSelector = serde_json::from_value(json!(["node", "out"])).unwrap();
    let from_dotted: VariableSelector = serde_json::from_value(json!("node.out")).unwrap();
    assert_eq!(from_array, from_dotted);
    assert_eq!(serde_json::to_value(&from_array).unwrap(), json!(["node", "out"]));
    assert!(serde_json::from_value::<VariableSelector>(json!([])).is_err());
}

#[tokio::test]
async fn test_concurrent_writers_on_distinct_paths() {
    let pool = Arc::new(VariablePool::new());
    let mut handles = Vec::new();
    for i in 0..16 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            pool.add([format!("node{}", i), "value".to_string()], json!(i));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(pool.len(), 16);
    for i in 0..16 {
        let path = VariableSelector::new([format!("node{}", i), "value".to_string()]);
        assert_eq!(pool.get(&path).unwrap().value(), &json!(i));
    }
}
