use std::path::{Path, PathBuf};

use model_el::engine;
use model_tree::duration::parse_iso_duration;
use model_tree::{CircularityGuard, ModelError, Node, Value};

fn resources_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("resources")
}

fn item() -> Node {
    let root = engine().root();
    root.set_current_directory(&resources_dir())
        .expect("resources directory must exist");
    root
}

fn child(node: &Node, path: &str) -> Node {
    node.get_item(path)
        .unwrap_or_else(|e| panic!("no node at {path}: {e}"))
}

#[test]
fn loads_json_file() {
    let item = item();
    item.append_from_json("{ '$json': 'root-01.json' }").unwrap();
    assert_eq!(item.get("fred"), Some(Value::from("bloggs")));
    assert!(!item.contains_key("$json"));
}

#[test]
fn values_beside_a_directive_override_the_file() {
    let item = item();
    item.append_from_json("{ colour: 'red', '$json': 'root-01.json' }").unwrap();
    assert_eq!(item.get("colour"), Some(Value::from("red")));
    assert_eq!(item.get("fred"), Some(Value::from("bloggs")));
}

#[test]
fn loads_nested_files() {
    let item = item();
    item.append_from_json("{ '$json': 'nested-01.json' }").unwrap();

    assert_eq!(item.get("level"), Some(Value::from(3)));
    assert_eq!(item.expand("${level}"), "3");
    assert_eq!(item.eval("level").unwrap(), Value::from(3));

    assert_eq!(
        item.eval("days.wednesday.rubbish[2]").unwrap(),
        Value::from("plastic")
    );
    assert_eq!(item.eval("days.wednesday.rubbish[4]").unwrap(), Value::from(105));
    assert_eq!(
        item.eval("days.friday.getParent().wednesday.rubbish[4]").unwrap(),
        Value::from(105)
    );
    assert_eq!(child(&item, "days.friday").path(), "days.friday");
}

#[test]
fn properties_file_overrides_json_values() {
    let item = item();
    item.append_from_json("{ '$json': 'sub01/root-02.json' }").unwrap();

    let less = child(&item, "less");
    assert_eq!(less.get("foot"), Some(Value::from("boot")));
    assert_eq!(less.get("hand"), Some(Value::from("glove")));
    assert_eq!(less.get("toe.nail"), Some(Value::from("red")));
}

#[test]
fn properties_xml_file_is_merged() {
    let item = item();
    item.append_from_json("{ '$properties-xml': 'properties.xml' }").unwrap();
    assert_eq!(item.get("amount"), Some(Value::from("234")));
    assert_eq!(item.get("currency"), Some(Value::from("GBP")));
}

#[test]
fn materializes_xml_file_reference() {
    let item = item();
    item.append_from_json("{ '$xml': 'site.xml' }").unwrap();

    assert_eq!(item.get("amount"), Some(Value::from(234.0)));
    assert_eq!(item.get("$owner"), Some(Value::from("fred")));
    assert_eq!(item.eval("totals.amount").unwrap(), Value::from(0.15));
    assert_eq!(item.eval("totals.valid").unwrap(), Value::Bool(true));
    assert_eq!(
        item.eval("totals.timeTaken").unwrap(),
        Value::Duration(parse_iso_duration("P2DT3H4M").unwrap())
    );
    assert_eq!(
        item.eval("totals.timestamp").unwrap().to_string(),
        "2007-12-03T10:15:30.123456789"
    );
    assert_eq!(
        item.eval("totals.data").unwrap(),
        Value::List((1..=4).map(Value::from).collect())
    );
    assert_eq!(
        item.eval("totals.population").unwrap().as_i64(),
        Some(123_456_789_012_345_678)
    );
    assert_eq!(item.eval("angular.$shadow").unwrap(), Value::from("RED"));

    let totals = child(&item, "totals");
    assert_eq!(
        totals.get("tally"),
        Some(Value::from("count = 0 ; count = count + 1"))
    );
    assert_eq!(totals.call("tally").unwrap(), Value::from(1));
}

#[test]
fn applies_xml_onload() {
    let item = item();
    item.append_from_json("{ '$xml': 'site-onload.xml' }").unwrap();
    assert_eq!(item.eval("home.blarney").unwrap(), Value::from("stone"));
    assert_eq!(item.eval("home.castle").unwrap(), Value::from("Blarney"));
}

#[test]
fn applies_json_onload() {
    let item = item();
    item.append_from_json(r#"{ '$$run': '$self.fred = "bloggs"', '$onload': '$self.run()' }"#)
        .unwrap();
    assert_eq!(item.eval("fred").unwrap(), Value::from("bloggs"));
}

#[test]
fn self_referencing_json_is_circular() {
    let item = item();
    let err = item
        .append_from_json("{ '$json': 'circularity.json' }")
        .unwrap_err();
    assert!(matches!(err, ModelError::Circularity(_)), "{err}");
    assert_eq!(CircularityGuard::depth(), 0);

    item.append_from_json("{ '$json': 'root-01.json' }").unwrap();
    assert_eq!(item.get("fred"), Some(Value::from("bloggs")));
}

#[test]
fn self_referencing_xml_is_circular() {
    let err = item()
        .append_from_json("{ '$xml': 'circularity.xml' }")
        .unwrap_err();
    assert!(matches!(err, ModelError::Circularity(_)), "{err}");
    assert_eq!(CircularityGuard::depth(), 0);
}

#[test]
fn json_and_xml_referencing_each_other_are_circular() {
    for directive in [
        "{ '$json': 'circularity-xml.json' }",
        "{ '$xml': 'circularity-json.xml' }",
    ] {
        let err = item().append_from_json(directive).unwrap_err();
        assert!(matches!(err, ModelError::Circularity(_)), "{directive}: {err}");
        assert_eq!(CircularityGuard::depth(), 0);
    }
}

#[test]
fn missing_file_is_a_configuration_error() {
    let err = item()
        .append_from_json("{ '$json': 'no-such-file.json' }")
        .unwrap_err();
    assert!(matches!(err, ModelError::MissingFile { .. }));
    assert!(err.is_configuration());
}

#[test]
fn runs_a_loaded_model() {
    let root = model_el::cli::load(&resources_dir().join("counter.json")).unwrap();
    assert_eq!(model_el::cli::execute(&root, None).unwrap(), Value::from(0));
    assert_eq!(root.get("count"), Some(Value::from(0)));
}

#[test]
fn loaded_xml_resolves_names_against_its_directory() {
    let root = model_el::cli::load(&resources_dir().join("sub01").join("site-02.xml")).unwrap();
    assert_eq!(root.get("title"), Some(Value::from("Sub")));
    assert_eq!(root.find("less.foot"), Some(Value::from("boot")));
    assert_eq!(root.find("less.hand"), Some(Value::from("glove")));
}
