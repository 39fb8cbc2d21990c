mod common;

use std::sync::Arc;

use serde_json::json;

use mapdex::error::MapdexError;
use mapdex::indexer::insert_sorted;
use mapdex::initiative::{InitiativeFactory, SideTable, compare_names};
use mapdex::schema::{CustomBuilder, PropDef, PropertySchema};
use mapdex::value::{PropValue, ValueKind};
use mapdex::vocab::VocabServices;

use common::{build, factory, record, size_vocabs};

fn factory_with(defs: Vec<(&str, PropDef)>) -> InitiativeFactory {
    let schema = PropertySchema::new(defs).expect("valid schema");
    InitiativeFactory::new(Arc::new(schema), vec!["name".into()], size_vocabs())
}

#[test]
fn builds_base_and_configured_properties() {
    let apple = build(json!({
        "uri": "urn:apple", "name": "Apple Co-op", "dataset": "fruit",
        "size": "https://example.org/size/large", "tags": ["organic", "local"], "active": 1
    }));
    assert_eq!(apple.uri(), "urn:apple");
    assert_eq!(apple.name(), "Apple Co-op");
    assert_eq!(apple.dataset(), "fruit");
    // vocabulary terms are stored abbreviated
    assert_eq!(apple.get("size"), &PropValue::from("sz:large"));
    assert_eq!(
        apple.get("tags"),
        &PropValue::List(vec!["organic".into(), "local".into()])
    );
    assert_eq!(apple.get("active"), &PropValue::Bool(true));
    assert!(apple.get("undeclared").is_absent());
    assert_eq!(apple.search_text(), "APPLE CO OP ORGANIC LOCAL");
}

#[test]
fn strict_value_rejects_wrong_type() {
    let err = factory()
        .build(&record(json!({"uri": 42, "name": "Numbered"})))
        .unwrap_err();
    match err {
        MapdexError::TypeMismatch { property, field, expected, found } => {
            assert_eq!(property, "uri");
            assert_eq!(field, "uri");
            assert_eq!(expected, "string");
            assert_eq!(found, "number");
        }
        other => panic!("unexpected error: {other}"),
    }
    // a missing strict field is a mismatch too
    let err = factory().build(&record(json!({"name": "Nameless"}))).unwrap_err();
    assert!(matches!(err, MapdexError::TypeMismatch { ref found, .. } if found == "null"));
}

#[test]
fn vocab_field_must_be_a_string() {
    let err = factory()
        .build(&record(json!({"uri": "u", "size": 5})))
        .unwrap_err();
    assert!(matches!(err, MapdexError::Type { ref property, .. } if property == "size"));

    let unsized_ = build(json!({"uri": "u", "size": null}));
    assert!(unsized_.get("size").is_absent());
    // unknown uris pass through unabbreviated
    let odd = build(json!({"uri": "u", "size": "https://elsewhere.org/huge"}));
    assert_eq!(odd.get("size").as_str(), Some("https://elsewhere.org/huge"));
}

#[test]
fn lenient_values_are_coerced() {
    let factory = factory_with(vec![
        ("count", PropDef::value(ValueKind::Number)),
        ("flag", PropDef::value(ValueKind::Boolean)),
        ("label", PropDef::value(ValueKind::String)),
    ]);
    let cases = [
        (json!("12"), PropValue::Number(12.0)),
        (json!(" 2.5 "), PropValue::Number(2.5)),
        (json!(""), PropValue::Number(0.0)),
        (json!("twelve"), PropValue::Absent),
        (json!(true), PropValue::Number(1.0)),
        (json!(null), PropValue::Absent),
    ];
    for (raw, expected) in cases {
        let built = factory
            .build(&record(json!({"uri": "u", "count": raw.clone()})))
            .expect("lenient build");
        assert_eq!(built.get("count"), &expected, "count from {raw}");
    }

    let built = factory
        .build(&record(json!({"uri": "u", "flag": 0, "label": 7})))
        .expect("lenient build");
    assert_eq!(built.get("flag"), &PropValue::Bool(false));
    assert_eq!(built.get("label"), &PropValue::from("7"));
    let built = factory
        .build(&record(json!({"uri": "u", "flag": "yes"})))
        .expect("lenient build");
    assert_eq!(built.get("flag"), &PropValue::Bool(true));
}

#[test]
fn manual_location_overrides_need_both_fields() {
    let overridden = build(json!({"uri": "u", "lat": 1.0, "lng": 2.0, "manLat": 3.0, "manLng": "4"}));
    assert_eq!(overridden.lat(), Some(3.0));
    assert_eq!(overridden.lng(), Some(4.0));
    assert!(overridden.has_location());

    let half = build(json!({"uri": "u", "lat": 1.0, "lng": 2.0, "manLat": 3.0}));
    assert_eq!(half.lat(), Some(1.0));
    assert_eq!(half.lng(), Some(2.0));

    // "0" is a placeholder, not a coordinate
    let placeholder = build(json!({"uri": "u", "lat": "1.5", "lng": 2.0, "manLat": "0", "manLng": 4.0}));
    assert_eq!(placeholder.lat(), Some(1.5));
    assert_eq!(placeholder.lng(), Some(2.0));

    let nowhere = build(json!({"uri": "u"}));
    assert_eq!(nowhere.lat(), None);
    assert!(!nowhere.has_location());
}

#[test]
fn multi_values_wrap_their_inner_builder() {
    let scalar = build(json!({"uri": "u", "tags": "solo"}));
    assert_eq!(scalar.get("tags"), &PropValue::List(vec!["solo".into()]));
    let missing = build(json!({"uri": "u"}));
    assert_eq!(missing.get("tags"), &PropValue::List(vec![]));

    let factory = factory_with(vec![
        ("keywords", PropDef::multi(PropDef::value(ValueKind::String)).with_from("kw")),
        ("sizes", PropDef::multi(PropDef::vocab("sz:"))),
        ("counts", PropDef::multi(PropDef::value(ValueKind::Number))),
    ]);
    let built = factory
        .build(&record(json!({
            "uri": "u",
            "kw": ["a", "b"],
            "sizes": ["https://example.org/size/large", "sz:small"],
            "counts": ["1", 2]
        })))
        .expect("multi build");
    assert_eq!(built.get("keywords"), &PropValue::List(vec!["a".into(), "b".into()]));
    assert_eq!(
        built.get("sizes"),
        &PropValue::List(vec!["sz:large".into(), "sz:small".into()])
    );
    assert_eq!(built.get("counts"), &PropValue::List(vec![PropValue::Number(1.0), PropValue::Number(2.0)]));

    // an inner failure fails the whole record
    let err = factory
        .build(&record(json!({"uri": "u", "sizes": ["sz:small", 3]})))
        .unwrap_err();
    assert!(matches!(err, MapdexError::Type { .. }));
}

#[test]
fn multi_elements_are_read_from_the_multi_field() {
    let factory = factory_with(vec![(
        "sizes",
        PropDef::multi(PropDef::vocab("sz:").with_from("ignored")).with_from("size_list"),
    )]);
    let built = factory
        .build(&record(json!({
            "uri": "u",
            "size_list": ["https://example.org/size/large", "sz:tiny"],
            "ignored": "sz:small"
        })))
        .expect("multi build");
    assert_eq!(
        built.get("sizes"),
        &PropValue::List(vec!["sz:large".into(), "sz:tiny".into()])
    );

    let err = factory
        .build(&record(json!({"uri": "u", "size_list": [7]})))
        .unwrap_err();
    match err {
        MapdexError::Type { field, .. } => assert_eq!(field, "size_list"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_schemas_are_rejected() {
    let nested = PropertySchema::new(vec![(
        "deep",
        PropDef::multi(PropDef::multi(PropDef::value(ValueKind::String))),
    )]);
    assert!(matches!(nested, Err(MapdexError::Schema(_))));
    assert!(matches!(
        PropertySchema::new(vec![("", PropDef::value(ValueKind::String))]),
        Err(MapdexError::Schema(_))
    ));
    assert!(matches!(CustomBuilder::named("altitude"), Err(MapdexError::Schema(_))));
}

#[test]
fn configured_properties_override_base_ones_in_place() {
    let schema = PropertySchema::new(vec![
        ("extra", PropDef::value(ValueKind::Number)),
        ("name", PropDef::strict(ValueKind::String)),
    ])
    .expect("valid schema");
    let names: Vec<&str> = schema.names().collect();
    assert_eq!(names, ["uri", "name", "dataset", "lat", "lng", "manLat", "manLng", "extra"]);

    let factory = InitiativeFactory::new(Arc::new(schema), vec![], Arc::new(VocabServices::empty("en")));
    assert!(factory.build(&record(json!({"uri": "u"}))).is_err());
    assert!(factory.build(&record(json!({"uri": "u", "name": "Named"}))).is_ok());
}

#[test]
fn custom_builders_compute_from_the_record() {
    let shouting = CustomBuilder::new("shout", |id, def, raw| {
        let field = def.source_field(id);
        Ok(raw
            .get(field)
            .and_then(|v| v.as_str())
            .map_or(PropValue::Absent, |s| PropValue::from(s.to_uppercase())))
    });
    let factory = factory_with(vec![("motto", PropDef::custom(shouting).with_from("slogan"))]);
    let built = factory
        .build(&record(json!({"uri": "u", "slogan": "grow local"})))
        .expect("custom build");
    assert_eq!(built.get("motto").as_str(), Some("GROW LOCAL"));
}

#[test]
fn initiatives_are_identified_by_uri() {
    let a = build(json!({"uri": "urn:same", "name": "First"}));
    let b = build(json!({"uri": "urn:same", "name": "Second"}));
    assert_eq!(a, b);

    let mut markers: SideTable<&str> = SideTable::new();
    markers.insert(&a, "marker-1");
    // the side table follows identity, not the record it was stored with
    assert_eq!(markers.get(&b), Some(&"marker-1"));
    assert_eq!(markers.remove(&b), Some("marker-1"));
    assert!(markers.is_empty());
}

#[test]
fn names_compare_case_insensitively_first() {
    use std::cmp::Ordering;
    assert_eq!(compare_names("apple", "Banana"), Ordering::Less);
    assert_eq!(compare_names("Zebra", "aardvark"), Ordering::Greater);
    assert_ne!(compare_names("Apple", "apple"), Ordering::Equal);
}

#[test]
fn accented_names_sort_with_their_base_letters() {
    use std::cmp::Ordering;
    let mut names = vec!["Zoe", "Émile", "Adam", "Apple", "apple", "Emile", "émile"];
    names.sort_by(|a, b| compare_names(a, b));
    assert_eq!(names, ["Adam", "apple", "Apple", "Emile", "émile", "Émile", "Zoe"]);
    assert_eq!(compare_names("Ōsaka", "Oslo"), Ordering::Less);
    assert_eq!(compare_names("Ärzte", "Zahnärzte"), Ordering::Less);
}

#[test]
fn name_order_holds_in_sorted_lists() {
    let factory = factory();
    let mut list = Vec::new();
    for (n, name) in ["Zoe", "Émile", "Adam", "apple", "Apple"].into_iter().enumerate() {
        let raw = record(json!({"uri": format!("urn:{n}"), "name": name}));
        insert_sorted(&mut list, &Arc::new(factory.build(&raw).expect("buildable")));
    }
    let names: Vec<&str> = list.iter().map(|initiative| initiative.name()).collect();
    assert_eq!(names, ["Adam", "apple", "Apple", "Émile", "Zoe"]);
}
