use std::{io::Write, sync::Arc};

use lazyjson::{
    BackingKind, Config, ErrorKind, JsonSource, NamingStrategy, ObjectSchema, Root, Scalar,
    ScalarKind, Shape, Value,
};

fn address() -> Arc<ObjectSchema> {
    ObjectSchema::builder("Address")
        .field("city", Shape::string())
        .field("zip", Shape::int())
        .build()
        .unwrap()
}

fn person() -> Arc<ObjectSchema> {
    ObjectSchema::builder("Person")
        .field("name", Shape::string())
        .primitive("age", ScalarKind::Int)
        .field("score", Shape::double())
        .field("active", Shape::bool())
        .field("level", Shape::byte())
        .field("initial", Shape::char())
        .field("color", Shape::enumeration(["RED", "GREEN", "BLUE"]))
        .field("home", Shape::object(address()))
        .field("tags", Shape::list(Shape::string()))
        .field("matrix", Shape::list(Shape::list(Shape::long())))
        .build()
        .unwrap()
}

const ADA: &str = r#"{
    "name": "Ada \"the first\"",
    "age": 36,
    "score": 99.5,
    "active": true,
    "level": -3,
    "initial": "A",
    "color": "BLUE",
    "home": {"city": "London", "zip": null},
    "tags": ["math", null, "engines"],
    "matrix": [[1, 2], [], null, [9007199254740993]]
}"#;

#[test]
fn test_object_fields() {
    let root = Root::open(JsonSource::memory(ADA), &Shape::object(person())).unwrap();
    let ada = root.object().unwrap().unwrap();
    assert_eq!(ada.schema_name(), "Person");
    assert_eq!(ada.get_str("name").unwrap().as_deref(), Some("Ada \"the first\""));
    assert_eq!(ada.get_i32("age").unwrap(), Some(36));
    assert_eq!(ada.get_f64("score").unwrap(), Some(99.5));
    assert_eq!(ada.get_bool("active").unwrap(), Some(true));
    assert_eq!(ada.get_i64("level").unwrap(), Some(-3));
    assert_eq!(ada.get_char("initial").unwrap(), Some('A'));
    assert_eq!(ada.get_enum("color").unwrap(), Some(2));
    assert_eq!(ada.get_str("color").unwrap().as_deref(), Some("BLUE"));

    // inline values never touch the document
    assert_eq!(ada.key("active").unwrap(), 2);
    assert_eq!(ada.key("level").unwrap(), -3 + 129);
    assert_eq!(ada.key("color").unwrap(), 3);

    let home = ada.get_object("home").unwrap().unwrap();
    assert_eq!(home.schema_name(), "Address");
    assert_eq!(home.get_str("city").unwrap().as_deref(), Some("London"));
    assert_eq!(home.get_i32("zip").unwrap(), None);
    assert!(home.is_null("zip").unwrap());
    assert!(!home.is_null("city").unwrap());
}

#[test]
fn test_lists() {
    let root = Root::open(JsonSource::memory(ADA), &Shape::object(person())).unwrap();
    assert_eq!(root.list_count(), 5);
    let ada = root.object().unwrap().unwrap();

    let tags = ada.get_list("tags").unwrap().unwrap();
    assert_eq!(tags.name(), "Person.tags");
    assert_eq!(tags.len(), 3);
    let tags = tags
        .iter()
        .map(|v| v.unwrap().as_str().map(str::to_owned))
        .collect::<Vec<_>>();
    assert_eq!(
        tags,
        vec![Some("math".to_string()), None, Some("engines".to_string())]
    );

    let matrix = ada.get_list("matrix").unwrap().unwrap();
    assert_eq!(matrix.len(), 4);
    let first = matrix.get_list(0).unwrap().unwrap();
    assert_eq!(first.get(1).unwrap().as_i64(), Some(2));
    assert!(matrix.get_list(1).unwrap().unwrap().is_empty());
    assert!(matrix.get_list(2).unwrap().is_none());
    assert_eq!(
        matrix.get_list(3).unwrap().unwrap().get(0).unwrap().as_i64(),
        Some(9007199254740993)
    );

    let err = matrix.get(4).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::OutOfBounds { index: 4, len: 4, .. }));
}

#[test]
fn test_absent_fields() {
    let text = r#"{"name": null, "active": null}"#;
    let root = Root::open(JsonSource::memory(text), &Shape::object(person())).unwrap();
    let person = root.object().unwrap().unwrap();
    assert!(person.get("name").unwrap().is_null());
    assert!(person.get("active").unwrap().is_null());
    // primitive fields read as zero
    assert_eq!(person.get("age").unwrap().as_scalar(), Some(&Scalar::Int(0)));
    assert!(person.get("home").unwrap().is_null());
    assert!(person.get_list("tags").unwrap().is_none());
}

#[test]
fn test_list_of_objects() {
    let text = r#"[
        {"name": "a", "age": 1, "tags": ["x", "y"]},
        null,
        {"name": "b", "age": 2, "home": {"city": "Paris", "zip": 75001}},
        {}
    ]"#;
    let root = Root::open(JsonSource::memory(text), &Shape::list(Shape::object(person()))).unwrap();
    let people = root.list().unwrap().unwrap();
    assert_eq!(people.len(), 4);

    let a = people.get_object(0).unwrap().unwrap();
    assert_eq!(a.get_str("name").unwrap().as_deref(), Some("a"));
    let tags = a.get_list("tags").unwrap().unwrap();
    assert_eq!(tags.get(1).unwrap().as_str(), Some("y"));

    assert!(people.get_object(1).unwrap().is_none());
    assert_eq!(people.key(1).unwrap(), 0);

    let b = people.get_object(2).unwrap().unwrap();
    assert_eq!(b.get_i32("age").unwrap(), Some(2));
    let home = b.get_object("home").unwrap().unwrap();
    assert_eq!(home.get_str("city").unwrap().as_deref(), Some("Paris"));
    assert_eq!(home.get_i32("zip").unwrap(), Some(75001));

    let empty = people.get_object(3).unwrap().unwrap();
    assert_eq!(empty.get_i32("age").unwrap(), Some(0));
    assert!(empty.get_str("name").unwrap().is_none());
}

#[test]
fn test_pre_resolved_accessor() {
    let text = r#"[{"name": "a"}, {"name": "b"}]"#;
    let root = Root::open(JsonSource::memory(text), &Shape::list(Shape::object(person()))).unwrap();
    let people = root.list().unwrap().unwrap();
    let name = people.get_object(0).unwrap().unwrap().accessor("name").unwrap();
    let names = people
        .iter()
        .map(|p| {
            let p = p.unwrap().into_object().unwrap();
            p.get_by(&name).unwrap().as_str().unwrap().to_string()
        })
        .collect::<Vec<_>>();
    assert_eq!(names, ["a", "b"]);

    let home = ObjectSchema::builder("Home").field("name", Shape::string()).build().unwrap();
    let other = Root::open(JsonSource::memory(r#"{"name": "c"}"#), &Shape::object(home)).unwrap();
    let other = other.object().unwrap().unwrap();
    assert!(other.get_by(&name).is_err());
}

#[test]
fn test_type_mismatch_on_access() {
    let root = Root::open(JsonSource::memory(ADA), &Shape::object(person())).unwrap();
    let ada = root.object().unwrap().unwrap();
    assert!(ada.get_bool("name").is_err());
    assert!(ada.get_object("tags").is_err());
    assert!(ada.get_list("home").is_err());
}

#[test]
fn test_naming_strategy() {
    let schema = ObjectSchema::builder("User")
        .field("firstName", Shape::string())
        .field_as("id", "ID", Shape::long())
        .build()
        .unwrap();
    let text = r#"{"first_name": "Grace", "ID": 7}"#;
    let config = Config::default().with_naming(NamingStrategy::Snake);
    let root = lazyjson::OpenOptions::new(config)
        .open(JsonSource::memory(text), &Shape::object(schema.clone()))
        .unwrap();
    let user = root.object().unwrap().unwrap();
    assert_eq!(user.get_str("firstName").unwrap().as_deref(), Some("Grace"));
    assert_eq!(user.get_i64("id").unwrap(), Some(7));

    // without the strategy `first_name` is an unknown member
    let root = Root::open(JsonSource::memory(text), &Shape::object(schema)).unwrap();
    let user = root.object().unwrap().unwrap();
    assert!(user.get_str("firstName").unwrap().is_none());
}

#[test]
fn test_index_errors() {
    let shape = Shape::object(person());
    for text in [
        "",
        "{",
        r#"{"age": "36"}"#,
        r#"{"color": "PURPLE"}"#,
        r#"{"level": 300}"#,
        r#"{"tags": "math"}"#,
        r#"{"home": []}"#,
        r#"{"name": "a"} trailing"#,
    ] {
        let err = Root::open(JsonSource::memory(text), &shape).unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::InvalidFormat { .. }),
            "{text}: {err}"
        );
    }
}

#[test]
fn test_strict_fields() {
    let shape = Shape::object(address());
    let strict = Config::default().with_strict_fields(true, true);
    let open = |text: &str| {
        lazyjson::OpenOptions::new(strict.clone()).open(JsonSource::memory(text), &shape)
    };
    open(r#"{"city": "Oslo", "zip": 150}"#).unwrap();
    open(r#"{"city": "Oslo", "zip": null}"#).unwrap();
    assert!(open(r#"{"city": "Oslo"}"#).is_err());
    assert!(open(r#"{"city": "Oslo", "zip": 1, "street": "x"}"#).is_err());
}

#[test]
fn test_schema_depth_limit() {
    let shape = Shape::list(Shape::list(Shape::list(Shape::int())));
    let config = Config::default().with_max_depth(2);
    let err = lazyjson::OpenOptions::new(config)
        .open(JsonSource::memory("[]"), &shape)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidDefinition { .. }));

    let err = Root::open(JsonSource::memory("1"), &Shape::int()).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidDefinition { .. }));
}

#[test]
fn test_file_source() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(ADA.as_bytes()).unwrap();
    file.flush().unwrap();

    let root = Root::open(JsonSource::file(file.path()), &Shape::object(person())).unwrap();
    let ada = root.object().unwrap().unwrap();
    assert_eq!(ada.get_str("name").unwrap().as_deref(), Some("Ada \"the first\""));
    let matrix = ada.get_list("matrix").unwrap().unwrap();
    let last = matrix.get_list(3).unwrap().unwrap();
    assert_eq!(last.get(0).unwrap().as_i64(), Some(9007199254740993));
    root.close().unwrap();
}

#[test]
fn test_spilled_blueprint() {
    let dir = tempfile::tempdir().unwrap();
    let text = format!(
        "[{}]",
        (0..2000).map(|i| (i * 7).to_string()).collect::<Vec<_>>().join(", ")
    );
    let config = Config::default()
        .with_memory_threshold(1024)
        .with_temp_dir(dir.path());
    let root = lazyjson::OpenOptions::new(config)
        .open(JsonSource::memory(text.clone()), &Shape::list(Shape::int()))
        .unwrap();
    assert_eq!(root.backing(), Some(BackingKind::File));
    let values = root.list().unwrap().unwrap();
    assert_eq!(values.len(), 2000);
    for i in (0..2000).step_by(131) {
        assert_eq!(values.get(i).unwrap().as_i64(), Some(i as i64 * 7));
    }
    root.close().unwrap();

    let root = Root::open(JsonSource::memory(text), &Shape::list(Shape::int())).unwrap();
    assert_eq!(root.backing(), Some(BackingKind::Memory));
}

#[test]
fn test_value_cache() {
    let text = r#"{"city": "Rome", "zip": 100}"#;
    let shape = Shape::object(address());
    let root = Root::open(JsonSource::memory(text), &shape).unwrap();
    let address = root.object().unwrap().unwrap();
    for _ in 0..3 {
        assert_eq!(address.get_str("city").unwrap().as_deref(), Some("Rome"));
        assert_eq!(address.get_i32("zip").unwrap(), Some(100));
    }
    assert_eq!(root.cached_values(), 2);

    let config = Config::default().with_cache_size(0);
    let root = lazyjson::OpenOptions::new(config)
        .open(JsonSource::memory(text), &shape)
        .unwrap();
    let address = root.object().unwrap().unwrap();
    assert_eq!(address.get_str("city").unwrap().as_deref(), Some("Rome"));
    assert_eq!(root.cached_values(), 0);
}

#[test]
fn test_concurrent_access() {
    let text = format!(
        "[{}]",
        (0..300)
            .map(|i| format!(r#"{{"name": "p{i}", "age": {i}, "tags": ["t{i}"]}}"#))
            .collect::<Vec<_>>()
            .join(",\n")
    );
    let root = Root::open(JsonSource::memory(text), &Shape::list(Shape::object(person()))).unwrap();
    let people = root.list().unwrap().unwrap();

    std::thread::scope(|s| {
        for t in 0..4 {
            let people = people.clone();
            s.spawn(move || {
                for i in (t..300).step_by(3) {
                    let p = people.get_object(i).unwrap().unwrap();
                    assert_eq!(p.get_str("name").unwrap(), Some(format!("p{i}")));
                    assert_eq!(p.get_i32("age").unwrap(), Some(i as i32));
                    let tags = p.get_list("tags").unwrap().unwrap();
                    assert_eq!(tags.get(0).unwrap().as_str(), Some(format!("t{i}").as_str()));
                }
            });
        }
    });
    root.close().unwrap();
}

#[test]
fn test_close() {
    let root = Root::open(JsonSource::memory(ADA), &Shape::object(person())).unwrap();
    let ada = root.object().unwrap().unwrap();
    let tags = ada.get_list("tags").unwrap().unwrap();
    assert!(matches!(ada.get("name").unwrap(), Value::Scalar(_)));

    let clone = root.clone();
    clone.close().unwrap();
    root.close().unwrap();
    assert!(root.is_closed());

    for err in [
        ada.get("name").unwrap_err(),
        ada.get("active").unwrap_err(),
        tags.get(0).unwrap_err(),
        root.root().unwrap_err(),
    ] {
        assert!(err.is_closed(), "{err}");
    }
}

#[test]
fn test_random_long_lists() {
    let mut rng = fastrand::Rng::with_seed(7);
    let rows = (0..50)
        .map(|_| (0..rng.usize(0..20)).map(|_| rng.i64(..)).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let text = serde_json::to_string(&rows).unwrap();
    let shape = Shape::list(Shape::list(Shape::long()));
    let root = Root::open(JsonSource::memory(text), &shape).unwrap();
    let list = root.list().unwrap().unwrap();
    assert_eq!(list.len(), rows.len());
    for (i, row) in rows.iter().enumerate() {
        let values = list.get_list(i).unwrap().unwrap();
        let values = values
            .iter()
            .map(|v| v.unwrap().as_i64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(&values, row);
    }
}
