use std::collections::BTreeMap;

use test_log::test;

use keytree::{
    composer::{Composer, DelimitedComposer, FlatComposer, Property},
    convert::Mapper,
    error::KeytreeError,
    typeinfo::{enum_type, Describe, PrimitiveKind, StructBuilder, TypeInfo},
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum LogLevel {
    Error,
    Warn,
    Info,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Endpoint {
    host: String,
    port: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct AppConfig {
    name: String,
    endpoint: Endpoint,
    level: Option<LogLevel>,
    replicas: Vec<String>,
    limits: BTreeMap<String, i64>,
}

impl Describe for LogLevel {
    fn build_type_info() -> TypeInfo {
        enum_type::<LogLevel>(
            "LogLevel",
            PrimitiveKind::I32,
            |l| *l as i128,
            |i| match i {
                0 => Some(LogLevel::Error),
                1 => Some(LogLevel::Warn),
                2 => Some(LogLevel::Info),
                _ => None,
            },
        )
    }
}

impl Describe for Endpoint {
    fn build_type_info() -> TypeInfo {
        StructBuilder::<Endpoint>::new("Endpoint")
            .field("host", |e: &Endpoint| e.host.clone(), |e, v| e.host = v)
            .field("port", |e: &Endpoint| e.port, |e, v| e.port = v)
            .with_default()
            .build()
    }
}

impl Describe for AppConfig {
    fn build_type_info() -> TypeInfo {
        StructBuilder::<AppConfig>::new("AppConfig")
            .field("name", |c: &AppConfig| c.name.clone(), |c, v| c.name = v)
            .comment("application display name")
            .field(
                "endpoint",
                |c: &AppConfig| c.endpoint.clone(),
                |c, v| c.endpoint = v,
            )
            .field("level", |c: &AppConfig| c.level, |c, v| c.level = v)
            .field(
                "replicas",
                |c: &AppConfig| c.replicas.clone(),
                |c, v| c.replicas = v,
            )
            .field(
                "limits",
                |c: &AppConfig| c.limits.clone(),
                |c, v| c.limits = v,
            )
            .with_default()
            .build()
    }
}

fn sample_config() -> AppConfig {
    AppConfig {
        name: "demo".into(),
        endpoint: Endpoint {
            host: "example.org".into(),
            port: 8080,
        },
        level: Some(LogLevel::Info),
        replicas: vec!["east".into(), "west".into()],
        limits: BTreeMap::from([("cpu".to_string(), 4i64), ("mem".to_string(), 2048i64)]),
    }
}

#[test]
fn test_full_round_trip_through_text() {
    let mapper = Mapper::new();
    let composer = DelimitedComposer::default();

    let config = sample_config();
    let text = mapper.to_text(&config, &composer).unwrap();
    let back: AppConfig = mapper.from_text(&text, &composer).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_serialized_text_shape() {
    let mapper = Mapper::new();
    let composer = DelimitedComposer::default();
    let text = mapper.to_text(&sample_config(), &composer).unwrap();

    let expected = "\
# application display name
name=demo
endpoint.host=example.org
endpoint.port=8080
level=2
replicas.0=east
replicas.1=west
limits.cpu=4
limits.mem=2048
";
    assert_eq!(text, expected);
}

#[test]
fn test_sparse_collection_padding_from_text() {
    let mapper = Mapper::new();
    let composer = DelimitedComposer::default();
    let list: Vec<String> = {
        let root = composer
            .read_properties(&[
                Property::new("0", Some("a".into())),
                Property::new("3", Some("d".into())),
            ])
            .unwrap();
        mapper.deserialize(&root).unwrap()
    };
    assert_eq!(list, ["a", "", "", "d"]);
}

#[test]
fn test_absent_optional_round_trips_as_empty_value() {
    let mapper = Mapper::new();
    let composer = DelimitedComposer::default();

    let mut config = sample_config();
    config.level = None;

    let text = mapper.to_text(&config, &composer).unwrap();
    assert!(text.contains("level=\n"), "unexpected text: {text}");

    let back: AppConfig = mapper.from_text(&text, &composer).unwrap();
    assert_eq!(back.level, None);
}

#[test]
fn test_flat_composer_rejects_what_delimited_accepts() {
    let mapper = Mapper::new();
    let config = sample_config();

    let root = mapper.serialize(&config).unwrap();
    let mut sink: Vec<Property> = Vec::new();
    let err = FlatComposer.write(&root, &mut sink).unwrap_err();
    assert!(matches!(err, KeytreeError::Structure(_)));

    sink.clear();
    DelimitedComposer::default().write(&root, &mut sink).unwrap();
    assert!(sink.iter().any(|p| p.key == "endpoint.host"));
}

#[test]
fn test_delimited_read_write_inverse() {
    let composer = DelimitedComposer::default();
    let input = vec![
        Property::new("a.b", Some("1".into())),
        Property::new("a.c", Some("2".into())),
    ];
    let root = composer.read_properties(&input).unwrap();

    let a = root.get_object("a").unwrap();
    assert_eq!(a.get_primitive("b").unwrap().value.as_deref(), Some("1"));
    assert_eq!(a.get_primitive("c").unwrap().value.as_deref(), Some("2"));

    let mut out: Vec<Property> = Vec::new();
    composer.write(&root, &mut out).unwrap();
    assert_eq!(out, input);
}

#[test]
fn test_float_suffix_through_pipeline() {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Ratios {
        scale: f32,
        offset: f64,
    }
    impl Describe for Ratios {
        fn build_type_info() -> TypeInfo {
            StructBuilder::<Ratios>::new("Ratios")
                .field("scale", |r: &Ratios| r.scale, |r, v| r.scale = v)
                .field("offset", |r: &Ratios| r.offset, |r, v| r.offset = v)
                .with_default()
                .build()
        }
    }

    let mapper = Mapper::new();
    let composer = DelimitedComposer::default();
    let ratios: Ratios = mapper
        .from_text("scale=3.14f\noffset=2.5\n", &composer)
        .unwrap();
    assert_eq!(ratios.scale, 3.14f32);
    assert_eq!(ratios.offset, 2.5f64);

    // Output carries no suffix
    let text = mapper.to_text(&ratios, &composer).unwrap();
    assert_eq!(text, "scale=3.14\noffset=2.5\n");
}

#[test]
fn test_conversion_failure_names_the_offender() {
    let mapper = Mapper::new();
    let composer = DelimitedComposer::default();
    let err = mapper
        .from_text::<AppConfig>("endpoint.port=eighty\n", &composer)
        .unwrap_err();
    assert!(err.to_string().contains("eighty"), "error was: {err}");
}

#[test]
fn test_comments_survive_read() {
    let composer = DelimitedComposer::default();
    let mapper = Mapper::new();

    let text = "# primary endpoint\nendpoint.host=example.org\nendpoint.port=80\nname=x\n";
    let config: AppConfig = mapper.from_text(text, &composer).unwrap();
    assert_eq!(config.endpoint.host, "example.org");
    assert_eq!(config.endpoint.port, 80);
}
