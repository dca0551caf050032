//! End-to-end conversion and proxy behaviour through a live runtime

use heron_runtime::classes::{self, auto_closeable_type, closeable_type, string_builder_type};
use heron_runtime::prelude::*;
use heron_runtime::EnumConstant;
use std::sync::OnceLock;

fn locked_runtime(converter: ConverterConfig) -> Runtime {
    let runtime = Runtime::new();
    runtime.set_converter(ValueConverter::with_config(converter));
    runtime.acquire().unwrap();
    runtime
}

/// Remove the global and nudge the VM, as every scenario does on the way out
fn finish(runtime: &Runtime, name: &str) {
    assert!(runtime.global().delete(name).unwrap());
    runtime.low_memory_notification().unwrap();
    runtime.unlock().unwrap();
}

fn joiner_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::interface("Joiner")
            .abstract_method("join", vec![ParamType::String, ParamType::String], ParamType::String)
            .build()
    })
    .clone()
}

fn greeter_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::interface("Greeter")
            .abstract_method("hello", vec![ParamType::String], ParamType::String)
            .abstract_method_variadic("join", vec![], Some(ParamType::String), ParamType::String)
            .abstract_method("split", vec![ParamType::String], ParamType::List)
            .build()
    })
    .clone()
}

#[test]
fn test_anonymous_function_as_interface() {
    let runtime = locked_runtime(ConverterConfig::default());
    let joiner = runtime
        .execute_as("(a, b) => a + ',' + b", &ParamType::Object(joiner_type()))
        .unwrap();
    runtime.global().set("joiner", joiner.clone()).unwrap();

    let ab = joiner.invoke("join", &["a".into(), "b".into()]).unwrap();
    assert_eq!(ab, HostValue::from("a,b"));
    assert_eq!(
        joiner.invoke("join", &[ab, "c".into()]).unwrap(),
        HostValue::from("a,b,c")
    );
    // crossing back into script yields the original function
    assert!(runtime.execute_bool("typeof joiner === 'function'").unwrap());
    assert_eq!(runtime.execute_string("joiner('x', 'y')").unwrap(), "x,y");
    assert!(runtime.global().delete("joiner").unwrap());
    runtime.low_memory_notification().unwrap();
    runtime.unlock().unwrap();
}

#[test]
fn test_anonymous_object_as_interface() {
    let runtime = locked_runtime(ConverterConfig::default());
    let greeter = runtime
        .execute_as(
            "({ hello: (name) => 'hello ' + name, join: (...parts) => parts.join(','), split: (s) => s.split(',') })",
            &ParamType::Object(greeter_type()),
        )
        .unwrap();

    assert_eq!(
        greeter.invoke("hello", &["heron".into()]).unwrap(),
        HostValue::from("hello heron")
    );
    assert_eq!(
        greeter
            .invoke("join", &[HostValue::List(vec!["a".into(), "b".into(), "c".into()])])
            .unwrap(),
        HostValue::from("a,b,c")
    );
    assert_eq!(
        greeter.invoke("join", &["a".into(), "b".into()]).unwrap(),
        HostValue::from("a,b")
    );
    assert_eq!(
        greeter.invoke("split", &["x,y".into()]).unwrap(),
        HostValue::List(vec!["x".into(), "y".into()])
    );

    let err = runtime
        .execute_as("({ hello: (n) => n })", &ParamType::Object(greeter_type()))
        .unwrap_err();
    assert!(matches!(err, HeronError::MissingMethod { .. }));
    runtime.unlock().unwrap();
}

#[test]
fn test_string_builder_chain() {
    let runtime = locked_runtime(ConverterConfig::default());
    runtime.global().set("StringBuilder", string_builder_type()).unwrap();
    assert_eq!(
        runtime
            .execute_string("new StringBuilder('abc').append(' ').append('def').toString()")
            .unwrap(),
        "abc def"
    );
    finish(&runtime, "StringBuilder");
}

fn color_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::enumeration("Color")
            .constant("Red")
            .constant("Green")
            .build()
    })
    .clone()
}

#[test]
fn test_enum_round_trip_and_immutability() {
    let runtime = locked_runtime(ConverterConfig::default());
    let red: EnumConstant = color_type().constant("Red").unwrap().clone();
    runtime.global().set("red", red.clone()).unwrap();
    runtime.global().set("Color", color_type()).unwrap();

    let back = runtime.global().get("red").unwrap();
    assert!(back.as_enum().is_some_and(|c| c.ptr_eq(&red)));
    assert!(runtime.execute_bool("red === Color.Red").unwrap());
    assert_eq!(runtime.execute_string("red.name()").unwrap(), "Red");
    assert_eq!(runtime.execute_i64("Color.Green.ordinal()").unwrap(), 1);
    assert_eq!(runtime.execute_string("Color.valueOf('Green').toString()").unwrap(), "Green");
    assert_eq!(runtime.execute_i64("Color.values().length").unwrap(), 2);

    assert!(runtime.execute("red.name = 'Blue'").is_err());
    assert!(runtime.execute("Color.Red = null").is_err());
    assert_eq!(red.name(), "Red");

    assert!(runtime.global().delete("Color").unwrap());
    finish(&runtime, "red");
}

#[test]
fn test_file_object() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "12345678").unwrap();

    let runtime = locked_runtime(ConverterConfig::default());
    classes::register_all(&runtime.global()).unwrap();
    let dir_name = dir.path().to_string_lossy().into_owned();
    runtime.global().set("dir", dir_name).unwrap();
    runtime.execute_void("let file = new File(dir, 'notes.txt')").unwrap();
    assert!(runtime.execute_bool("file.exists() && file.isFile() && file.canRead()").unwrap());
    assert_eq!(runtime.execute_i64("file.length()").unwrap(), 8);
    assert_eq!(runtime.execute_string("file.getName()").unwrap(), "notes.txt");
    assert!(runtime.execute_bool("Path.of(dir).toFile().isDirectory()").unwrap());
    runtime.reset().unwrap();
    runtime.unlock().unwrap();
}

#[test]
fn test_interface_assignability() {
    let runtime = locked_runtime(ConverterConfig::default());
    classes::register_all(&runtime.global()).unwrap();
    assert!(runtime.execute_bool("AutoCloseable.isAssignableFrom(Closeable)").unwrap());
    assert!(!runtime.execute_bool("Closeable.isAssignableFrom(AutoCloseable)").unwrap());
    assert!(!runtime.execute_bool("AutoCloseable.isAssignableFrom(StringBuilder)").unwrap());
    assert!(auto_closeable_type().is_assignable_from(&closeable_type()));
    runtime.reset().unwrap();
    runtime.unlock().unwrap();
}

#[test]
fn test_map_proxy() {
    let runtime = locked_runtime(ConverterConfig::new().proxy_map(true));
    let map: HostMap = [("x", HostValue::Int(1)), ("y", HostValue::from("2"))]
        .into_iter()
        .collect();
    runtime.global().set("map", map.clone()).unwrap();

    assert!(runtime.execute_bool("map.containsKey('x')").unwrap());
    assert_eq!(runtime.execute_i64("map['x']").unwrap(), 1);
    assert_eq!(runtime.execute_string("map.y").unwrap(), "2");
    runtime.execute_void("map.z = 3; map['x'] = 10").unwrap();
    assert_eq!(map.get("z"), Some(HostValue::Int(3)));
    assert_eq!(map.get("x"), Some(HostValue::Int(10)));
    assert_eq!(
        runtime.execute_string("JSON.stringify(Object.keys(map))").unwrap(),
        r#"["x","y","z"]"#
    );
    map.insert("w", true);
    assert!(runtime.execute_bool("map.w === true && 'w' in map").unwrap());

    let back = runtime.global().get("map").unwrap();
    assert!(back.as_map().is_some_and(|m| m.ptr_eq(&map)));
    finish(&runtime, "map");
    assert_eq!(runtime.binding_count(), 0);
}

#[test]
fn test_map_without_proxy_mode_uses_methods() {
    let runtime = locked_runtime(ConverterConfig::default());
    let map: HostMap = [("x", 1)].into_iter().collect();
    runtime.global().set("map", map).unwrap();
    assert!(runtime.execute_bool("map.containsKey('x') && map.x === undefined").unwrap());
    assert_eq!(runtime.execute_i64("map.get('x')").unwrap(), 1);
    finish(&runtime, "map");
}

fn echo_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::class("Echo")
            .constructor(vec![], |_| Ok(HostValue::object(Echo)))
            .method("echo", vec![ParamType::String], ParamType::String, |_, args| {
                Ok(args[0].clone())
            })
            .method_variadic(
                "echo",
                vec![],
                Some(ParamType::String),
                ParamType::List,
                |_, args| Ok(args[0].clone()),
            )
            .build()
    })
    .clone()
}

struct Echo;

impl HostObject for Echo {
    fn host_type(&self) -> HostType {
        echo_type()
    }
}

#[test]
fn test_overloaded_methods() {
    let runtime = locked_runtime(ConverterConfig::default());
    runtime.global().set("Echo", echo_type()).unwrap();
    runtime.execute_void("let m = new Echo()").unwrap();
    assert_eq!(runtime.execute_string("m.echo('abc')").unwrap(), "abc");
    assert_eq!(
        runtime.execute_string("JSON.stringify(m.echo('abc', 'def'))").unwrap(),
        r#"["abc","def"]"#
    );
    assert_eq!(runtime.execute_string("JSON.stringify(m.echo())").unwrap(), "[]");
    assert_eq!(runtime.execute_string("m.echo(42)").unwrap(), "42");
    finish(&runtime, "Echo");
}

#[test]
fn test_path_and_pattern() {
    let runtime = locked_runtime(ConverterConfig::default());
    classes::register_all(&runtime.global()).unwrap();
    assert_eq!(
        runtime.execute_string("Path.of('/a/b').resolve('c').getFileName().toString()").unwrap(),
        "c"
    );
    runtime.execute_void("let p = Pattern.compile('^\\\\d+$')").unwrap();
    assert!(runtime.execute_bool("p.matcher('2024').matches()").unwrap());
    assert!(!runtime.execute_bool("p.matcher('20x4').matches()").unwrap());
    runtime.execute_void("let m = Pattern.compile('(\\\\w+)@(\\\\w+)').matcher('ann@host bob@lake')").unwrap();
    assert!(runtime.execute_bool("m.find()").unwrap());
    assert_eq!(runtime.execute_string("m.group(2)").unwrap(), "host");
    assert!(runtime.execute_bool("m.find() && m.group() === 'bob@lake'").unwrap());
    assert!(!runtime.execute_bool("m.find()").unwrap());
    runtime.reset().unwrap();
    runtime.unlock().unwrap();
}

#[test]
fn test_set_proxy() {
    let runtime = locked_runtime(ConverterConfig::new().proxy_set(true));
    let set: HostSet = ["a", "b"].into_iter().collect();
    runtime.global().set("set", set.clone()).unwrap();

    assert!(runtime.execute_bool("set.contains('a') && set.a === true && 'b' in set").unwrap());
    assert!(runtime.execute_bool("set.c === undefined").unwrap());
    assert!(runtime.execute_bool("set.add('c')").unwrap());
    runtime.execute_void("set.d = true; set.a = false").unwrap();
    assert!(set.contains(&HostValue::from("d")));
    assert!(!set.contains(&HostValue::from("a")));
    assert_eq!(
        runtime.execute_string("JSON.stringify(Object.keys(set))").unwrap(),
        r#"["b","c","d"]"#
    );
    finish(&runtime, "set");
}

#[test]
fn test_host_function_proxy() {
    let runtime = locked_runtime(ConverterConfig::default());
    let upper = HostFunction::typed("upper", vec![ParamType::String], ParamType::String, |args| {
        Ok(HostValue::from(args[0].as_str().unwrap_or_default().to_uppercase()))
    });
    runtime.global().set("upper", upper.clone()).unwrap();
    assert_eq!(runtime.execute_string("upper('abc')").unwrap(), "ABC");
    assert_eq!(runtime.execute_string("['x', 'y'].map(upper).join('')").unwrap(), "XY");
    let back = runtime.global().get("upper").unwrap();
    assert!(back.as_function().is_some_and(|f| f.ptr_eq(&upper)));
    finish(&runtime, "upper");
}

fn text_ops_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::interface("TextOps")
            .abstract_method_variadic(
                "join",
                vec![ParamType::String],
                Some(ParamType::String),
                ParamType::String,
            )
            .abstract_method("split", vec![ParamType::String, ParamType::String], ParamType::List)
            .build()
    })
    .clone()
}

#[test]
fn test_separator_first_object_methods() {
    let runtime = locked_runtime(ConverterConfig::default());
    let ops = runtime
        .execute_as(
            "({ join: (separator, ...strings) => strings.join(separator), split: (separator, str) => str.split(separator) })",
            &ParamType::Object(text_ops_type()),
        )
        .unwrap();

    let packed = HostValue::List(vec!["a".into(), "b".into(), "c".into()]);
    assert_eq!(ops.invoke("join", &["-".into(), packed]).unwrap(), HostValue::from("a-b-c"));
    assert_eq!(
        ops.invoke("join", &["+".into(), "x".into(), "y".into()]).unwrap(),
        HostValue::from("x+y")
    );
    assert_eq!(ops.invoke("join", &[",".into()]).unwrap(), HostValue::from(""));
    assert_eq!(
        ops.invoke("split", &[";".into(), "p;q;r".into()]).unwrap(),
        HostValue::List(vec!["p".into(), "q".into(), "r".into()])
    );
    runtime.unlock().unwrap();
}

#[derive(Default)]
struct JoinerHolder {
    joiner: parking_lot::Mutex<Option<HostValue>>,
}

impl HostObject for JoinerHolder {
    fn host_type(&self) -> HostType {
        joiner_holder_type()
    }
}

fn joiner_holder_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::class("JoinerHolder")
            .constructor(vec![], |_| Ok(HostValue::object(JoinerHolder::default())))
            .method("setJoiner", vec![ParamType::Object(joiner_type())], ParamType::Void, |this, args| {
                let holder = downcast::<JoinerHolder>(this).ok_or_else(|| HeronError::host("receiver"))?;
                *holder.joiner.lock() = args.first().cloned();
                Ok(HostValue::Null)
            })
            .method(
                "joinWith",
                vec![ParamType::String, ParamType::String],
                ParamType::String,
                |this, args| {
                    let holder = downcast::<JoinerHolder>(this).ok_or_else(|| HeronError::host("receiver"))?;
                    let joiner = holder.joiner.lock().clone().ok_or_else(|| HeronError::host("no joiner"))?;
                    joiner.invoke("join", args)
                },
            )
            .build()
    })
    .clone()
}

#[test]
fn test_script_function_passed_to_interface_parameter() {
    let runtime = locked_runtime(ConverterConfig::default());
    runtime.global().set("JoinerHolder", joiner_holder_type()).unwrap();
    runtime
        .execute_void("let holder = new JoinerHolder(); holder.setJoiner((a, b) => a + '|' + b)")
        .unwrap();
    assert_eq!(runtime.execute_string("holder.joinWith('l', 'r')").unwrap(), "l|r");

    let holder = runtime.global().get("holder").unwrap();
    let stored = holder
        .downcast::<JoinerHolder>()
        .and_then(|h| h.joiner.lock().clone())
        .unwrap();
    assert!(stored.host_type().is_some_and(|t| t.ptr_eq(&joiner_type())));
    assert_eq!(
        stored.invoke("join", &["1".into(), "2".into()]).unwrap(),
        HostValue::from("1|2")
    );

    let err = runtime.execute("holder.setJoiner(42)").unwrap_err();
    assert!(matches!(err, HeronError::Vm(_)));
    assert!(runtime.global().delete("JoinerHolder").unwrap());
    finish(&runtime, "holder");
}

#[test]
fn test_type_token_round_trip() {
    let runtime = locked_runtime(ConverterConfig::default());
    runtime.global().set("Color", color_type()).unwrap();
    runtime.global().set("StringBuilder", string_builder_type()).unwrap();

    let color = runtime.execute_object("Color").unwrap();
    assert!(color.as_type().is_some_and(|t| t.ptr_eq(&color_type())));
    let builder = runtime.execute_object("StringBuilder").unwrap();
    assert!(builder.as_type().is_some_and(|t| t.ptr_eq(&string_builder_type())));
    assert_eq!(runtime.global().get("Color").unwrap().as_type(), Some(&color_type()));
    assert!(runtime.execute_bool("Color === Color && StringBuilder !== Color").unwrap());

    assert!(runtime.global().delete("StringBuilder").unwrap());
    finish(&runtime, "Color");
}
