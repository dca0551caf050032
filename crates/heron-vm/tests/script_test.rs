//! Script dialect tests

use heron_vm::{Value, Vm, VmError, native_function};

fn eval(source: &str) -> Value {
    let vm = Vm::new();
    vm.execute(source).unwrap()
}

fn eval_str(source: &str) -> String {
    eval(source).as_str().map(str::to_string).unwrap()
}

#[test]
fn test_arithmetic_and_strings() {
    assert_eq!(eval("1 + 2 * 3 - 4 / 2").as_number(), Some(5.0));
    assert_eq!(eval("7 % 3").as_number(), Some(1.0));
    assert_eq!(eval_str("'a' + 1 + 2"), "a12");
    assert_eq!(eval_str("1 + 2 + 'a'"), "3a");
    assert_eq!(eval("-'3'").as_number(), Some(-3.0));
}

#[test]
fn test_functions_and_closures() {
    let source = r#"
        function counter() {
            let n = 0
            return () => { n += 1; return n }
        }
        const next = counter()
        next(); next(); next()
    "#;
    assert_eq!(eval(source).as_number(), Some(3.0));
}

#[test]
fn test_rest_and_spread() {
    let source = "const join = (separator, ...strings) => [...strings].join(separator)\n\
                  join(', ', 'a', 'b', 'c')";
    assert_eq!(eval_str(source), "a, b, c");
}

#[test]
fn test_objects_and_this() {
    let source = r#"
        const obj = {
            name: 'heron',
            greet() { return 'hello ' + this.name },
        }
        obj.greet()
    "#;
    assert_eq!(eval_str(source), "hello heron");
}

#[test]
fn test_constructor_functions() {
    let source = r#"
        function Point(x, y) { this.x = x; this.y = y }
        const p = new Point(1, 2)
        p.x + p.y
    "#;
    assert_eq!(eval(source).as_number(), Some(3.0));
}

#[test]
fn test_conditionals() {
    let source = r#"
        function sign(n) {
            if (n < 0) return -1
            else if (n === 0) return 0
            return 1
        }
        [sign(-5), sign(0), sign(9)].join(',')
    "#;
    assert_eq!(eval_str(source), "-1,0,1");
    assert_eq!(eval_str("true ? 'yes' : 'no'"), "yes");
    assert_eq!(eval("null || 0 || 'x'").as_str(), Some("x"));
    assert_eq!(eval("1 && 0").as_number(), Some(0.0));
}

#[test]
fn test_array_methods() {
    assert_eq!(
        eval_str("[1, 2, 3, 4].filter(n => n % 2 === 0).map(n => n * 10).join('-')"),
        "20-40"
    );
    assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b, 0)").as_number(), Some(6.0));
    assert_eq!(eval("[1, 2, 3].indexOf(2)").as_number(), Some(1.0));
    assert_eq!(eval("[1, 2, 3].includes(4)").as_bool(), Some(false));
    assert_eq!(eval("const a = []; a.push(1, 2); a.length").as_number(), Some(2.0));
}

#[test]
fn test_string_methods() {
    assert_eq!(eval_str("' Abc '.trim().toUpperCase()"), "ABC");
    assert_eq!(eval_str("'a,b,c'.split(',').join('|')"), "a|b|c");
    assert_eq!(eval("'hello'.startsWith('he')").as_bool(), Some(true));
    assert_eq!(eval("'hello'.indexOf('l')").as_number(), Some(2.0));
    assert_eq!(eval("'hello'.length").as_number(), Some(5.0));
    assert_eq!(eval_str("'hello'[1]"), "e");
}

#[test]
fn test_json_round_trip() {
    assert_eq!(
        eval_str("JSON.stringify({ a: 1, b: [true, null, 'x'], c: undefined })"),
        r#"{"a":1,"b":[true,null,"x"]}"#
    );
    assert_eq!(eval("JSON.parse('{\"x\": [1, 2]}').x[1]").as_number(), Some(2.0));
    assert_eq!(
        eval_str("JSON.stringify(Object.keys({ z: 1, y: 2 }))"),
        r#"["z","y"]"#
    );
}

#[test]
fn test_typeof_and_in() {
    assert_eq!(eval_str("typeof undeclared"), "undefined");
    assert_eq!(eval_str("typeof (() => 1)"), "function");
    assert_eq!(eval_str("typeof null"), "object");
    assert_eq!(eval("'a' in { a: 1 }").as_bool(), Some(true));
    assert_eq!(eval("const o = { a: 1 }; delete o.a; 'a' in o").as_bool(), Some(false));
}

#[test]
fn test_dates() {
    assert_eq!(eval("new Date(1000).getTime()").as_number(), Some(1000.0));
    assert_eq!(eval_str("new Date(0).toISOString()"), "1970-01-01T00:00:00.000Z");
    assert_eq!(
        eval("new Date('2024-02-29T12:30:15.250Z').getTime()").as_number(),
        Some(1_709_209_815_250.0)
    );
    assert_eq!(eval("new Date('2024-02-29').getFullYear()").as_number(), Some(2024.0));
    assert!(eval("Date.now()").as_number().is_some_and(|n| n > 0.0));
}

#[test]
fn test_errors() {
    let vm = Vm::new();
    let err = vm.execute("throw new TypeError('bad input')").unwrap_err();
    match &err {
        VmError::Exception(thrown) => assert_eq!(thrown.message, "TypeError: bad input"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(vm.execute("missing + 1"), Err(VmError::ReferenceError(_))));
    assert!(matches!(vm.execute("undefined.x"), Err(VmError::TypeError(_))));
    assert!(matches!(vm.execute("const k = 1; k = 2"), Err(VmError::TypeError(_))));
    assert!(matches!(vm.execute("let = ;"), Err(VmError::SyntaxError { .. })));
}

#[test]
fn test_native_functions() {
    let vm = Vm::new();
    vm.set_global(
        "twice",
        native_function("twice", |vm, _this, args| {
            let f = args.first().cloned().unwrap_or_default();
            let once = vm.call(&f, &Value::Undefined, &[])?;
            let again = vm.call(&f, &Value::Undefined, &[])?;
            Ok(Value::Number(once.to_number() + again.to_number()))
        }),
    );
    assert_eq!(vm.execute("twice(() => 21)").unwrap().as_number(), Some(42.0));
}

#[test]
fn test_global_bindings_from_host() {
    let vm = Vm::new();
    vm.set_global("a", Value::from("x"));
    assert_eq!(vm.execute("a + a").unwrap().as_str(), Some("xx"));
    assert!(vm.delete_global("a").is_some());
    assert!(matches!(vm.execute("a"), Err(VmError::ReferenceError(_))));
}

#[test]
fn test_number_to_string() {
    assert_eq!(eval_str("String(1e20)"), "100000000000000000000");
    assert_eq!(eval_str("'' + 1e21"), "1e+21");
    assert_eq!(eval_str("'' + 1e-7"), "1e-7");
    assert_eq!(eval_str("'' + 0.5"), "0.5");
    assert_eq!(eval_str("String(-2 / 3)"), "-0.6666666666666666");
}

#[test]
fn test_oversized_lengths_are_range_errors() {
    let vm = Vm::new();
    assert!(matches!(
        vm.execute("let a = []; a.length = 4294967296"),
        Err(VmError::RangeError(_))
    ));
    assert!(matches!(vm.execute("a.length = 4294967295"), Err(VmError::RangeError(_))));
    assert!(matches!(vm.execute("a[4000000000] = 1"), Err(VmError::RangeError(_))));
    assert!(matches!(vm.execute("new Array(1e10)"), Err(VmError::RangeError(_))));
    assert!(matches!(vm.execute("'ab'.repeat(1e10)"), Err(VmError::RangeError(_))));
    assert_eq!(vm.execute("a.length = 3; a.length").unwrap().as_number(), Some(3.0));
    assert_eq!(vm.execute("new Array(2).length").unwrap().as_number(), Some(2.0));
}

#[test]
fn test_template_and_coalesce() {
    assert_eq!(eval_str("const n = 2; `n=${n + 1}!`"), "n=3!");
    assert_eq!(eval_str("null ?? 'fallback'"), "fallback");
    assert_eq!(eval("0 ?? 1").as_number(), Some(0.0));
}
