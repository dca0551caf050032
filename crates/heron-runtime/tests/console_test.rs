//! Console routing through the process-wide handler

use heron_runtime::prelude::*;
use heron_runtime::reset_console_handler;
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn test_console_routes_to_handler() {
    let captured: Arc<Mutex<Vec<(ConsoleLevel, String)>>> = Arc::default();
    let sink = Arc::clone(&captured);
    set_console_handler(move |level, message| sink.lock().push((level, message.to_string())));

    let runtime = Runtime::new();
    let _guard = runtime.lock().unwrap();
    ConsoleInterceptor::register(&runtime.global()).unwrap();
    runtime.global().set("items", vec![HostValue::from(1), HostValue::from(2)]).unwrap();
    runtime
        .execute_void("console.log('count', items.length); console.warn('careful'); console.error(null, true)")
        .unwrap();

    assert_eq!(
        *captured.lock(),
        vec![
            (ConsoleLevel::Log, "count 2".to_string()),
            (ConsoleLevel::Warn, "careful".to_string()),
            (ConsoleLevel::Error, "null true".to_string()),
        ]
    );

    assert!(ConsoleInterceptor::unregister(&runtime.global()).unwrap());
    assert!(runtime.execute("console.log('gone')").is_err());
    reset_console_handler();
}
