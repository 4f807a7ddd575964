//! Behavioural tests for the console endpoint over a live socket.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use crate::bootstrap::{Daemon, bootstrap_with};

use super::support::{
    ConsoleClient, RecordingHealthReporter, TestConfigLoader, calculator_api, reporter_handle,
};

struct ConsoleWorld {
    daemon: Option<Daemon>,
    client: Option<ConsoleClient>,
    greeting: String,
    output: String,
}

impl ConsoleWorld {
    fn new() -> Self {
        Self {
            daemon: None,
            client: None,
            greeting: String::new(),
            output: String::new(),
        }
    }

    fn client(&mut self) -> &mut ConsoleClient {
        self.client.as_mut().expect("client should be connected")
    }
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"')
}

/// Feature files write newlines as `\n`.
fn unescape(value: &str) -> String {
    strip_quotes(value).replace("\\n", "\n")
}

#[fixture]
fn world() -> RefCell<ConsoleWorld> {
    RefCell::new(ConsoleWorld::new())
}

#[given("a running daemon serving the calculator")]
fn given_running_daemon(world: &RefCell<ConsoleWorld>) {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let mut daemon = bootstrap_with(
        &TestConfigLoader::new(),
        reporter_handle(&reporter),
        calculator_api(),
    )
    .expect("bootstrap daemon");
    daemon.start().expect("start endpoints");
    world.borrow_mut().daemon = Some(daemon);
}

#[given("a console client is connected")]
fn given_console_client(world: &RefCell<ConsoleWorld>) {
    let address = world
        .borrow()
        .daemon
        .as_ref()
        .and_then(Daemon::console_address)
        .expect("console address");
    let (client, greeting) = ConsoleClient::connect(address);
    let mut state = world.borrow_mut();
    state.client = Some(client);
    state.greeting = greeting;
}

#[when("the client types {line}")]
fn when_client_types(world: &RefCell<ConsoleWorld>, line: String) {
    let mut state = world.borrow_mut();
    let output = state.client().run(strip_quotes(&line));
    state.output = output;
}

#[then("the client was greeted with {greeting}")]
fn then_client_greeted(world: &RefCell<ConsoleWorld>, greeting: String) {
    assert_eq!(world.borrow().greeting, unescape(&greeting));
}

#[then("the console prints {text}")]
fn then_console_prints(world: &RefCell<ConsoleWorld>, text: String) {
    assert_eq!(world.borrow().output, unescape(&text));
}

#[then("the console replies with JSON {json}")]
fn then_console_replies_json(world: &RefCell<ConsoleWorld>, json: String) {
    let expected: Value = serde_json::from_str(&json).expect("expected reply is JSON");
    let state = world.borrow();
    let actual: Value = serde_json::from_str(&state.output)
        .unwrap_or_else(|error| panic!("console output {:?} is not JSON: {error}", state.output));
    assert_eq!(actual, expected);
}

#[then("the console output contains {text}")]
fn then_console_contains(world: &RefCell<ConsoleWorld>, text: String) {
    let expected = unescape(&text);
    let state = world.borrow();
    assert!(
        state.output.contains(&expected),
        "expected {expected:?} in {:?}",
        state.output
    );
}

#[then("the connection is closed")]
fn then_connection_closed(world: &RefCell<ConsoleWorld>) {
    assert!(world.borrow_mut().client().is_closed());
}

#[scenario(path = "tests/features/console.feature")]
fn console_endpoint(#[from(world)] world: RefCell<ConsoleWorld>) {
    drop(world);
}
