//! Line interpreter for the console endpoint.
//!
//! Each input line is split on whitespace. `help` and `quit` are handled
//! locally; everything else is `[<service>] <method> [args...]` and goes to
//! the router as a positional call. The service name may be left out when
//! exactly one service is registered.

use serde_json::Value;

use courier_core::{ArgumentKind, CallResponse, Service, ServerContext, Session};

/// Result of interpreting one console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConsoleOutcome {
    /// Text to write back, already newline-terminated.
    pub(crate) output: String,
    /// Whether the connection should close after writing `output`.
    pub(crate) close: bool,
}

impl ConsoleOutcome {
    fn reply(output: String) -> Self {
        Self {
            output,
            close: false,
        }
    }

    fn line(text: impl AsRef<str>) -> Self {
        Self::reply(format!("{}\n", text.as_ref()))
    }
}

/// Interprets one line of console input.
pub(crate) fn execute(line: &str, context: &ServerContext, session: &dyn Session) -> ConsoleOutcome {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.split_first() {
        None => ConsoleOutcome::reply(String::new()),
        Some((&"quit", _)) => ConsoleOutcome {
            output: String::from("Bye!\n"),
            close: true,
        },
        Some((&"help", args)) => help(context, args),
        Some(_) => dispatch(context, session, &tokens),
    }
}

/// Resolves the target service, honouring single-service omission.
fn resolve_service<'a, 't>(
    context: &'a ServerContext,
    args: &'t [&'t str],
) -> Option<(&'a Service, &'t [&'t str])> {
    let services = context.api().services();
    if let [only] = services {
        return Some((only, args));
    }
    let (name, rest) = args.split_first()?;
    context.api().find_service(name).map(|service| (service, rest))
}

fn help(context: &ServerContext, args: &[&str]) -> ConsoleOutcome {
    if args.is_empty() {
        return ConsoleOutcome::reply(overview(context));
    }

    let Some((service, rest)) = resolve_service(context, args) else {
        return ConsoleOutcome::line("Usage: help <service> <method>");
    };
    let Some(method_name) = rest.first() else {
        return ConsoleOutcome::line("Usage: help <service> <method>");
    };
    let Some(method) = service.find_method(method_name) else {
        return ConsoleOutcome::line(format!("Unknown method '{method_name}'"));
    };

    let mut output = format!("{}:\n", method.name());
    if method.arg_spec().is_empty() {
        output.push_str("  (Takes no arguments)\n");
    }
    for arg in method.arg_spec() {
        let marker = if arg.is_required() && arg.default().is_none() {
            ""
        } else {
            ", optional"
        };
        output.push_str(&format!(
            "  {} ({}{marker})\n",
            arg.name(),
            describe_kind(arg.kind())
        ));
    }
    ConsoleOutcome::reply(output)
}

fn overview(context: &ServerContext) -> String {
    let mut output = String::from("  help -- Show this help\n  quit -- Close connection\n");
    let services = context.api().services();
    if let [only] = services {
        output.push('\n');
        list_methods(&mut output, only);
        return output;
    }
    for service in services {
        output.push_str(&format!("\nService '{}':\n\n", service.name()));
        list_methods(&mut output, service);
    }
    output
}

fn list_methods(output: &mut String, service: &Service) {
    for name in service.method_names() {
        output.push_str(&format!("  {name}\n"));
    }
}

fn describe_kind(kind: &ArgumentKind) -> String {
    match kind {
        ArgumentKind::Nested(children) => {
            let fields: Vec<String> = children
                .iter()
                .map(|child| format!("{}: {}", child.name(), describe_kind(child.kind())))
                .collect();
            format!("nested {{{}}}", fields.join(", "))
        }
        other => other.name().to_owned(),
    }
}

fn dispatch(context: &ServerContext, session: &dyn Session, tokens: &[&str]) -> ConsoleOutcome {
    let Some((service, rest)) = resolve_service(context, tokens) else {
        return ConsoleOutcome::line("Unknown service");
    };
    let Some((method, args)) = rest.split_first() else {
        return ConsoleOutcome::line("No command given");
    };

    let response = context.handle_positional(service.name(), method, args, session);
    ConsoleOutcome::reply(render(response))
}

fn render(response: CallResponse) -> String {
    if let Some(errors) = response.errors {
        let mut output = String::from("Parse errors:\n");
        for error in errors {
            output.push_str(&format!(" {error}\n"));
        }
        return output;
    }

    let data = Value::Object(response.result.unwrap_or_default());
    let body = match serde_json::to_string_pretty(&data) {
        Ok(body) => body,
        Err(error) => return format!("Error encoding response: {error}\n"),
    };
    if response.ok {
        format!("{body}\n")
    } else {
        format!("Call failed:\n{body}\n")
    }
}
