//! Introspection and session methods available on every daemon.

use std::sync::Arc;

use serde_json::{Value, json};

use courier_core::{
    ApiData, ArgumentKind, ArgumentSpec, BasicUser, CallArgs, HandlerReply, RegistrationError,
    ServerContext, Service, Session,
};

/// Name the system service registers under.
pub const SYSTEM_SERVICE: &str = "system";

/// Builds the `system` service.
///
/// | method     | arguments         | result                                  |
/// |------------|-------------------|-----------------------------------------|
/// | `ping`     |                   | `{"pong": true}`                        |
/// | `echo`     | `message: string` | `{"message": ...}`                      |
/// | `services` |                   | `{"services": [...]}`                   |
/// | `methods`  | `service: string` | `{"methods": [{name, args: [...]}]}`    |
/// | `endpoints`|                   | `{"endpoints": [...]}`                  |
/// | `login`    | `user: string`    | `{"user": ...}`                         |
/// | `whoami`   |                   | `{"user": ... or null}`                 |
///
/// `login` attaches a user once per session; later attempts fail with
/// `Already logged in` and leave the first user in place.
///
/// # Errors
///
/// Returns [`RegistrationError`] if a method specification is rejected.
pub fn system_service() -> Result<Service, RegistrationError> {
    let mut service = Service::new(SYSTEM_SERVICE);
    service.add_method("ping", Vec::new(), |_args, _session, _context| ping())?;
    service.add_method(
        "echo",
        vec![ArgumentSpec::required("message", ArgumentKind::String)],
        |args, _session, _context| echo(&args),
    )?;
    service.add_method("services", Vec::new(), |_args, _session, context| {
        services(context)
    })?;
    service.add_method(
        "methods",
        vec![ArgumentSpec::required("service", ArgumentKind::String)],
        |args, _session, context| methods(&args, context),
    )?;
    service.add_method("endpoints", Vec::new(), |_args, _session, context| {
        endpoints(context)
    })?;
    service.add_method(
        "login",
        vec![ArgumentSpec::required("user", ArgumentKind::String)],
        |args, session, _context| login(&args, session),
    )?;
    service.add_method("whoami", Vec::new(), |_args, session, _context| whoami(session))?;
    Ok(service)
}

fn reply(value: Value) -> HandlerReply {
    match value {
        Value::Object(map) => HandlerReply::success(map),
        other => {
            let mut data = ApiData::new();
            data.insert("value".to_owned(), other);
            HandlerReply::success(data)
        }
    }
}

fn ping() -> HandlerReply {
    reply(json!({ "pong": true }))
}

fn echo(args: &CallArgs) -> HandlerReply {
    reply(json!({ "message": args.str("message").unwrap_or_default() }))
}

fn services(context: &ServerContext) -> HandlerReply {
    let names: Vec<&str> = context.api().services().iter().map(Service::name).collect();
    reply(json!({ "services": names }))
}

fn methods(args: &CallArgs, context: &ServerContext) -> HandlerReply {
    let name = args.str("service").unwrap_or_default();
    let Some(service) = context.api().find_service(name) else {
        return HandlerReply::error("Unknown service");
    };

    let listing: Vec<Value> = service
        .methods()
        .iter()
        .map(|method| {
            json!({
                "name": method.name(),
                "args": method.arg_spec().iter().map(describe_arg).collect::<Vec<_>>(),
            })
        })
        .collect();
    reply(json!({ "methods": listing }))
}

fn describe_arg(arg: &ArgumentSpec) -> Value {
    let mut entry = json!({
        "name": arg.name(),
        "kind": arg.kind().name(),
        "required": arg.is_required(),
    });
    if let ArgumentKind::Nested(children) = arg.kind()
        && let Value::Object(map) = &mut entry
    {
        map.insert(
            "fields".to_owned(),
            Value::Array(children.iter().map(describe_arg).collect()),
        );
    }
    entry
}

fn endpoints(context: &ServerContext) -> HandlerReply {
    reply(json!({ "endpoints": context.active_endpoints() }))
}

fn login(args: &CallArgs, session: &dyn Session) -> HandlerReply {
    let user = args.str("user").unwrap_or_default();
    if !session.claim_user(Arc::new(BasicUser::new(user, user))) {
        return HandlerReply::error("Already logged in");
    }
    reply(json!({ "user": user }))
}

fn whoami(session: &dyn Session) -> HandlerReply {
    let user = session.user().map(|user| user.display_name().to_owned());
    reply(json!({ "user": user }))
}
