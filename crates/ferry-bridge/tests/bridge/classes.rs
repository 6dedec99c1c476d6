//! Dynamic Type Synthesizer and Callback Dispatcher tests

use super::harness::*;
use ferry_bridge::{BridgeError, BridgeSession};
use ferry_guest::{GuestKind, GuestValue};
use ferry_host::HostValue;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Instantiate a published class from the session module
fn instantiate(session: &BridgeSession, class_name: &str) -> GuestValue {
    let guest = session.guest();
    let module = session.module().unwrap();
    let ty = guest.getattr(&module, class_name).unwrap();
    guest.call(&ty, &[]).unwrap()
}

#[test]
fn test_greet_sends_exactly_one_message() {
    let (host, session) = open("classes_greet");
    let (origin, log) = recorder(&host, "GreeterImpl");

    session
        .define_class(&origin, "Greeter", "object", &names(&["greet"]))
        .unwrap();

    {
        let guest = session.guest();
        let instance = instantiate(&session, "Greeter");
        let x = guest.new_int(5).unwrap();

        let result = guest.call_method(&instance, "greet", &[x.clone()]).unwrap();
        assert!(result.is_none());

        let log = log.lock();
        assert_eq!(log.len(), 1);
        let (message, args) = &log[0];
        assert_eq!(message, "greet");
        assert_eq!(args.len(), 1);

        // The argument is a proxy that converts back to the very same object.
        let back = session.to_guest(&args[0]).unwrap();
        assert!(back.is(&x));
    }

    let binding = session.active_binding().unwrap();
    assert_eq!(binding.class_name, "Greeter");
    assert_eq!(binding.origin, origin);
    assert!(session.close().is_ok());
}

#[test]
fn test_callback_arguments_keep_order() {
    let (host, session) = open("classes_arg_order");
    let (origin, log) = recorder(&host, "OrderImpl");
    session
        .define_class(&origin, "Ordered", "object", &names(&["take"]))
        .unwrap();

    {
        let guest = session.guest();
        let instance = instantiate(&session, "Ordered");
        let args = [
            guest.new_str("one").unwrap(),
            guest.new_str("two").unwrap(),
            guest.new_str("three").unwrap(),
        ];
        guest.call_method(&instance, "take", &args).unwrap();

        let log = log.lock();
        let (_, proxies) = &log[0];
        let strings: Vec<String> = proxies
            .iter()
            .map(|p| session.string_value(p).unwrap())
            .collect();
        assert_eq!(strings, vec!["one", "two", "three"]);
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_two_classes_route_to_their_own_origins() {
    let (host, session) = open("classes_two_origins");
    let (first, first_log) = recorder(&host, "FirstImpl");
    let (second, second_log) = recorder(&host, "SecondImpl");

    session
        .define_class(&first, "First", "object", &names(&["greet"]))
        .unwrap();
    session
        .define_class(&second, "Second", "object", &names(&["greet"]))
        .unwrap();
    assert_eq!(session.active_binding().unwrap().class_name, "Second");

    {
        let guest = session.guest();
        let a = instantiate(&session, "First");
        let b = instantiate(&session, "Second");
        guest
            .call_method(&a, "greet", &[guest.new_str("to first").unwrap()])
            .unwrap();
        guest
            .call_method(&b, "greet", &[guest.new_str("to second").unwrap()])
            .unwrap();
        guest
            .call_method(&a, "greet", &[guest.new_str("first again").unwrap()])
            .unwrap();
    }

    assert_eq!(first_log.lock().len(), 2);
    assert_eq!(second_log.lock().len(), 1);
    let second_arg = second_log.lock()[0].1[0].clone();
    assert_eq!(session.string_value(&second_arg).unwrap(), "to second");
    assert!(session.close().is_ok());
}

#[test]
fn test_synthesized_type_is_an_instance_of_its_base() {
    let (host, session) = open("classes_base");
    let (origin, _log) = recorder(&host, "ShapeImpl");

    session
        .define_class(&origin, "Shape", "object", &names(&["area"]))
        .unwrap();
    session
        .define_class(&origin, "Circle", "SHAPE", &names(&["radius"]))
        .unwrap();

    {
        let guest = session.guest();
        let module = session.module().unwrap();
        let shape = guest.getattr(&module, "Shape").unwrap();
        let circle = instantiate(&session, "Circle");
        assert!(guest.is_instance(&circle, &shape).unwrap());
        assert_eq!(guest.type_name(&circle).unwrap(), "Circle");
        let area = guest.getattr(&circle, "area").unwrap();
        assert_eq!(area.kind(), Some(GuestKind::BoundMethod));
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_rejected_definitions_register_nothing() {
    let (host, session) = open("classes_rejected");
    let (origin, _log) = recorder(&host, "RejectImpl");
    session
        .define_class(&origin, "Existing", "object", &names(&["greet"]))
        .unwrap();
    let before = session.guest().live_objects();

    let cases = [
        ("Fresh", "NoSuchBase", names(&["greet"])),
        ("Fresh", "int", names(&["greet"])),
        ("Fresh", "shout", names(&["greet"])),
        ("Fresh", "object", names(&["__init_subclass__"])),
        ("Fresh", "object", names(&["greet", "greet"])),
        ("Fresh", "object", names(&[""])),
        ("Existing", "object", names(&["greet"])),
        ("EXISTING", "object", names(&["greet"])),
        ("not an identifier", "object", names(&["greet"])),
    ];
    for (class_name, base, methods) in &cases {
        let err = session
            .define_class(&origin, class_name, base, methods)
            .unwrap_err();
        assert!(
            matches!(err, BridgeError::ClassDefinition(_)),
            "{} ({}) {:?}: {:?}",
            class_name,
            base,
            methods,
            err
        );
    }

    assert_eq!(session.guest().live_objects(), before);
    assert_eq!(session.active_binding().unwrap().class_name, "Existing");
    let module = session.module().unwrap();
    assert!(!session.guest().hasattr(&module, "Fresh").unwrap());
    drop(module);
    assert!(session.close().is_ok());
}

#[test]
fn test_class_names_differing_only_in_case_collide() {
    let (host, session) = open("classes_case_collision");
    let (origin, _log) = recorder(&host, "CaseImpl");
    session
        .define_class(&origin, "Greeter", "object", &names(&["greet"]))
        .unwrap();

    let err = session
        .define_class(&origin, "greeter", "object", &names(&["greet"]))
        .unwrap_err();
    match err {
        BridgeError::ClassDefinition(message) => assert!(message.contains("'Greeter'")),
        other => panic!("unexpected error: {:?}", other),
    }

    // The base still resolves unambiguously, whatever its spelling.
    session
        .define_class(&origin, "LoudGreeter", "GREETER", &names(&["shout_out"]))
        .unwrap();
    {
        let loud = instantiate(&session, "LoudGreeter");
        let module = session.module().unwrap();
        let base = session.guest().getattr(&module, "Greeter").unwrap();
        assert!(session.guest().is_instance(&loud, &base).unwrap());
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_host_failure_surfaces_as_guest_fault() {
    let (host, session) = open("classes_host_failure");
    let origin = mute(&host, "MuteImpl");
    session
        .define_class(&origin, "Mute", "object", &names(&["speak"]))
        .unwrap();

    {
        let instance = instantiate(&session, "Mute");
        let proxy = session.make_proxy(&instance).unwrap();
        let err = session.call_method(&proxy, "speak", &[]).unwrap_err();
        match err {
            BridgeError::GuestRuntimeFault { kind, message } => {
                assert_eq!(kind, "RuntimeError");
                assert!(message.contains("does not understand"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_host_message_reaches_callback_through_proxy() {
    // Host -> proxy -> Guest method -> callback -> Host, on one thread.
    let (host, session) = open("classes_reentrant");
    let (origin, log) = recorder(&host, "EchoImpl");
    session
        .define_class(&origin, "Echo", "object", &names(&["echo"]))
        .unwrap();

    {
        let instance = instantiate(&session, "Echo");
        let proxy = session.make_proxy(&instance).unwrap();
        let reply = host
            .send(&proxy, "ECHO", &[HostValue::from("ping")])
            .unwrap();
        assert_eq!(reply, HostValue::Nil);
    }

    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].0, "echo");
    assert_eq!(session.string_value(&log[0].1[0]).unwrap(), "ping");
    drop(log);
    assert!(session.close().is_ok());
}

#[test]
fn test_callback_after_close_raises() {
    let (host, session) = open("classes_after_close");
    let (origin, log) = recorder(&host, "LateImpl");
    session
        .define_class(&origin, "Late", "object", &names(&["ping"]))
        .unwrap();

    let guest = session.guest().clone();
    let instance = instantiate(&session, "Late");
    let proxy = session.make_proxy(&instance).unwrap();
    drop(instance);
    assert!(session.close().is_ok());

    assert!(matches!(
        session.call_method(&proxy, "ping", &[]),
        Err(BridgeError::GuestRuntimeFault { .. })
    ));
    assert!(!guest.is_initialized());
    assert!(log.lock().is_empty());
}
