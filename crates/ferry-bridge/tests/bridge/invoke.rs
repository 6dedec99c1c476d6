//! Function Invoker tests

use super::harness::*;
use ferry_bridge::BridgeError;
use ferry_host::HostValue;

#[test]
fn test_scalar_argument_matches_one_element_sequence() {
    let (_host, session) = open("invoke_scalar");

    let scalar = session
        .call_function("shout", Some(&HostValue::from("hi")))
        .unwrap();
    let sequence = session
        .call_function("shout", Some(&strings(&["hi"])))
        .unwrap();

    assert_eq!(scalar, Some(HostValue::from("HI")));
    assert_eq!(scalar, sequence);
    assert!(session.close().is_ok());
}

#[test]
fn test_argument_spreading() {
    let (_host, session) = open("invoke_spreading");

    let count = |args: Option<&HostValue>| session.call_function("count", args).unwrap();
    assert_eq!(count(None), Some(HostValue::from("0")));
    assert_eq!(count(Some(&HostValue::Nil)), Some(HostValue::from("1")));
    assert_eq!(count(Some(&strings(&[]))), Some(HostValue::from("0")));
    assert_eq!(count(Some(&strings(&["a", "b", "c"]))), Some(HostValue::from("3")));
    assert_eq!(
        count(Some(&HostValue::array(vec![strings(&["a", "b"])]))),
        Some(HostValue::from("1"))
    );
    assert!(session.close().is_ok());
}

#[test]
fn test_nil_argument_is_passed_as_none() {
    let (_host, session) = open("invoke_nil_argument");
    assert_eq!(
        session.call_function("type_of", Some(&HostValue::Nil)).unwrap(),
        Some(HostValue::from("NoneType"))
    );
    assert_eq!(
        session.call_function("type_of", Some(&HostValue::array(vec![HostValue::Nil]))).unwrap(),
        Some(HostValue::from("NoneType"))
    );
    assert!(matches!(
        session.call_function("type_of", None),
        Err(BridgeError::GuestRuntimeFault { .. })
    ));
    assert!(session.close().is_ok());
}

#[test]
fn test_none_result_is_absent() {
    let (_host, session) = open("invoke_none_result");
    assert_eq!(session.call_function("nothing", None).unwrap(), None);
    assert!(session.close().is_ok());
}

#[test]
fn test_unknown_function() {
    let (_host, session) = open("invoke_unknown");

    let err = session.call_function("does_not_exist", None).unwrap_err();
    assert_eq!(err, BridgeError::FunctionNotFound("does_not_exist".to_string()));

    // Module globals that are not callable are not functions either.
    let err = session.call_function("registry", None).unwrap_err();
    assert_eq!(err, BridgeError::FunctionNotFound("registry".to_string()));
    assert!(session.close().is_ok());
}

#[test]
fn test_guest_exception_becomes_fault() {
    let (_host, session) = open("invoke_guest_fault");

    let err = session.call_function("fail", None).unwrap_err();
    assert_eq!(
        err,
        BridgeError::GuestRuntimeFault {
            kind: "ValueError".to_string(),
            message: "bad input".to_string(),
        }
    );

    let err = session
        .call_function("shout", Some(&strings(&["a", "b"])))
        .unwrap_err();
    assert!(matches!(err, BridgeError::GuestRuntimeFault { ref kind, .. } if kind == "TypeError"));
    assert!(session.close().is_ok());
}

#[test]
fn test_unsupported_result_releases_references() {
    let (_host, session) = open("invoke_unsupported_result");
    let before = session.guest().live_objects();

    for _ in 0..10 {
        let err = session
            .call_function("number", Some(&strings(&["ignored", "args"])))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::UnsupportedGuestType {
                type_name: "int".to_string()
            }
        );
    }

    assert_eq!(session.guest().live_objects(), before);
    assert!(session.close().is_ok());
}

#[test]
fn test_every_path_is_balanced() {
    let (host, session) = open("invoke_balanced");
    let (origin, _log) = recorder(&host, "Unconvertible");
    let before = session.guest().live_objects();

    let _ = session.call_function("shout", Some(&HostValue::from("x")));
    let _ = session.call_function("fail", Some(&strings(&["a"])));
    let _ = session.call_function("missing", Some(&strings(&["a"])));
    let _ = session.call_function("shout", Some(&HostValue::array(vec![origin])));

    assert_eq!(session.guest().live_objects(), before);
    assert!(session.close().is_ok());
}
