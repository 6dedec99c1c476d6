//! Session open / close tests

use super::harness::*;
use ferry_bridge::{BridgeConfig, BridgeError, BridgeSession};
use ferry_guest::TeardownError;
use ferry_host::HostValue;

#[test]
fn test_open_without_inittab_entry_gets_registry_only() {
    let session = BridgeSession::open(host(), BridgeConfig::new("lifecycle_bare", false)).unwrap();
    assert!(session.is_open());
    {
        let module = session.module().unwrap();
        let guest = session.guest();
        assert!(guest.hasattr(&module, "store_object").unwrap());
        assert!(guest.hasattr(&module, "resolve_function").unwrap());
        assert!(!guest.hasattr(&module, "shout").unwrap());
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_open_registers_proxy_class_once() {
    let host = host();
    guest_module("lifecycle_proxy_class");
    let a = BridgeSession::open(host.clone(), BridgeConfig::new("lifecycle_proxy_class", false)).unwrap();
    let b = BridgeSession::open(host.clone(), BridgeConfig::new("lifecycle_proxy_class", false)).unwrap();

    let class = host.find_class("guestinstance").unwrap();
    assert!(std::sync::Arc::ptr_eq(&class, a.proxy_class()));
    assert!(std::sync::Arc::ptr_eq(&class, b.proxy_class()));
    assert!(a.close().is_ok());
    assert!(b.close().is_ok());
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = BridgeConfig::new("lifecycle_invalid", false);
    config.proxy_class = String::new();
    assert!(matches!(
        BridgeSession::open(host(), config),
        Err(BridgeError::Config(_))
    ));
}

#[test]
fn test_debug_session_enables_registry_tracing() {
    guest_module("lifecycle_debug");
    let session = BridgeSession::open(host(), BridgeConfig::new("lifecycle_debug", true)).unwrap();
    assert!(session.tracer().is_enabled());
    {
        let module = session.module().unwrap();
        let flag = session.guest().getattr(&module, "debug_enabled").unwrap();
        assert_eq!(flag.as_bool(), Some(true));
        assert_eq!(
            session.call_function("shout", Some(&HostValue::from("traced"))).unwrap(),
            Some(HostValue::from("TRACED"))
        );
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_close_is_idempotent() {
    let (_host, session) = open("lifecycle_idempotent");
    assert!(session.close().is_ok());
    assert!(!session.is_open());
    assert!(session.close().is_ok());
    assert_eq!(
        session.call_function("shout", Some(&HostValue::from("x"))),
        Err(BridgeError::NotInitialized)
    );
}

#[test]
fn test_close_reports_outstanding_references() {
    let (_host, session) = open("lifecycle_leak");
    let kept = session.guest().new_str("kept").unwrap();
    std::mem::forget(kept);
    assert_eq!(
        session.close(),
        Err(BridgeError::FinalizeFailure(TeardownError::Leaked(1)))
    );
    assert!(!session.is_open());
}

#[test]
fn test_callback_with_dropped_session_raises() {
    let (host, session) = open("lifecycle_dropped");
    let (origin, log) = recorder(&host, "DroppedImpl");
    session
        .define_class(&origin, "Dropped", "object", &["poke".to_string()])
        .unwrap();

    let guest = session.guest().clone();
    let module = session.module().unwrap();
    let ty = guest.getattr(&module, "Dropped").unwrap();
    let instance = guest.call(&ty, &[]).unwrap();
    drop(session);

    let err = guest.call_method(&instance, "poke", &[]).unwrap_err();
    assert_eq!(err.kind, "RuntimeError");
    assert!(err.message.contains("closed"));
    assert!(log.lock().is_empty());
}
