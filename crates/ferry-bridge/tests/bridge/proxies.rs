//! Opaque Reference Proxy tests

use super::harness::*;
use ferry_bridge::{proxy, BridgeError};
use ferry_host::{reflect, HostValue};

#[test]
fn test_proxy_preserves_identity() {
    let (host, session) = open("proxies_identity");
    {
        let guest = session.guest();
        let value = guest.new_int(7).unwrap();

        let p = session.to_host_or_proxy(&value).unwrap();
        assert!(reflect::is_instance_of_class(host.as_ref(), &p, "GuestInstance"));
        assert!(!reflect::is_string(&p));

        let back = session.to_guest(&p).unwrap();
        assert!(back.is(&value));

        // Proxies inside a sequence are dereferenced too.
        let wrapped = session
            .to_guest(&HostValue::array(vec![p.clone(), HostValue::from("s")]))
            .unwrap();
        assert!(wrapped.tuple_items().unwrap()[0].is(&value));
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_same_object_same_key() {
    let (host, session) = open("proxies_same_key");
    {
        let value = session.guest().new_int(1).unwrap();
        let other = session.guest().new_int(1).unwrap();

        let a = session.make_proxy(&value).unwrap();
        let b = session.make_proxy(&value).unwrap();
        let c = session.make_proxy(&other).unwrap();

        let key = |p: &HostValue| proxy::opaque_ref(p).unwrap().key().clone();
        assert_eq!(key(&a), key(&b));
        assert_ne!(key(&a), key(&c));
        assert_eq!(key(&a).as_str(), value.id().to_string());

        let identity = host.send(&a, "identity", &[]).unwrap();
        assert_eq!(identity.as_str(), Some(key(&a).as_str()));
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_proxy_string_and_method_calls() {
    let (host, session) = open("proxies_methods");
    {
        let guest = session.guest();
        let describe = guest
            .new_function("describe", None, |call| {
                let rt = call.runtime();
                let suffix = call.str_arg(1)?;
                rt.new_str(&format!("counter {}", suffix))
            })
            .unwrap();
        let value = guest
            .new_function("value", None, |call| call.runtime().new_int(42))
            .unwrap();
        let ty = guest
            .new_type(
                "Counter",
                &[],
                &[("describe".to_string(), describe), ("value".to_string(), value)],
            )
            .unwrap();
        let counter = guest.call(&ty, &[]).unwrap();
        let p = session.make_proxy(&counter).unwrap();

        // Convertible results come back as Host values...
        let described = session
            .call_method(&p, "DESCRIBE", &[HostValue::from("#1")])
            .unwrap();
        assert_eq!(described, HostValue::from("counter #1"));

        // ...others as new proxies.
        let v = session.call_method(&p, "value", &[]).unwrap();
        assert!(proxy::opaque_ref(&v).is_some());
        assert_eq!(session.string_value(&v).unwrap(), "42");
        let text = host.send(&v, "string", &[]).unwrap();
        assert_eq!(text, HostValue::from("42"));

        let err = session.call_method(&p, "missing", &[]).unwrap_err();
        assert_eq!(err, BridgeError::FunctionNotFound("Counter.missing".to_string()));
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_non_proxy_rejected_by_proxy_operations() {
    let (_host, session) = open("proxies_non_proxy");
    let err = session.string_value(&HostValue::from("plain")).unwrap_err();
    assert_eq!(
        err,
        BridgeError::UnsupportedHostType {
            class: "String".to_string()
        }
    );
    assert!(session.close().is_ok());
}

#[test]
fn test_proxy_from_another_session_is_rejected() {
    let (_host_a, a) = open("proxies_session_a");
    let (_host_b, b) = open("proxies_session_b");
    {
        let value = a.guest().new_str("from a").unwrap();
        let p = a.make_proxy(&value).unwrap();
        assert!(matches!(
            b.to_guest(&p),
            Err(BridgeError::UnsupportedHostType { .. })
        ));
    }
    assert!(a.close().is_ok());
    assert!(b.close().is_ok());
}

#[test]
fn test_proxy_attribute_read_and_assignment() {
    let (host, session) = open("proxies_attributes");
    {
        let guest = session.guest();
        let ty = guest.new_type("Holder", &[], &[]).unwrap();
        let holder = guest.call(&ty, &[]).unwrap();
        guest
            .setattr(&holder, "label", &guest.new_str("hello").unwrap())
            .unwrap();
        let p = session.make_proxy(&holder).unwrap();

        // A plain attribute is answered, not called.
        assert_eq!(session.call_method(&p, "label", &[]).unwrap(), HostValue::from("hello"));
        assert_eq!(host.send(&p, "LABEL", &[]).unwrap(), HostValue::from("hello"));

        // `name=` assigns the first argument and answers it.
        assert_eq!(
            session.call_method(&p, "label=", &[HostValue::from("bye")]).unwrap(),
            HostValue::from("bye")
        );
        assert_eq!(
            guest.getattr(&holder, "label").unwrap().as_string().as_deref(),
            Some("bye")
        );

        // Assignment through the Host keeps the existing attribute's spelling.
        host.send(&p, "Label=", &[HostValue::from("again")]).unwrap();
        assert_eq!(
            guest.getattr(&holder, "label").unwrap().as_string().as_deref(),
            Some("again")
        );

        // A new attribute can be created the same way.
        session
            .call_method(&p, "size=", &[HostValue::array(vec!["a".into()])])
            .unwrap();
        assert_eq!(
            session.call_method(&p, "size", &[]).unwrap(),
            HostValue::array(vec!["a".into()])
        );

        assert!(matches!(
            session.call_method(&p, "label=", &[]),
            Err(BridgeError::GuestRuntimeFault { .. })
        ));
    }
    assert!(session.close().is_ok());
}
