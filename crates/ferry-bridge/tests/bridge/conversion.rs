//! Value Converter tests

use super::harness::*;
use ferry_bridge::BridgeError;
use ferry_guest::GuestKind;
use ferry_host::HostValue;

#[test]
fn test_round_trip_supported_values() {
    let (_host, session) = open("conv_round_trip");
    let values = [
        HostValue::Nil,
        HostValue::from(""),
        HostValue::from("héllo wörld"),
        HostValue::array(vec![]),
        strings(&["a", "b", "c"]),
        HostValue::array(vec![
            HostValue::Nil,
            HostValue::from("x"),
            HostValue::array(vec![HostValue::array(vec![HostValue::from("deep")])]),
        ]),
    ];

    for value in &values {
        let guest = session.to_guest(value).unwrap();
        let back = session.to_host(&guest).unwrap();
        assert_eq!(&back, value);
    }

    assert!(session.close().is_ok());
}

#[test]
fn test_sequence_becomes_tuple_in_order() {
    let (_host, session) = open("conv_tuple_order");
    {
        let guest = session.to_guest(&strings(&["first", "second"])).unwrap();
        assert_eq!(guest.kind(), Some(GuestKind::Tuple));
        let items = guest.tuple_items().unwrap();
        assert_eq!(items[0].as_string().as_deref(), Some("first"));
        assert_eq!(items[1].as_string().as_deref(), Some("second"));

        let nil = session.to_guest(&HostValue::Nil).unwrap();
        assert!(nil.is_none());
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_unsupported_host_object() {
    let (host, session) = open("conv_unsupported_host");
    let (origin, _log) = recorder(&host, "Dictionary");

    let err = session.to_guest(&origin).unwrap_err();
    assert_eq!(
        err,
        BridgeError::UnsupportedHostType {
            class: "Dictionary".to_string()
        }
    );

    // Nested inside a sequence fails the same way, without leaking the
    // items converted before it.
    let nested = HostValue::array(vec![HostValue::from("ok"), origin]);
    assert!(matches!(
        session.to_guest(&nested),
        Err(BridgeError::UnsupportedHostType { .. })
    ));
    assert!(session.close().is_ok());
}

#[test]
fn test_unsupported_guest_type() {
    let (_host, session) = open("conv_unsupported_guest");
    {
        let int = session.guest().new_int(7).unwrap();
        assert_eq!(
            session.to_host(&int).unwrap_err(),
            BridgeError::UnsupportedGuestType {
                type_name: "int".to_string()
            }
        );

        let mixed = session
            .guest()
            .new_tuple(&[session.guest().new_str("s").unwrap(), int])
            .unwrap();
        assert!(matches!(
            session.to_host(&mixed),
            Err(BridgeError::UnsupportedGuestType { .. })
        ));
    }
    assert!(session.close().is_ok());
}

#[test]
fn test_deep_nesting_round_trips() {
    let (_host, session) = open("conv_deep_nesting");
    let deep = (0..70).fold(HostValue::from("core"), |inner, _| HostValue::array(vec![inner]));
    {
        let converted = session.to_guest(&deep).unwrap();
        assert_eq!(session.to_host(&converted).unwrap(), deep);
    }
    assert!(session.close().is_ok());
}
