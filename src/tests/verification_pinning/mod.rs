//! Pin policy tests, run directly against the installed verifier.
//!
//! Every case mints a fresh chain from a trusted test CA (or an unrelated one,
//! for chains that must fail standard validation), builds a [PinStore] from
//! the case's pins and asks the verifier installed by [TrustConfigurator] for
//! its verdict.

use super::{bare_client_config, verification_time, Issued, TestCa};
use crate::{
    Fingerprint, HostIdentity, PinStore, PinStoreHandle, TrustConfigurator, TrustDecision,
    TrustRejected,
};
use rustls::client::danger::{ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::ServerName;
use rustls::{CertificateError, Error as TlsError};
use std::sync::Arc;
use std::thread;

macro_rules! pinning_test_cases {
    { $( $name:ident => $test_case:expr ),+ , } => {
        $(
            #[test]
            fn $name() {
                run_pinning_case(&$test_case);
            }
        )+
    };
}

/// Which key a configured pin refers to.
#[derive(Clone, Copy)]
enum Pin {
    /// The key of the leaf the server presents.
    Presented,
    /// Some other key.
    Other,
}

/// Which CA issued the presented chain.
#[derive(Clone, Copy)]
enum Issuer {
    Trusted,
    Untrusted,
}

#[derive(Debug)]
enum Expected {
    Trusted,
    /// Rejected by the pin check, for the given normalized host.
    PinRejected(&'static str),
    /// Rejected by standard validation before pins are consulted.
    Invalid(CertificateError),
}

struct PinCase<'a> {
    /// The name of the server we're connecting to.
    reference_id: &'a str,

    /// The names the presented leaf certificate is valid for.
    leaf_names: &'a [&'a str],

    issuer: Issuer,

    pins: &'a [(&'a str, &'a [Pin])],

    expected: Expected,
}

const API_EXAMPLE_COM: &str = "api.example.com";
const OTHER_EXAMPLE_COM: &str = "other.example.com";

pinning_test_cases! {
    pinned_host_with_pinned_key => PinCase {
        reference_id: API_EXAMPLE_COM,
        leaf_names: &[API_EXAMPLE_COM],
        issuer: Issuer::Trusted,
        pins: &[(API_EXAMPLE_COM, &[Pin::Presented])],
        expected: Expected::Trusted,
    },
    pinned_host_with_backup_pin => PinCase {
        reference_id: API_EXAMPLE_COM,
        leaf_names: &[API_EXAMPLE_COM],
        issuer: Issuer::Trusted,
        pins: &[(API_EXAMPLE_COM, &[Pin::Other, Pin::Presented])],
        expected: Expected::Trusted,
    },
    // The chain is valid for a trusted CA, but the key isn't pinned.
    pinned_host_with_unpinned_key => PinCase {
        reference_id: API_EXAMPLE_COM,
        leaf_names: &[API_EXAMPLE_COM],
        issuer: Issuer::Trusted,
        pins: &[(API_EXAMPLE_COM, &[Pin::Other])],
        expected: Expected::PinRejected(API_EXAMPLE_COM),
    },
    pinned_host_mixed_case_reference => PinCase {
        reference_id: "API.Example.com",
        leaf_names: &[API_EXAMPLE_COM],
        issuer: Issuer::Trusted,
        pins: &[(API_EXAMPLE_COM, &[Pin::Other])],
        expected: Expected::PinRejected(API_EXAMPLE_COM),
    },
    pinned_in_mixed_case_config => PinCase {
        reference_id: API_EXAMPLE_COM,
        leaf_names: &[API_EXAMPLE_COM],
        issuer: Issuer::Trusted,
        pins: &[("Api.Example.COM.", &[Pin::Presented])],
        expected: Expected::Trusted,
    },
    // A matching pin never rescues a chain that fails standard validation.
    pinned_key_with_untrusted_chain => PinCase {
        reference_id: API_EXAMPLE_COM,
        leaf_names: &[API_EXAMPLE_COM],
        issuer: Issuer::Untrusted,
        pins: &[(API_EXAMPLE_COM, &[Pin::Presented])],
        expected: Expected::Invalid(CertificateError::UnknownIssuer),
    },
    unpinned_host_with_valid_chain => PinCase {
        reference_id: OTHER_EXAMPLE_COM,
        leaf_names: &[OTHER_EXAMPLE_COM],
        issuer: Issuer::Trusted,
        pins: &[(API_EXAMPLE_COM, &[Pin::Other])],
        expected: Expected::Trusted,
    },
    unpinned_host_with_untrusted_chain => PinCase {
        reference_id: OTHER_EXAMPLE_COM,
        leaf_names: &[OTHER_EXAMPLE_COM],
        issuer: Issuer::Untrusted,
        pins: &[(API_EXAMPLE_COM, &[Pin::Other])],
        expected: Expected::Invalid(CertificateError::UnknownIssuer),
    },
    // Pins for a parent domain don't extend to its subdomains.
    subdomain_of_pinned_host => PinCase {
        reference_id: "sub.example.com",
        leaf_names: &["sub.example.com"],
        issuer: Issuer::Trusted,
        pins: &[("example.com", &[Pin::Other])],
        expected: Expected::Trusted,
    },
    // Nor do pins for a subdomain extend to its parent.
    parent_of_pinned_host => PinCase {
        reference_id: "example.com",
        leaf_names: &["example.com"],
        issuer: Issuer::Trusted,
        pins: &[("sub.example.com", &[Pin::Other])],
        expected: Expected::Trusted,
    },
    no_pins_at_all => PinCase {
        reference_id: API_EXAMPLE_COM,
        leaf_names: &[API_EXAMPLE_COM],
        issuer: Issuer::Trusted,
        pins: &[],
        expected: Expected::Trusted,
    },
}

fn pin_store(case: &PinCase<'_>, issued: &Issued) -> PinStore {
    let other = Fingerprint::of_spki(b"some other public key");
    PinStore::new(case.pins.iter().map(|(host, pins)| {
        let pins = pins.iter().map(|pin| match pin {
            Pin::Presented => issued.fingerprint,
            Pin::Other => other,
        });
        (*host, pins.collect::<Vec<_>>())
    }))
    .unwrap()
}

fn run_pinning_case(case: &PinCase<'_>) {
    let trusted = TestCa::new("pinning test root");
    let untrusted = TestCa::new("unrelated test root");
    let issued = match case.issuer {
        Issuer::Trusted => trusted.issue(case.leaf_names),
        Issuer::Untrusted => untrusted.issue(case.leaf_names),
    };

    let configurator =
        TrustConfigurator::new(pin_store(case, &issued)).with_fallback_verifier(trusted.verifier());
    let mut config = bare_client_config();
    configurator.setup_client(&mut config);
    let verifier = configurator.verifier().expect("verifier installed by setup");

    let server_name = ServerName::try_from(case.reference_id).unwrap();
    let result = verifier.verify_server_cert(
        issued.end_entity(),
        issued.intermediates(),
        &server_name,
        &[],
        verification_time(),
    );

    match (&case.expected, result) {
        (Expected::Trusted, Ok(_)) => {}
        (
            Expected::PinRejected(host),
            Err(TlsError::InvalidCertificate(CertificateError::Other(other))),
        ) => {
            let rejected: &TrustRejected = other
                .0
                .downcast_ref()
                .expect("incorrect `Other` inner error kind");
            assert_eq!(rejected.host.as_str(), *host);
        }
        (Expected::Invalid(expected), Err(TlsError::InvalidCertificate(err))) => {
            assert_eq!(&err, expected);
        }
        (expected, result) => panic!("expected {expected:?}, got {result:?}"),
    }
}

#[test]
fn rejection_reports_presented_key() {
    let ca = TestCa::new("pinning test root");
    let issued = ca.issue(&[API_EXAMPLE_COM]);
    let pinned = Fingerprint::of_spki(b"the only pinned key");

    let configurator = TrustConfigurator::new(PinStore::new([(API_EXAMPLE_COM, [pinned])]).unwrap())
        .with_fallback_verifier(ca.verifier());
    let mut config = bare_client_config();
    configurator.setup_client(&mut config);

    let err = configurator
        .verifier()
        .unwrap()
        .verify_server_cert(
            issued.end_entity(),
            issued.intermediates(),
            &ServerName::try_from(API_EXAMPLE_COM).unwrap(),
            &[],
            verification_time(),
        )
        .unwrap_err();

    let TlsError::InvalidCertificate(CertificateError::Other(other)) = &err else {
        panic!("expected a pin rejection, got {err:?}");
    };
    let rejected = other.0.downcast_ref::<TrustRejected>().unwrap();
    assert_eq!(rejected.presented, issued.fingerprint);
    assert_eq!(rejected.host.as_str(), API_EXAMPLE_COM);
}

#[test]
fn setup_is_idempotent() {
    let ca = TestCa::new("pinning test root");
    let issued = ca.issue(&[API_EXAMPLE_COM]);

    let configurator =
        TrustConfigurator::new(PinStore::new([(API_EXAMPLE_COM, [issued.fingerprint])]).unwrap())
            .with_fallback_verifier(ca.verifier());
    let mut config = bare_client_config();

    configurator.setup_client(&mut config);
    let first = Arc::clone(configurator.verifier().unwrap());
    configurator.setup_client(&mut config);
    let second = configurator.verifier().unwrap();

    assert!(Arc::ptr_eq(&first, second));
    assert!(second
        .verify_server_cert(
            issued.end_entity(),
            issued.intermediates(),
            &ServerName::try_from(API_EXAMPLE_COM).unwrap(),
            &[],
            verification_time(),
        )
        .is_ok());
}

#[test]
fn rebuilding_after_setup_uses_new_fallback() {
    let first_ca = TestCa::new("first test root");
    let second_ca = TestCa::new("second test root");
    let issued = second_ca.issue(&[API_EXAMPLE_COM]);
    let server_name = ServerName::try_from(API_EXAMPLE_COM).unwrap();

    let configurator =
        TrustConfigurator::new(PinStore::new([(API_EXAMPLE_COM, [issued.fingerprint])]).unwrap())
            .with_fallback_verifier(first_ca.verifier());
    let mut config = bare_client_config();
    configurator.setup_client(&mut config);
    let result = configurator.verifier().unwrap().verify_server_cert(
        issued.end_entity(),
        issued.intermediates(),
        &server_name,
        &[],
        verification_time(),
    );
    assert_eq!(
        result.map(|_| ()),
        Err(TlsError::InvalidCertificate(CertificateError::UnknownIssuer))
    );

    let configurator = configurator.with_fallback_verifier(second_ca.verifier());
    configurator.setup_client(&mut config);
    configurator
        .verifier()
        .unwrap()
        .verify_server_cert(
            issued.end_entity(),
            issued.intermediates(),
            &server_name,
            &[],
            verification_time(),
        )
        .unwrap();
}

fn decision(result: Result<ServerCertVerified, TlsError>) -> TrustDecision {
    match result {
        Ok(_) => TrustDecision::Trusted,
        Err(TlsError::InvalidCertificate(CertificateError::Other(other)))
            if other.0.downcast_ref::<TrustRejected>().is_some() =>
        {
            TrustDecision::Rejected
        }
        Err(err) => panic!("unexpected verification error: {err:?}"),
    }
}

#[test]
fn parallel_checks_see_whole_stores_during_rotation() {
    let ca = TestCa::new("pinning test root");
    let old_key = ca.issue(&[API_EXAMPLE_COM]);
    let new_key = ca.issue(&[API_EXAMPLE_COM]);
    let pins_for = |issued: &Issued| PinStore::new([(API_EXAMPLE_COM, [issued.fingerprint])]).unwrap();
    let old_store = pins_for(&old_key);
    let new_store = pins_for(&new_key);

    let handle = Arc::new(PinStoreHandle::new(pins_for(&old_key)));
    let configurator = TrustConfigurator::with_rotating_pins(Arc::clone(&handle))
        .with_fallback_verifier(ca.verifier());
    let mut config = bare_client_config();
    configurator.setup_client(&mut config);
    let verifier = Arc::clone(configurator.verifier().unwrap());

    let host = HostIdentity::new(API_EXAMPLE_COM).unwrap();
    let server_name = ServerName::try_from(API_EXAMPLE_COM).unwrap();
    let check = |issued: &Issued| {
        decision(verifier.verify_server_cert(
            issued.end_entity(),
            issued.intermediates(),
            &server_name,
            &[],
            verification_time(),
        ))
    };

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..100 {
                    for issued in [&old_key, &new_key] {
                        let verdict = check(issued);
                        let allowed = [
                            old_store.decide(&host, &issued.fingerprint),
                            new_store.decide(&host, &issued.fingerprint),
                        ];
                        assert!(
                            allowed.contains(&Some(verdict)),
                            "{verdict:?} matches neither pin store"
                        );
                    }
                }
            });
        }

        scope.spawn(|| {
            for round in 0..50 {
                let next = if round % 2 == 0 { &new_key } else { &old_key };
                handle.replace(pins_for(next));
            }
            handle.replace(pins_for(&new_key));
        });
    });

    assert_eq!(check(&new_key), TrustDecision::Trusted);
    assert_eq!(check(&old_key), TrustDecision::Rejected);
}
