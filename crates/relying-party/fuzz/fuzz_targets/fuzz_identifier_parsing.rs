//! Fuzz target for user-supplied identifier parsing.
//!
//! Every input must either parse or produce `InvalidIdentifier`; parsing
//! must never panic. A successfully parsed identifier must re-parse to
//! itself from its display form.

#![no_main]

use libfuzzer_sys::fuzz_target;
use openid_rp::{Identifier, RelyingPartyError};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    match Identifier::parse(input) {
        Ok(identifier) => {
            let _ = identifier.is_secure();
            let reparsed = Identifier::parse(&identifier.to_string())
                .expect("normalized identifier must parse");
            assert_eq!(reparsed, identifier);
        },
        Err(RelyingPartyError::InvalidIdentifier { .. }) => {},
        Err(other) => panic!("unexpected error kind: {other:?}"),
    }
});
