//! Fuzz target for realm parsing and matching.
//!
//! Feeds arbitrary strings as realms, and checks that a parsed realm always
//! contains its own wildcard-free URL.

#![no_main]

use libfuzzer_sys::fuzz_target;
use openid_rp::Realm;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(realm) = Realm::parse(input) {
        let _ = realm.to_string();
        let _ = realm.is_secure();
        assert!(realm.contains(realm.no_wildcard_url()), "realm must contain itself: {realm}");
    }
});
