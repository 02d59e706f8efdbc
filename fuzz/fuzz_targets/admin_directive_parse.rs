#![no_main]

use fleet_access::{normalize_handle, parse_admin_directive, AdminDirective};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    if let Some(AdminDirective::Add { handle }) = parse_admin_directive(&raw) {
        assert!(!handle.is_empty());
        assert!(!handle.starts_with('@'));
        assert_eq!(normalize_handle(&handle), handle);
    }
});
