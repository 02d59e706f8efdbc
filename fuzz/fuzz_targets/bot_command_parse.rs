#![no_main]

use fleet_bot::{parse_bot_command, parse_vehicle_ordinal, BotCommand};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    let is_slash = raw.trim_start().starts_with('/');
    match parse_bot_command(&raw) {
        Some(BotCommand::Usage(usage)) => assert!(usage.starts_with("Usage: /")),
        Some(BotCommand::Unknown { keyword }) => assert!(keyword.starts_with('/')),
        Some(_) => assert!(is_slash),
        None => {}
    }

    for vehicle_count in 0..4 {
        if let Some(index) = parse_vehicle_ordinal(&raw, vehicle_count) {
            assert!(index < vehicle_count);
        }
    }
});
