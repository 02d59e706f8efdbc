#![no_main]

use fleet_bot::{CommandSessions, SessionStep};
use libfuzzer_sys::fuzz_target;

const VEHICLE_COUNT: usize = 2;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let mut sessions = CommandSessions::new();

    for line in raw.lines().take(64) {
        let awaiting = sessions.pending_action(7).is_some();
        let step = sessions.step(7, line, VEHICLE_COUNT);
        match step {
            SessionStep::Dispatch { vehicle_index, .. } => {
                assert!(vehicle_index < VEHICLE_COUNT);
                assert!(sessions.pending_action(7).is_none());
            }
            SessionStep::Prompt { .. } => assert!(sessions.pending_action(7).is_some()),
            SessionStep::Reprompt { .. } => assert!(awaiting),
            SessionStep::Status | SessionStep::Help => {
                assert_eq!(awaiting, sessions.pending_action(7).is_some());
            }
            _ => {}
        }
        assert!(sessions.len() <= 1);
    }
});
