//! Lives in its own test binary: `EventLogger::init` installs the
//! process-global subscriber, which would collide with `#[traced_test]`
//! in the unit tests.

use sixsim_telemetry::EventLogger;

#[test]
fn init_twice_is_harmless() {
    EventLogger::init("warn");
    EventLogger::init("debug");
}
