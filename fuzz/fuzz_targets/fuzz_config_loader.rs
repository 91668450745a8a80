#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary TOML must either parse and validate, or be rejected; never panic.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = tank_config::load_toml(data) {
        let _ = cfg.validate();
    }
});
