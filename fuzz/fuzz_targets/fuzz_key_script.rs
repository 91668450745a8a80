#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(keys) = tank_ui::parse_key_script(data) {
        // one poll per accepted token character at most
        assert!(keys.len() <= data.len());
    }
});
