#![no_main]

use libfuzzer_sys::fuzz_target;
use logship_core::config::parse_window;

fuzz_target!(|text: &str| {
    // 인식 불가 텍스트는 1일로 대체된다 — 패닉이나 오버플로가 없어야 한다
    let _ = parse_window(text);
});
