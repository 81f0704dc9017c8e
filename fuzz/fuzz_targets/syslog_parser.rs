#![no_main]

use libfuzzer_sys::fuzz_target;
use logship_pipeline::parser;

fuzz_target!(|data: &[u8]| {
    // 파서는 전체 함수다 — 어떤 입력에도 크래시나 패닉이 없어야 한다
    let text = parser::decode(data);
    let _ = parser::parse(&text);
});
