#![no_main]

use fheguess::contract::abi::{Decoder, decode_revert_reason};
use fheguess::contract::decode_log;
use fheguess::types::{Address, H256, Log};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decode_revert_reason(data);

    if let Ok(d) = Decoder::new(data, 6) {
        for i in 0..6 {
            let _ = d.bool(i);
            let _ = d.u8(i);
            let _ = d.u64(i);
            let _ = d.address(i);
        }
    }

    // Leading 32-byte chunks become topics, the rest is log data.
    let split = (data.first().copied().unwrap_or(0) as usize % 4).min(data.len() / 32);
    let topics = data
        .chunks_exact(32)
        .take(split)
        .map(|chunk| {
            let mut topic = [0u8; 32];
            topic.copy_from_slice(chunk);
            H256::new(topic)
        })
        .collect();
    let log = Log {
        address: Address::ZERO,
        topics,
        data: data[split * 32..].to_vec(),
        block_number: None,
    };
    let _ = decode_log(&log);
});
