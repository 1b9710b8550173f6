#![no_main]

use fheguess::transport::JsonRpcResponse;
use fheguess::types::{Log, TxReceipt};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = serde_json::from_slice::<JsonRpcResponse>(data) {
        if let Ok(result) = response.into_result() {
            let _ = serde_json::from_value::<Option<TxReceipt>>(result.clone());
            let _ = serde_json::from_value::<Vec<Log>>(result);
        }
    }
});
