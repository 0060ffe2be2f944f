#![no_main]

use libfuzzer_sys::fuzz_target;
use snapforge::image::SnapshotHeader;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = SnapshotHeader::parse(data) {
        let _ = header.verify(data);
    }
});
