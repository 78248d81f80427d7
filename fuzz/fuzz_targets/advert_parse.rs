//! Fuzz target for advert sub-payload parsing.
//!
//! Every flagged optional field is bounds-checked; malformed adverts must
//! fail cleanly without touching the outer frame.

#![no_main]

use libfuzzer_sys::fuzz_target;

use embermesh_proto::Advert;

fuzz_target!(|data: &[u8]| {
    let _ = Advert::parse(data);
});
