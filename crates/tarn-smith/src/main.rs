//! Print one generated program, for eyeballing the generator or seeding
//! a corpus: `tarn-smith [seed]`.

use arbitrary::{Arbitrary, Unstructured};
use tarn_smith::Program;

fn pseudo_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        out.push(state as u8);
    }
    out
}

fn main() {
    let seed: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let data = pseudo_bytes(seed, 4096);
    let mut u = Unstructured::new(&data);
    match Program::arbitrary(&mut u) {
        Ok(program) => print!("{}", program.to_source()),
        Err(e) => eprintln!("generation failed: {e}"),
    }
}
