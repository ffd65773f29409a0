use decoder::ErrorKind;

use crate::{Decoder, Instruction};

mod avx512;
mod mov_special;

fn decodes(decoder: &Decoder, bytes: &[u8]) -> Instruction {
    match decoder.decode_slice(bytes) {
        Ok(inst) => inst,
        Err(e) => panic!("{:02x?} did not decode: {:?}", bytes, e),
    }
}

fn rejects(decoder: &Decoder, bytes: &[u8], kind: ErrorKind) {
    match decoder.decode_slice(bytes) {
        Ok(inst) => panic!("{:02x?} decoded to {:?}, expected {:?}", bytes, inst.code(), kind),
        Err(e) => assert_eq!(e.kind, kind, "wrong error for {:02x?}", bytes),
    }
}
