use decoder::ErrorKind;

use super::{decodes, rejects};
use crate::{Code, Decoder, OpKind, RegSpec};

#[test]
fn mov_from_cr_long() {
    let inst = decodes(&Decoder::long(), &[0x0f, 0x20, 0xde]);
    assert_eq!(inst.code(), Code::Mov_Rq_Cq);
    assert_eq!(inst.len(), 3);
    assert_eq!(inst.op_count(), 2);
    assert_eq!(inst.op_kind(0), Some(OpKind::Register));
    assert_eq!(inst.op_register(0), Some(RegSpec::rsi()));
    assert_eq!(inst.op_register(1), Some(RegSpec::cr(3)));
}

#[test]
fn mov_from_cr_protected() {
    let inst = decodes(&Decoder::protected(), &[0x0f, 0x20, 0xde]);
    assert_eq!(inst.code(), Code::Mov_Rd_Cd);
    assert_eq!(inst.op_register(0), Some(RegSpec::esi()));
    assert_eq!(inst.op_register(1), Some(RegSpec::cr(3)));
}

#[test]
fn mov_to_cr() {
    let inst = decodes(&Decoder::long(), &[0x0f, 0x22, 0xde]);
    assert_eq!(inst.code(), Code::Mov_Cq_Rq);
    assert_eq!(inst.op_register(0), Some(RegSpec::cr(3)));
    assert_eq!(inst.op_register(1), Some(RegSpec::rsi()));
}

// the modrm mod field does not matter for these; 0x1e encodes the same operands as 0xde
#[test]
fn mod_bits_are_ignored() {
    let inst = decodes(&Decoder::long(), &[0x0f, 0x20, 0x1e]);
    assert_eq!(inst.code(), Code::Mov_Rq_Cq);
    assert_eq!(inst.op_register(0), Some(RegSpec::rsi()));
    assert_eq!(inst.op_register(1), Some(RegSpec::cr(3)));
}

#[test]
fn lock_selects_cr8() {
    let inst = decodes(&Decoder::protected(), &[0xf0, 0x0f, 0x20, 0xde]);
    assert_eq!(inst.code(), Code::Mov_Rd_Cd);
    assert_eq!(inst.op_register(1), Some(RegSpec::cr(11)));
    assert!(!inst.prefixes.lock());

    let inst = decodes(&Decoder::long(), &[0xf0, 0x0f, 0x22, 0xde]);
    assert_eq!(inst.op_register(0), Some(RegSpec::cr(11)));
}

#[test]
fn rex_r_selects_high_cr() {
    let inst = decodes(&Decoder::long(), &[0x44, 0x0f, 0x20, 0xde]);
    assert_eq!(inst.op_register(0), Some(RegSpec::rsi()));
    assert_eq!(inst.op_register(1), Some(RegSpec::cr(11)));
}

#[test]
fn rex_b_extends_the_gpr() {
    let inst = decodes(&Decoder::long(), &[0x41, 0x0f, 0x20, 0xde]);
    assert_eq!(inst.op_register(0), Some(RegSpec::r14()));
    assert_eq!(inst.op_register(1), Some(RegSpec::cr(3)));
}

// only the rex byte immediately before the opcode takes effect
#[test]
fn earlier_rex_bytes_are_dead() {
    let inst = decodes(&Decoder::long(), &[0x41, 0x40, 0x0f, 0x20, 0xde]);
    assert_eq!(inst.op_register(0), Some(RegSpec::rsi()));
}

#[test]
fn mov_dr() {
    let inst = decodes(&Decoder::long(), &[0x0f, 0x21, 0xde]);
    assert_eq!(inst.code(), Code::Mov_Rq_Dq);
    assert_eq!(inst.op_register(0), Some(RegSpec::rsi()));
    assert_eq!(inst.op_register(1), Some(RegSpec::dr(3)));

    let inst = decodes(&Decoder::protected(), &[0x0f, 0x23, 0xde]);
    assert_eq!(inst.code(), Code::Mov_Dd_Rd);
    assert_eq!(inst.op_register(0), Some(RegSpec::dr(3)));
    assert_eq!(inst.op_register(1), Some(RegSpec::esi()));
}

#[test]
fn lock_on_dr_is_rejected() {
    rejects(&Decoder::long(), &[0xf0, 0x0f, 0x21, 0xde], ErrorKind::InvalidPrefixes);
    rejects(&Decoder::protected(), &[0xf0, 0x0f, 0x23, 0xde], ErrorKind::InvalidPrefixes);
}

#[test]
fn mov_tr_requires_the_flag() {
    rejects(&Decoder::protected(), &[0x0f, 0x24, 0xde], ErrorKind::InvalidOpcode);
    rejects(&Decoder::real(), &[0x0f, 0x26, 0xde], ErrorKind::InvalidOpcode);

    let inst = decodes(&Decoder::protected().with_mov_tr(), &[0x0f, 0x24, 0xde]);
    assert_eq!(inst.code(), Code::Mov_Rd_Td);
    assert_eq!(inst.op_register(0), Some(RegSpec::esi()));
    assert_eq!(inst.op_register(1), Some(RegSpec::tr(3)));

    let inst = decodes(&Decoder::real().with_mov_tr(), &[0x0f, 0x26, 0xde]);
    assert_eq!(inst.code(), Code::Mov_Td_Rd);
    assert_eq!(inst.op_register(0), Some(RegSpec::tr(3)));
}

#[test]
fn mov_tr_never_decodes_in_long_mode() {
    rejects(&Decoder::long().with_mov_tr(), &[0x0f, 0x24, 0xde], ErrorKind::InvalidOpcode);
    rejects(&Decoder::long().with_mov_tr(), &[0x0f, 0x26, 0xde], ErrorKind::InvalidOpcode);
}
