use decoder::ErrorKind;

use super::{decodes, rejects};
use crate::{Code, Decoder, MemorySize, OpKind, RegSpec, RoundingControl};

#[test]
fn vmovaps_lengths() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x08, 0x28, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vmovaps_xmm_k1z_xmmm128);
    assert_eq!(inst.len(), 6);
    assert_eq!(inst.op_register(0), Some(RegSpec::xmm(2)));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(3)));
    assert_eq!(inst.op_mask(), None);
    assert!(!inst.zeroing_masking());

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x28, 0x28, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vmovaps_ymm_k1z_ymmm256);
    assert_eq!(inst.op_register(0), Some(RegSpec::ymm(2)));

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x48, 0x28, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vmovaps_zmm_k1z_zmmm512);
    assert_eq!(inst.op_register(0), Some(RegSpec::zmm(2)));
}

#[test]
fn vmovaps_masking() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x8b, 0x28, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vmovaps_xmm_k1z_xmmm128);
    assert_eq!(inst.op_mask(), Some(RegSpec::mask(3)));
    assert!(inst.zeroing_masking());

    // zeroing without a mask register is malformed
    rejects(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x88, 0x28, 0xd3], ErrorKind::InvalidOperand);
}

#[test]
fn vmovaps_compressed_displacement() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x08, 0x28, 0x50, 0x01]);
    assert_eq!(inst.op_kind(1), Some(OpKind::Memory));
    assert_eq!(inst.memory_base(), Some(RegSpec::eax()));
    assert_eq!(inst.memory_scale(), 1);
    assert_eq!(inst.memory_displacement(), 16);
    assert_eq!(inst.memory_displ_size(), 1);
    assert_eq!(inst.memory_size(), MemorySize::Packed128_Float32);

    // the stored byte scales by the full vector width
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x48, 0x28, 0x50, 0x01]);
    assert_eq!(inst.memory_displacement(), 64);
    assert_eq!(inst.memory_size(), MemorySize::Packed512_Float32);

    // a negative compressed disp8 under 16-bit addressing reports 16 bits, not 32
    let inst = decodes(&Decoder::real(), &[0x62, 0xf1, 0x7c, 0x08, 0x28, 0x48, 0xff]);
    assert_eq!(inst.memory_base(), Some(RegSpec::bx()));
    assert_eq!(inst.memory_displacement(), 0xfff0);
    assert_eq!(inst.memory_displ_size(), 1);
}

#[test]
fn vmovapd_is_the_w1_form() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0xfd, 0x08, 0x28, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vmovapd_xmm_k1z_xmmm128);

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0xfd, 0x28, 0x29, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vmovapd_ymmm256_k1z_ymm);
    assert_eq!(inst.op_register(0), Some(RegSpec::ymm(3)));
    assert_eq!(inst.op_register(1), Some(RegSpec::ymm(2)));

    // w1 with the ps prefix selection does not exist
    rejects(&Decoder::protected(), &[0x62, 0xf1, 0xfc, 0x08, 0x28, 0xd3], ErrorKind::InvalidOpcode);
}

#[test]
fn vmovaps_rejects_broadcast_and_ll_11() {
    rejects(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x18, 0x28, 0xd3], ErrorKind::InvalidOperand);
    rejects(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x68, 0x28, 0xd3], ErrorKind::InvalidOperand);
}

#[test]
fn high_registers_in_long_mode() {
    // evex.r' lifts the destination into the 16-31 range, evex.x the rm register
    let inst = decodes(&Decoder::long(), &[0x62, 0x31, 0x7c, 0x8b, 0x28, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vmovaps_xmm_k1z_xmmm128);
    assert_eq!(inst.op_register(0), Some(RegSpec::xmm(10)));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(19)));
    assert_eq!(inst.op_mask(), Some(RegSpec::mask(3)));
    assert!(inst.zeroing_masking());
}

#[test]
fn vcvtsi2ss_rounding() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x4e, 0x08, 0x2a, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vcvtsi2ss_xmm_xmm_rm32_er);
    assert_eq!(inst.op_count(), 3);
    assert_eq!(inst.op_register(0), Some(RegSpec::xmm(2)));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(6)));
    assert_eq!(inst.op_register(2), Some(RegSpec::ebx()));
    assert_eq!(inst.rounding_control(), None);

    for (p3, rc) in [
        (0x18, RoundingControl::Nearest),
        (0x38, RoundingControl::Down),
        (0x58, RoundingControl::Up),
        (0x78, RoundingControl::Zero),
    ] {
        let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x4e, p3, 0x2a, 0xd3]);
        assert_eq!(inst.code(), Code::EVEX_Vcvtsi2ss_xmm_xmm_rm32_er);
        assert_eq!(inst.rounding_control(), Some(rc));
    }
}

#[test]
fn vcvtsi2sd_w0_has_no_rounding() {
    // the broadcast bit is accepted and ignored on this one
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x4f, 0x18, 0x2a, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vcvtsi2sd_xmm_xmm_rm32);
    assert_eq!(inst.rounding_control(), None);

    let inst = decodes(&Decoder::long(), &[0x62, 0xf1, 0xcf, 0x18, 0x2a, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vcvtsi2sd_xmm_xmm_rm64_er);
    assert_eq!(inst.op_register(2), Some(RegSpec::rbx()));
    assert_eq!(inst.rounding_control(), Some(RoundingControl::Nearest));
}

#[test]
fn vcvtsi2ss_memory_is_a_scalar_tuple() {
    // vector-length bits are ignored for the scalar tuple; displacement scales by the element
    for p3 in [0x08, 0x28, 0x48, 0x68] {
        let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x4e, p3, 0x2a, 0x50, 0x01]);
        assert_eq!(inst.code(), Code::EVEX_Vcvtsi2ss_xmm_xmm_rm32_er);
        assert_eq!(inst.memory_size(), MemorySize::Int32);
        assert_eq!(inst.memory_displacement(), 4);
        assert_eq!(inst.memory_displ_size(), 1);
    }
}

#[test]
fn masking_is_rejected_where_unsupported() {
    rejects(&Decoder::protected(), &[0x62, 0xf1, 0x4e, 0x0b, 0x2a, 0xd3], ErrorKind::InvalidOperand);
    rejects(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x0b, 0x2e, 0xd3], ErrorKind::InvalidOperand);
    rejects(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x0b, 0x2b, 0x50, 0x01], ErrorKind::InvalidOperand);
}

#[test]
fn vmovnt() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x08, 0x2b, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vmovntps_m128_xmm);
    assert_eq!(inst.op_kind(0), Some(OpKind::Memory));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(2)));
    assert_eq!(inst.memory_displacement(), 16);

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0xfd, 0x48, 0x2b, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vmovntpd_m512_zmm);
    assert_eq!(inst.memory_displacement(), 64);
    assert_eq!(inst.memory_size(), MemorySize::Packed512_Float64);

    rejects(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x08, 0x2b, 0xd3], ErrorKind::InvalidOperand);
}

#[test]
fn vcvtss2si_rounding_and_vcvttss2si_sae() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7e, 0x18, 0x2d, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vcvtss2si_r32_xmmm32_er);
    assert_eq!(inst.op_register(0), Some(RegSpec::edx()));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(3)));
    assert_eq!(inst.rounding_control(), Some(RoundingControl::Nearest));

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7e, 0x58, 0x2d, 0xd3]);
    assert_eq!(inst.rounding_control(), Some(RoundingControl::Up));

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7e, 0x18, 0x2c, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vcvttss2si_r32_xmmm32_sae);
    assert!(inst.suppress_all_exceptions());
    assert_eq!(inst.rounding_control(), None);

    let inst = decodes(&Decoder::long(), &[0x62, 0xf1, 0xff, 0x08, 0x2c, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vcvttsd2si_r64_xmmm64_sae);
    assert_eq!(inst.op_register(0), Some(RegSpec::rdx()));
    assert!(!inst.suppress_all_exceptions());
}

#[test]
fn vucomiss_sae() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x08, 0x2e, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vucomiss_xmm_xmmm32_sae);
    assert!(!inst.suppress_all_exceptions());

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x18, 0x2e, 0xd3]);
    assert!(inst.suppress_all_exceptions());

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0xfd, 0x18, 0x2f, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vcomisd_xmm_xmmm64_sae);
    assert!(inst.suppress_all_exceptions());

    // memory forms scale by the element width
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf1, 0x7c, 0x08, 0x2e, 0x50, 0x01]);
    assert_eq!(inst.memory_size(), MemorySize::Float32);
    assert_eq!(inst.memory_displacement(), 4);
}

#[test]
fn vpmulld() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0x4d, 0x0b, 0x40, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vpmulld_VX_k1z_HX_WX_b);
    assert_eq!(inst.len(), 7);
    assert_eq!(inst.op_register(0), Some(RegSpec::xmm(2)));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(6)));
    assert_eq!(inst.op_kind(2), Some(OpKind::Memory));
    assert_eq!(inst.op_mask(), Some(RegSpec::mask(3)));
    assert_eq!(inst.memory_size(), MemorySize::Packed128_Int32);
    assert_eq!(inst.memory_displacement(), 16);
    assert_eq!(inst.memory_scale(), 0);
}

#[test]
fn vpmulld_broadcast() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0x4d, 0x9d, 0x40, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vpmulld_VX_k1z_HX_WX_b);
    assert_eq!(inst.op_mask(), Some(RegSpec::mask(5)));
    assert!(inst.zeroing_masking());
    assert_eq!(inst.memory_size(), MemorySize::Broadcast128_Int32);
    // broadcast scales the displacement by the element, not the vector
    assert_eq!(inst.memory_displacement(), 4);

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0xcd, 0x9d, 0x40, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vpmullq_VX_k1z_HX_WX_b);
    assert_eq!(inst.memory_size(), MemorySize::Broadcast128_Int64);
    assert_eq!(inst.memory_displacement(), 8);
}

#[test]
fn vpmulld_high_registers() {
    let inst = decodes(&Decoder::long(), &[0x62, 0xe2, 0x0d, 0x0b, 0x40, 0xd3]);
    assert_eq!(inst.op_register(0), Some(RegSpec::xmm(18)));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(14)));
    assert_eq!(inst.op_register(2), Some(RegSpec::xmm(3)));
    assert_eq!(inst.op_mask(), Some(RegSpec::mask(3)));

    let inst = decodes(&Decoder::long(), &[0x62, 0x12, 0x4d, 0x03, 0x40, 0xd3]);
    assert_eq!(inst.op_register(0), Some(RegSpec::xmm(10)));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(22)));
    assert_eq!(inst.op_register(2), Some(RegSpec::xmm(27)));
}

#[test]
fn vpmulld_broadcast_on_register_is_rejected() {
    rejects(&Decoder::protected(), &[0x62, 0xf2, 0x4d, 0x1b, 0x40, 0xd3], ErrorKind::InvalidOperand);
}

#[test]
fn vgetexp_packed() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0x7d, 0x0b, 0x42, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vgetexpps_VX_k1z_WX_b);
    assert_eq!(inst.op_register(0), Some(RegSpec::xmm(2)));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(3)));
    assert_eq!(inst.op_mask(), Some(RegSpec::mask(3)));

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0x7d, 0x48, 0x42, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vgetexpps_VZ_k1z_WZ_sae_b);
    assert_eq!(inst.memory_size(), MemorySize::Packed512_Float32);
    assert_eq!(inst.memory_displacement(), 64);

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0xfd, 0xdb, 0x42, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vgetexppd_VZ_k1z_WZ_sae_b);
    assert_eq!(inst.memory_size(), MemorySize::Broadcast512_Float64);
    assert_eq!(inst.memory_displacement(), 8);
    assert!(inst.zeroing_masking());
}

#[test]
fn vgetexp_sae_overrides_the_length_bits() {
    // the broadcast bit on a register form requests sae and forces the 512-bit entry, whatever
    // L'L says
    for p3 in [0x1b, 0x3b, 0x5b, 0x7b] {
        let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0x7d, p3, 0x42, 0xd3]);
        assert_eq!(inst.code(), Code::EVEX_Vgetexpps_VZ_k1z_WZ_sae_b);
        assert_eq!(inst.op_register(0), Some(RegSpec::zmm(2)));
        assert_eq!(inst.op_register(1), Some(RegSpec::zmm(3)));
        assert!(inst.suppress_all_exceptions());
        assert_eq!(inst.rounding_control(), None);
    }
}

#[test]
fn vgetexpss() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0x4d, 0x0b, 0x43, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vgetexpss_VX_k1z_HX_WX_sae);
    assert_eq!(inst.op_register(0), Some(RegSpec::xmm(2)));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(6)));
    assert_eq!(inst.memory_size(), MemorySize::Float32);
    assert_eq!(inst.memory_displacement(), 4);
    assert_eq!(inst.op_mask(), Some(RegSpec::mask(3)));

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0xcd, 0x1b, 0x43, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vgetexpsd_VX_k1z_HX_WX_sae);
    assert!(inst.suppress_all_exceptions());
}

#[test]
fn vplzcnt() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0x7d, 0x0b, 0x44, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vplzcntd_VX_k1z_WX_b);
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(3)));

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0xfd, 0x5b, 0x44, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vplzcntq_VZ_k1z_WZ_b);
    assert_eq!(inst.memory_size(), MemorySize::Broadcast512_UInt64);
    assert_eq!(inst.memory_displacement(), 8);

    // no sae form exists, so broadcast on a register form is malformed
    rejects(&Decoder::protected(), &[0x62, 0xf2, 0x7d, 0x1b, 0x44, 0xd3], ErrorKind::InvalidOperand);
}

#[test]
fn variable_shifts() {
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0x4d, 0x0b, 0x45, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vpsrlvd_VX_k1z_HX_WX_b);
    assert_eq!(inst.op_register(0), Some(RegSpec::xmm(2)));
    assert_eq!(inst.op_register(1), Some(RegSpec::xmm(6)));
    assert_eq!(inst.op_register(2), Some(RegSpec::xmm(3)));

    // unlike its vex ancestor, vpsrav does have a w1 form
    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0xcd, 0x2b, 0x46, 0xd3]);
    assert_eq!(inst.code(), Code::EVEX_Vpsravq_VY_k1z_HY_WY_b);

    let inst = decodes(&Decoder::protected(), &[0x62, 0xf2, 0x4d, 0x4b, 0x47, 0x50, 0x01]);
    assert_eq!(inst.code(), Code::EVEX_Vpsllvd_VZ_k1z_HZ_WZ_b);
    assert_eq!(inst.memory_size(), MemorySize::Packed512_UInt32);
    assert_eq!(inst.memory_displacement(), 64);
    assert_eq!(inst.memory_scale(), 0);
}

#[test]
fn reserved_bits_must_hold() {
    // bits 2-3 of the first payload byte
    rejects(&Decoder::long(), &[0x62, 0xf5, 0x7c, 0x08, 0x28, 0xd3], ErrorKind::InvalidOpcode);
    rejects(&Decoder::long(), &[0x62, 0xf9, 0x7c, 0x08, 0x28, 0xd3], ErrorKind::InvalidOpcode);
    // bit 2 of the second payload byte
    rejects(&Decoder::long(), &[0x62, 0xf1, 0x78, 0x08, 0x28, 0xd3], ErrorKind::InvalidOpcode);
}

#[test]
fn evex_is_bound_outside_long_mode() {
    // the first payload byte doubles as modrm for `bound`; top bits below 11 leave evex space
    rejects(&Decoder::protected(), &[0x62, 0x31, 0x7c, 0x08, 0x28, 0xd3], ErrorKind::InvalidOpcode);
}

#[test]
fn prefixes_conflicting_with_evex() {
    rejects(&Decoder::protected(), &[0x66, 0x62, 0xf1, 0x7c, 0x08, 0x28, 0xd3], ErrorKind::InvalidPrefixes);
    rejects(&Decoder::protected(), &[0xf3, 0x62, 0xf1, 0x7c, 0x08, 0x28, 0xd3], ErrorKind::InvalidPrefixes);
    rejects(&Decoder::long(), &[0x48, 0x62, 0xf1, 0x7c, 0x08, 0x28, 0xd3], ErrorKind::InvalidPrefixes);
}

#[test]
fn segment_overrides_pass_through_evex() {
    let inst = decodes(&Decoder::protected(), &[0x65, 0x62, 0xf1, 0x7c, 0x08, 0x28, 0x50, 0x01]);
    assert_eq!(inst.memory_segment(), crate::Segment::GS);
    assert_eq!(inst.len(), 8);
}
