//! decoding `evex`-encoded instructions.
//!
//! the 4-byte prefix is split across [`crate::Prefixes`]: `r`/`x`/`b`/`w`/`l` land in the
//! synthetic `rex`, the `avx512` decorator bits (`z`, `L'`, `b`, `aaa`, `R'`) in
//! [`crate::PrefixEvex`]. `vvvv` and `V'` combine into a five-bit register stored before
//! dispatch. every covered form then decides what the decorator bits mean for it: broadcast and
//! compressed-displacement scaling on memory operands, rounding control or sae on register
//! forms, opmask/zeroing where the form allows masking.

use decoder::{ErrorKind, Reader};

use crate::{
    broadcast_size, packed_size, read_E, read_modrm_reg, require_no_vvvv, vector_bytes, vex_reg,
    Code, Decoder, Elem, Instruction, MemorySize, Mode, OperandSpec, RegSpec, RegisterBank,
    RoundingControl,
};

pub(crate) fn read(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
) -> Result<(), ErrorKind> {
    if crate::avx_prefix_conflict(instr) {
        return Err(ErrorKind::InvalidPrefixes);
    }
    let p0 = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    if decoder.mode != Mode::Long && p0 & 0xc0 != 0xc0 {
        // outside long mode `62` with top modrm bits clear is `bound`
        return Err(ErrorKind::InvalidOpcode);
    }
    if p0 & 0x0c != 0 {
        // bits 2 and 3 of the first payload byte are reserved and must be zero
        return Err(ErrorKind::InvalidOpcode);
    }
    let p1 = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    if p1 & 0x04 == 0 {
        // bit 2 of the second payload byte must be set
        return Err(ErrorKind::InvalidOpcode);
    }
    let p2 = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    instr.prefixes.evex_from(p0, p1, p2);

    // vvvv and V' arrive inverted; fold them into one five-bit register number
    let vp = ((p2 >> 3) & 1) << 4;
    let vvvvv = (((p1 >> 3) & 0b1111) | vp) ^ 0b11111;
    instr.regs[3] = RegSpec {
        num: vvvvv,
        bank: RegisterBank::X,
    };

    let pp = p1 & 0b11;
    let opcode = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    match p0 & 0b11 {
        0b01 => read_evex_0f(decoder, words, instr, opcode, pp),
        0b10 => read_evex_0f38(decoder, words, instr, opcode, pp),
        _ => Err(ErrorKind::InvalidOpcode),
    }
}

/// vector length from `L'L`. `11` is reserved for anything that is not embedded rounding.
fn vector_bank(instr: &Instruction) -> Result<RegisterBank, ErrorKind> {
    let l = instr.prefixes.vex_unchecked().l();
    let lp = instr.prefixes.evex_unchecked().lp();
    match (lp, l) {
        (false, false) => Ok(RegisterBank::X),
        (false, true) => Ok(RegisterBank::Y),
        (true, false) => Ok(RegisterBank::Z),
        (true, true) => Err(ErrorKind::InvalidOperand),
    }
}

/// apply the `aaa`/`z` decorator bits. forms without masking support require both clear.
fn apply_masking(instr: &mut Instruction, allowed: bool) -> Result<(), ErrorKind> {
    let evex = instr.prefixes.evex_unchecked();
    let aaa = evex.mask_reg();
    let z = evex.merge();
    if !allowed {
        if aaa != 0 || z {
            return Err(ErrorKind::InvalidOperand);
        }
        return Ok(());
    }
    if z && aaa == 0 {
        // zeroing requires a mask register
        return Err(ErrorKind::InvalidOperand);
    }
    if aaa != 0 {
        instr.op_mask = Some(RegSpec::mask(aaa));
    }
    instr.zeroing = z;
    Ok(())
}

/// embedded rounding mode from `L'L` when the broadcast bit selects it on a register form.
fn rounding(instr: &Instruction) -> RoundingControl {
    let l = instr.prefixes.vex_unchecked().l();
    let lp = instr.prefixes.evex_unchecked().lp();
    match (lp, l) {
        (false, false) => RoundingControl::Nearest,
        (false, true) => RoundingControl::Down,
        (true, false) => RoundingControl::Up,
        (true, true) => RoundingControl::Zero,
    }
}

/// resolve the rm operand of a full-tuple form: the broadcast bit on a memory operand switches
/// to the element-wide shape and scales the compressed displacement by the element width
/// instead of the full vector.
#[allow(non_snake_case)]
fn read_E_full(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    modrm: u8,
    bank: RegisterBank,
    elem: Elem,
    default_scale: u8,
) -> Result<OperandSpec, ErrorKind> {
    let broadcast = instr.prefixes.evex_unchecked().broadcast() && modrm < 0b11_000_000;
    let (size, disp_scale) = if broadcast {
        (broadcast_size(bank, elem), elem.width())
    } else {
        (packed_size(bank, elem), vector_bytes(bank))
    };
    read_E(decoder, words, instr, modrm, bank, size, default_scale, disp_scale)
}

fn read_evex_0f(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    opcode: u8,
    pp: u8,
) -> Result<(), ErrorKind> {
    let evex = instr.prefixes.evex_unchecked();
    let w = evex.vex().w();
    let b = evex.broadcast();
    let gp_w = decoder.mode == Mode::Long && w;

    match opcode {
        0x28 | 0x29 => {
            require_no_vvvv(instr)?;
            if b {
                // full-vector moves have neither broadcast nor rounding
                return Err(ErrorKind::InvalidOperand);
            }
            apply_masking(instr, true)?;
            let elem = match (pp, w) {
                (0b00, false) => Elem::F32,
                (0b01, true) => Elem::F64,
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            let bank = vector_bank(instr)?;
            let code = match (elem, bank, opcode) {
                (Elem::F32, RegisterBank::X, 0x28) => Code::EVEX_Vmovaps_xmm_k1z_xmmm128,
                (Elem::F32, RegisterBank::Y, 0x28) => Code::EVEX_Vmovaps_ymm_k1z_ymmm256,
                (Elem::F32, _, 0x28) => Code::EVEX_Vmovaps_zmm_k1z_zmmm512,
                (Elem::F32, RegisterBank::X, _) => Code::EVEX_Vmovaps_xmmm128_k1z_xmm,
                (Elem::F32, RegisterBank::Y, _) => Code::EVEX_Vmovaps_ymmm256_k1z_ymm,
                (Elem::F32, _, _) => Code::EVEX_Vmovaps_zmmm512_k1z_zmm,
                (_, RegisterBank::X, 0x28) => Code::EVEX_Vmovapd_xmm_k1z_xmmm128,
                (_, RegisterBank::Y, 0x28) => Code::EVEX_Vmovapd_ymm_k1z_ymmm256,
                (_, _, 0x28) => Code::EVEX_Vmovapd_zmm_k1z_zmmm512,
                (_, RegisterBank::X, _) => Code::EVEX_Vmovapd_xmmm128_k1z_xmm,
                (_, RegisterBank::Y, _) => Code::EVEX_Vmovapd_ymmm256_k1z_ymm,
                _ => Code::EVEX_Vmovapd_zmmm512_k1z_zmm,
            };
            instr.code = code;
            let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, bank);
            let rm = read_E(
                decoder,
                words,
                instr,
                modrm,
                bank,
                packed_size(bank, elem),
                1,
                vector_bytes(bank),
            )?;
            if opcode == 0x28 {
                instr.operands[0] = OperandSpec::RegRRR;
                instr.operands[1] = rm;
            } else {
                instr.operands[0] = rm;
                instr.operands[1] = OperandSpec::RegRRR;
            }
            instr.operand_count = 2;
        }
        0x2a => {
            apply_masking(instr, false)?;
            // W widens the gpr operand only in long mode; the `sd` W0 form additionally has no
            // rounding, its broadcast bit is accepted and ignored
            let (code, has_er) = match (pp, gp_w) {
                (0b10, false) => (Code::EVEX_Vcvtsi2ss_xmm_xmm_rm32_er, true),
                (0b10, true) => (Code::EVEX_Vcvtsi2ss_xmm_xmm_rm64_er, true),
                (0b11, false) => (Code::EVEX_Vcvtsi2sd_xmm_xmm_rm32, false),
                (0b11, true) => (Code::EVEX_Vcvtsi2sd_xmm_xmm_rm64_er, true),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            let (gp_bank, size, scale) = if gp_w {
                (RegisterBank::Q, MemorySize::Int64, 8)
            } else {
                (RegisterBank::D, MemorySize::Int32, 4)
            };
            instr.code = code;
            let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            if b {
                if modrm < 0b11_000_000 {
                    return Err(ErrorKind::InvalidOperand);
                }
                if has_er {
                    instr.rc = Some(rounding(instr));
                }
            }
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            instr.regs[3] = vex_reg(decoder, instr, RegisterBank::X);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = OperandSpec::RegVex;
            instr.operands[2] = read_E(decoder, words, instr, modrm, gp_bank, size, 1, scale)?;
            instr.operand_count = 3;
        }
        0x2b => {
            require_no_vvvv(instr)?;
            apply_masking(instr, false)?;
            if b {
                return Err(ErrorKind::InvalidOperand);
            }
            let elem = match (pp, w) {
                (0b00, false) => Elem::F32,
                (0b01, true) => Elem::F64,
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            let bank = vector_bank(instr)?;
            instr.code = match (elem, bank) {
                (Elem::F32, RegisterBank::X) => Code::EVEX_Vmovntps_m128_xmm,
                (Elem::F32, RegisterBank::Y) => Code::EVEX_Vmovntps_m256_ymm,
                (Elem::F32, _) => Code::EVEX_Vmovntps_m512_zmm,
                (_, RegisterBank::X) => Code::EVEX_Vmovntpd_m128_xmm,
                (_, RegisterBank::Y) => Code::EVEX_Vmovntpd_m256_ymm,
                _ => Code::EVEX_Vmovntpd_m512_zmm,
            };
            let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            if modrm >= 0b11_000_000 {
                return Err(ErrorKind::InvalidOperand);
            }
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, bank);
            instr.operands[0] = read_E(
                decoder,
                words,
                instr,
                modrm,
                bank,
                packed_size(bank, elem),
                1,
                vector_bytes(bank),
            )?;
            instr.operands[1] = OperandSpec::RegRRR;
            instr.operand_count = 2;
        }
        0x2c | 0x2d => {
            require_no_vvvv(instr)?;
            apply_masking(instr, false)?;
            let truncating = opcode == 0x2c;
            let (code, size, scale) = match (pp, gp_w) {
                (0b10, false) => (
                    if truncating { Code::EVEX_Vcvttss2si_r32_xmmm32_sae } else { Code::EVEX_Vcvtss2si_r32_xmmm32_er },
                    MemorySize::Float32,
                    4,
                ),
                (0b10, true) => (
                    if truncating { Code::EVEX_Vcvttss2si_r64_xmmm32_sae } else { Code::EVEX_Vcvtss2si_r64_xmmm32_er },
                    MemorySize::Float32,
                    4,
                ),
                (0b11, false) => (
                    if truncating { Code::EVEX_Vcvttsd2si_r32_xmmm64_sae } else { Code::EVEX_Vcvtsd2si_r32_xmmm64_er },
                    MemorySize::Float64,
                    8,
                ),
                (0b11, true) => (
                    if truncating { Code::EVEX_Vcvttsd2si_r64_xmmm64_sae } else { Code::EVEX_Vcvtsd2si_r64_xmmm64_er },
                    MemorySize::Float64,
                    8,
                ),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            let gp_bank = if gp_w { RegisterBank::Q } else { RegisterBank::D };
            instr.code = code;
            let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            if b {
                if modrm < 0b11_000_000 {
                    return Err(ErrorKind::InvalidOperand);
                }
                if truncating {
                    instr.sae = true;
                } else {
                    instr.rc = Some(rounding(instr));
                }
            }
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, gp_bank);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 1, scale)?;
            instr.operand_count = 2;
        }
        0x2e | 0x2f => {
            require_no_vvvv(instr)?;
            apply_masking(instr, false)?;
            let unordered = opcode == 0x2e;
            let (code, size, scale) = match (pp, w) {
                (0b00, false) => (
                    if unordered { Code::EVEX_Vucomiss_xmm_xmmm32_sae } else { Code::EVEX_Vcomiss_xmm_xmmm32_sae },
                    MemorySize::Float32,
                    4,
                ),
                (0b01, true) => (
                    if unordered { Code::EVEX_Vucomisd_xmm_xmmm64_sae } else { Code::EVEX_Vcomisd_xmm_xmmm64_sae },
                    MemorySize::Float64,
                    8,
                ),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            instr.code = code;
            let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            if b {
                if modrm < 0b11_000_000 {
                    return Err(ErrorKind::InvalidOperand);
                }
                instr.sae = true;
            }
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 1, scale)?;
            instr.operand_count = 2;
        }
        _ => return Err(ErrorKind::InvalidOpcode),
    }
    Ok(())
}

fn read_evex_0f38(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    opcode: u8,
    pp: u8,
) -> Result<(), ErrorKind> {
    if pp != 0b01 {
        return Err(ErrorKind::InvalidOpcode);
    }
    let evex = instr.prefixes.evex_unchecked();
    let w = evex.vex().w();
    let b = evex.broadcast();

    match opcode {
        // full-tuple three-operand forms: broadcast on memory, nothing on the broadcast bit
        // otherwise
        0x40 | 0x45 | 0x46 | 0x47 => {
            apply_masking(instr, true)?;
            let bank = vector_bank(instr)?;
            let (code, elem) = match (opcode, w, bank) {
                (0x40, false, RegisterBank::X) => (Code::EVEX_Vpmulld_VX_k1z_HX_WX_b, Elem::I32),
                (0x40, false, RegisterBank::Y) => (Code::EVEX_Vpmulld_VY_k1z_HY_WY_b, Elem::I32),
                (0x40, false, _) => (Code::EVEX_Vpmulld_VZ_k1z_HZ_WZ_b, Elem::I32),
                (0x40, true, RegisterBank::X) => (Code::EVEX_Vpmullq_VX_k1z_HX_WX_b, Elem::I64),
                (0x40, true, RegisterBank::Y) => (Code::EVEX_Vpmullq_VY_k1z_HY_WY_b, Elem::I64),
                (0x40, true, _) => (Code::EVEX_Vpmullq_VZ_k1z_HZ_WZ_b, Elem::I64),
                (0x45, false, RegisterBank::X) => (Code::EVEX_Vpsrlvd_VX_k1z_HX_WX_b, Elem::U32),
                (0x45, false, RegisterBank::Y) => (Code::EVEX_Vpsrlvd_VY_k1z_HY_WY_b, Elem::U32),
                (0x45, false, _) => (Code::EVEX_Vpsrlvd_VZ_k1z_HZ_WZ_b, Elem::U32),
                (0x45, true, RegisterBank::X) => (Code::EVEX_Vpsrlvq_VX_k1z_HX_WX_b, Elem::U64),
                (0x45, true, RegisterBank::Y) => (Code::EVEX_Vpsrlvq_VY_k1z_HY_WY_b, Elem::U64),
                (0x45, true, _) => (Code::EVEX_Vpsrlvq_VZ_k1z_HZ_WZ_b, Elem::U64),
                (0x46, false, RegisterBank::X) => (Code::EVEX_Vpsravd_VX_k1z_HX_WX_b, Elem::U32),
                (0x46, false, RegisterBank::Y) => (Code::EVEX_Vpsravd_VY_k1z_HY_WY_b, Elem::U32),
                (0x46, false, _) => (Code::EVEX_Vpsravd_VZ_k1z_HZ_WZ_b, Elem::U32),
                (0x46, true, RegisterBank::X) => (Code::EVEX_Vpsravq_VX_k1z_HX_WX_b, Elem::U64),
                (0x46, true, RegisterBank::Y) => (Code::EVEX_Vpsravq_VY_k1z_HY_WY_b, Elem::U64),
                (0x46, true, _) => (Code::EVEX_Vpsravq_VZ_k1z_HZ_WZ_b, Elem::U64),
                (_, false, RegisterBank::X) => (Code::EVEX_Vpsllvd_VX_k1z_HX_WX_b, Elem::U32),
                (_, false, RegisterBank::Y) => (Code::EVEX_Vpsllvd_VY_k1z_HY_WY_b, Elem::U32),
                (_, false, _) => (Code::EVEX_Vpsllvd_VZ_k1z_HZ_WZ_b, Elem::U32),
                (_, true, RegisterBank::X) => (Code::EVEX_Vpsllvq_VX_k1z_HX_WX_b, Elem::U64),
                (_, true, RegisterBank::Y) => (Code::EVEX_Vpsllvq_VY_k1z_HY_WY_b, Elem::U64),
                (_, true, _) => (Code::EVEX_Vpsllvq_VZ_k1z_HZ_WZ_b, Elem::U64),
            };
            instr.code = code;
            let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            if b && modrm >= 0b11_000_000 {
                return Err(ErrorKind::InvalidOperand);
            }
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, bank);
            instr.regs[3] = vex_reg(decoder, instr, bank);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = OperandSpec::RegVex;
            instr.operands[2] = read_E_full(decoder, words, instr, modrm, bank, elem, 0)?;
            instr.operand_count = 3;
        }
        // full-tuple unary forms
        0x42 | 0x44 => {
            require_no_vvvv(instr)?;
            apply_masking(instr, true)?;
            let sae_capable = opcode == 0x42;
            let elem = match (opcode, w) {
                (0x42, false) => Elem::F32,
                (0x42, true) => Elem::F64,
                (_, false) => Elem::U32,
                (_, true) => Elem::U64,
            };
            let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            // on a register form the broadcast bit requests sae where the form supports it,
            // overriding the vector length to 512
            let bank = if b && modrm >= 0b11_000_000 {
                if !sae_capable {
                    return Err(ErrorKind::InvalidOperand);
                }
                instr.sae = true;
                RegisterBank::Z
            } else {
                vector_bank(instr)?
            };
            instr.code = match (opcode, w, bank) {
                (0x42, false, RegisterBank::X) => Code::EVEX_Vgetexpps_VX_k1z_WX_b,
                (0x42, false, RegisterBank::Y) => Code::EVEX_Vgetexpps_VY_k1z_WY_b,
                (0x42, false, _) => Code::EVEX_Vgetexpps_VZ_k1z_WZ_sae_b,
                (0x42, true, RegisterBank::X) => Code::EVEX_Vgetexppd_VX_k1z_WX_b,
                (0x42, true, RegisterBank::Y) => Code::EVEX_Vgetexppd_VY_k1z_WY_b,
                (0x42, true, _) => Code::EVEX_Vgetexppd_VZ_k1z_WZ_sae_b,
                (_, false, RegisterBank::X) => Code::EVEX_Vplzcntd_VX_k1z_WX_b,
                (_, false, RegisterBank::Y) => Code::EVEX_Vplzcntd_VY_k1z_WY_b,
                (_, false, _) => Code::EVEX_Vplzcntd_VZ_k1z_WZ_b,
                (_, true, RegisterBank::X) => Code::EVEX_Vplzcntq_VX_k1z_WX_b,
                (_, true, RegisterBank::Y) => Code::EVEX_Vplzcntq_VY_k1z_WY_b,
                (_, true, _) => Code::EVEX_Vplzcntq_VZ_k1z_WZ_b,
            };
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, bank);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = read_E_full(decoder, words, instr, modrm, bank, elem, 0)?;
            instr.operand_count = 2;
        }
        // scalar-tuple forms: no broadcast, sae on register forms
        0x43 => {
            apply_masking(instr, true)?;
            let (code, size, scale) = if w {
                (Code::EVEX_Vgetexpsd_VX_k1z_HX_WX_sae, MemorySize::Float64, 8)
            } else {
                (Code::EVEX_Vgetexpss_VX_k1z_HX_WX_sae, MemorySize::Float32, 4)
            };
            instr.code = code;
            let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            if b {
                if modrm < 0b11_000_000 {
                    return Err(ErrorKind::InvalidOperand);
                }
                instr.sae = true;
            }
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            instr.regs[3] = vex_reg(decoder, instr, RegisterBank::X);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = OperandSpec::RegVex;
            instr.operands[2] = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 0, scale)?;
            instr.operand_count = 3;
        }
        _ => return Err(ErrorKind::InvalidOpcode),
    }
    Ok(())
}
