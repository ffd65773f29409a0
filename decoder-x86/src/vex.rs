//! decoding `vex`-encoded instructions: the two-byte `c5` form and the three-byte `c4` form.
//!
//! the prefix bytes are folded into a synthetic `rex` in [`crate::Prefixes`]; the opcode-map
//! selector, `pp` field, and `vvvv` register are resolved here, then dispatch proceeds per map.

use decoder::{ErrorKind, Reader};

use crate::{
    packed_size, read_E, read_modrm_reg, require_no_vvvv, vex_reg, Code, Decoder, Elem,
    Instruction, MemorySize, Mode, OperandSpec, RegSpec, RegisterBank,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Map {
    Map0f,
    Map0f38,
    Map0f3a,
}

pub(crate) fn read_c5(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
) -> Result<(), ErrorKind> {
    if crate::avx_prefix_conflict(instr) {
        return Err(ErrorKind::InvalidPrefixes);
    }
    let byte = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    if decoder.mode != Mode::Long && byte & 0xc0 != 0xc0 {
        // outside long mode `c5` with top modrm bits clear is `lds`, which is out of range here
        return Err(ErrorKind::InvalidOpcode);
    }
    instr.prefixes.vex_from_c5(byte);
    instr.regs[3] = RegSpec {
        num: ((byte >> 3) & 0b1111) ^ 0b1111,
        bank: RegisterBank::X,
    };
    let pp = byte & 0b11;
    let opcode = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    read_vex_instruction(decoder, words, instr, Map::Map0f, opcode, pp)
}

pub(crate) fn read_c4(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
) -> Result<(), ErrorKind> {
    if crate::avx_prefix_conflict(instr) {
        return Err(ErrorKind::InvalidPrefixes);
    }
    let high = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    if decoder.mode != Mode::Long && high & 0xc0 != 0xc0 {
        // outside long mode this byte pattern is `les`
        return Err(ErrorKind::InvalidOpcode);
    }
    let low = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    instr.prefixes.vex_from_c4(high, low);
    instr.regs[3] = RegSpec {
        num: ((low >> 3) & 0b1111) ^ 0b1111,
        bank: RegisterBank::X,
    };
    let map = match high & 0b11111 {
        0b00001 => Map::Map0f,
        0b00010 => Map::Map0f38,
        0b00011 => Map::Map0f3a,
        _ => return Err(ErrorKind::InvalidOpcode),
    };
    let pp = low & 0b11;
    let opcode = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    read_vex_instruction(decoder, words, instr, map, opcode, pp)
}

fn read_vex_instruction(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    map: Map,
    opcode: u8,
    pp: u8,
) -> Result<(), ErrorKind> {
    let vex = instr.prefixes.vex_unchecked();
    let l = vex.l();
    // vex.w picks the element width of a form in any mode, but widens a gpr operand only in
    // long mode
    let gp_w = decoder.mode == Mode::Long && vex.w();

    match map {
        Map::Map0f => read_vex_0f(decoder, words, instr, opcode, pp, l, gp_w),
        Map::Map0f38 => read_vex_0f38(decoder, words, instr, opcode, pp, l, vex.w()),
        Map::Map0f3a => Err(ErrorKind::InvalidOpcode),
    }
}

fn read_vex_0f(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    opcode: u8,
    pp: u8,
    l: bool,
    gp_w: bool,
) -> Result<(), ErrorKind> {
    let modrm;
    match opcode {
        0x28 | 0x29 => {
            require_no_vvvv(instr)?;
            let (code_load, code_store, elem) = match (pp, l) {
                (0b00, false) => (Code::VEX_Vmovaps_xmm_xmmm128, Code::VEX_Vmovaps_xmmm128_xmm, Elem::F32),
                (0b00, true) => (Code::VEX_Vmovaps_ymm_ymmm256, Code::VEX_Vmovaps_ymmm256_ymm, Elem::F32),
                (0b01, false) => (Code::VEX_Vmovapd_xmm_xmmm128, Code::VEX_Vmovapd_xmmm128_xmm, Elem::F64),
                (0b01, true) => (Code::VEX_Vmovapd_ymm_ymmm256, Code::VEX_Vmovapd_ymmm256_ymm, Elem::F64),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            let bank = if l { RegisterBank::Y } else { RegisterBank::X };
            modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, bank);
            let rm = read_E(decoder, words, instr, modrm, bank, packed_size(bank, elem), 1, 1)?;
            if opcode == 0x28 {
                instr.code = code_load;
                instr.operands[0] = OperandSpec::RegRRR;
                instr.operands[1] = rm;
            } else {
                instr.code = code_store;
                instr.operands[0] = rm;
                instr.operands[1] = OperandSpec::RegRRR;
            }
            instr.operand_count = 2;
        }
        0x2a => {
            let (code, bank, size) = match (pp, gp_w) {
                (0b10, false) => (Code::VEX_Vcvtsi2ss_xmm_xmm_rm32, RegisterBank::D, MemorySize::Int32),
                (0b10, true) => (Code::VEX_Vcvtsi2ss_xmm_xmm_rm64, RegisterBank::Q, MemorySize::Int64),
                (0b11, false) => (Code::VEX_Vcvtsi2sd_xmm_xmm_rm32, RegisterBank::D, MemorySize::Int32),
                (0b11, true) => (Code::VEX_Vcvtsi2sd_xmm_xmm_rm64, RegisterBank::Q, MemorySize::Int64),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            instr.code = code;
            modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            instr.regs[3] = vex_reg(decoder, instr, RegisterBank::X);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = OperandSpec::RegVex;
            instr.operands[2] = read_E(decoder, words, instr, modrm, bank, size, 1, 1)?;
            instr.operand_count = 3;
        }
        0x2b => {
            require_no_vvvv(instr)?;
            let (code, elem) = match (pp, l) {
                (0b00, false) => (Code::VEX_Vmovntps_m128_xmm, Elem::F32),
                (0b00, true) => (Code::VEX_Vmovntps_m256_ymm, Elem::F32),
                (0b01, false) => (Code::VEX_Vmovntpd_m128_xmm, Elem::F64),
                (0b01, true) => (Code::VEX_Vmovntpd_m256_ymm, Elem::F64),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            if modrm >= 0b11_000_000 {
                return Err(ErrorKind::InvalidOperand);
            }
            let bank = if l { RegisterBank::Y } else { RegisterBank::X };
            instr.code = code;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, bank);
            instr.operands[0] = read_E(decoder, words, instr, modrm, bank, packed_size(bank, elem), 1, 1)?;
            instr.operands[1] = OperandSpec::RegRRR;
            instr.operand_count = 2;
        }
        0x2c | 0x2d => {
            require_no_vvvv(instr)?;
            let truncating = opcode == 0x2c;
            let (code, size) = match (pp, gp_w) {
                (0b10, false) => (
                    if truncating { Code::VEX_Vcvttss2si_r32_xmmm32 } else { Code::VEX_Vcvtss2si_r32_xmmm32 },
                    MemorySize::Float32,
                ),
                (0b10, true) => (
                    if truncating { Code::VEX_Vcvttss2si_r64_xmmm32 } else { Code::VEX_Vcvtss2si_r64_xmmm32 },
                    MemorySize::Float32,
                ),
                (0b11, false) => (
                    if truncating { Code::VEX_Vcvttsd2si_r32_xmmm64 } else { Code::VEX_Vcvtsd2si_r32_xmmm64 },
                    MemorySize::Float64,
                ),
                (0b11, true) => (
                    if truncating { Code::VEX_Vcvttsd2si_r64_xmmm64 } else { Code::VEX_Vcvtsd2si_r64_xmmm64 },
                    MemorySize::Float64,
                ),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            let reg_bank = if gp_w { RegisterBank::Q } else { RegisterBank::D };
            instr.code = code;
            modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, reg_bank);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 1, 1)?;
            instr.operand_count = 2;
        }
        0x2e | 0x2f => {
            require_no_vvvv(instr)?;
            let unordered = opcode == 0x2e;
            let (code, size) = match pp {
                0b00 => (
                    if unordered { Code::VEX_Vucomiss_xmm_xmmm32 } else { Code::VEX_Vcomiss_xmm_xmmm32 },
                    MemorySize::Float32,
                ),
                0b01 => (
                    if unordered { Code::VEX_Vucomisd_xmm_xmmm64 } else { Code::VEX_Vcomisd_xmm_xmmm64 },
                    MemorySize::Float64,
                ),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            instr.code = code;
            modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 1, 1)?;
            instr.operand_count = 2;
        }
        _ => return Err(ErrorKind::InvalidOpcode),
    }
    Ok(())
}

fn read_vex_0f38(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    opcode: u8,
    pp: u8,
    l: bool,
    w: bool,
) -> Result<(), ErrorKind> {
    if pp != 0b01 {
        return Err(ErrorKind::InvalidOpcode);
    }
    let bank = if l { RegisterBank::Y } else { RegisterBank::X };

    let (code, elem) = match opcode {
        0x40 => {
            if w {
                return Err(ErrorKind::InvalidOpcode);
            }
            (
                if l { Code::VEX_Vpmulld_VY_HY_WY } else { Code::VEX_Vpmulld_VX_HX_WX },
                Elem::I32,
            )
        }
        0x41 => {
            if w || l {
                return Err(ErrorKind::InvalidOpcode);
            }
            require_no_vvvv(instr)?;
            instr.code = Code::VEX_Vphminposuw_VX_WX;
            let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = read_E(
                decoder,
                words,
                instr,
                modrm,
                RegisterBank::X,
                MemorySize::Packed128_UInt16,
                0,
                1,
            )?;
            instr.operand_count = 2;
            return Ok(());
        }
        0x45 => (
            match (w, l) {
                (false, false) => Code::VEX_Vpsrlvd_VX_HX_WX,
                (false, true) => Code::VEX_Vpsrlvd_VY_HY_WY,
                (true, false) => Code::VEX_Vpsrlvq_VX_HX_WX,
                (true, true) => Code::VEX_Vpsrlvq_VY_HY_WY,
            },
            if w { Elem::U64 } else { Elem::U32 },
        ),
        0x46 => {
            if w {
                return Err(ErrorKind::InvalidOpcode);
            }
            (
                if l { Code::VEX_Vpsravd_VY_HY_WY } else { Code::VEX_Vpsravd_VX_HX_WX },
                Elem::U32,
            )
        }
        0x47 => (
            match (w, l) {
                (false, false) => Code::VEX_Vpsllvd_VX_HX_WX,
                (false, true) => Code::VEX_Vpsllvd_VY_HY_WY,
                (true, false) => Code::VEX_Vpsllvq_VX_HX_WX,
                (true, true) => Code::VEX_Vpsllvq_VY_HY_WY,
            },
            if w { Elem::U64 } else { Elem::U32 },
        ),
        _ => return Err(ErrorKind::InvalidOpcode),
    };

    instr.code = code;
    let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    instr.regs[0] = read_modrm_reg(decoder, instr, modrm, bank);
    instr.regs[3] = vex_reg(decoder, instr, bank);
    instr.operands[0] = OperandSpec::RegRRR;
    instr.operands[1] = OperandSpec::RegVex;
    instr.operands[2] = read_E(decoder, words, instr, modrm, bank, packed_size(bank, elem), 0, 1)?;
    instr.operand_count = 3;
    Ok(())
}
