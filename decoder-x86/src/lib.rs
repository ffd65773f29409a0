//! decoder for `x86` and `x86_64` instruction streams.
//!
//! decoding is a single forward pass with no backtracking: legacy prefixes, then an optional
//! `rex`/`vex`/`evex` prefix, then opcode bytes, then `modrm`/`sib`/displacement. the decoder
//! reports the exact number of bytes each instruction spans, which makes it usable for
//! length-disambiguation over a linear byte stream.
//!
//! one [`Decoder`] covers all three addressing modes. construct with [`Decoder::real`] (16-bit),
//! [`Decoder::protected`] (32-bit), or [`Decoder::long`] (64-bit), then decode with
//! [`Decoder::decode_slice`] or through [`decoder::Decodable`]:
//!
//! ```
//! use decoder_x86::{Code, Decoder, RegSpec};
//!
//! let inst = Decoder::long().decode_slice(&[0x0f, 0x20, 0xde]).unwrap();
//! assert_eq!(inst.code(), Code::Mov_Rq_Cq);
//! assert_eq!(inst.op_register(0), Some(RegSpec::rsi()));
//! ```
//!
//! a decoder is a small copyable value with no state mutated by decoding; decoding the same
//! bytes twice yields field-identical instructions.

mod evex;
mod vex;

#[cfg(test)]
mod tests;

use core::hash::{Hash, Hasher};

use decoder::{Decodable, Decoded, Error, ErrorKind, Reader};

#[derive(Copy, Clone, Debug, PartialOrd, Ord, Eq, PartialEq)]
pub struct RegSpec {
    num: u8,
    bank: RegisterBank,
}

impl Hash for RegSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let code = ((self.bank as u16) << 8) | (self.num as u16);
        code.hash(state);
    }
}

macro_rules! register {
    ($bank:ident, $name:ident => $num:expr, $($tail:tt)+) => {
        #[inline]
        pub const fn $name() -> RegSpec {
            RegSpec { bank: RegisterBank::$bank, num: $num }
        }

        register!($bank, $($tail)*);
    };
    ($bank:ident, $name:ident => $num:expr) => {
        #[inline]
        pub const fn $name() -> RegSpec {
            RegSpec { bank: RegisterBank::$bank, num: $num }
        }
    };
}

#[allow(non_snake_case)]
impl RegSpec {
    /// the number of this register in its bank.
    ///
    /// for many registers this is a number in the name, but for registers harkening back to
    /// `x86_32`, the first eight registers are `rax`, `rcx`, `rdx`, `rbx`, `rsp`, `rbp`, `rsi`,
    /// and `rdi` (or `eXX` for the 32-bit forms, `XX` for 16-bit forms).
    pub fn num(&self) -> u8 {
        self.num
    }

    /// the bank this register is in.
    ///
    /// this corresponds to the register's size and usage in the instruction set; `rax` and `mm0`
    /// are the same size, but different banks (`Q` and `MM` respectively).
    pub fn bank(&self) -> RegisterBank {
        self.bank
    }

    /// construct a `RegSpec` for xmm reg `num`
    #[inline]
    pub fn xmm(num: u8) -> RegSpec {
        if num >= 32 {
            panic!("invalid x86 xmm reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::X,
        }
    }

    /// construct a `RegSpec` for ymm reg `num`
    #[inline]
    pub fn ymm(num: u8) -> RegSpec {
        if num >= 32 {
            panic!("invalid x86 ymm reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::Y,
        }
    }

    /// construct a `RegSpec` for zmm reg `num`
    #[inline]
    pub fn zmm(num: u8) -> RegSpec {
        if num >= 32 {
            panic!("invalid x86 zmm reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::Z,
        }
    }

    /// construct a `RegSpec` for qword reg `num`
    #[inline]
    pub fn q(num: u8) -> RegSpec {
        if num >= 16 {
            panic!("invalid x86 qword reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::Q,
        }
    }

    /// construct a `RegSpec` for dword reg `num`
    #[inline]
    pub fn d(num: u8) -> RegSpec {
        if num >= 16 {
            panic!("invalid x86 dword reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::D,
        }
    }

    /// construct a `RegSpec` for word reg `num`
    #[inline]
    pub fn w(num: u8) -> RegSpec {
        if num >= 16 {
            panic!("invalid x86 word reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::W,
        }
    }

    /// construct a `RegSpec` for mask reg `num`
    #[inline]
    pub fn mask(num: u8) -> RegSpec {
        if num >= 8 {
            panic!("invalid x86 mask reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::K,
        }
    }

    /// construct a `RegSpec` for mmx reg `num`
    #[inline]
    pub fn mm(num: u8) -> RegSpec {
        if num >= 8 {
            panic!("invalid x86 mmx reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::MM,
        }
    }

    /// construct a `RegSpec` for control reg `num`
    #[inline]
    pub fn cr(num: u8) -> RegSpec {
        if num >= 16 {
            panic!("invalid x86 control reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::CR,
        }
    }

    /// construct a `RegSpec` for debug reg `num`
    #[inline]
    pub fn dr(num: u8) -> RegSpec {
        if num >= 16 {
            panic!("invalid x86 debug reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::DR,
        }
    }

    /// construct a `RegSpec` for test reg `num`
    #[inline]
    pub fn tr(num: u8) -> RegSpec {
        if num >= 8 {
            panic!("invalid x86 test reg {}", num);
        }

        RegSpec {
            num,
            bank: RegisterBank::TR,
        }
    }

    register!(Q,
        rax => 0, rcx => 1, rdx => 2, rbx => 3,
        rsp => 4, rbp => 5, rsi => 6, rdi => 7,
        r8 => 8, r9 => 9, r10 => 10, r11 => 11,
        r12 => 12, r13 => 13, r14 => 14, r15 => 15
    );

    register!(D,
        eax => 0, ecx => 1, edx => 2, ebx => 3,
        esp => 4, ebp => 5, esi => 6, edi => 7,
        r8d => 8, r9d => 9, r10d => 10, r11d => 11,
        r12d => 12, r13d => 13, r14d => 14, r15d => 15
    );

    register!(W,
        ax => 0, cx => 1, dx => 2, bx => 3,
        sp => 4, bp => 5, si => 6, di => 7
    );

    #[inline]
    pub const fn xmm0() -> RegSpec {
        RegSpec {
            bank: RegisterBank::X,
            num: 0,
        }
    }

    #[inline]
    pub const fn ymm0() -> RegSpec {
        RegSpec {
            bank: RegisterBank::Y,
            num: 0,
        }
    }

    #[inline]
    pub const fn zmm0() -> RegSpec {
        RegSpec {
            bank: RegisterBank::Z,
            num: 0,
        }
    }

    #[inline]
    pub const fn mm0() -> RegSpec {
        RegSpec {
            bank: RegisterBank::MM,
            num: 0,
        }
    }
}

/// the bank a register is in, which doubles as its class: general-purpose registers by width
/// (`B`/`W`/`D`/`Q`), vector registers by length (`X`/`Y`/`Z`), opmask (`K`), mmx, segment, and
/// the system banks (`CR`/`DR`/`TR`).
#[derive(Copy, Clone, Debug, PartialOrd, Ord, Eq, PartialEq, Hash)]
pub enum RegisterBank {
    B,
    W,
    D,
    Q,
    X,
    Y,
    Z,
    K,
    MM,
    S,
    CR,
    DR,
    TR,
}

/// an `x86` segment register.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Segment {
    ES,
    CS,
    SS,
    DS,
    FS,
    GS,
}

/// the broad kind of an operand: a register, a memory reference, or an immediate.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OpKind {
    Register,
    Memory,
    Immediate,
}

/// the shape of the data a memory operand references.
///
/// `Broadcast*` sizes are produced only by `evex`-encoded instructions whose broadcast bit is
/// set on a memory operand; the element width then also drives compressed-displacement scaling.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MemorySize {
    /// no memory operand, or a memory shape this decoder does not report.
    Unknown,
    Float32,
    Float64,
    Int32,
    Int64,
    Packed64_Float32,
    Packed64_Int32,
    Packed128_Float32,
    Packed128_Float64,
    Packed128_Int32,
    Packed128_Int64,
    Packed128_UInt16,
    Packed128_UInt32,
    Packed128_UInt64,
    Packed256_Float32,
    Packed256_Float64,
    Packed256_Int32,
    Packed256_Int64,
    Packed256_UInt32,
    Packed256_UInt64,
    Packed512_Float32,
    Packed512_Float64,
    Packed512_Int32,
    Packed512_Int64,
    Packed512_UInt32,
    Packed512_UInt64,
    Broadcast128_Float32,
    Broadcast128_Float64,
    Broadcast128_Int32,
    Broadcast128_Int64,
    Broadcast128_UInt32,
    Broadcast128_UInt64,
    Broadcast256_Float32,
    Broadcast256_Float64,
    Broadcast256_Int32,
    Broadcast256_Int64,
    Broadcast256_UInt32,
    Broadcast256_UInt64,
    Broadcast512_Float32,
    Broadcast512_Float64,
    Broadcast512_Int32,
    Broadcast512_Int64,
    Broadcast512_UInt32,
    Broadcast512_UInt64,
}

/// the rounding mode an `evex`-encoded instruction requests when its broadcast bit selects
/// embedded rounding on a register-only form.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RoundingControl {
    Nearest,
    Down,
    Up,
    Zero,
}

/// the exact instruction form that was decoded.
///
/// legacy, `vex`, and `evex` encodings of the same mnemonic are distinct members: the encoding
/// family decides which decorators (masking, broadcast, rounding) the form can carry, so they
/// are never unified.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Code {
    INVALID,

    // 0f20-0f26: mov to/from control, debug, and test registers
    Mov_Rd_Cd,
    Mov_Rq_Cq,
    Mov_Cd_Rd,
    Mov_Cq_Rq,
    Mov_Rd_Dd,
    Mov_Rq_Dq,
    Mov_Dd_Rd,
    Mov_Dq_Rq,
    Mov_Rd_Td,
    Mov_Td_Rd,

    // 0f28/0f29
    Movaps_xmm_xmmm128,
    Movaps_xmmm128_xmm,
    Movapd_xmm_xmmm128,
    Movapd_xmmm128_xmm,
    VEX_Vmovaps_xmm_xmmm128,
    VEX_Vmovaps_xmmm128_xmm,
    VEX_Vmovaps_ymm_ymmm256,
    VEX_Vmovaps_ymmm256_ymm,
    VEX_Vmovapd_xmm_xmmm128,
    VEX_Vmovapd_xmmm128_xmm,
    VEX_Vmovapd_ymm_ymmm256,
    VEX_Vmovapd_ymmm256_ymm,
    EVEX_Vmovaps_xmm_k1z_xmmm128,
    EVEX_Vmovaps_xmmm128_k1z_xmm,
    EVEX_Vmovaps_ymm_k1z_ymmm256,
    EVEX_Vmovaps_ymmm256_k1z_ymm,
    EVEX_Vmovaps_zmm_k1z_zmmm512,
    EVEX_Vmovaps_zmmm512_k1z_zmm,
    EVEX_Vmovapd_xmm_k1z_xmmm128,
    EVEX_Vmovapd_xmmm128_k1z_xmm,
    EVEX_Vmovapd_ymm_k1z_ymmm256,
    EVEX_Vmovapd_ymmm256_k1z_ymm,
    EVEX_Vmovapd_zmm_k1z_zmmm512,
    EVEX_Vmovapd_zmmm512_k1z_zmm,

    // 0f2a
    Cvtpi2ps_xmm_mmm64,
    Cvtpi2pd_xmm_mmm64,
    Cvtsi2ss_xmm_rm32,
    Cvtsi2ss_xmm_rm64,
    Cvtsi2sd_xmm_rm32,
    Cvtsi2sd_xmm_rm64,
    VEX_Vcvtsi2ss_xmm_xmm_rm32,
    VEX_Vcvtsi2ss_xmm_xmm_rm64,
    VEX_Vcvtsi2sd_xmm_xmm_rm32,
    VEX_Vcvtsi2sd_xmm_xmm_rm64,
    EVEX_Vcvtsi2ss_xmm_xmm_rm32_er,
    EVEX_Vcvtsi2ss_xmm_xmm_rm64_er,
    EVEX_Vcvtsi2sd_xmm_xmm_rm32,
    EVEX_Vcvtsi2sd_xmm_xmm_rm64_er,

    // 0f2b
    Movntps_m128_xmm,
    Movntpd_m128_xmm,
    Movntss_m32_xmm,
    Movntsd_m64_xmm,
    VEX_Vmovntps_m128_xmm,
    VEX_Vmovntps_m256_ymm,
    VEX_Vmovntpd_m128_xmm,
    VEX_Vmovntpd_m256_ymm,
    EVEX_Vmovntps_m128_xmm,
    EVEX_Vmovntps_m256_ymm,
    EVEX_Vmovntps_m512_zmm,
    EVEX_Vmovntpd_m128_xmm,
    EVEX_Vmovntpd_m256_ymm,
    EVEX_Vmovntpd_m512_zmm,

    // 0f2c
    Cvttps2pi_mm_xmmm64,
    Cvttpd2pi_mm_xmmm128,
    Cvttss2si_r32_xmmm32,
    Cvttss2si_r64_xmmm32,
    Cvttsd2si_r32_xmmm64,
    Cvttsd2si_r64_xmmm64,
    VEX_Vcvttss2si_r32_xmmm32,
    VEX_Vcvttss2si_r64_xmmm32,
    VEX_Vcvttsd2si_r32_xmmm64,
    VEX_Vcvttsd2si_r64_xmmm64,
    EVEX_Vcvttss2si_r32_xmmm32_sae,
    EVEX_Vcvttss2si_r64_xmmm32_sae,
    EVEX_Vcvttsd2si_r32_xmmm64_sae,
    EVEX_Vcvttsd2si_r64_xmmm64_sae,

    // 0f2d
    Cvtps2pi_mm_xmmm64,
    Cvtpd2pi_mm_xmmm128,
    Cvtss2si_r32_xmmm32,
    Cvtss2si_r64_xmmm32,
    Cvtsd2si_r32_xmmm64,
    Cvtsd2si_r64_xmmm64,
    VEX_Vcvtss2si_r32_xmmm32,
    VEX_Vcvtss2si_r64_xmmm32,
    VEX_Vcvtsd2si_r32_xmmm64,
    VEX_Vcvtsd2si_r64_xmmm64,
    EVEX_Vcvtss2si_r32_xmmm32_er,
    EVEX_Vcvtss2si_r64_xmmm32_er,
    EVEX_Vcvtsd2si_r32_xmmm64_er,
    EVEX_Vcvtsd2si_r64_xmmm64_er,

    // 0f2e/0f2f
    Ucomiss_xmm_xmmm32,
    Ucomisd_xmm_xmmm64,
    Comiss_xmm_xmmm32,
    Comisd_xmm_xmmm64,
    VEX_Vucomiss_xmm_xmmm32,
    VEX_Vucomisd_xmm_xmmm64,
    VEX_Vcomiss_xmm_xmmm32,
    VEX_Vcomisd_xmm_xmmm64,
    EVEX_Vucomiss_xmm_xmmm32_sae,
    EVEX_Vucomisd_xmm_xmmm64_sae,
    EVEX_Vcomiss_xmm_xmmm32_sae,
    EVEX_Vcomisd_xmm_xmmm64_sae,

    // 0f3840/0f3841
    Pmulld_VX_WX,
    Phminposuw_VX_WX,
    VEX_Vpmulld_VX_HX_WX,
    VEX_Vpmulld_VY_HY_WY,
    VEX_Vphminposuw_VX_WX,
    EVEX_Vpmulld_VX_k1z_HX_WX_b,
    EVEX_Vpmulld_VY_k1z_HY_WY_b,
    EVEX_Vpmulld_VZ_k1z_HZ_WZ_b,
    EVEX_Vpmullq_VX_k1z_HX_WX_b,
    EVEX_Vpmullq_VY_k1z_HY_WY_b,
    EVEX_Vpmullq_VZ_k1z_HZ_WZ_b,

    // 0f3842/0f3843
    EVEX_Vgetexpps_VX_k1z_WX_b,
    EVEX_Vgetexpps_VY_k1z_WY_b,
    EVEX_Vgetexpps_VZ_k1z_WZ_sae_b,
    EVEX_Vgetexppd_VX_k1z_WX_b,
    EVEX_Vgetexppd_VY_k1z_WY_b,
    EVEX_Vgetexppd_VZ_k1z_WZ_sae_b,
    EVEX_Vgetexpss_VX_k1z_HX_WX_sae,
    EVEX_Vgetexpsd_VX_k1z_HX_WX_sae,

    // 0f3844
    EVEX_Vplzcntd_VX_k1z_WX_b,
    EVEX_Vplzcntd_VY_k1z_WY_b,
    EVEX_Vplzcntd_VZ_k1z_WZ_b,
    EVEX_Vplzcntq_VX_k1z_WX_b,
    EVEX_Vplzcntq_VY_k1z_WY_b,
    EVEX_Vplzcntq_VZ_k1z_WZ_b,

    // 0f3845-0f3847
    VEX_Vpsrlvd_VX_HX_WX,
    VEX_Vpsrlvd_VY_HY_WY,
    VEX_Vpsrlvq_VX_HX_WX,
    VEX_Vpsrlvq_VY_HY_WY,
    VEX_Vpsravd_VX_HX_WX,
    VEX_Vpsravd_VY_HY_WY,
    VEX_Vpsllvd_VX_HX_WX,
    VEX_Vpsllvd_VY_HY_WY,
    VEX_Vpsllvq_VX_HX_WX,
    VEX_Vpsllvq_VY_HY_WY,
    EVEX_Vpsrlvd_VX_k1z_HX_WX_b,
    EVEX_Vpsrlvd_VY_k1z_HY_WY_b,
    EVEX_Vpsrlvd_VZ_k1z_HZ_WZ_b,
    EVEX_Vpsrlvq_VX_k1z_HX_WX_b,
    EVEX_Vpsrlvq_VY_k1z_HY_WY_b,
    EVEX_Vpsrlvq_VZ_k1z_HZ_WZ_b,
    EVEX_Vpsravd_VX_k1z_HX_WX_b,
    EVEX_Vpsravd_VY_k1z_HY_WY_b,
    EVEX_Vpsravd_VZ_k1z_HZ_WZ_b,
    EVEX_Vpsravq_VX_k1z_HX_WX_b,
    EVEX_Vpsravq_VY_k1z_HY_WY_b,
    EVEX_Vpsravq_VZ_k1z_HZ_WZ_b,
    EVEX_Vpsllvd_VX_k1z_HX_WX_b,
    EVEX_Vpsllvd_VY_k1z_HY_WY_b,
    EVEX_Vpsllvd_VZ_k1z_HZ_WZ_b,
    EVEX_Vpsllvq_VX_k1z_HX_WX_b,
    EVEX_Vpsllvq_VY_k1z_HY_WY_b,
    EVEX_Vpsllvq_VZ_k1z_HZ_WZ_b,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum OperandSpec {
    Nothing,
    // the register in regs[0], from modrm's rrr bits (or the fixed cr/dr/tr slot)
    RegRRR,
    // the register in regs[1], from modrm's mmm bits with mod 11
    RegMMM,
    // the register in regs[3], from vex/evex vvvv
    RegVex,
    // the instruction's single memory operand, described by the mem_* fields
    Mem,
}

/// an `x86` instruction.
///
/// the decoded form is identified by [`Instruction::code()`]; an instruction has
/// [`Instruction::op_count()`] operands, inspected through [`Instruction::op_kind()`] and
/// [`Instruction::op_register()`]. at most one operand is a memory reference, described by the
/// `memory_*` accessors. `avx512` decorators (opmask, zeroing, rounding, sae) are reported per
/// instruction, not per operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub prefixes: Prefixes,
    regs: [RegSpec; 4],
    operands: [OperandSpec; 4],
    operand_count: u8,
    length: u8,
    code: Code,
    mem_segment: Segment,
    mem_base: Option<RegSpec>,
    mem_index: Option<RegSpec>,
    scale: u8,
    disp: u32,
    disp_size: u8,
    mem_size: MemorySize,
    op_mask: Option<RegSpec>,
    zeroing: bool,
    rc: Option<RoundingControl>,
    sae: bool,
}

impl Instruction {
    fn invalid() -> Instruction {
        Instruction {
            prefixes: Prefixes::new(),
            regs: [RegSpec { num: 0, bank: RegisterBank::D }; 4],
            operands: [OperandSpec::Nothing; 4],
            operand_count: 0,
            length: 0,
            code: Code::INVALID,
            mem_segment: Segment::DS,
            mem_base: None,
            mem_index: None,
            scale: 0,
            disp: 0,
            disp_size: 0,
            mem_size: MemorySize::Unknown,
            op_mask: None,
            zeroing: false,
            rc: None,
            sae: false,
        }
    }

    /// the decoded instruction form.
    #[inline]
    pub fn code(&self) -> Code {
        self.code
    }

    /// how many operands this instruction has.
    #[inline]
    pub fn op_count(&self) -> u8 {
        self.operand_count
    }

    /// the exact number of bytes this instruction spans, prefixes included.
    #[inline]
    pub fn len(&self) -> usize {
        self.length as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// the kind of operand `index`, or `None` past [`Instruction::op_count()`].
    pub fn op_kind(&self, index: u8) -> Option<OpKind> {
        match self.operands.get(index as usize)? {
            OperandSpec::RegRRR | OperandSpec::RegMMM | OperandSpec::RegVex => Some(OpKind::Register),
            OperandSpec::Mem => Some(OpKind::Memory),
            OperandSpec::Nothing => None,
        }
    }

    /// the register of operand `index`, or `None` if that operand is not a register.
    pub fn op_register(&self, index: u8) -> Option<RegSpec> {
        match self.operands.get(index as usize)? {
            OperandSpec::RegRRR => Some(self.regs[0]),
            OperandSpec::RegMMM => Some(self.regs[1]),
            OperandSpec::RegVex => Some(self.regs[3]),
            _ => None,
        }
    }

    /// the segment the memory operand is read relative to. `ds` unless a base register implies
    /// `ss` or a segment-override prefix was present.
    #[inline]
    pub fn memory_segment(&self) -> Segment {
        self.mem_segment
    }

    #[inline]
    pub fn memory_base(&self) -> Option<RegSpec> {
        self.mem_base
    }

    #[inline]
    pub fn memory_index(&self) -> Option<RegSpec> {
        self.mem_index
    }

    /// the index scale of the memory operand. for addressing without a `sib` byte no scale field
    /// exists; what is reported then depends on the opcode map the instruction came from (`1` on
    /// the `0f` map, `0` on the `0f38` map).
    #[inline]
    pub fn memory_scale(&self) -> u8 {
        self.scale
    }

    /// the effective displacement of the memory operand. for `evex` compressed displacement this
    /// is the stored byte already multiplied by the form's tuple size.
    #[inline]
    pub fn memory_displacement(&self) -> u32 {
        self.disp
    }

    /// how many displacement bytes were physically present (0, 1, 2, or 4), independent of the
    /// effective displacement's magnitude.
    #[inline]
    pub fn memory_displ_size(&self) -> u8 {
        self.disp_size
    }

    #[inline]
    pub fn memory_size(&self) -> MemorySize {
        self.mem_size
    }

    /// the `avx512` opmask register, `k1`-`k7`, or `None` when unmasked.
    #[inline]
    pub fn op_mask(&self) -> Option<RegSpec> {
        self.op_mask
    }

    #[inline]
    pub fn zeroing_masking(&self) -> bool {
        self.zeroing
    }

    #[inline]
    pub fn rounding_control(&self) -> Option<RoundingControl> {
        self.rc
    }

    #[inline]
    pub fn suppress_all_exceptions(&self) -> bool {
        self.sae
    }
}

impl Decoded for Instruction {
    #[inline]
    fn width(&self) -> usize {
        self.length as usize
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct EvexData {
    // data: present, z, b, Lp, Rp, aaa
    bits: u8,
}

/// the prefixes on an instruction.
///
/// `rep`, `repnz`, `lock`, and segment override prefixes are directly accessible here. `rex`,
/// `vex`, and `evex` prefixes are available through their associated helpers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Prefixes {
    bits: u8,
    rex: PrefixRex,
    segment: Segment,
    evex_data: EvexData,
}

/// the `avx512`-related data from an `evex` prefix.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PrefixEvex {
    vex: PrefixVex,
    evex_data: EvexData,
}

impl PrefixEvex {
    fn present(&self) -> bool {
        self.evex_data.present()
    }
    /// the `evex` prefix's parts that overlap with `vex` definitions - `L`, `W`, `R`, `X`, and
    /// `B` bits.
    pub fn vex(&self) -> PrefixVex {
        self.vex
    }
    /// the `avx512` mask register in use. `0` indicates "no mask register".
    pub fn mask_reg(&self) -> u8 {
        self.evex_data.aaa()
    }
    pub fn broadcast(&self) -> bool {
        self.evex_data.b()
    }
    pub fn merge(&self) -> bool {
        self.evex_data.z()
    }
    /// the `evex` `L'` bit.
    pub fn lp(&self) -> bool {
        self.evex_data.lp()
    }
    /// the `evex` `R'` bit.
    pub fn rp(&self) -> bool {
        self.evex_data.rp()
    }
}

/// bits specified in an avx/avx2 `vex` prefix: `L`, `W`, `R`, `X`, and `B`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PrefixVex {
    bits: u8,
}

impl PrefixVex {
    #[inline]
    fn present(&self) -> bool {
        (self.bits & 0x80) == 0x80
    }
    #[inline]
    pub fn b(&self) -> bool {
        (self.bits & 0x01) == 0x01
    }
    #[inline]
    pub fn x(&self) -> bool {
        (self.bits & 0x02) == 0x02
    }
    #[inline]
    pub fn r(&self) -> bool {
        (self.bits & 0x04) == 0x04
    }
    #[inline]
    pub fn w(&self) -> bool {
        (self.bits & 0x08) == 0x08
    }
    #[inline]
    pub fn l(&self) -> bool {
        (self.bits & 0x10) == 0x10
    }
}

/// bits specified in an x86_64 `rex` prefix.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PrefixRex {
    bits: u8,
}

impl PrefixRex {
    #[inline]
    fn present(&self) -> bool {
        (self.bits & 0xc0) == 0x40
    }
    #[inline]
    pub fn b(&self) -> bool {
        (self.bits & 0x01) == 0x01
    }
    #[inline]
    pub fn x(&self) -> bool {
        (self.bits & 0x02) == 0x02
    }
    #[inline]
    pub fn r(&self) -> bool {
        (self.bits & 0x04) == 0x04
    }
    #[inline]
    pub fn w(&self) -> bool {
        (self.bits & 0x08) == 0x08
    }
    #[inline]
    fn from(&mut self, prefix: u8) {
        self.bits = prefix;
    }
}

impl Prefixes {
    fn new() -> Prefixes {
        Prefixes {
            bits: 0,
            rex: PrefixRex { bits: 0 },
            segment: Segment::DS,
            evex_data: EvexData { bits: 0 },
        }
    }
    #[inline]
    pub fn rep(&self) -> bool {
        self.bits & 0x30 == 0x10
    }
    #[inline]
    fn set_rep(&mut self) {
        self.bits = (self.bits & 0xcf) | 0x10
    }
    #[inline]
    pub fn repnz(&self) -> bool {
        self.bits & 0x30 == 0x30
    }
    #[inline]
    fn set_repnz(&mut self) {
        self.bits = (self.bits & 0xcf) | 0x30
    }
    #[inline]
    fn clear_rep(&mut self) {
        self.bits &= 0xcf
    }
    #[inline]
    fn operand_size(&self) -> bool {
        self.bits & 0x1 == 1
    }
    #[inline]
    fn set_operand_size(&mut self) {
        self.bits |= 0x1
    }
    #[inline]
    fn address_size(&self) -> bool {
        self.bits & 0x2 == 2
    }
    #[inline]
    fn set_address_size(&mut self) {
        self.bits |= 0x2
    }
    #[inline]
    pub fn lock(&self) -> bool {
        self.bits & 0x4 == 4
    }
    #[inline]
    fn set_lock(&mut self) {
        self.bits |= 0x4
    }
    #[inline]
    fn clear_lock(&mut self) {
        self.bits &= !0x4
    }
    /// the segment-override prefix on this instruction, if any. the last override byte wins.
    #[inline]
    pub fn segment_override(&self) -> Option<Segment> {
        if self.bits & 0x40 == 0x40 {
            Some(self.segment)
        } else {
            None
        }
    }
    #[inline]
    fn set_segment(&mut self, segment: Segment) {
        self.bits |= 0x40;
        self.segment = segment;
    }
    #[inline]
    fn rex_unchecked(&self) -> PrefixRex {
        self.rex
    }
    #[inline]
    pub fn rex(&self) -> Option<PrefixRex> {
        let rex = self.rex_unchecked();
        if rex.present() {
            Some(rex)
        } else {
            None
        }
    }
    #[inline]
    fn vex_unchecked(&self) -> PrefixVex {
        PrefixVex {
            bits: self.rex.bits,
        }
    }
    #[inline]
    pub fn vex(&self) -> Option<PrefixVex> {
        let vex = self.vex_unchecked();
        if vex.present() {
            Some(vex)
        } else {
            None
        }
    }
    #[inline]
    fn evex_unchecked(&self) -> PrefixEvex {
        PrefixEvex {
            vex: PrefixVex {
                bits: self.rex.bits,
            },
            evex_data: self.evex_data,
        }
    }
    #[inline]
    pub fn evex(&self) -> Option<PrefixEvex> {
        let evex = self.evex_unchecked();
        if evex.present() {
            Some(evex)
        } else {
            None
        }
    }

    #[inline]
    fn rex_from(&mut self, bits: u8) {
        self.rex.bits = bits;
    }

    #[inline]
    fn vex_from_c5(&mut self, bits: u8) {
        // collect rex bits
        let r = bits & 0x80;
        let wrxb = (r >> 5) ^ 0x04;
        let l = (bits & 0x04) << 2;
        let synthetic_rex = wrxb | l | 0x80;
        self.rex.from(synthetic_rex);
    }

    #[inline]
    fn vex_from_c4(&mut self, high: u8, low: u8) {
        let w = low & 0x80;
        let rxb = (high >> 5) ^ 0x07;
        let wrxb = rxb | (w >> 4);
        let l = (low & 0x04) << 2;
        let synthetic_rex = wrxb | l | 0x80;
        self.rex.from(synthetic_rex);
    }

    #[inline]
    fn evex_from(&mut self, b1: u8, b2: u8, b3: u8) {
        let w = b2 & 0x80;
        let rxb = ((b1 >> 5) & 0b111) ^ 0b111; // `rxb` is provided in inverted form
        let wrxb = rxb | (w >> 4);
        let l = (b3 & 0x20) >> 1;
        let synthetic_rex = wrxb | l | 0x80;
        self.rex.from(synthetic_rex);

        // R' is provided in inverted form
        let rp = ((b1 & 0x10) >> 4) ^ 1;
        let lp = (b3 & 0x40) >> 6;
        let aaa = b3 & 0b111;
        let z = (b3 & 0x80) >> 7;
        let b = (b3 & 0x10) >> 4;
        self.evex_data.from(rp, lp, z, b, aaa);
    }
}

impl EvexData {
    fn from(&mut self, rp: u8, lp: u8, z: u8, b: u8, aaa: u8) {
        let mut bits = 0;
        bits |= aaa;
        bits |= b << 3;
        bits |= z << 4;
        bits |= lp << 5;
        bits |= rp << 6;
        bits |= 0x80;
        self.bits = bits;
    }

    fn present(&self) -> bool {
        self.bits & 0b1000_0000 != 0
    }

    fn aaa(&self) -> u8 {
        self.bits & 0b111
    }

    fn b(&self) -> bool {
        (self.bits & 0b0000_1000) != 0
    }

    fn z(&self) -> bool {
        (self.bits & 0b0001_0000) != 0
    }

    fn lp(&self) -> bool {
        (self.bits & 0b0010_0000) != 0
    }

    fn rp(&self) -> bool {
        (self.bits & 0b0100_0000) != 0
    }
}

/// the addressing mode a [`Decoder`] decodes for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Mode {
    /// 16-bit addressing and operand sizes.
    Real,
    /// 32-bit addressing and operand sizes.
    Protected,
    /// 64-bit addressing, `rex` prefixes, register numbers up to 15 (31 for vectors).
    Long,
}

/// an `x86` instruction decoder.
///
/// fundamentally this is a mode and a bag of feature flags with no additional state kept during
/// decoding. it can be copied cheaply, hashed cheaply, compared cheaply.
#[derive(Debug, PartialEq, Copy, Clone, Eq, Hash, PartialOrd, Ord)]
pub struct Decoder {
    mode: Mode,
    // feature flags tracked here:
    //  0. mov to/from test registers (0f24/0f26, 386/486 only)
    flags: u64,
}

impl Decoder {
    /// a decoder for 16-bit code.
    pub fn real() -> Self {
        Decoder { mode: Mode::Real, flags: 0 }
    }

    /// a decoder for 32-bit code.
    pub fn protected() -> Self {
        Decoder { mode: Mode::Protected, flags: 0 }
    }

    /// a decoder for 64-bit code.
    pub fn long() -> Self {
        Decoder { mode: Mode::Long, flags: 0 }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn mov_tr(&self) -> bool {
        self.flags & (1 << 0) != 0
    }

    /// also decode `mov` to/from the 386/486 test registers (`0f24`/`0f26`). these were removed
    /// from the instruction set afterwards and are rejected by default.
    pub fn with_mov_tr(mut self) -> Self {
        self.flags |= 1 << 0;
        self
    }

    /// helper to decode an instruction directly from a byte slice.
    pub fn decode_slice(&self, data: &[u8]) -> Result<Instruction, Error> {
        let mut reader = Reader::new(data);
        self.decode(&mut reader)
    }
}

impl Decodable for Decoder {
    type Instruction = Instruction;

    fn decode(&self, words: &mut Reader) -> Result<Instruction, Error> {
        words.mark();
        let mut instr = Instruction::invalid();
        read(self, words, &mut instr).map_err(|kind| Error::new(kind, words.offset()))?;

        if words.offset() > 15 {
            return Err(Error::new(ErrorKind::TooLong, words.offset()));
        }
        instr.length = words.offset() as u8;
        Ok(instr)
    }

    fn max_width(&self) -> usize {
        15
    }
}

fn read(decoder: &Decoder, words: &mut Reader, instr: &mut Instruction) -> Result<(), ErrorKind> {
    let mut mandatory = 0u8;
    let mut rex = 0u8;
    let opcode = loop {
        let byte = words.next().ok_or(ErrorKind::ExhaustedInput)?;
        match byte {
            0x26 => {
                instr.prefixes.set_segment(Segment::ES);
                rex = 0;
            }
            0x2e => {
                instr.prefixes.set_segment(Segment::CS);
                rex = 0;
            }
            0x36 => {
                instr.prefixes.set_segment(Segment::SS);
                rex = 0;
            }
            0x3e => {
                instr.prefixes.set_segment(Segment::DS);
                rex = 0;
            }
            0x64 => {
                instr.prefixes.set_segment(Segment::FS);
                rex = 0;
            }
            0x65 => {
                instr.prefixes.set_segment(Segment::GS);
                rex = 0;
            }
            0x66 => {
                instr.prefixes.set_operand_size();
                mandatory = 0x66;
                rex = 0;
            }
            0x67 => {
                instr.prefixes.set_address_size();
                rex = 0;
            }
            0xf0 => {
                instr.prefixes.set_lock();
                rex = 0;
            }
            0xf2 => {
                instr.prefixes.set_repnz();
                mandatory = 0xf2;
                rex = 0;
            }
            0xf3 => {
                instr.prefixes.set_rep();
                mandatory = 0xf3;
                rex = 0;
            }
            0x40..=0x4f if decoder.mode == Mode::Long => {
                // a rex prefix is only effective immediately before the opcode; any other prefix
                // after it cancels it
                rex = byte;
            }
            _ => break byte,
        }
    };
    if rex != 0 {
        instr.prefixes.rex_from(rex);
    }

    match opcode {
        0xc5 => vex::read_c5(decoder, words, instr)?,
        0xc4 => vex::read_c4(decoder, words, instr)?,
        0x62 => evex::read(decoder, words, instr)?,
        0x0f => read_0f(decoder, words, instr, mandatory)?,
        _ => return Err(ErrorKind::InvalidOpcode),
    }

    // everything that consumes a lock prefix (the cr8 encoding of 0f20/0f22) clears it; a
    // leftover lock byte is malformed for the whole range this decoder covers
    if instr.prefixes.lock() {
        return Err(ErrorKind::InvalidPrefixes);
    }
    Ok(())
}

fn read_0f(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    mandatory: u8,
) -> Result<(), ErrorKind> {
    let opcode = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    match opcode {
        0x20 | 0x21 | 0x22 | 0x23 | 0x24 | 0x26 => read_mov_special(decoder, words, instr, opcode),
        0x28..=0x2f => read_sse(decoder, words, instr, opcode, mandatory),
        0x38 => {
            let opcode = words.next().ok_or(ErrorKind::ExhaustedInput)?;
            read_0f38(decoder, words, instr, opcode, mandatory)
        }
        _ => Err(ErrorKind::InvalidOpcode),
    }
}

/// `mov` to/from control, debug, and test registers. the modrm mod bits are ignored for these:
/// the rm field always names a register.
fn read_mov_special(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    opcode: u8,
) -> Result<(), ErrorKind> {
    let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    let mut reg_num = (modrm >> 3) & 0b111;
    let mut rm_num = modrm & 0b111;
    let long = decoder.mode == Mode::Long;
    if long {
        let rex = instr.prefixes.rex_unchecked();
        if rex.r() {
            reg_num |= 0b1000;
        }
        if rex.b() {
            rm_num |= 0b1000;
        }
    }
    let gp_bank = if long { RegisterBank::Q } else { RegisterBank::D };

    let (bank, to_special) = match opcode {
        0x20 | 0x22 => {
            if instr.prefixes.lock() {
                // `f0 0f20` is the cr8 encoding for code without rex; the byte does not act as
                // a lock prefix here
                instr.prefixes.clear_lock();
                reg_num |= 0b1000;
            }
            (RegisterBank::CR, opcode == 0x22)
        }
        0x21 | 0x23 => (RegisterBank::DR, opcode == 0x23),
        _ => {
            // 0f24/0f26 went away with the 486; they only decode when explicitly asked for, and
            // never in long mode
            if long || !decoder.mov_tr() {
                return Err(ErrorKind::InvalidOpcode);
            }
            reg_num &= 0b111;
            (RegisterBank::TR, opcode == 0x26)
        }
    };

    instr.code = match (opcode, long) {
        (0x20, false) => Code::Mov_Rd_Cd,
        (0x20, true) => Code::Mov_Rq_Cq,
        (0x21, false) => Code::Mov_Rd_Dd,
        (0x21, true) => Code::Mov_Rq_Dq,
        (0x22, false) => Code::Mov_Cd_Rd,
        (0x22, true) => Code::Mov_Cq_Rq,
        (0x23, false) => Code::Mov_Dd_Rd,
        (0x23, true) => Code::Mov_Dq_Rq,
        (0x24, _) => Code::Mov_Rd_Td,
        _ => Code::Mov_Td_Rd,
    };

    instr.regs[0] = RegSpec { num: reg_num, bank };
    instr.regs[1] = RegSpec { num: rm_num, bank: gp_bank };
    if to_special {
        instr.operands[0] = OperandSpec::RegRRR;
        instr.operands[1] = OperandSpec::RegMMM;
    } else {
        instr.operands[0] = OperandSpec::RegMMM;
        instr.operands[1] = OperandSpec::RegRRR;
    }
    instr.operand_count = 2;
    Ok(())
}

fn read_sse(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    opcode: u8,
    mandatory: u8,
) -> Result<(), ErrorKind> {
    let long = decoder.mode == Mode::Long;
    let w = long && instr.prefixes.rex_unchecked().w();
    let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;

    match opcode {
        0x28 | 0x29 => {
            let (code_load, code_store, size) = match mandatory {
                0x66 => (
                    Code::Movapd_xmm_xmmm128,
                    Code::Movapd_xmmm128_xmm,
                    MemorySize::Packed128_Float64,
                ),
                0 => (
                    Code::Movaps_xmm_xmmm128,
                    Code::Movaps_xmmm128_xmm,
                    MemorySize::Packed128_Float32,
                ),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            let rm = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 1, 1)?;
            if opcode == 0x28 {
                instr.code = code_load;
                instr.operands[0] = OperandSpec::RegRRR;
                instr.operands[1] = rm;
            } else {
                instr.code = code_store;
                instr.operands[0] = rm;
                instr.operands[1] = OperandSpec::RegRRR;
            }
        }
        0x2a => {
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            let (code, bank, size) = match mandatory {
                0 => (
                    Code::Cvtpi2ps_xmm_mmm64,
                    RegisterBank::MM,
                    MemorySize::Packed64_Int32,
                ),
                0x66 => (
                    Code::Cvtpi2pd_xmm_mmm64,
                    RegisterBank::MM,
                    MemorySize::Packed64_Int32,
                ),
                0xf3 if w => (Code::Cvtsi2ss_xmm_rm64, RegisterBank::Q, MemorySize::Int64),
                0xf3 => (Code::Cvtsi2ss_xmm_rm32, RegisterBank::D, MemorySize::Int32),
                0xf2 if w => (Code::Cvtsi2sd_xmm_rm64, RegisterBank::Q, MemorySize::Int64),
                _ => (Code::Cvtsi2sd_xmm_rm32, RegisterBank::D, MemorySize::Int32),
            };
            instr.code = code;
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = read_E(decoder, words, instr, modrm, bank, size, 1, 1)?;
        }
        0x2b => {
            if modrm >= 0b11_000_000 {
                return Err(ErrorKind::InvalidOperand);
            }
            let (code, size) = match mandatory {
                0 => (Code::Movntps_m128_xmm, MemorySize::Packed128_Float32),
                0x66 => (Code::Movntpd_m128_xmm, MemorySize::Packed128_Float64),
                0xf3 => (Code::Movntss_m32_xmm, MemorySize::Float32),
                _ => (Code::Movntsd_m64_xmm, MemorySize::Float64),
            };
            instr.code = code;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            instr.operands[0] = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 1, 1)?;
            instr.operands[1] = OperandSpec::RegRRR;
        }
        0x2c | 0x2d => {
            let truncating = opcode == 0x2c;
            let (code, reg_bank, size) = match mandatory {
                0 => (
                    if truncating { Code::Cvttps2pi_mm_xmmm64 } else { Code::Cvtps2pi_mm_xmmm64 },
                    RegisterBank::MM,
                    MemorySize::Packed64_Float32,
                ),
                0x66 => (
                    if truncating { Code::Cvttpd2pi_mm_xmmm128 } else { Code::Cvtpd2pi_mm_xmmm128 },
                    RegisterBank::MM,
                    MemorySize::Packed128_Float64,
                ),
                0xf3 => (
                    match (truncating, w) {
                        (true, false) => Code::Cvttss2si_r32_xmmm32,
                        (true, true) => Code::Cvttss2si_r64_xmmm32,
                        (false, false) => Code::Cvtss2si_r32_xmmm32,
                        (false, true) => Code::Cvtss2si_r64_xmmm32,
                    },
                    if w { RegisterBank::Q } else { RegisterBank::D },
                    MemorySize::Float32,
                ),
                _ => (
                    match (truncating, w) {
                        (true, false) => Code::Cvttsd2si_r32_xmmm64,
                        (true, true) => Code::Cvttsd2si_r64_xmmm64,
                        (false, false) => Code::Cvtsd2si_r32_xmmm64,
                        (false, true) => Code::Cvtsd2si_r64_xmmm64,
                    },
                    if w { RegisterBank::Q } else { RegisterBank::D },
                    MemorySize::Float64,
                ),
            };
            instr.code = code;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, reg_bank);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 1, 1)?;
        }
        _ => {
            // 0x2e / 0x2f
            let unordered = opcode == 0x2e;
            let (code, size) = match mandatory {
                0 => (
                    if unordered { Code::Ucomiss_xmm_xmmm32 } else { Code::Comiss_xmm_xmmm32 },
                    MemorySize::Float32,
                ),
                0x66 => (
                    if unordered { Code::Ucomisd_xmm_xmmm64 } else { Code::Comisd_xmm_xmmm64 },
                    MemorySize::Float64,
                ),
                _ => return Err(ErrorKind::InvalidOpcode),
            };
            instr.code = code;
            instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
            instr.operands[0] = OperandSpec::RegRRR;
            instr.operands[1] = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 1, 1)?;
        }
    }

    instr.operand_count = 2;
    // f2/f3 acted as a mandatory-prefix selector above, not as a rep prefix
    instr.prefixes.clear_rep();
    Ok(())
}

fn read_0f38(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    opcode: u8,
    mandatory: u8,
) -> Result<(), ErrorKind> {
    if mandatory != 0x66 {
        return Err(ErrorKind::InvalidOpcode);
    }
    let (code, size) = match opcode {
        0x40 => (Code::Pmulld_VX_WX, MemorySize::Packed128_Int32),
        0x41 => (Code::Phminposuw_VX_WX, MemorySize::Packed128_UInt16),
        _ => return Err(ErrorKind::InvalidOpcode),
    };
    let modrm = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    instr.code = code;
    instr.regs[0] = read_modrm_reg(decoder, instr, modrm, RegisterBank::X);
    instr.operands[0] = OperandSpec::RegRRR;
    instr.operands[1] = read_E(decoder, words, instr, modrm, RegisterBank::X, size, 0, 1)?;
    instr.operand_count = 2;
    instr.prefixes.clear_rep();
    Ok(())
}

/// the element type a packed/broadcast memory shape is built from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Elem {
    F32,
    F64,
    I32,
    I64,
    U32,
    U64,
}

impl Elem {
    pub(crate) fn width(self) -> u32 {
        match self {
            Elem::F32 | Elem::I32 | Elem::U32 => 4,
            Elem::F64 | Elem::I64 | Elem::U64 => 8,
        }
    }
}

pub(crate) fn packed_size(bank: RegisterBank, elem: Elem) -> MemorySize {
    match (bank, elem) {
        (RegisterBank::X, Elem::F32) => MemorySize::Packed128_Float32,
        (RegisterBank::X, Elem::F64) => MemorySize::Packed128_Float64,
        (RegisterBank::X, Elem::I32) => MemorySize::Packed128_Int32,
        (RegisterBank::X, Elem::I64) => MemorySize::Packed128_Int64,
        (RegisterBank::X, Elem::U32) => MemorySize::Packed128_UInt32,
        (RegisterBank::X, Elem::U64) => MemorySize::Packed128_UInt64,
        (RegisterBank::Y, Elem::F32) => MemorySize::Packed256_Float32,
        (RegisterBank::Y, Elem::F64) => MemorySize::Packed256_Float64,
        (RegisterBank::Y, Elem::I32) => MemorySize::Packed256_Int32,
        (RegisterBank::Y, Elem::I64) => MemorySize::Packed256_Int64,
        (RegisterBank::Y, Elem::U32) => MemorySize::Packed256_UInt32,
        (RegisterBank::Y, Elem::U64) => MemorySize::Packed256_UInt64,
        (_, Elem::F32) => MemorySize::Packed512_Float32,
        (_, Elem::F64) => MemorySize::Packed512_Float64,
        (_, Elem::I32) => MemorySize::Packed512_Int32,
        (_, Elem::I64) => MemorySize::Packed512_Int64,
        (_, Elem::U32) => MemorySize::Packed512_UInt32,
        (_, Elem::U64) => MemorySize::Packed512_UInt64,
    }
}

pub(crate) fn broadcast_size(bank: RegisterBank, elem: Elem) -> MemorySize {
    match (bank, elem) {
        (RegisterBank::X, Elem::F32) => MemorySize::Broadcast128_Float32,
        (RegisterBank::X, Elem::F64) => MemorySize::Broadcast128_Float64,
        (RegisterBank::X, Elem::I32) => MemorySize::Broadcast128_Int32,
        (RegisterBank::X, Elem::I64) => MemorySize::Broadcast128_Int64,
        (RegisterBank::X, Elem::U32) => MemorySize::Broadcast128_UInt32,
        (RegisterBank::X, Elem::U64) => MemorySize::Broadcast128_UInt64,
        (RegisterBank::Y, Elem::F32) => MemorySize::Broadcast256_Float32,
        (RegisterBank::Y, Elem::F64) => MemorySize::Broadcast256_Float64,
        (RegisterBank::Y, Elem::I32) => MemorySize::Broadcast256_Int32,
        (RegisterBank::Y, Elem::I64) => MemorySize::Broadcast256_Int64,
        (RegisterBank::Y, Elem::U32) => MemorySize::Broadcast256_UInt32,
        (RegisterBank::Y, Elem::U64) => MemorySize::Broadcast256_UInt64,
        (_, Elem::F32) => MemorySize::Broadcast512_Float32,
        (_, Elem::F64) => MemorySize::Broadcast512_Float64,
        (_, Elem::I32) => MemorySize::Broadcast512_Int32,
        (_, Elem::I64) => MemorySize::Broadcast512_Int64,
        (_, Elem::U32) => MemorySize::Broadcast512_UInt32,
        (_, Elem::U64) => MemorySize::Broadcast512_UInt64,
    }
}

/// bytes a full vector of this bank spans, for compressed-displacement scaling.
pub(crate) fn vector_bytes(bank: RegisterBank) -> u32 {
    match bank {
        RegisterBank::X => 16,
        RegisterBank::Y => 32,
        _ => 64,
    }
}

/// resolve the modrm `rrr` field to a register, folding in `rex.r` (and `evex.r'` for vector
/// banks) in long mode.
pub(crate) fn read_modrm_reg(
    decoder: &Decoder,
    instr: &Instruction,
    modrm: u8,
    bank: RegisterBank,
) -> RegSpec {
    let mut num = (modrm >> 3) & 0b111;
    if decoder.mode == Mode::Long {
        if instr.prefixes.rex_unchecked().r() {
            num |= 0b1000;
        }
        let vector = matches!(bank, RegisterBank::X | RegisterBank::Y | RegisterBank::Z);
        if vector && instr.prefixes.evex().is_some() && instr.prefixes.evex_unchecked().rp() {
            num |= 0b10000;
        }
    }
    if bank == RegisterBank::MM {
        num &= 0b111;
    }
    RegSpec { num, bank }
}

/// materialize the `vvvv` register stored during vex/evex prefix parsing.
pub(crate) fn vex_reg(decoder: &Decoder, instr: &Instruction, bank: RegisterBank) -> RegSpec {
    let mut num = instr.regs[3].num;
    if decoder.mode != Mode::Long {
        num &= 0b111;
    }
    RegSpec { num, bank }
}

/// forms without a `vvvv` operand require the field to encode register 0 (all bits set on the
/// wire); anything else is a malformed instruction.
pub(crate) fn require_no_vvvv(instr: &Instruction) -> Result<(), ErrorKind> {
    if instr.regs[3].num != 0 {
        return Err(ErrorKind::InvalidOperand);
    }
    Ok(())
}

pub(crate) fn avx_prefix_conflict(instr: &Instruction) -> bool {
    let p = &instr.prefixes;
    p.lock() || p.rep() || p.repnz() || p.operand_size() || p.rex().is_some()
}

/// resolve modrm's `mmm` field: a register when mod is 11, otherwise the memory operand.
///
/// `default_scale` is what `memory_scale` reports for no-`sib` addressing on this opcode map;
/// `disp_scale` is the evex compressed-displacement multiplier (1 for legacy/vex).
#[allow(non_snake_case)]
pub(crate) fn read_E(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    modrm: u8,
    bank: RegisterBank,
    size: MemorySize,
    default_scale: u8,
    disp_scale: u32,
) -> Result<OperandSpec, ErrorKind> {
    if modrm >= 0b11_000_000 {
        let mut num = modrm & 0b111;
        if decoder.mode == Mode::Long {
            let rex = instr.prefixes.rex_unchecked();
            if rex.b() {
                num |= 0b1000;
            }
            let vector = matches!(bank, RegisterBank::X | RegisterBank::Y | RegisterBank::Z);
            if vector && instr.prefixes.evex().is_some() && rex.x() {
                num |= 0b10000;
            }
        }
        if bank == RegisterBank::MM {
            num &= 0b111;
        }
        instr.regs[1] = RegSpec { num, bank };
        Ok(OperandSpec::RegMMM)
    } else {
        read_M(decoder, words, instr, modrm, size, default_scale, disp_scale)?;
        Ok(OperandSpec::Mem)
    }
}

#[allow(non_snake_case)]
fn read_M(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    modrm: u8,
    size: MemorySize,
    default_scale: u8,
    disp_scale: u32,
) -> Result<(), ErrorKind> {
    instr.mem_size = size;
    let mod_bits = modrm >> 6;
    let rm = modrm & 0b111;

    let addr16 = match decoder.mode {
        Mode::Real => !instr.prefixes.address_size(),
        Mode::Protected => instr.prefixes.address_size(),
        Mode::Long => false,
    };

    if addr16 {
        let (base, index) = match rm {
            0 => (Some(RegSpec::bx()), Some(RegSpec::si())),
            1 => (Some(RegSpec::bx()), Some(RegSpec::di())),
            2 => (Some(RegSpec::bp()), Some(RegSpec::si())),
            3 => (Some(RegSpec::bp()), Some(RegSpec::di())),
            4 => (Some(RegSpec::si()), None),
            5 => (Some(RegSpec::di()), None),
            6 => {
                if mod_bits == 0b00 {
                    (None, None)
                } else {
                    (Some(RegSpec::bp()), None)
                }
            }
            _ => (Some(RegSpec::bx()), None),
        };
        instr.mem_base = base;
        instr.mem_index = index;
        instr.scale = default_scale;
        match mod_bits {
            0b00 => {
                if rm == 6 {
                    instr.disp = read_num(words, 2)?;
                    instr.disp_size = 2;
                }
            }
            0b01 => {
                // 16-bit addressing truncates the scaled displacement to 16 bits.
                read_disp8(words, instr, disp_scale)?;
                instr.disp &= 0xffff;
            }
            _ => {
                instr.disp = read_num(words, 2)?;
                instr.disp_size = 2;
            }
        }
    } else {
        let bank = if decoder.mode == Mode::Long && !instr.prefixes.address_size() {
            RegisterBank::Q
        } else {
            RegisterBank::D
        };
        let mut forced_disp32 = false;
        if rm == 0b100 {
            forced_disp32 = read_sib(decoder, words, instr, mod_bits, bank, default_scale)?;
        } else {
            if mod_bits == 0b00 && rm == 0b101 {
                instr.mem_base = None;
                forced_disp32 = true;
            } else {
                let mut num = rm;
                if decoder.mode == Mode::Long && instr.prefixes.rex_unchecked().b() {
                    num |= 0b1000;
                }
                instr.mem_base = Some(RegSpec { num, bank });
            }
            instr.mem_index = None;
            instr.scale = default_scale;
        }
        match mod_bits {
            0b00 if forced_disp32 => {
                instr.disp = read_num(words, 4)?;
                instr.disp_size = 4;
            }
            0b01 => read_disp8(words, instr, disp_scale)?,
            0b10 => {
                instr.disp = read_num(words, 4)?;
                instr.disp_size = 4;
            }
            _ => {}
        }
    }

    instr.mem_segment = match instr.prefixes.segment_override() {
        Some(segment) => segment,
        None => default_segment(instr.mem_base),
    };
    Ok(())
}

/// decode a `sib` byte, returning whether the mod-00 "no base, disp32" encoding was chosen.
fn read_sib(
    decoder: &Decoder,
    words: &mut Reader,
    instr: &mut Instruction,
    mod_bits: u8,
    bank: RegisterBank,
    default_scale: u8,
) -> Result<bool, ErrorKind> {
    let sib = words.next().ok_or(ErrorKind::ExhaustedInput)?;
    let ss = sib >> 6;
    let index = (sib >> 3) & 0b111;
    let base = sib & 0b111;
    let long = decoder.mode == Mode::Long;
    let rex = instr.prefixes.rex_unchecked();

    let mut forced_disp32 = false;
    if base == 0b101 && mod_bits == 0b00 {
        instr.mem_base = None;
        forced_disp32 = true;
    } else {
        let mut num = base;
        if long && rex.b() {
            num |= 0b1000;
        }
        instr.mem_base = Some(RegSpec { num, bank });
    }

    let x = long && rex.x();
    if index == 0b100 && !x {
        instr.mem_index = None;
        instr.scale = default_scale;
    } else {
        let num = if x { index | 0b1000 } else { index };
        instr.mem_index = Some(RegSpec { num, bank });
        instr.scale = 1 << ss;
    }
    Ok(forced_disp32)
}

fn read_disp8(words: &mut Reader, instr: &mut Instruction, disp_scale: u32) -> Result<(), ErrorKind> {
    let byte = words.next().ok_or(ErrorKind::ExhaustedInput)? as i8;
    instr.disp = (byte as i32).wrapping_mul(disp_scale as i32) as u32;
    instr.disp_size = 1;
    Ok(())
}

fn read_num(words: &mut Reader, width: usize) -> Result<u32, ErrorKind> {
    let mut buf = [0u8; 4];
    words
        .next_n(&mut buf[..width])
        .ok_or(ErrorKind::ExhaustedInput)?;
    Ok(u32::from_le_bytes(buf))
}

fn default_segment(base: Option<RegSpec>) -> Segment {
    match base {
        Some(reg)
            if matches!(reg.bank, RegisterBank::W | RegisterBank::D | RegisterBank::Q)
                && (reg.num == 4 || reg.num == 5) =>
        {
            Segment::SS
        }
        _ => Segment::DS,
    }
}
