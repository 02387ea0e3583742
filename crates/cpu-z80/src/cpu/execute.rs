//! Instruction fetch, decode and execution.

#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.

use emu_core::Bus;

use crate::alu::{
    adc16, add16, alu8, daa, dec8, inc8, mulub, muluw, rotate, rotate_a, sbc16, sub8,
};
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity, sz53, sz53p};
use crate::opcodes::{AluOp, BlockOp, Mem, Op, RotOp, Table};
use crate::personality::Personality;

use super::CpuCore;

impl<P: Personality> CpuCore<P> {
    // === Bus access ===

    #[inline]
    pub(crate) fn read<B: Bus>(&mut self, bus: &mut B, address: u16) -> u8 {
        self.link.read(bus, address, self.clock.time())
    }

    #[inline]
    pub(crate) fn write<B: Bus>(&mut self, bus: &mut B, address: u16, value: u8) {
        self.link.write(bus, address, value, self.clock.time());
    }

    pub(crate) fn read_word<B: Bus>(&mut self, bus: &mut B, address: u16) -> u16 {
        let lo = self.read(bus, address);
        let hi = self.read(bus, address.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write_word<B: Bus>(&mut self, bus: &mut B, address: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write(bus, address, lo);
        self.write(bus, address.wrapping_add(1), hi);
    }

    pub(crate) fn push<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write(bus, self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write(bus, self.regs.sp, lo);
    }

    fn pop<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let value = self.read_word(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    fn port_in<B: Bus>(&mut self, bus: &mut B, port: u16) -> u8 {
        self.link.io_read(bus, port, self.clock.time())
    }

    fn port_out<B: Bus>(&mut self, bus: &mut B, port: u16, value: u8) {
        self.link.io_write(bus, port, value, self.clock.time());
    }

    // === Instruction stream ===

    /// M1 cycle: fetch an opcode or prefix byte and refresh.
    fn fetch_opcode<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let opcode = if self.fetch_from_ack {
            bus.interrupt_ack()
        } else {
            let pc = self.regs.pc;
            self.regs.pc = pc.wrapping_add(1);
            self.read(bus, pc)
        };
        self.regs.inc_r(1);
        self.charge(P::TIMING.m1);
        opcode
    }

    /// Operand byte (immediate or displacement).
    fn fetch_byte<B: Bus>(&mut self, bus: &mut B) -> u8 {
        if self.fetch_from_ack {
            return bus.interrupt_ack();
        }
        let pc = self.regs.pc;
        self.regs.pc = pc.wrapping_add(1);
        self.read(bus, pc)
    }

    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Effective address of a memory operand, fetching the displacement
    /// for indexed forms.
    fn mem_addr<B: Bus>(&mut self, bus: &mut B, mem: Mem) -> u16 {
        let base = match mem {
            Mem::Hl => return self.regs.hl(),
            Mem::Ix => self.regs.ix,
            Mem::Iy => self.regs.iy,
        };
        let d = self.fetch_byte(bus) as i8;
        self.regs.wz = base.wrapping_add_signed(i16::from(d));
        self.regs.wz
    }

    /// Address of a CB-space memory operand. Indexed forms computed it
    /// into WZ before the opcode byte.
    fn cb_addr(&self, mem: Mem) -> u16 {
        match mem {
            Mem::Hl => self.regs.hl(),
            Mem::Ix | Mem::Iy => self.regs.wz,
        }
    }

    /// Decode and execute one instruction, following prefixes.
    ///
    /// A `DD`/`FD` followed by another `DD`/`FD` ends the step with the
    /// second prefix pending, so a long prefix run stays interruptible only
    /// at its end while still costing one M1 per byte.
    pub(crate) fn execute_instruction<B: Bus>(&mut self, bus: &mut B) {
        let mut table = self.prefix.take().unwrap_or(Table::Main);
        loop {
            let opcode = self.fetch_opcode(bus);
            match table.lookup(opcode) {
                Op::Prefix(next @ (Table::Dd | Table::Fd)) if table.is_index() => {
                    self.prefix = Some(next);
                    return;
                }
                Op::Prefix(next @ (Table::DdCb | Table::FdCb)) => {
                    // Displacement comes before the opcode byte.
                    let base = if next == Table::DdCb {
                        self.regs.ix
                    } else {
                        self.regs.iy
                    };
                    let d = self.fetch_byte(bus) as i8;
                    self.regs.wz = base.wrapping_add_signed(i16::from(d));
                    let code = self.fetch_byte(bus);
                    self.charge(P::TIMING.index_bit_fetch);
                    self.exec(bus, next.lookup(code));
                    return;
                }
                Op::Prefix(next) => table = next,
                op => {
                    self.exec(bus, op);
                    return;
                }
            }
        }
    }

    fn jump_relative(&mut self, d: u8) {
        self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(d as i8));
        self.regs.wz = self.regs.pc;
    }

    fn alu_a(&mut self, op: AluOp, value: u8) {
        let result = alu8(op, self.regs.a, value, self.regs.f);
        self.regs.a = result.value;
        self.regs.f = result.flags;
    }

    /// `BIT n` flags. X/Y come from `xy`, which differs per addressing mode.
    fn bit(&mut self, n: u8, value: u8, xy: u8) {
        let set = value & (1 << n);
        let mut f = (self.regs.f & CF) | HF | (xy & (YF | XF));
        if set == 0 {
            f |= ZF | PF;
        }
        if n == 7 && set != 0 {
            f |= SF;
        }
        self.regs.f = f;
    }

    fn set_a_ir(&mut self, value: u8) {
        self.regs.a = value;
        let mut f = (self.regs.f & CF) | sz53(value);
        if self.regs.iff2 {
            f |= PF;
        }
        self.regs.f = f;
    }

    fn mem_cost(mem: Mem, direct: u32, indexed: u32) -> u32 {
        if mem == Mem::Hl { direct } else { indexed }
    }

    /// Execute one decoded operation.
    #[allow(clippy::too_many_lines)]
    fn exec<B: Bus>(&mut self, bus: &mut B, op: Op) {
        let t = P::TIMING;
        match op {
            Op::Nop | Op::Prefix(_) => {}

            // === 8-bit loads ===
            Op::LdRR(dst, src) => {
                let v = self.regs.get8(src);
                self.regs.set8(dst, v);
            }
            Op::LdRN(r) => {
                let n = self.fetch_byte(bus);
                self.regs.set8(r, n);
                self.charge(t.ld_r_n);
            }
            Op::LdRMem(r, mem) => {
                let addr = self.mem_addr(bus, mem);
                let v = self.read(bus, addr);
                self.regs.set8(r, v);
                self.charge(Self::mem_cost(mem, t.ld_r_hl, t.ld_r_xix));
            }
            Op::LdMemR(mem, r) => {
                let addr = self.mem_addr(bus, mem);
                let v = self.regs.get8(r);
                self.write(bus, addr, v);
                self.charge(Self::mem_cost(mem, t.ld_hl_r, t.ld_xix_r));
            }
            Op::LdMemN(mem) => {
                let addr = self.mem_addr(bus, mem);
                let n = self.fetch_byte(bus);
                self.write(bus, addr, n);
                self.charge(Self::mem_cost(mem, t.ld_hl_n, t.ld_xix_n));
            }
            Op::LdAInd(rr) => {
                let addr = self.regs.get16(rr);
                self.regs.a = self.read(bus, addr);
                self.regs.wz = addr.wrapping_add(1);
                self.charge(t.ld_r_hl);
            }
            Op::LdIndA(rr) => {
                let addr = self.regs.get16(rr);
                let a = self.regs.a;
                self.write(bus, addr, a);
                self.regs.wz = u16::from(a) << 8 | (addr.wrapping_add(1) & 0xFF);
                self.charge(t.ld_hl_r);
            }
            Op::LdAAbs => {
                let addr = self.fetch_word(bus);
                self.regs.a = self.read(bus, addr);
                self.regs.wz = addr.wrapping_add(1);
                self.charge(t.ld_a_abs);
            }
            Op::LdAbsA => {
                let addr = self.fetch_word(bus);
                let a = self.regs.a;
                self.write(bus, addr, a);
                self.regs.wz = u16::from(a) << 8 | (addr.wrapping_add(1) & 0xFF);
                self.charge(t.ld_a_abs);
            }

            // === 16-bit loads and stack ===
            Op::LdRrNn(rr) => {
                let nn = self.fetch_word(bus);
                self.regs.set16(rr, nn);
                self.charge(t.ld_rr_nn);
            }
            Op::LdRrAbs(rr) => {
                let addr = self.fetch_word(bus);
                let v = self.read_word(bus, addr);
                self.regs.set16(rr, v);
                self.regs.wz = addr.wrapping_add(1);
                self.charge(t.ld_hl_abs);
            }
            Op::LdAbsRr(rr) => {
                let addr = self.fetch_word(bus);
                let v = self.regs.get16(rr);
                self.write_word(bus, addr, v);
                self.regs.wz = addr.wrapping_add(1);
                self.charge(t.ld_hl_abs);
            }
            Op::LdSpRr(rr) => {
                self.regs.sp = self.regs.get16(rr);
                self.charge(t.ld_sp_hl);
            }
            Op::Push(rr) => {
                let v = self.regs.get16(rr);
                self.push(bus, v);
                self.charge(t.push);
            }
            Op::Pop(rr) => {
                let v = self.pop(bus);
                self.regs.set16(rr, v);
                self.charge(t.pop);
            }
            Op::ExDeHl => self.regs.ex_de_hl(),
            Op::ExAfAf => self.regs.ex_af(),
            Op::Exx => self.regs.exx(),
            Op::ExSpRr(rr) => {
                let sp = self.regs.sp;
                let v = self.read_word(bus, sp);
                let old = self.regs.get16(rr);
                self.write_word(bus, sp, old);
                self.regs.set16(rr, v);
                self.regs.wz = v;
                self.charge(t.ex_sp);
            }

            // === Arithmetic ===
            Op::Alu(alu, r) => {
                let v = self.regs.get8(r);
                self.alu_a(alu, v);
            }
            Op::AluN(alu) => {
                let n = self.fetch_byte(bus);
                self.alu_a(alu, n);
                self.charge(t.alu_n);
            }
            Op::AluMem(alu, mem) => {
                let addr = self.mem_addr(bus, mem);
                let v = self.read(bus, addr);
                self.alu_a(alu, v);
                self.charge(Self::mem_cost(mem, t.alu_hl, t.alu_xix));
            }
            Op::Inc(r) => {
                let res = inc8(self.regs.get8(r), self.regs.f);
                self.regs.set8(r, res.value);
                self.regs.f = res.flags;
            }
            Op::Dec(r) => {
                let res = dec8(self.regs.get8(r), self.regs.f);
                self.regs.set8(r, res.value);
                self.regs.f = res.flags;
            }
            Op::IncMem(mem) | Op::DecMem(mem) => {
                let addr = self.mem_addr(bus, mem);
                let v = self.read(bus, addr);
                let res = if matches!(op, Op::IncMem(_)) {
                    inc8(v, self.regs.f)
                } else {
                    dec8(v, self.regs.f)
                };
                self.write(bus, addr, res.value);
                self.regs.f = res.flags;
                self.charge(Self::mem_cost(mem, t.inc_hl, t.inc_xix));
            }
            Op::Inc16(rr) => {
                let v = self.regs.get16(rr).wrapping_add(1);
                self.regs.set16(rr, v);
                self.charge(t.inc16);
            }
            Op::Dec16(rr) => {
                let v = self.regs.get16(rr).wrapping_sub(1);
                self.regs.set16(rr, v);
                self.charge(t.inc16);
            }
            Op::Add16(dst, src) => {
                let a = self.regs.get16(dst);
                let (v, f) = add16(a, self.regs.get16(src), self.regs.f);
                self.regs.wz = a.wrapping_add(1);
                self.regs.set16(dst, v);
                self.regs.f = f;
                self.charge(t.add16);
            }
            Op::Adc16(rr) | Op::Sbc16(rr) => {
                let hl = self.regs.hl();
                let operand = self.regs.get16(rr);
                let (v, f) = if matches!(op, Op::Adc16(_)) {
                    adc16(hl, operand, self.regs.carry())
                } else {
                    sbc16(hl, operand, self.regs.carry())
                };
                self.regs.wz = hl.wrapping_add(1);
                self.regs.set_hl(v);
                self.regs.f = f;
                self.charge(t.adc16);
            }

            // === Accumulator and flags ===
            Op::Rlca | Op::Rrca | Op::Rla | Op::Rra => {
                let rot = match op {
                    Op::Rlca => RotOp::Rlc,
                    Op::Rrca => RotOp::Rrc,
                    Op::Rla => RotOp::Rl,
                    _ => RotOp::Rr,
                };
                let res = rotate_a(rot, self.regs.a, self.regs.f);
                self.regs.a = res.value;
                self.regs.f = res.flags;
            }
            Op::Daa => {
                let res = daa(self.regs.a, self.regs.f);
                self.regs.a = res.value;
                self.regs.f = res.flags;
            }
            Op::Cpl => {
                self.regs.a = !self.regs.a;
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF | CF)) | HF | NF | (self.regs.a & (YF | XF));
            }
            Op::Scf => {
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | CF | (self.regs.a & (YF | XF));
            }
            Op::Ccf => {
                let carry = self.regs.f & CF;
                let mut f = (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF));
                f |= if carry != 0 { HF } else { CF };
                self.regs.f = f;
            }

            // === Control ===
            Op::Halt => self.regs.halted = true,
            Op::Di => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }
            Op::Ei => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.after_ei = true;
                self.link.arm(1);
            }
            Op::Jp => {
                let nn = self.fetch_word(bus);
                self.regs.pc = nn;
                self.regs.wz = nn;
                self.charge(t.jp);
            }
            Op::JpCc(cond) => {
                let nn = self.fetch_word(bus);
                self.regs.wz = nn;
                if self.regs.condition(cond) {
                    self.regs.pc = nn;
                }
                self.charge(t.jp);
            }
            Op::JpRr(rr) => self.regs.pc = self.regs.get16(rr),
            Op::Jr => {
                let d = self.fetch_byte(bus);
                self.jump_relative(d);
                self.charge(t.jr);
            }
            Op::JrCc(cond) => {
                let d = self.fetch_byte(bus);
                if self.regs.condition(cond) {
                    self.jump_relative(d);
                    self.charge(t.jr);
                } else {
                    self.charge(t.jr_not_taken);
                }
            }
            Op::Djnz => {
                self.regs.b = self.regs.b.wrapping_sub(1);
                let d = self.fetch_byte(bus);
                if self.regs.b != 0 {
                    self.jump_relative(d);
                    self.charge(t.djnz);
                } else {
                    self.charge(t.djnz_not_taken);
                }
            }
            Op::Call => {
                let nn = self.fetch_word(bus);
                let pc = self.regs.pc;
                self.push(bus, pc);
                self.regs.pc = nn;
                self.regs.wz = nn;
                self.charge(t.call);
            }
            Op::CallCc(cond) => {
                let nn = self.fetch_word(bus);
                self.regs.wz = nn;
                if self.regs.condition(cond) {
                    let pc = self.regs.pc;
                    self.push(bus, pc);
                    self.regs.pc = nn;
                    self.charge(t.call);
                } else {
                    self.charge(t.call_not_taken);
                }
            }
            Op::Ret => {
                self.regs.pc = self.pop(bus);
                self.regs.wz = self.regs.pc;
                self.charge(t.ret);
            }
            Op::RetCc(cond) => {
                if self.regs.condition(cond) {
                    self.regs.pc = self.pop(bus);
                    self.regs.wz = self.regs.pc;
                    self.charge(t.ret_cc_taken);
                } else {
                    self.charge(t.ret_cc_not_taken);
                }
            }
            Op::Rst(vector) => {
                let pc = self.regs.pc;
                self.push(bus, pc);
                self.regs.pc = u16::from(vector);
                self.regs.wz = self.regs.pc;
                self.charge(t.rst);
            }

            // === I/O ===
            Op::OutNA => {
                let n = self.fetch_byte(bus);
                let a = self.regs.a;
                let port = u16::from(a) << 8 | u16::from(n);
                self.port_out(bus, port, a);
                self.regs.wz = u16::from(a) << 8 | u16::from(n.wrapping_add(1));
                self.charge(t.in_a_n);
            }
            Op::InAN => {
                let n = self.fetch_byte(bus);
                let port = u16::from(self.regs.a) << 8 | u16::from(n);
                self.regs.a = self.port_in(bus, port);
                self.regs.wz = port.wrapping_add(1);
                self.charge(t.in_a_n);
            }
            Op::InRC(r) => {
                let port = self.regs.bc();
                let v = self.port_in(bus, port);
                self.regs.f = (self.regs.f & CF) | sz53p(v);
                if let Some(r) = r {
                    self.regs.set8(r, v);
                }
                self.regs.wz = port.wrapping_add(1);
                self.charge(t.in_r_c);
            }
            Op::OutCR(r) => {
                let port = self.regs.bc();
                let v = r.map_or(0, |r| self.regs.get8(r));
                self.port_out(bus, port, v);
                self.regs.wz = port.wrapping_add(1);
                self.charge(t.in_r_c);
            }

            // === CB space ===
            Op::Rot(rot, r) => {
                let res = rotate(rot, self.regs.get8(r), self.regs.f);
                self.regs.set8(r, res.value);
                self.regs.f = res.flags;
            }
            Op::RotMem(rot, mem, copy) => {
                let addr = self.cb_addr(mem);
                let v = self.read(bus, addr);
                let res = rotate(rot, v, self.regs.f);
                self.write(bus, addr, res.value);
                self.regs.f = res.flags;
                if let Some(r) = copy {
                    self.regs.set8(r, res.value);
                }
                self.charge(Self::mem_cost(mem, t.rot_hl, t.rot_xix));
            }
            Op::Bit(n, r) => {
                let v = self.regs.get8(r);
                self.bit(n, v, v);
            }
            Op::BitMem(n, mem) => {
                let addr = self.cb_addr(mem);
                let v = self.read(bus, addr);
                let xy = (self.regs.wz >> 8) as u8;
                self.bit(n, v, xy);
                self.charge(Self::mem_cost(mem, t.bit_hl, t.bit_xix));
            }
            Op::Res(n, r) => {
                let v = self.regs.get8(r) & !(1 << n);
                self.regs.set8(r, v);
            }
            Op::Set(n, r) => {
                let v = self.regs.get8(r) | (1 << n);
                self.regs.set8(r, v);
            }
            Op::ResMem(n, mem, copy) | Op::SetMem(n, mem, copy) => {
                let addr = self.cb_addr(mem);
                let old = self.read(bus, addr);
                let v = if matches!(op, Op::SetMem(..)) {
                    old | (1 << n)
                } else {
                    old & !(1 << n)
                };
                self.write(bus, addr, v);
                if let Some(r) = copy {
                    self.regs.set8(r, v);
                }
                self.charge(Self::mem_cost(mem, t.rot_hl, t.rot_xix));
            }

            // === ED space ===
            Op::Neg => {
                let res = sub8(0, self.regs.a, false);
                self.regs.a = res.value;
                self.regs.f = res.flags;
            }
            Op::Retn => {
                self.regs.pc = self.pop(bus);
                self.regs.wz = self.regs.pc;
                self.regs.iff1 = self.regs.iff2;
                self.link.irq.finish_nmi();
                self.link.arm(1);
                self.charge(t.retn);
            }
            Op::Reti => {
                self.regs.pc = self.pop(bus);
                self.regs.wz = self.regs.pc;
                self.link.irq.finish_irq();
                bus.reti(self.clock.time());
                self.charge(t.retn);
            }
            Op::Im(mode) => {
                self.regs.im = mode;
                self.charge(t.im);
            }
            Op::LdIA => {
                self.regs.i = self.regs.a;
                self.charge(t.ld_a_i);
            }
            Op::LdRA => {
                self.regs.r = self.regs.a;
                self.charge(t.ld_a_i);
            }
            Op::LdAI => {
                self.set_a_ir(self.regs.i);
                self.charge(t.ld_a_i);
            }
            Op::LdAR => {
                self.set_a_ir(self.regs.r);
                self.charge(t.ld_a_i);
            }
            Op::Rrd | Op::Rld => {
                let hl = self.regs.hl();
                let m = self.read(bus, hl);
                let a = self.regs.a;
                let (mem, acc) = if op == Op::Rrd {
                    ((a << 4) | (m >> 4), (a & 0xF0) | (m & 0x0F))
                } else {
                    ((m << 4) | (a & 0x0F), (a & 0xF0) | (m >> 4))
                };
                self.write(bus, hl, mem);
                self.regs.a = acc;
                self.regs.f = (self.regs.f & CF) | sz53p(acc);
                self.regs.wz = hl.wrapping_add(1);
                self.charge(t.rld);
            }
            Op::Block(block) => self.block(bus, block),
            Op::Mulub(r) if P::HAS_MULTIPLY => {
                let (product, f) = mulub(self.regs.a, self.regs.get8(r), self.regs.f);
                self.regs.set_hl(product);
                self.regs.f = f;
                self.charge(t.mulub);
            }
            Op::Muluw(rr) if P::HAS_MULTIPLY => {
                let (product, f) = muluw(self.regs.hl(), self.regs.get16(rr), self.regs.f);
                self.regs.set_de((product >> 16) as u16);
                self.regs.set_hl(product as u16);
                self.regs.f = f;
                self.charge(t.muluw);
            }
            Op::Mulub(_) | Op::Muluw(_) | Op::EdNop => {
                tracing::trace!(
                    pc = format_args!("{:#06X}", self.regs.pc.wrapping_sub(2)),
                    "undefined ED opcode"
                );
            }
        }
    }

    /// Block transfer, compare and I/O. Repeating forms rewind PC so the
    /// instruction runs again after an interrupt check.
    fn block<B: Bus>(&mut self, bus: &mut B, op: BlockOp) {
        let t = P::TIMING;
        let step: u16 = if op.decrements() { 0xFFFF } else { 1 };
        let hl = self.regs.hl();
        let repeat = match op {
            BlockOp::Ldi | BlockOp::Ldd | BlockOp::Ldir | BlockOp::Lddr => {
                let v = self.read(bus, hl);
                let de = self.regs.de();
                self.write(bus, de, v);
                self.regs.set_hl(hl.wrapping_add(step));
                self.regs.set_de(de.wrapping_add(step));
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);

                let n = v.wrapping_add(self.regs.a);
                let mut f = (self.regs.f & (SF | ZF | CF)) | (n & XF) | ((n << 4) & YF);
                if bc != 0 {
                    f |= PF;
                }
                self.regs.f = f;
                bc != 0
            }
            BlockOp::Cpi | BlockOp::Cpd | BlockOp::Cpir | BlockOp::Cpdr => {
                let v = self.read(bus, hl);
                let a = self.regs.a;
                let diff = a.wrapping_sub(v);
                self.regs.set_hl(hl.wrapping_add(step));
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);
                self.regs.wz = self.regs.wz.wrapping_add(step);

                let half = (a & 0x0F) < (v & 0x0F);
                let n = diff.wrapping_sub(u8::from(half));
                let mut f = (self.regs.f & CF) | NF | (sz53(diff) & (SF | ZF));
                f |= (n & XF) | ((n << 4) & YF);
                if half {
                    f |= HF;
                }
                if bc != 0 {
                    f |= PF;
                }
                self.regs.f = f;
                bc != 0 && diff != 0
            }
            BlockOp::Ini | BlockOp::Ind | BlockOp::Inir | BlockOp::Indr => {
                let port = self.regs.bc();
                let v = self.port_in(bus, port);
                self.regs.wz = port.wrapping_add(step);
                self.regs.b = self.regs.b.wrapping_sub(1);
                self.write(bus, hl, v);
                self.regs.set_hl(hl.wrapping_add(step));
                let k = u16::from(v) + u16::from(self.regs.c.wrapping_add(step as u8));
                self.block_io_flags(v, k);
                self.regs.b != 0
            }
            BlockOp::Outi | BlockOp::Outd | BlockOp::Otir | BlockOp::Otdr => {
                let v = self.read(bus, hl);
                self.regs.b = self.regs.b.wrapping_sub(1);
                let port = self.regs.bc();
                self.regs.wz = port.wrapping_add(step);
                self.port_out(bus, port, v);
                self.regs.set_hl(hl.wrapping_add(step));
                let k = u16::from(v) + u16::from(self.regs.l);
                self.block_io_flags(v, k);
                self.regs.b != 0
            }
        };
        self.charge(t.block);
        if op.repeats() && repeat {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            self.regs.wz = self.regs.pc.wrapping_add(1);
            self.charge(t.block_repeat);
        }
    }

    fn block_io_flags(&mut self, value: u8, k: u16) {
        let b = self.regs.b;
        let mut f = sz53(b);
        if value & 0x80 != 0 {
            f |= NF;
        }
        if k > 0xFF {
            f |= HF | CF;
        }
        if parity((k as u8 & 7) ^ b) {
            f |= PF;
        }
        self.regs.f = f;
    }
}

#[cfg(test)]
mod tests {
    use emu_core::{Bus, Cpu, EmuTime, SimpleBus};

    use crate::cpu::{R800, Z80};
    use crate::flags::{CF, PF, ZF};

    fn run(cpu: &mut Z80, bus: &mut SimpleBus, steps: usize) -> u64 {
        (0..steps).map(|_| cpu.step(bus).get()).sum()
    }

    #[test]
    fn ld_immediate_and_register() {
        let mut bus = SimpleBus::new();
        bus.load(0, &[0x3E, 0x42, 0x47]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        assert_eq!(run(&mut cpu, &mut bus, 2), 11);
        assert_eq!(cpu.regs.b, 0x42);
        assert_eq!(cpu.regs.pc, 3);
    }

    #[test]
    fn indexed_load_and_store() {
        let mut bus = SimpleBus::new();
        // LD IX,#8000 ; LD (IX-2),#5A ; LD A,(IX-2)
        bus.load(0, &[0xDD, 0x21, 0x00, 0x80, 0xDD, 0x36, 0xFE, 0x5A, 0xDD, 0x7E, 0xFE]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        assert_eq!(run(&mut cpu, &mut bus, 3), 14 + 19 + 19);
        assert_eq!(bus.peek(0x7FFE), 0x5A);
        assert_eq!(cpu.regs.a, 0x5A);
    }

    #[test]
    fn ldir_repeats_until_bc_is_zero() {
        let mut bus = SimpleBus::new();
        bus.load(0x4000, &[1, 2, 3]);
        bus.load(0, &[0xED, 0xB0]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        cpu.regs.set_hl(0x4000);
        cpu.regs.set_de(0x5000);
        cpu.regs.set_bc(3);
        assert_eq!(run(&mut cpu, &mut bus, 3), 21 + 21 + 16);
        assert_eq!(cpu.regs.pc, 2);
        assert_eq!(cpu.regs.bc(), 0);
        assert_eq!(cpu.regs.f & PF, 0);
        assert_eq!(&[bus.peek(0x5000), bus.peek(0x5001), bus.peek(0x5002)], &[1, 2, 3]);
    }

    #[test]
    fn cpir_stops_on_match() {
        let mut bus = SimpleBus::new();
        bus.load(0x4000, &[7, 8, 9, 10]);
        bus.load(0, &[0xED, 0xB1]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        cpu.regs.a = 9;
        cpu.regs.set_hl(0x4000);
        cpu.regs.set_bc(4);
        run(&mut cpu, &mut bus, 3);
        assert_eq!(cpu.regs.pc, 2);
        assert_eq!(cpu.regs.hl(), 0x4003);
        assert_eq!(cpu.regs.bc(), 1);
        assert_ne!(cpu.regs.f & ZF, 0);
    }

    #[test]
    fn call_and_ret_round_trip() {
        let mut bus = SimpleBus::new();
        // LD SP,#F000 ; CALL #0010 ... #0010: RET
        bus.load(0, &[0x31, 0x00, 0xF0, 0xCD, 0x10, 0x00]);
        bus.load(0x10, &[0xC9]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        assert_eq!(run(&mut cpu, &mut bus, 3), 10 + 17 + 10);
        assert_eq!(cpu.regs.pc, 6);
        assert_eq!(cpu.regs.sp, 0xF000);
        assert_eq!(bus.peek(0xEFFE), 0x06);
    }

    #[test]
    fn djnz_loop_timing() {
        let mut bus = SimpleBus::new();
        // LD B,3 ; loop: DJNZ loop
        bus.load(0, &[0x06, 0x03, 0x10, 0xFE]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        assert_eq!(run(&mut cpu, &mut bus, 4), 7 + 13 + 13 + 8);
        assert_eq!(cpu.regs.pc, 4);
    }

    #[test]
    fn ddcb_copies_result_into_register() {
        let mut bus = SimpleBus::new();
        bus.poke(0x8001, 0x81);
        // LD IX,#8000 ; RLC (IX+1),B
        bus.load(0, &[0xDD, 0x21, 0x00, 0x80, 0xDD, 0xCB, 0x01, 0x00]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        assert_eq!(run(&mut cpu, &mut bus, 2), 14 + 23);
        assert_eq!(bus.peek(0x8001), 0x03);
        assert_eq!(cpu.regs.b, 0x03);
        assert_ne!(cpu.regs.f & CF, 0);
    }

    #[test]
    fn phantom_prefix_costs_one_m1() {
        let mut bus = SimpleBus::new();
        // DD LD B,A
        bus.load(0, &[0xDD, 0x47]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        cpu.regs.a = 9;
        assert_eq!(run(&mut cpu, &mut bus, 1), 8);
        assert_eq!(cpu.regs.b, 9);
    }

    #[test]
    fn chained_index_prefixes_use_the_last_one() {
        let mut bus = SimpleBus::new();
        // DD FD LD HL,#1234 -> LD IY,#1234
        bus.load(0, &[0xDD, 0xFD, 0x21, 0x34, 0x12]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        let first = run(&mut cpu, &mut bus, 1);
        assert_eq!(first, 8);
        assert_eq!(cpu.prefix, Some(crate::opcodes::Table::Fd));
        let second = run(&mut cpu, &mut bus, 1);
        assert_eq!(second, 10);
        assert_eq!(cpu.regs.iy, 0x1234);
        assert_eq!(cpu.regs.ix, 0);
    }

    #[test]
    fn bit_hl_takes_xy_from_memptr() {
        let mut bus = SimpleBus::new();
        bus.poke(0x4000, 0x00);
        // LD HL,#4000 ; LD A,(#2827) ; BIT 0,(HL)
        bus.load(0, &[0x21, 0x00, 0x40, 0x3A, 0x27, 0x28, 0xCB, 0x46]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        run(&mut cpu, &mut bus, 3);
        // WZ = #2828 after LD A,(#2827).
        assert_eq!(cpu.regs.f & 0x28, 0x28);
        assert_ne!(cpu.regs.f & ZF, 0);
    }

    #[test]
    fn multiply_only_on_r800() {
        let mut bus = SimpleBus::new();
        // LD A,#10 ; LD B,#20 ; MULUB A,B
        bus.load(0, &[0x3E, 0x10, 0x06, 0x20, 0xED, 0xC1]);

        let mut r800 = R800::new(EmuTime::ZERO);
        let cycles: u64 = (0..3).map(|_| r800.step(&mut bus).get()).sum();
        assert_eq!(r800.regs.hl(), 0x0200);
        assert_eq!(cycles, 2 + 2 + 14);

        let mut z80 = Z80::new(EmuTime::ZERO);
        z80.regs.set_hl(0x1111);
        assert_eq!(run(&mut z80, &mut bus, 3), 7 + 7 + 8);
        assert_eq!(z80.regs.hl(), 0x1111);
    }

    #[test]
    fn muluw_fills_de_hl() {
        let mut bus = SimpleBus::new();
        // LD HL,#1234 ; LD BC,#0100 ; MULUW HL,BC
        bus.load(0, &[0x21, 0x34, 0x12, 0x01, 0x00, 0x01, 0xED, 0xC3]);
        let mut cpu = R800::new(EmuTime::ZERO);
        for _ in 0..3 {
            cpu.step(&mut bus);
        }
        assert_eq!(cpu.regs.de(), 0x0012);
        assert_eq!(cpu.regs.hl(), 0x3400);
        assert_ne!(cpu.regs.f & CF, 0);
    }

    #[test]
    fn out_and_in_through_ports() {
        let mut bus = SimpleBus::new();
        bus.set_port(0x99, 0x5A);
        // LD A,#12 ; OUT (#98),A ; IN A,(#99)
        bus.load(0, &[0x3E, 0x12, 0xD3, 0x98, 0xDB, 0x99]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        assert_eq!(run(&mut cpu, &mut bus, 3), 7 + 11 + 11);
        assert_eq!(bus.port_writes, vec![(0x1298, 0x12)]);
        assert_eq!(cpu.regs.a, 0x5A);
    }

    #[test]
    fn refresh_counts_m1_cycles() {
        let mut bus = SimpleBus::new();
        // NOP ; LD IX,#0000 ; BIT 0,(IX+0)
        bus.load(0, &[0x00, 0xDD, 0x21, 0x00, 0x00, 0xDD, 0xCB, 0x00, 0x46]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        run(&mut cpu, &mut bus, 3);
        assert_eq!(cpu.regs.r, 5);
    }
}
