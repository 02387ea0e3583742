//! Debugger surface: breakpoints and a small textual command language.
//!
//! Commands:
//!
//! ```text
//! step                     execute one instruction
//! cont                     leave break state
//! break                    enter break state
//! bp add <addr>            set a breakpoint
//! bp remove <addr>         clear a breakpoint
//! bp list                  list breakpoints
//! disasm [addr] [count]    disassemble (default: PC, 1 instruction)
//! regs                     register dump
//! get <path>               one observable value, e.g. `get flags.z`
//! ```
//!
//! Addresses are `#hex`, `0xhex`, `$hex` or decimal.

use std::fmt::Write as _;

use emu_core::{Bus, Cpu, Observable};

use crate::cpu::CpuCore;
use crate::error::DebugError;
use crate::personality::Personality;
use crate::registers::Registers;

/// Upper bound for `disasm` counts.
const MAX_DISASM: usize = 256;

impl<P: Personality> CpuCore<P> {
    /// Stop execution before the instruction at `address`.
    pub fn add_breakpoint(&mut self, address: u16) -> Result<(), DebugError> {
        if !self.breakpoints.insert(address) {
            return Err(DebugError::BreakpointExists(address));
        }
        tracing::debug!(address = format_args!("{address:#06X}"), "breakpoint added");
        self.link.arm(1);
        Ok(())
    }

    pub fn remove_breakpoint(&mut self, address: u16) -> Result<(), DebugError> {
        if !self.breakpoints.remove(&address) {
            return Err(DebugError::NoBreakpoint(address));
        }
        tracing::debug!(address = format_args!("{address:#06X}"), "breakpoint removed");
        self.link.arm(1);
        Ok(())
    }

    /// Breakpoints in ascending address order.
    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }

    /// Run one debugger command and return its output.
    ///
    /// A rejected command leaves the CPU untouched.
    pub fn command<B: Bus>(&mut self, bus: &mut B, line: &str) -> Result<String, DebugError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(DebugError::Empty);
        };
        let args: Vec<&str> = words.collect();
        match name {
            "step" => {
                no_args("step", &args)?;
                let ticks = self.debug_step(bus);
                Ok(format!("{ticks}\n{}", dump(&self.regs)))
            }
            "cont" => {
                no_args("cont", &args)?;
                self.continue_cpu();
                Ok("running".to_string())
            }
            "break" => {
                no_args("break", &args)?;
                self.break_cpu();
                Ok(format!("break at #{:04X}", self.regs.pc))
            }
            "bp" => self.breakpoint_command(&args),
            "disasm" => self.disasm_command(bus, &args),
            "regs" => {
                no_args("regs", &args)?;
                Ok(dump(&self.registers()))
            }
            "get" => match args.as_slice() {
                [path] => self
                    .query(path)
                    .map(|v| format!("{path}={v}"))
                    .ok_or_else(|| DebugError::UnknownPath((*path).to_string())),
                _ => Err(DebugError::Arguments {
                    command: "get",
                    expected: "one path",
                }),
            },
            other => Err(DebugError::UnknownCommand(other.to_string())),
        }
    }

    fn breakpoint_command(&mut self, args: &[&str]) -> Result<String, DebugError> {
        const USAGE: DebugError = DebugError::Arguments {
            command: "bp",
            expected: "`add <addr>`, `remove <addr>` or `list`",
        };
        match args {
            ["add", addr] => {
                let address = parse_address(addr)?;
                self.add_breakpoint(address)?;
                Ok(format!("breakpoint set at #{address:04X}"))
            }
            ["remove", addr] => {
                let address = parse_address(addr)?;
                self.remove_breakpoint(address)?;
                Ok(format!("breakpoint removed at #{address:04X}"))
            }
            ["list"] => {
                if self.breakpoints.is_empty() {
                    return Ok("no breakpoints".to_string());
                }
                let list: Vec<String> = self.breakpoints().map(|a| format!("#{a:04X}")).collect();
                Ok(list.join("\n"))
            }
            _ => Err(USAGE),
        }
    }

    fn disasm_command<B: Bus>(&self, bus: &B, args: &[&str]) -> Result<String, DebugError> {
        let (mut address, count) = match args {
            [] => (self.regs.pc, 1),
            [addr] => (parse_address(addr)?, 1),
            [addr, count] => (parse_address(addr)?, parse_count(count)?),
            _ => {
                return Err(DebugError::Arguments {
                    command: "disasm",
                    expected: "at most an address and a count",
                });
            }
        };
        let mut out = String::new();
        for i in 0..count {
            let (text, len) = self.disassemble(bus, address);
            if i > 0 {
                out.push('\n');
            }
            let _ = write!(out, "#{address:04X}  {text}");
            address = address.wrapping_add(len);
        }
        Ok(out)
    }
}

fn no_args(command: &'static str, args: &[&str]) -> Result<(), DebugError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(DebugError::Arguments {
            command,
            expected: "no arguments",
        })
    }
}

/// Parse `#hex`, `$hex`, `0xhex` or decimal.
pub fn parse_address(text: &str) -> Result<u16, DebugError> {
    let lower = text.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower
        .strip_prefix('#')
        .or_else(|| lower.strip_prefix('$'))
        .or_else(|| lower.strip_prefix("0x"))
    {
        u16::from_str_radix(hex, 16)
    } else {
        lower.parse()
    };
    parsed.map_err(|_| DebugError::Address(text.to_string()))
}

fn parse_count(text: &str) -> Result<usize, DebugError> {
    match text.parse::<usize>() {
        Ok(n) if (1..=MAX_DISASM).contains(&n) => Ok(n),
        _ => Err(DebugError::Count(text.to_string())),
    }
}

fn dump(r: &Registers) -> String {
    format!(
        "af=#{:04X} bc=#{:04X} de=#{:04X} hl=#{:04X} ix=#{:04X} iy=#{:04X} sp=#{:04X} pc=#{:04X}\n\
         af'=#{:04X} bc'=#{:04X} de'=#{:04X} hl'=#{:04X} i=#{:02X} r=#{:02X} im={} iff1={} iff2={}{}",
        r.af(),
        r.bc(),
        r.de(),
        r.hl(),
        r.ix,
        r.iy,
        r.sp,
        r.pc,
        r.af_alt(),
        r.bc_alt(),
        r.de_alt(),
        r.hl_alt(),
        r.i,
        r.r,
        r.im,
        u8::from(r.iff1),
        u8::from(r.iff2),
        if r.halted { " halted" } else { "" },
    )
}
