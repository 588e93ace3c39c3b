//! Simulated OpenOCD target for unit tests (enabled for dependents through
//! the `mock` feature).
//!
//! The mock answers the same command vocabulary as a real server, including
//! the command echo, over a tiny Cortex-M register file. Instructions are
//! installed per address; every other address executes as a no-op.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::registers::Register;
use crate::session::Transport;

const BANNER: &str = "Open On-Chip Debugger\n";
const LR: usize = 14;
const PC: usize = 15;
const INITIAL_SP: u32 = 0x2000_0400;

/// Effect of one simulated instruction on the register file.
pub type Program = Box<dyn Fn(&mut [u32; 16], &dyn Fn(u32) -> u32)>;

pub struct MockTransport {
    regs: [u32; 16],
    reset_pc: u32,
    words: HashMap<u32, u32>,
    memory: Option<Box<dyn Fn(u32) -> u32>>,
    program: HashMap<u32, Program>,
    fail_register_reads: bool,
    fail_memory_reads: bool,
    banner_sent: bool,
    pending: Option<String>,
    commands: Vec<String>,
    steps: usize,
}

impl MockTransport {
    pub fn new(reset_pc: u32) -> Self {
        let mut regs = [0u32; 16];
        regs[13] = INITIAL_SP;
        regs[PC] = reset_pc;
        Self {
            regs,
            reset_pc,
            words: HashMap::new(),
            memory: None,
            program: HashMap::new(),
            fail_register_reads: false,
            fail_memory_reads: false,
            banner_sent: false,
            pending: None,
            commands: Vec::new(),
            steps: 0,
        }
    }

    /// Store a word readable through `mdw` and through simulated loads.
    pub fn with_word(mut self, address: u32, value: u32) -> Self {
        self.words.insert(address, value);
        self
    }

    /// Fallback for addresses not stored with [`with_word`](Self::with_word).
    pub fn with_memory(mut self, memory: impl Fn(u32) -> u32 + 'static) -> Self {
        self.memory = Some(Box::new(memory));
        self
    }

    pub fn with_instruction(
        mut self,
        address: u32,
        effect: impl Fn(&mut [u32; 16], &dyn Fn(u32) -> u32) + 'static,
    ) -> Self {
        self.program.insert(address, Box::new(effect));
        self
    }

    /// `ldr dst, [src]` at `address`.
    pub fn with_load(self, address: u32, src: Register, dst: Register) -> Self {
        let (src, dst) = (src.number() as usize, dst.number() as usize);
        self.with_instruction(address, move |regs, mem| regs[dst] = mem(regs[src]))
    }

    /// Single-register reads answer without any hex literal.
    pub fn fail_register_reads(mut self) -> Self {
        self.fail_register_reads = true;
        self
    }

    /// `mdw` answers with an error instead of a word.
    pub fn fail_memory_reads(mut self) -> Self {
        self.fail_memory_reads = true;
        self
    }

    pub fn register(&self, reg: Register) -> u32 {
        self.regs[reg.number() as usize]
    }

    /// Every command line received so far.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    fn read_word(&self, address: u32) -> u32 {
        if let Some(value) = self.words.get(&address) {
            return *value;
        }
        self.memory.as_ref().map(|m| m(address)).unwrap_or(0)
    }

    fn execute(&mut self, line: &str) -> String {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let body = match parts.as_slice() {
            ["reset", "halt"] => {
                self.regs = [0; 16];
                self.regs[13] = INITIAL_SP;
                self.regs[LR] = 0xFFFF_FFFF;
                self.regs[PC] = self.reset_pc;
                format!(
                    "target halted due to debug-request, current mode: Thread \nxPSR: 0x01000000 pc: 0x{:08x} msp: 0x{:08x}\n",
                    self.reset_pc, INITIAL_SP
                )
            }
            ["mdw", _] if self.fail_memory_reads => {
                "Error: Failed to read memory at 0x10001004\n".to_string()
            }
            ["mdw", addr] => match parse_value(addr) {
                Some(address) => format!("0x{:08x}: {:08x} \n", address, self.read_word(address)),
                None => "invalid command argument\n".to_string(),
            },
            ["reg"] => self.listing(),
            ["reg", name] => match name.parse::<Register>() {
                Ok(_) if self.fail_register_reads => "Error: target not halted\n".to_string(),
                Ok(reg) => format!("{} (/32): 0x{:08x}\n", reg, self.register(reg)),
                Err(_) => format!("register {} not found in current target\n", name),
            },
            ["reg", name, value] => match (name.parse::<Register>(), parse_value(value)) {
                (Ok(reg), Some(value)) => {
                    self.regs[reg.number() as usize] = value;
                    format!("{} (/32): 0x{:08x}\n", reg, value)
                }
                _ => "invalid command argument\n".to_string(),
            },
            ["step"] => {
                let pc = self.regs[PC];
                self.steps += 1;
                if let Some(effect) = self.program.get(&pc) {
                    let words = &self.words;
                    let memory = &self.memory;
                    let mem = |address: u32| {
                        words
                            .get(&address)
                            .copied()
                            .or_else(|| memory.as_ref().map(|m| m(address)))
                            .unwrap_or(0)
                    };
                    effect(&mut self.regs, &mem);
                }
                self.regs[PC] = pc.wrapping_add(2);
                format!(
                    "target halted due to single-step, current mode: Thread \nxPSR: 0x01000000 pc: 0x{:08x} msp: 0x{:08x}\n",
                    self.regs[PC], self.regs[13]
                )
            }
            _ => format!("invalid command name \"{}\"\n", line),
        };
        format!("{}\n{}", line, body)
    }

    fn listing(&self) -> String {
        let mut out = String::from("===== arm v7m registers\n");
        for (n, name) in [
            "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "sp",
            "lr", "pc",
        ]
        .iter()
        .enumerate()
        {
            out.push_str(&format!("({}) {} (/32): 0x{:08x}\n", n, name, self.regs[n]));
        }
        out.push_str("(16) xPSR (/32): 0x01000000\n");
        out
    }
}

fn parse_value(s: &str) -> Option<u32> {
    let hex = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(hex, 16).ok()
}

impl Transport for MockTransport {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.commands.push(line.to_string());
        let response = self.execute(line);
        self.pending = Some(response);
        Ok(())
    }

    fn read_until(&mut self, _prompt: &str) -> Result<String> {
        if let Some(response) = self.pending.take() {
            return Ok(response);
        }
        if !self.banner_sent {
            self.banner_sent = true;
            return Ok(BANNER.to_string());
        }
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "no response pending",
        )))
    }
}
