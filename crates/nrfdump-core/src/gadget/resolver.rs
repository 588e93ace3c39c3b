use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::gadget::{Gadget, GadgetCandidate};
use crate::oracle::KnownMarker;
use crate::probe::Probe;
use crate::registers::GENERAL;
use crate::session::Transport;

/// Finds which register supplies the address operand of a candidate.
pub struct InputResolver<'a, T: Transport> {
    probe: &'a mut Probe<T>,
    marker: KnownMarker,
}

impl<'a, T: Transport> InputResolver<'a, T> {
    pub fn new(probe: &'a mut Probe<T>, marker: KnownMarker) -> Self {
        Self { probe, marker }
    }

    /// Try each register in [`GENERAL`] order: zero everything, load only that
    /// register with the marker address, execute the candidate and look for
    /// the marker value. The first register that reproduces it wins.
    ///
    /// The output register is taken from the winning probe, which may differ
    /// from the one the scan reported.
    pub fn resolve(&mut self, candidate: GadgetCandidate) -> Result<Gadget> {
        info!("Checking which register is the source...");

        for reg in GENERAL {
            debug!("register: {}", reg);
            self.probe.set_all_registers(0)?;
            self.probe.write_register(reg, self.marker.address)?;
            self.probe.step_at(candidate.instruction_address)?;

            let Some(output_register) = self
                .probe
                .read_all_registers()?
                .find_value(self.marker.value)
            else {
                continue;
            };

            if output_register != candidate.output_register {
                warn!(
                    "Output register changed from {} to {} while resolving the source",
                    candidate.output_register, output_register
                );
            }
            info!("Found source register: {}", reg);
            return Ok(Gadget {
                instruction_address: candidate.instruction_address,
                input_register: reg,
                output_register,
            });
        }

        Err(Error::InputRegisterNotFound {
            instruction_address: candidate.instruction_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::mock_probe;
    use crate::registers::Register;
    use crate::session::MockTransport;

    const MARKER_ADDRESS: u32 = 0x1000_1004;
    const MARKER_VALUE: u32 = 0xFFFF_FF00;
    const GADGET: u32 = 0x0000_114C;

    fn marker() -> KnownMarker {
        KnownMarker::new(MARKER_ADDRESS, MARKER_VALUE).unwrap()
    }

    fn candidate() -> GadgetCandidate {
        GadgetCandidate {
            instruction_address: GADGET,
            output_register: Register::R3,
        }
    }

    #[test]
    fn test_resolves_input_register() {
        let transport = MockTransport::new(0)
            .with_word(MARKER_ADDRESS, MARKER_VALUE)
            .with_load(GADGET, Register::R5, Register::R3);
        let mut probe = mock_probe(transport);

        let gadget = InputResolver::new(&mut probe, marker())
            .resolve(candidate())
            .unwrap();
        assert_eq!(gadget.input_register, Register::R5);
        assert_eq!(gadget.output_register, Register::R3);
        assert_eq!(gadget.instruction_address, GADGET);

        let session = probe.into_session();
        let mock = session.transport();
        assert_eq!(mock.register(Register::R5), MARKER_ADDRESS);
        assert_eq!(mock.register(Register::R3), MARKER_VALUE);
        for reg in GENERAL {
            if reg != Register::R5 && reg != Register::R3 {
                assert_eq!(mock.register(reg), 0, "{} left set", reg);
            }
        }
        assert_eq!(mock.steps(), 6);
    }

    #[test]
    fn test_output_register_taken_from_resolution() {
        let transport = MockTransport::new(0)
            .with_word(MARKER_ADDRESS, MARKER_VALUE)
            .with_load(GADGET, Register::R1, Register::R4);
        let mut probe = mock_probe(transport);

        let gadget = InputResolver::new(&mut probe, marker())
            .resolve(candidate())
            .unwrap();
        assert_eq!(gadget.input_register, Register::R1);
        assert_eq!(gadget.output_register, Register::R4);
    }

    #[test]
    fn test_no_input_register() {
        // Only fires when r0 and r1 agree, which a single-register probe never produces.
        let transport = MockTransport::new(0)
            .with_word(MARKER_ADDRESS, MARKER_VALUE)
            .with_instruction(GADGET, |regs, mem| {
                if regs[0] != 0 && regs[0] == regs[1] {
                    regs[3] = mem(regs[0]);
                }
            });
        let mut probe = mock_probe(transport);

        let err = InputResolver::new(&mut probe, marker())
            .resolve(candidate())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InputRegisterNotFound {
                instruction_address: GADGET
            }
        ));
        assert_eq!(probe.into_session().transport().steps(), GENERAL.len());
    }
}
